//! Sequence driver
//!
//! Pushes each step's configuration, then blocks on convergence before
//! moving to the next step. The whole run shares one [`RunContext`]; each
//! wait gets whatever time the run has left (optionally capped per step).
//! The first failing step aborts the run.

use crate::config::DriverConfig;
use crate::context::RunContext;
use crate::error::{FixtureError, RunError, WaitError};
use crate::fixture::AgentFixture;
use crate::poller::wait_for_match;
use crate::source::{polling_source, SnapshotStream};
use converge_state::{ExpectationStep, MatchReport};
use futures::future::BoxFuture;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Check run after a step has converged
pub type StepHook = Arc<dyn Fn() -> BoxFuture<'static, Result<(), String>> + Send + Sync>;

/// One step of a run: an expectation and an optional follow-up check
#[derive(Clone)]
pub struct Step {
    /// Configuration and expected state
    pub expectation: ExpectationStep,
    after: Option<StepHook>,
}

impl Step {
    /// Step without a follow-up check
    #[inline]
    #[must_use]
    pub fn new(expectation: ExpectationStep) -> Self {
        Self {
            expectation,
            after: None,
        }
    }

    /// Run `hook` once the step has converged; an `Err` fails the step
    #[must_use]
    pub fn with_after<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), String>> + Send + 'static,
    {
        self.after = Some(Arc::new(move || -> BoxFuture<'static, Result<(), String>> {
            Box::pin(hook())
        }));
        self
    }
}

impl From<ExpectationStep> for Step {
    fn from(expectation: ExpectationStep) -> Self {
        Self::new(expectation)
    }
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Step")
            .field("expectation", &self.expectation)
            .field("after", &self.after.is_some())
            .finish()
    }
}

/// Per-step statistics of a successful run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepOutcome {
    /// Step index
    pub index: usize,
    /// Snapshots evaluated before the match
    pub snapshots_seen: usize,
    /// Time from configuration push to convergence
    pub elapsed: Duration,
}

/// Summary of a successful run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// One entry per step, in order
    pub steps: Vec<StepOutcome>,
    /// Wall-clock time of the run
    pub elapsed: Duration,
}

/// Drives an agent through a sequence of steps
pub struct SequenceDriver {
    fixture: Arc<dyn AgentFixture>,
    config: DriverConfig,
}

impl SequenceDriver {
    /// Create a driver for `fixture`
    #[must_use]
    pub fn new(fixture: Arc<dyn AgentFixture>, config: DriverConfig) -> Self {
        Self { fixture, config }
    }

    /// Driver configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Context bounded by the configured run timeout
    #[must_use]
    pub fn context(&self) -> RunContext {
        RunContext::with_timeout(self.config.run_timeout)
    }

    /// Stage component binaries on the fixture
    ///
    /// # Errors
    /// `RunError::Setup` if the fixture fails or the context expires first.
    pub async fn prepare(&self, ctx: &RunContext, components: &[String]) -> Result<(), RunError> {
        tracing::info!(?components, "preparing fixture");
        let result = tokio::select! {
            biased;
            () = ctx.cancelled() => Err(FixtureError::Prepare("cancelled".to_string())),
            res = tokio::time::timeout_at(ctx.deadline(), self.fixture.prepare(components)) => {
                res.unwrap_or_else(|_| Err(FixtureError::Prepare("deadline elapsed".to_string())))
            }
        };
        result.map_err(|err| {
            tracing::error!(error = %err, "fixture preparation failed");
            RunError::Setup(err)
        })
    }

    /// Run every step in order, stopping at the first failure
    ///
    /// # Errors
    /// - `RunError::ConfigPush` if the fixture rejects a configuration
    /// - `RunError::Convergence` on timeout, cancellation or a closed source
    /// - `RunError::AfterHook` if a follow-up check fails
    pub async fn run(&self, ctx: &RunContext, steps: &[Step]) -> Result<RunReport, RunError> {
        let started = Instant::now();
        let mut source = self.observe();
        let mut report = RunReport::default();

        for (index, step) in steps.iter().enumerate() {
            let outcome = self.run_step(ctx, index, step, &mut source).await?;
            report.steps.push(outcome);
        }

        report.elapsed = started.elapsed();
        tracing::info!(steps = steps.len(), elapsed = ?report.elapsed, "run converged");
        Ok(report)
    }

    async fn run_step(
        &self,
        ctx: &RunContext,
        index: usize,
        step: &Step,
        source: &mut SnapshotStream,
    ) -> Result<StepOutcome, RunError> {
        if ctx.is_cancelled() {
            return Err(RunError::Convergence {
                step: index,
                source: WaitError::Cancelled {
                    last: MatchReport::no_snapshot(),
                },
            });
        }

        let step_ctx = match self.config.step_timeout {
            Some(limit) => ctx.child_with_timeout(limit),
            None => ctx.child(),
        };
        let started = Instant::now();

        tracing::info!(step = index, remaining = ?step_ctx.remaining(), "applying configuration");
        within(
            &step_ctx,
            self.fixture.configure(&step.expectation.configure),
            MatchReport::no_snapshot(),
        )
        .await
        .map_err(|source| {
            tracing::error!(step = index, error = %source, "configuration push interrupted");
            RunError::Convergence {
                step: index,
                source,
            }
        })?
        .map_err(|source| {
            tracing::error!(step = index, error = %source, "configuration push failed");
            RunError::ConfigPush {
                step: index,
                source,
            }
        })?;

        let expectation = &step.expectation;
        let converged = wait_for_match(&step_ctx, source, |snapshot| expectation.evaluate(snapshot))
            .await
            .map_err(|source| RunError::Convergence {
                step: index,
                source,
            })?;

        if let Some(hook) = &step.after {
            within(&step_ctx, hook(), MatchReport::matched())
                .await
                .map_err(|source| {
                    tracing::error!(step = index, error = %source, "after hook interrupted");
                    RunError::Convergence {
                        step: index,
                        source,
                    }
                })?
                .map_err(|reason| {
                    tracing::error!(step = index, %reason, "after hook failed");
                    RunError::AfterHook {
                        step: index,
                        reason,
                    }
                })?;
        }

        let outcome = StepOutcome {
            index,
            snapshots_seen: converged.snapshots_seen,
            elapsed: started.elapsed(),
        };
        tracing::info!(
            step = index,
            snapshots = outcome.snapshots_seen,
            elapsed = ?outcome.elapsed,
            "step converged"
        );
        Ok(outcome)
    }

    fn observe(&self) -> SnapshotStream {
        match self.config.poll_interval {
            Some(period) => {
                let fixture = Arc::clone(&self.fixture);
                polling_source(
                    move || {
                        let fixture = Arc::clone(&fixture);
                        async move { fixture.latest().await }
                    },
                    period,
                )
            }
            None => self.fixture.subscribe(),
        }
    }
}

/// Await a collaborator call, giving up when `ctx` expires or is cancelled
///
/// `last` is the diagnostic reported if the call is interrupted.
async fn within<F: Future>(
    ctx: &RunContext,
    call: F,
    last: MatchReport,
) -> Result<F::Output, WaitError> {
    let started = Instant::now();
    tokio::select! {
        biased;
        () = ctx.cancelled() => Err(WaitError::Cancelled { last }),
        res = tokio::time::timeout_at(ctx.deadline(), call) => res.map_err(|_| WaitError::Timeout {
            waited: started.elapsed(),
            last,
        }),
    }
}

impl fmt::Debug for SequenceDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SequenceDriver")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
