//! Error types for Converge Core
//!
//! Provides error handling for:
//! - Fixture preparation and configuration failures
//! - Convergence waits that time out, get cancelled or lose their source
//!   (either by closing or by failing)
//! - Sequence runs, tagged with the failing step

use converge_state::MatchReport;
use std::time::Duration;

/// Failures reported by the agent collaborator
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FixtureError {
    /// Component binaries could not be staged
    #[error("prepare failed: {0}")]
    Prepare(String),

    /// Configuration could not be delivered
    #[error("configure failed: {0}")]
    Configure(String),

    /// Configuration document could not be understood by the agent
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The agent does not offer this kind of access
    #[error("unsupported by this agent: {0}")]
    Unsupported(String),

    /// The agent is gone
    #[error("agent closed")]
    Closed,
}

/// Why a convergence wait ended without a match
///
/// Every variant carries the report from the last evaluated snapshot.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WaitError {
    /// Deadline elapsed first
    #[error("timed out after {waited:?} waiting for state: {last}")]
    Timeout {
        /// Time spent waiting
        waited: Duration,
        /// Last diagnostic
        last: MatchReport,
    },

    /// Cancelled by the caller
    #[error("cancelled while waiting for state: {last}")]
    Cancelled {
        /// Last diagnostic
        last: MatchReport,
    },

    /// The snapshot source ended
    #[error("state source closed before convergence: {last}")]
    SourceClosed {
        /// Last diagnostic
        last: MatchReport,
    },

    /// The snapshot source failed
    #[error("state source failed: {error}; last: {last}")]
    Source {
        /// Collaborator error
        #[source]
        error: FixtureError,
        /// Last diagnostic
        last: MatchReport,
    },
}

impl WaitError {
    /// Diagnostic from the last evaluated snapshot
    #[must_use]
    pub fn last_report(&self) -> &MatchReport {
        match self {
            Self::Timeout { last, .. }
            | Self::Cancelled { last }
            | Self::SourceClosed { last }
            | Self::Source { last, .. } => last,
        }
    }
}

/// Classification of a failed run, for reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// Collaborator could not be prepared
    Setup,
    /// Configuration push failed
    ConfigPush,
    /// Deadline elapsed before convergence
    Timeout,
    /// Caller cancelled the run
    Cancelled,
    /// State stopped changing without matching
    Mismatch,
    /// Post-convergence check failed
    AfterHook,
    /// State could not be observed
    Source,
}

/// Error returned by a sequence run
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    /// Fixture preparation failed; no steps were attempted
    #[error("setup failed: {0}")]
    Setup(#[source] FixtureError),

    /// Pushing a step's configuration failed
    #[error("step {step}: configuration push failed: {source}")]
    ConfigPush {
        /// Failing step index
        step: usize,
        /// Collaborator error
        #[source]
        source: FixtureError,
    },

    /// A step never reached its expected state
    #[error("step {step}: {source}")]
    Convergence {
        /// Failing step index
        step: usize,
        /// Wait outcome
        #[source]
        source: WaitError,
    },

    /// A step converged but its follow-up check failed
    #[error("step {step}: after hook failed: {reason}")]
    AfterHook {
        /// Failing step index
        step: usize,
        /// Hook message
        reason: String,
    },
}

impl RunError {
    /// Index of the failing step, if the run got that far
    #[inline]
    #[must_use]
    pub fn step(&self) -> Option<usize> {
        match self {
            Self::Setup(_) => None,
            Self::ConfigPush { step, .. }
            | Self::Convergence { step, .. }
            | Self::AfterHook { step, .. } => Some(*step),
        }
    }

    /// Last match diagnostic, for convergence failures
    #[must_use]
    pub fn diagnostic(&self) -> Option<&MatchReport> {
        match self {
            Self::Convergence { source, .. } => Some(source.last_report()),
            _ => None,
        }
    }

    /// Failure classification
    #[must_use]
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Setup(_) => FailureKind::Setup,
            Self::ConfigPush { .. } => FailureKind::ConfigPush,
            Self::Convergence { source, .. } => match source {
                WaitError::Timeout { .. } => FailureKind::Timeout,
                WaitError::Cancelled { .. } => FailureKind::Cancelled,
                WaitError::SourceClosed { .. } => FailureKind::Mismatch,
                WaitError::Source { .. } => FailureKind::Source,
            },
            Self::AfterHook { .. } => FailureKind::AfterHook,
        }
    }

    /// Check if the run hit its deadline
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        self.kind() == FailureKind::Timeout
    }

    /// Check if the run was cancelled
    #[inline]
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.kind() == FailureKind::Cancelled
    }
}
