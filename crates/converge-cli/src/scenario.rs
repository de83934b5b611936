//! Scenario files
//!
//! A scenario lists the component binaries to stage, the simulator's
//! timing and the steps to drive it through.

use converge_core::{
    DriverConfig, RunError, RunReport, SequenceDriver, SimulatedAgent, SimulatorConfig, Step,
};
use converge_state::ExpectationStep;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::Instrument;

/// A sequence of steps run against the simulated agent
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Scenario {
    /// Label used in logs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Run timeout override in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    /// Component binaries staged before the first step
    pub prepare: Vec<String>,
    /// Simulator timing
    pub simulator: SimulatorConfig,
    /// Steps, run in order
    pub steps: Vec<ExpectationStep>,
}

impl Scenario {
    /// Driver configuration for this scenario
    ///
    /// An explicit `timeout_secs` wins over the scenario's own, which wins
    /// over `base`.
    #[must_use]
    pub fn driver_config(&self, base: DriverConfig, timeout_secs: Option<u64>) -> DriverConfig {
        match timeout_secs.or(self.timeout_secs) {
            Some(secs) => base.with_run_timeout(Duration::from_secs(secs)),
            None => base,
        }
    }
}

/// Run `scenario` against a fresh simulated agent
///
/// # Errors
/// The first failing step's [`RunError`], or a setup error if the
/// component binaries cannot be staged.
pub async fn run_scenario(scenario: &Scenario, config: DriverConfig) -> Result<RunReport, RunError> {
    let agent = Arc::new(SimulatedAgent::new(scenario.simulator.clone()));
    let driver = SequenceDriver::new(agent.clone(), config);
    let ctx = driver.context();

    let span = tracing::info_span!(
        "scenario",
        name = scenario.name.as_deref().unwrap_or("unnamed"),
        steps = scenario.steps.len()
    );

    let steps: Vec<Step> = scenario.steps.iter().cloned().map(Step::from).collect();
    let result = async {
        match driver.prepare(&ctx, &scenario.prepare).await {
            Ok(()) => driver.run(&ctx, &steps).await,
            Err(err) => Err(err),
        }
    }
    .instrument(span)
    .await;

    agent.shutdown();
    result
}
