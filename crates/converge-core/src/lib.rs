//! Converge Core - drive an agent to expected states
//!
//! Pushes configurations to an agent and blocks until its reported state
//! converges on what each step expects:
//! - Waits on a snapshot stream under a deadline and cancellation
//! - Runs ordered steps, failing fast with the last diagnostic
//! - Adapts push-based and pull-based agents to one stream shape
//! - Ships an in-process simulated agent for end-to-end runs
//!
//! # Example
//!
//! ```rust,ignore
//! use converge_core::{DriverConfig, SequenceDriver, SimulatedAgent, Step};
//! use converge_state::{ClientState, ExpectationStep};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let driver = SequenceDriver::new(Arc::new(SimulatedAgent::default()), DriverConfig::new());
//! let ctx = driver.context();
//!
//! driver.prepare(&ctx, &["fake".to_string()]).await?;
//! let steps = vec![Step::new(ExpectationStep::new("", ClientState::Healthy))];
//! let report = driver.run(&ctx, &steps).await?;
//!
//! println!("converged {} steps in {:?}", report.steps.len(), report.elapsed);
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![warn(missing_docs)]

pub mod config;
pub mod context;
pub mod driver;
pub mod error;
pub mod fixture;
pub mod poller;
pub mod simulator;
pub mod source;

pub use config::{ConfigError, DriverConfig};
pub use context::RunContext;
pub use driver::{RunReport, SequenceDriver, Step, StepHook, StepOutcome};
pub use error::{FailureKind, FixtureError, RunError, WaitError};
pub use fixture::AgentFixture;
pub use poller::{wait_for_match, Converged};
pub use simulator::{SimulatedAgent, SimulatorConfig};
pub use source::{channel_source, polling_source, watch_source, SnapshotStream, MIN_POLL_INTERVAL};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for writing convergence tests
    pub use crate::{
        AgentFixture, DriverConfig, RunContext, RunError, SequenceDriver, Step,
    };
    pub use converge_state::{
        ClientState, ComponentState, ComponentUnitKey, ComponentUnitState, ExpectationStep,
        StateSnapshot,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
