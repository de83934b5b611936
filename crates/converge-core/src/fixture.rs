//! Agent collaborator seam
//!
//! Implement [`AgentFixture`] to put a real or simulated agent under test.
//! The driver never inspects configuration payloads; it hands them over and
//! watches the snapshot stream.

use crate::error::FixtureError;
use crate::source::SnapshotStream;
use converge_state::StateSnapshot;

/// A running agent the driver can configure and observe
#[async_trait::async_trait]
pub trait AgentFixture: Send + Sync {
    /// Stage the named component binaries before any step runs
    async fn prepare(&self, components: &[String]) -> Result<(), FixtureError>;

    /// Deliver a configuration document; applying it is the agent's job
    async fn configure(&self, payload: &str) -> Result<(), FixtureError>;

    /// Fresh stream of pushed snapshots, starting from the latest one
    fn subscribe(&self) -> SnapshotStream;

    /// Latest snapshot for pull-based observation, `None` before the first one
    async fn latest(&self) -> Result<Option<StateSnapshot>, FixtureError> {
        Err(FixtureError::Unsupported("polling".to_string()))
    }
}
