//! Simulated agent
//!
//! An in-process [`AgentFixture`] that behaves like an agent running fake
//! components. Applying a configuration walks the reported state through
//! the same phases a real agent goes through:
//!
//! 1. agent `Configuring`, planned components `Starting`
//! 2. after `transition_delay`: agent `Healthy`, components `Healthy`,
//!    units at their declared states
//! 3. after `shipper_delay`: shipper components appear
//!
//! Components whose binary was never prepared report `Failed`.

mod topology;

use crate::config::millis;
use crate::error::FixtureError;
use crate::fixture::AgentFixture;
use crate::source::{watch_source, SnapshotStream};
use converge_state::{
    AgentState, ClientState, ComponentMap, ComponentState, ComponentUnitState, StateSnapshot,
};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use topology::{PlannedComponent, Topology};

/// Simulator timing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Time from configuration to healthy components
    #[serde(with = "millis")]
    pub transition_delay: Duration,
    /// Additional time before shipper components appear
    #[serde(with = "millis")]
    pub shipper_delay: Duration,
    /// Upper bound of random extra delay per phase
    #[serde(with = "millis")]
    pub jitter: Duration,
    /// Seed for jitter; unseeded runs use entropy
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl SimulatorConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With transition delay
    #[inline]
    #[must_use]
    pub fn with_transition_delay(mut self, delay: Duration) -> Self {
        self.transition_delay = delay;
        self
    }

    /// With shipper delay
    #[inline]
    #[must_use]
    pub fn with_shipper_delay(mut self, delay: Duration) -> Self {
        self.shipper_delay = delay;
        self
    }

    /// With seeded jitter
    #[inline]
    #[must_use]
    pub fn with_jitter(mut self, jitter: Duration, seed: u64) -> Self {
        self.jitter = jitter;
        self.seed = Some(seed);
        self
    }
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            transition_delay: Duration::from_millis(200),
            shipper_delay: Duration::from_millis(300),
            jitter: Duration::ZERO,
            seed: None,
        }
    }
}

/// In-process agent running fake components
pub struct SimulatedAgent {
    config: SimulatorConfig,
    state: Arc<watch::Sender<Option<StateSnapshot>>>,
    prepared: Mutex<BTreeSet<String>>,
    rng: Mutex<StdRng>,
    applying: Mutex<Option<JoinHandle<()>>>,
}

impl SimulatedAgent {
    /// Create an agent in `Starting` state with no components
    #[must_use]
    pub fn new(config: SimulatorConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let (state, _) = watch::channel(Some(StateSnapshot::new(ClientState::Starting)));
        Self {
            config,
            state: Arc::new(state),
            prepared: Mutex::new(BTreeSet::new()),
            rng: Mutex::new(rng),
            applying: Mutex::new(None),
        }
    }

    /// Latest published snapshot
    #[must_use]
    pub fn snapshot(&self) -> Option<StateSnapshot> {
        self.state.borrow().clone()
    }

    /// Stop every component and report the agent `Stopped`
    pub fn shutdown(&self) {
        if let Some(task) = self.applying.lock().take() {
            task.abort();
        }
        tracing::info!("simulated agent stopping");
        self.state
            .send_replace(Some(StateSnapshot::new(ClientState::Stopped)));
    }

    fn delay(&self, base: Duration) -> Duration {
        if self.config.jitter.is_zero() {
            return base;
        }
        let max = u64::try_from(self.config.jitter.as_millis()).unwrap_or(u64::MAX);
        base + Duration::from_millis(self.rng.lock().gen_range(0..=max))
    }
}

impl Default for SimulatedAgent {
    fn default() -> Self {
        Self::new(SimulatorConfig::default())
    }
}

#[async_trait::async_trait]
impl AgentFixture for SimulatedAgent {
    async fn prepare(&self, components: &[String]) -> Result<(), FixtureError> {
        if let Some(blank) = components.iter().find(|c| c.trim().is_empty()) {
            return Err(FixtureError::Prepare(format!("invalid component name {blank:?}")));
        }
        self.prepared.lock().extend(components.iter().cloned());
        self.state.send_if_modified(|current| match current {
            Some(snapshot) if snapshot.agent.state == ClientState::Starting => {
                snapshot.agent = AgentState::new(ClientState::Healthy);
                true
            }
            _ => false,
        });
        tracing::debug!(?components, "simulated agent prepared");
        Ok(())
    }

    async fn configure(&self, payload: &str) -> Result<(), FixtureError> {
        let topology = topology::plan(payload)?;
        let prepared = self.prepared.lock().clone();
        let settle = self.delay(self.config.transition_delay);
        let ship = self.delay(self.config.shipper_delay);
        let state = Arc::clone(&self.state);

        tracing::info!(components = topology.len(), "simulated agent applying configuration");
        // Published before returning so an observer never sees the previous
        // configuration's state after the push.
        state.send_replace(Some(starting_snapshot(&topology)));
        let task = tokio::spawn(async move {
            tokio::time::sleep(settle).await;
            state.send_replace(Some(running_snapshot(&topology, &prepared, false)));

            if topology.iter().any(|c| c.is_shipper) {
                tokio::time::sleep(ship).await;
                state.send_replace(Some(running_snapshot(&topology, &prepared, true)));
            }
        });

        if let Some(previous) = self.applying.lock().replace(task) {
            previous.abort();
        }
        Ok(())
    }

    fn subscribe(&self) -> SnapshotStream {
        watch_source(self.state.subscribe())
    }

    async fn latest(&self) -> Result<Option<StateSnapshot>, FixtureError> {
        Ok(self.snapshot())
    }
}

impl Drop for SimulatedAgent {
    fn drop(&mut self) {
        if let Some(task) = self.applying.get_mut().take() {
            task.abort();
        }
    }
}

fn starting_snapshot(topology: &Topology) -> StateSnapshot {
    let components: ComponentMap = topology
        .iter()
        .filter(|c| !c.is_shipper)
        .map(|c| {
            let units = c
                .units
                .iter()
                .map(|u| (u.key.clone(), ComponentUnitState::new(ClientState::Starting)))
                .collect();
            (
                c.name.clone(),
                ComponentState {
                    state: ClientState::Starting,
                    units,
                },
            )
        })
        .collect();
    StateSnapshot {
        agent: AgentState {
            state: ClientState::Configuring,
            message: "Applying configuration".to_string(),
        },
        components,
    }
}

fn running_snapshot(
    topology: &Topology,
    prepared: &BTreeSet<String>,
    with_shippers: bool,
) -> StateSnapshot {
    let components: ComponentMap = topology
        .iter()
        .filter(|c| with_shippers || !c.is_shipper)
        .map(|c| (c.name.clone(), running_component(c, prepared)))
        .collect();
    StateSnapshot {
        agent: AgentState {
            state: ClientState::Healthy,
            message: "Running".to_string(),
        },
        components,
    }
}

fn running_component(component: &PlannedComponent, prepared: &BTreeSet<String>) -> ComponentState {
    if !prepared.contains(&component.binary) {
        let message = format!("binary {:?} not prepared", component.binary);
        let units = component
            .units
            .iter()
            .map(|u| {
                (
                    u.key.clone(),
                    ComponentUnitState::new(ClientState::Failed).with_message(message.clone()),
                )
            })
            .collect();
        return ComponentState {
            state: ClientState::Failed,
            units,
        };
    }

    let units = component
        .units
        .iter()
        .map(|u| {
            (
                u.key.clone(),
                ComponentUnitState::new(u.state).with_message(u.message.clone()),
            )
        })
        .collect();
    ComponentState {
        state: ClientState::Healthy,
        units,
    }
}
