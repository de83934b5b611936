//! Testing utilities for Converge workspace
//!
//! A scripted agent fixture plus shorthand for building states.

#![allow(missing_docs)]

use converge_core::{channel_source, AgentFixture, FixtureError, SnapshotStream};
use converge_state::{ClientState, ComponentState, ComponentUnitKey, StateSnapshot};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

type StateSender = Arc<watch::Sender<Option<StateSnapshot>>>;

/// Agent whose reactions to each configuration are scripted up front
///
/// Every pushed payload is recorded. A payload with a script publishes its
/// snapshots in order, each after its delay from the previous one.
pub struct ScriptedAgent {
    tx: Mutex<Option<StateSender>>,
    rx: watch::Receiver<Option<StateSnapshot>>,
    scripts: HashMap<String, Vec<(Duration, StateSnapshot)>>,
    configure_errors: HashMap<String, FixtureError>,
    stalled: HashSet<String>,
    prepare_error: Option<FixtureError>,
    pollable: bool,
    pushed: Mutex<Vec<String>>,
    prepared: Mutex<Vec<String>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl ScriptedAgent {
    /// Agent with no state published yet
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(None);
        Self {
            tx: Mutex::new(Some(Arc::new(tx))),
            rx,
            scripts: HashMap::new(),
            configure_errors: HashMap::new(),
            stalled: HashSet::new(),
            prepare_error: None,
            pollable: true,
            pushed: Mutex::new(Vec::new()),
            prepared: Mutex::new(Vec::new()),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Start out reporting `snapshot`
    pub fn with_initial(self, snapshot: StateSnapshot) -> Self {
        self.publish(snapshot);
        self
    }

    /// Publish `snapshots` after `payload` is pushed
    pub fn with_script(
        mut self,
        payload: impl Into<String>,
        snapshots: Vec<(Duration, StateSnapshot)>,
    ) -> Self {
        self.scripts.insert(payload.into(), snapshots);
        self
    }

    /// Reject `payload` with `err`
    pub fn with_configure_error(mut self, payload: impl Into<String>, err: FixtureError) -> Self {
        self.configure_errors.insert(payload.into(), err);
        self
    }

    /// Never return from pushing `payload`
    pub fn with_stalled_configure(mut self, payload: impl Into<String>) -> Self {
        self.stalled.insert(payload.into());
        self
    }

    /// Fail preparation with `err`
    pub fn with_prepare_error(mut self, err: FixtureError) -> Self {
        self.prepare_error = Some(err);
        self
    }

    /// Report polling as unsupported
    pub fn push_only(mut self) -> Self {
        self.pollable = false;
        self
    }

    /// Replace the reported state now
    pub fn publish(&self, snapshot: StateSnapshot) {
        if let Some(tx) = self.tx.lock().as_ref() {
            tx.send_replace(Some(snapshot));
        }
    }

    /// Drop the state sender; open subscriptions end
    pub fn close(&self) {
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
        self.tx.lock().take();
    }

    /// Payloads pushed so far, in order
    pub fn pushed(&self) -> Vec<String> {
        self.pushed.lock().clone()
    }

    /// Components staged so far
    pub fn prepared(&self) -> Vec<String> {
        self.prepared.lock().clone()
    }
}

impl Default for ScriptedAgent {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ScriptedAgent {
    fn drop(&mut self) {
        for task in self.tasks.get_mut().drain(..) {
            task.abort();
        }
    }
}

#[async_trait::async_trait]
impl AgentFixture for ScriptedAgent {
    async fn prepare(&self, components: &[String]) -> Result<(), FixtureError> {
        if let Some(err) = &self.prepare_error {
            return Err(err.clone());
        }
        self.prepared.lock().extend(components.iter().cloned());
        Ok(())
    }

    async fn configure(&self, payload: &str) -> Result<(), FixtureError> {
        self.pushed.lock().push(payload.to_string());
        if let Some(err) = self.configure_errors.get(payload) {
            return Err(err.clone());
        }
        if self.stalled.contains(payload) {
            std::future::pending::<()>().await;
        }
        let Some(tx) = self.tx.lock().clone() else {
            return Err(FixtureError::Closed);
        };
        if let Some(script) = self.scripts.get(payload).cloned() {
            let task = tokio::spawn(async move {
                for (delay, snapshot) in script {
                    tokio::time::sleep(delay).await;
                    tx.send_replace(Some(snapshot));
                }
            });
            self.tasks.lock().push(task);
        }
        Ok(())
    }

    fn subscribe(&self) -> SnapshotStream {
        converge_core::watch_source(self.rx.clone())
    }

    async fn latest(&self) -> Result<Option<StateSnapshot>, FixtureError> {
        if !self.pollable {
            return Err(FixtureError::Unsupported("polling".to_string()));
        }
        if self.tx.lock().is_none() {
            return Err(FixtureError::Closed);
        }
        Ok(self.rx.borrow().clone())
    }
}

/// Stream fed by hand through the returned sender
pub fn manual_source(buffer: usize) -> (mpsc::Sender<StateSnapshot>, SnapshotStream) {
    let (tx, rx) = mpsc::channel(buffer);
    (tx, channel_source(rx))
}

pub fn component(state: ClientState, units: &[(ComponentUnitKey, ClientState)]) -> ComponentState {
    units
        .iter()
        .fold(ComponentState::new(state), |component, (key, unit)| {
            component.with_unit_state(key.clone(), *unit)
        })
}

pub fn healthy_component(units: &[ComponentUnitKey]) -> ComponentState {
    units
        .iter()
        .fold(ComponentState::new(ClientState::Healthy), |component, key| {
            component.with_unit_state(key.clone(), ClientState::Healthy)
        })
}

pub fn snapshot(agent: ClientState, components: &[(&str, ComponentState)]) -> StateSnapshot {
    components
        .iter()
        .fold(StateSnapshot::new(agent), |snapshot, (name, component)| {
            snapshot.with_component(*name, component.clone())
        })
}

pub fn healthy_agent() -> StateSnapshot {
    StateSnapshot::new(ClientState::Healthy)
}
