//! One step of a convergence run

use crate::matcher::matches;
use crate::report::MatchReport;
use crate::state::{ClientState, ComponentMap, ComponentState, StateSnapshot};
use serde::{Deserialize, Serialize};

/// A configuration payload paired with the state it should produce
///
/// `components` are matched as a subset (extra components and units are
/// tolerated); `strict_components` must match exactly and close the
/// component world for the step. Which discipline applies is entirely the
/// author's choice.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ExpectationStep {
    /// Opaque configuration document pushed to the agent
    #[serde(default)]
    pub configure: String,
    /// Expected agent health
    pub agent_state: ClientState,
    /// Components that must be present and match (subset)
    #[serde(default)]
    pub components: ComponentMap,
    /// Components that must match exactly, with no others running
    #[serde(default)]
    pub strict_components: ComponentMap,
}

impl ExpectationStep {
    /// Step expecting the agent in `agent_state` after applying `configure`
    #[must_use]
    pub fn new(configure: impl Into<String>, agent_state: ClientState) -> Self {
        Self {
            configure: configure.into(),
            agent_state,
            components: ComponentMap::new(),
            strict_components: ComponentMap::new(),
        }
    }

    /// Require a component (subset match)
    #[must_use]
    pub fn with_component(mut self, name: impl Into<String>, component: ComponentState) -> Self {
        self.components.insert(name.into(), component);
        self
    }

    /// Require a component (exact match)
    #[must_use]
    pub fn with_strict_component(
        mut self,
        name: impl Into<String>,
        component: ComponentState,
    ) -> Self {
        self.strict_components.insert(name.into(), component);
        self
    }

    /// Evaluate an observed snapshot against this step
    #[must_use]
    pub fn evaluate(&self, snapshot: &StateSnapshot) -> MatchReport {
        matches(
            self.agent_state,
            &self.components,
            &self.strict_components,
            &snapshot.agent,
            &snapshot.components,
        )
    }
}
