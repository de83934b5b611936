//! Match verdicts and their diagnostics

use crate::state::{ClientState, ComponentUnitKey};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One divergence between expected and observed state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Mismatch {
    /// No snapshot has been observed yet
    NoSnapshot,
    /// Agent health differs
    AgentState {
        /// Expected health
        expected: ClientState,
        /// Observed health
        observed: ClientState,
    },
    /// Expected component is not running
    MissingComponent {
        /// Component name
        component: String,
    },
    /// Component running outside a closed-world expectation
    UnexpectedComponent {
        /// Component name
        component: String,
    },
    /// Component health differs
    ComponentState {
        /// Component name
        component: String,
        /// Expected health
        expected: ClientState,
        /// Observed health
        observed: ClientState,
    },
    /// Expected unit is not reported
    MissingUnit {
        /// Owning component
        component: String,
        /// Unit key
        unit: ComponentUnitKey,
    },
    /// Unit reported outside a strict expectation
    UnexpectedUnit {
        /// Owning component
        component: String,
        /// Unit key
        unit: ComponentUnitKey,
    },
    /// Unit health differs
    UnitState {
        /// Owning component
        component: String,
        /// Unit key
        unit: ComponentUnitKey,
        /// Expected health
        expected: ClientState,
        /// Observed health
        observed: ClientState,
    },
}

impl Mismatch {
    /// Component this mismatch concerns, if any
    #[must_use]
    pub fn component(&self) -> Option<&str> {
        match self {
            Self::NoSnapshot | Self::AgentState { .. } => None,
            Self::MissingComponent { component }
            | Self::UnexpectedComponent { component }
            | Self::ComponentState { component, .. }
            | Self::MissingUnit { component, .. }
            | Self::UnexpectedUnit { component, .. }
            | Self::UnitState { component, .. } => Some(component),
        }
    }
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoSnapshot => f.write_str("no state observed"),
            Self::AgentState { expected, observed } => {
                write!(f, "agent state: expected {expected}, observed {observed}")
            }
            Self::MissingComponent { component } => {
                write!(f, "component {component:?}: missing")
            }
            Self::UnexpectedComponent { component } => {
                write!(f, "component {component:?}: unexpected")
            }
            Self::ComponentState {
                component,
                expected,
                observed,
            } => write!(
                f,
                "component {component:?}: expected {expected}, observed {observed}"
            ),
            Self::MissingUnit { component, unit } => {
                write!(f, "component {component:?} unit {unit}: missing")
            }
            Self::UnexpectedUnit { component, unit } => {
                write!(f, "component {component:?} unit {unit}: unexpected")
            }
            Self::UnitState {
                component,
                unit,
                expected,
                observed,
            } => write!(
                f,
                "component {component:?} unit {unit}: expected {expected}, observed {observed}"
            ),
        }
    }
}

/// Outcome of comparing one snapshot against an expectation
///
/// Lists every mismatch found, in a deterministic order: agent first, then
/// components by name, then units by key.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MatchReport {
    mismatches: Vec<Mismatch>,
}

impl MatchReport {
    /// Report with no mismatches
    #[inline]
    #[must_use]
    pub fn matched() -> Self {
        Self::default()
    }

    /// Report used before any snapshot has been evaluated
    #[inline]
    #[must_use]
    pub fn no_snapshot() -> Self {
        Self {
            mismatches: vec![Mismatch::NoSnapshot],
        }
    }

    /// Report carrying the given mismatches
    #[inline]
    #[must_use]
    pub fn from_mismatches(mismatches: Vec<Mismatch>) -> Self {
        Self { mismatches }
    }

    /// Whether the observed state satisfied the expectation
    #[inline]
    #[must_use]
    pub fn is_match(&self) -> bool {
        self.mismatches.is_empty()
    }

    /// Every divergence found
    #[inline]
    #[must_use]
    pub fn mismatches(&self) -> &[Mismatch] {
        &self.mismatches
    }

    /// Number of divergences
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.mismatches.len()
    }

    /// True when there are no divergences
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mismatches.is_empty()
    }

    pub(crate) fn push(&mut self, mismatch: Mismatch) {
        self.mismatches.push(mismatch);
    }
}

impl fmt::Display for MatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.mismatches.is_empty() {
            return f.write_str("state matches");
        }
        write!(f, "{} mismatch(es):", self.mismatches.len())?;
        for mismatch in &self.mismatches {
            write!(f, "\n  - {mismatch}")?;
        }
        Ok(())
    }
}
