//! Expected-state matching
//!
//! Compares an expected state tree against one observed snapshot under two
//! disciplines:
//! - [`MatchMode::Subset`]: named units must be present and equal, extras
//!   are tolerated
//! - [`MatchMode::Exact`]: the unit key set must be identical
//!
//! Key sets are compared with explicit set differences over ordered sets,
//! so verdicts and diagnostics never depend on map iteration order.

use crate::report::{MatchReport, Mismatch};
use crate::state::{AgentState, ClientState, ComponentMap, ComponentState, ComponentUnitKey};
use std::collections::BTreeSet;

/// Matching discipline for one component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchMode {
    /// Expected units are a subset requirement
    Subset,
    /// Expected units must equal the observed unit set
    Exact,
}

/// Compare expected agent and component state against an observed snapshot
///
/// The agent check gates everything else: on an agent mismatch the report
/// contains only that mismatch. Otherwise every component divergence is
/// collected. When `expected_strict` is non-empty the step assumes a closed
/// world and any observed component not named in either map is reported.
#[must_use]
pub fn matches(
    expected_agent: ClientState,
    expected_components: &ComponentMap,
    expected_strict: &ComponentMap,
    observed_agent: &AgentState,
    observed_components: &ComponentMap,
) -> MatchReport {
    let mut report = MatchReport::matched();

    if observed_agent.state != expected_agent {
        report.push(Mismatch::AgentState {
            expected: expected_agent,
            observed: observed_agent.state,
        });
        return report;
    }

    for (name, expected) in expected_components {
        match_component(
            name,
            expected,
            observed_components.get(name),
            MatchMode::Subset,
            &mut report,
        );
    }

    for (name, expected) in expected_strict {
        match_component(
            name,
            expected,
            observed_components.get(name),
            MatchMode::Exact,
            &mut report,
        );
    }

    if !expected_strict.is_empty() {
        let named: BTreeSet<&str> = expected_components
            .keys()
            .chain(expected_strict.keys())
            .map(String::as_str)
            .collect();
        for name in observed_components.keys() {
            if !named.contains(name.as_str()) {
                report.push(Mismatch::UnexpectedComponent {
                    component: name.clone(),
                });
            }
        }
    }

    report
}

/// Compare one named component, appending every divergence to `report`
pub fn match_component(
    name: &str,
    expected: &ComponentState,
    observed: Option<&ComponentState>,
    mode: MatchMode,
    report: &mut MatchReport,
) {
    let Some(observed) = observed else {
        report.push(Mismatch::MissingComponent {
            component: name.to_string(),
        });
        return;
    };

    if observed.state != expected.state {
        report.push(Mismatch::ComponentState {
            component: name.to_string(),
            expected: expected.state,
            observed: observed.state,
        });
    }

    let expected_keys: BTreeSet<&ComponentUnitKey> = expected.units.keys().collect();
    let observed_keys: BTreeSet<&ComponentUnitKey> = observed.units.keys().collect();

    for key in expected_keys.difference(&observed_keys) {
        report.push(Mismatch::MissingUnit {
            component: name.to_string(),
            unit: (*key).clone(),
        });
    }

    if mode == MatchMode::Exact {
        for key in observed_keys.difference(&expected_keys) {
            report.push(Mismatch::UnexpectedUnit {
                component: name.to_string(),
                unit: (*key).clone(),
            });
        }
    }

    for key in expected_keys.intersection(&observed_keys) {
        let want = expected.units[*key].state;
        let got = observed.units[*key].state;
        if want != got {
            report.push(Mismatch::UnitState {
                component: name.to_string(),
                unit: (*key).clone(),
                expected: want,
                observed: got,
            });
        }
    }
}
