//! Fake-component configuration dialect
//!
//! Turns an agent policy document (outputs + inputs) into the set of
//! components and units a running agent would report for it.

use crate::error::FixtureError;
use converge_state::{ClientState, ComponentUnitKey};
use serde::Deserialize;
use std::collections::BTreeMap;

/// Suffix marking input types that run one component per input
const NON_GROUPED_SUFFIX: &str = "-non-grouped";

#[derive(Debug, Clone, Deserialize)]
struct Policy {
    #[serde(default)]
    outputs: BTreeMap<String, OutputPolicy>,
    #[serde(default)]
    inputs: Vec<InputPolicy>,
}

#[derive(Debug, Clone, Deserialize)]
struct OutputPolicy {
    #[serde(rename = "type")]
    kind: String,
    #[serde(rename = "shipper.enabled", default)]
    shipper_enabled: bool,
}

#[derive(Debug, Clone, Deserialize)]
struct InputPolicy {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default = "default_state_code")]
    state: u8,
    #[serde(default)]
    message: String,
    #[serde(default = "default_output")]
    use_output: String,
}

fn default_state_code() -> u8 {
    ClientState::Healthy.as_u8()
}

fn default_output() -> String {
    "default".to_string()
}

/// One unit a planned component will report once running
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PlannedUnit {
    pub(crate) key: ComponentUnitKey,
    pub(crate) state: ClientState,
    pub(crate) message: String,
}

/// One component the agent will run for a policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PlannedComponent {
    pub(crate) name: String,
    /// Binary that must have been prepared
    pub(crate) binary: String,
    pub(crate) units: Vec<PlannedUnit>,
    /// Shippers come up after the components they serve
    pub(crate) is_shipper: bool,
}

/// Everything the agent runs for one policy, ordered by component name
pub(crate) type Topology = Vec<PlannedComponent>;

/// Parse a policy document and plan its components
pub(crate) fn plan(doc: &str) -> Result<Topology, FixtureError> {
    let policy: Policy = if doc.trim().is_empty() {
        Policy {
            outputs: BTreeMap::new(),
            inputs: Vec::new(),
        }
    } else {
        serde_yaml::from_str(doc).map_err(|e| FixtureError::InvalidConfig(e.to_string()))?
    };

    let mut components: BTreeMap<String, PlannedComponent> = BTreeMap::new();
    // shipper name -> (binary, served component names)
    let mut shippers: BTreeMap<String, (String, Vec<String>)> = BTreeMap::new();

    for input in &policy.inputs {
        let output = policy.outputs.get(&input.use_output).ok_or_else(|| {
            FixtureError::InvalidConfig(format!(
                "input {:?} uses unknown output {:?}",
                input.id, input.use_output
            ))
        })?;
        let state = ClientState::try_from(input.state)
            .map_err(|e| FixtureError::InvalidConfig(format!("input {:?}: {e}", input.id)))?;
        let binary = binary_for(&input.kind);

        let (name, output_unit, input_unit) = if input.kind.ends_with(NON_GROUPED_SUFFIX) {
            let name = format!("{}-{}-{}", input.kind, input.use_output, input.id);
            let input_unit = format!("{name}-unit");
            (name, output.kind.clone(), input_unit)
        } else {
            let name = format!("{}-{}", input.kind, input.use_output);
            let input_unit = format!("{name}-{}", input.id);
            (name.clone(), name, input_unit)
        };

        let component = components
            .entry(name.clone())
            .or_insert_with(|| PlannedComponent {
                name: name.clone(),
                binary: binary.clone(),
                units: vec![PlannedUnit {
                    key: ComponentUnitKey::output(output_unit),
                    state: ClientState::Healthy,
                    message: "Healthy".to_string(),
                }],
                is_shipper: false,
            });
        component.units.push(PlannedUnit {
            key: ComponentUnitKey::input(input_unit),
            state,
            message: input.message.clone(),
        });

        if output.shipper_enabled {
            let shipper = format!("{binary}-shipper-{}", input.use_output);
            let (_, served) = shippers
                .entry(shipper)
                .or_insert_with(|| (format!("{binary}-shipper"), Vec::new()));
            if !served.contains(&name) {
                served.push(name);
            }
        }
    }

    for (name, (binary, served)) in shippers {
        let mut units = vec![PlannedUnit {
            key: ComponentUnitKey::output(name.clone()),
            state: ClientState::Healthy,
            message: "Healthy".to_string(),
        }];
        units.extend(served.into_iter().map(|component| PlannedUnit {
            key: ComponentUnitKey::input(component),
            state: ClientState::Healthy,
            message: "Healthy".to_string(),
        }));
        components.insert(
            name.clone(),
            PlannedComponent {
                name,
                binary,
                units,
                is_shipper: true,
            },
        );
    }

    Ok(components.into_values().collect())
}

/// Binary providing an input type: the first dash-separated segment
fn binary_for(kind: &str) -> String {
    kind.split('-').next().unwrap_or(kind).to_string()
}
