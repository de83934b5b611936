//! State vocabulary shared by expectations and observed snapshots
//!
//! Plain value types with structural equality. Nothing in here knows how
//! states are compared; that lives in [`crate::matcher`].

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Errors produced when parsing state vocabulary from text or wire codes
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseStateError {
    /// Unknown client state name
    #[error("unknown client state: {0}")]
    UnknownState(String),

    /// Wire code outside the known range
    #[error("unknown client state code: {0}")]
    UnknownCode(u8),

    /// Unknown unit type name
    #[error("unknown unit type: {0}")]
    UnknownUnitType(String),

    /// Unit key without a `<type>/<id>` shape
    #[error("malformed unit key {0:?}, expected <input|output>/<id>")]
    MalformedUnitKey(String),
}

/// Health of an agent, component or unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientState {
    /// Process launched, not yet configured
    #[default]
    Starting,
    /// Applying configuration
    Configuring,
    /// Running as expected
    Healthy,
    /// Running with reduced functionality
    Degraded,
    /// Not running correctly
    Failed,
    /// Shutting down
    Stopping,
    /// Shut down
    Stopped,
}

impl ClientState {
    /// Every state, in wire-code order
    pub const ALL: [ClientState; 7] = [
        Self::Starting,
        Self::Configuring,
        Self::Healthy,
        Self::Degraded,
        Self::Failed,
        Self::Stopping,
        Self::Stopped,
    ];

    /// Numeric code used by the control protocol
    #[inline]
    #[must_use]
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Lower-case name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Starting => "starting",
            Self::Configuring => "configuring",
            Self::Healthy => "healthy",
            Self::Degraded => "degraded",
            Self::Failed => "failed",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
        }
    }
}

impl TryFrom<u8> for ClientState {
    type Error = ParseStateError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Self::ALL
            .get(usize::from(code))
            .copied()
            .ok_or(ParseStateError::UnknownCode(code))
    }
}

impl fmt::Display for ClientState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClientState {
    type Err = ParseStateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|state| state.as_str() == lowered)
            .ok_or_else(|| ParseStateError::UnknownState(s.to_string()))
    }
}

/// Role of a unit inside its component
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitType {
    /// Consumes work
    Input,
    /// Ships results
    Output,
}

impl UnitType {
    /// Lower-case name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::Output => "output",
        }
    }
}

impl fmt::Display for UnitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UnitType {
    type Err = ParseStateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "input" => Ok(Self::Input),
            "output" => Ok(Self::Output),
            _ => Err(ParseStateError::UnknownUnitType(s.to_string())),
        }
    }
}

/// Identity of a unit within its component
///
/// Text form is `<type>/<id>`, e.g. `input/fake-default-fake`. The id may
/// itself contain `/`; only the first separator splits.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ComponentUnitKey {
    /// Unit role
    pub unit_type: UnitType,
    /// Identifier, unique within the owning component
    pub unit_id: String,
}

impl ComponentUnitKey {
    /// Create a key
    #[inline]
    #[must_use]
    pub fn new(unit_type: UnitType, unit_id: impl Into<String>) -> Self {
        Self {
            unit_type,
            unit_id: unit_id.into(),
        }
    }

    /// Input unit key
    #[inline]
    #[must_use]
    pub fn input(unit_id: impl Into<String>) -> Self {
        Self::new(UnitType::Input, unit_id)
    }

    /// Output unit key
    #[inline]
    #[must_use]
    pub fn output(unit_id: impl Into<String>) -> Self {
        Self::new(UnitType::Output, unit_id)
    }
}

impl fmt::Display for ComponentUnitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.unit_type, self.unit_id)
    }
}

impl FromStr for ComponentUnitKey {
    type Err = ParseStateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, id) = s
            .split_once('/')
            .ok_or_else(|| ParseStateError::MalformedUnitKey(s.to_string()))?;
        if id.is_empty() {
            return Err(ParseStateError::MalformedUnitKey(s.to_string()));
        }
        Ok(Self::new(kind.parse()?, id))
    }
}

impl Serialize for ComponentUnitKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ComponentUnitKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Health of a single unit
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ComponentUnitState {
    /// Unit health
    pub state: ClientState,
    /// Status message, opaque to matching
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
    /// Structured diagnostics, opaque to matching
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
}

impl ComponentUnitState {
    /// Unit in `state` with no metadata
    #[inline]
    #[must_use]
    pub fn new(state: ClientState) -> Self {
        Self {
            state,
            message: String::new(),
            payload: None,
        }
    }

    /// Attach a status message
    #[inline]
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Attach a diagnostic payload
    #[inline]
    #[must_use]
    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }
}

/// Units of one component, ordered by key
pub type UnitMap = BTreeMap<ComponentUnitKey, ComponentUnitState>;

/// Components by name, ordered by name
pub type ComponentMap = BTreeMap<String, ComponentState>;

/// Health of one managed sub-process and its units
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ComponentState {
    /// Component health
    pub state: ClientState,
    /// Units reported by the component
    #[serde(default)]
    pub units: UnitMap,
}

impl ComponentState {
    /// Component in `state` with no units
    #[inline]
    #[must_use]
    pub fn new(state: ClientState) -> Self {
        Self {
            state,
            units: UnitMap::new(),
        }
    }

    /// Add or replace a unit
    #[must_use]
    pub fn with_unit(mut self, key: ComponentUnitKey, unit: ComponentUnitState) -> Self {
        self.units.insert(key, unit);
        self
    }

    /// Add or replace a unit in `state` with no metadata
    #[must_use]
    pub fn with_unit_state(self, key: ComponentUnitKey, state: ClientState) -> Self {
        self.with_unit(key, ComponentUnitState::new(state))
    }
}

/// Top-level health of the supervising process
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AgentState {
    /// Agent health
    pub state: ClientState,
    /// Status message, opaque to matching
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
}

impl AgentState {
    /// Agent in `state` with no message
    #[inline]
    #[must_use]
    pub fn new(state: ClientState) -> Self {
        Self {
            state,
            message: String::new(),
        }
    }
}

/// One observed view of the agent and every component it runs
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StateSnapshot {
    /// Agent health
    pub agent: AgentState,
    /// Components by name
    #[serde(default)]
    pub components: ComponentMap,
}

impl StateSnapshot {
    /// Snapshot with the agent in `state` and no components
    #[inline]
    #[must_use]
    pub fn new(state: ClientState) -> Self {
        Self {
            agent: AgentState::new(state),
            components: ComponentMap::new(),
        }
    }

    /// Add or replace a component
    #[must_use]
    pub fn with_component(mut self, name: impl Into<String>, component: ComponentState) -> Self {
        self.components.insert(name.into(), component);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_state_codes_follow_protocol_order() {
        assert_eq!(ClientState::Starting.as_u8(), 0);
        assert_eq!(ClientState::Healthy.as_u8(), 2);
        assert_eq!(ClientState::Stopped.as_u8(), 6);
        assert_eq!(ClientState::try_from(1), Ok(ClientState::Configuring));
        assert_eq!(
            ClientState::try_from(9),
            Err(ParseStateError::UnknownCode(9))
        );
    }

    #[test]
    fn client_state_parses_case_insensitively() {
        assert_eq!("Healthy".parse(), Ok(ClientState::Healthy));
        assert_eq!(" degraded ".parse(), Ok(ClientState::Degraded));
        assert!("upgrading".parse::<ClientState>().is_err());
    }

    #[test]
    fn unit_key_equality_is_structural() {
        let a = ComponentUnitKey::input("u1");
        let b = ComponentUnitKey::new(UnitType::Input, String::from("u1"));
        assert_eq!(a, b);
        assert_ne!(a, ComponentUnitKey::output("u1"));

        let mut set = std::collections::HashSet::new();
        set.insert(a);
        assert!(set.contains(&b));
    }

    #[test]
    fn unit_key_text_form() {
        let key: ComponentUnitKey = "output/fake-shipper-default".parse().unwrap();
        assert_eq!(key, ComponentUnitKey::output("fake-shipper-default"));
        assert_eq!(key.to_string(), "output/fake-shipper-default");

        let nested: ComponentUnitKey = "input/a/b".parse().unwrap();
        assert_eq!(nested.unit_id, "a/b");

        assert!("input".parse::<ComponentUnitKey>().is_err());
        assert!("input/".parse::<ComponentUnitKey>().is_err());
        assert!("socket/x".parse::<ComponentUnitKey>().is_err());
    }

    #[test]
    fn empty_units_differ_from_default_units() {
        let empty = ComponentState::new(ClientState::Healthy);
        let defaulted = ComponentState::new(ClientState::Healthy)
            .with_unit(ComponentUnitKey::input("u1"), ComponentUnitState::default());
        assert_ne!(empty, defaulted);
    }

    #[test]
    fn unit_keys_serialize_as_map_keys() {
        let component = ComponentState::new(ClientState::Healthy)
            .with_unit_state(ComponentUnitKey::input("u1"), ClientState::Configuring);
        let json = serde_json::to_value(&component).unwrap();
        assert_eq!(json["units"]["input/u1"]["state"], "configuring");

        let back: ComponentState = serde_json::from_value(json).unwrap();
        assert_eq!(back, component);
    }
}
