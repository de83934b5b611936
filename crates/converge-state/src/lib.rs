//! Converge State - expected vs observed agent state
//!
//! Value types describing agent, component and unit health, plus the pure
//! matcher that decides whether an observed snapshot has reached an
//! expected shape.
//!
//! # Core Concepts
//!
//! - [`StateSnapshot`]: one observed view of the agent and its components
//! - [`ExpectationStep`]: configuration plus the state it should produce
//! - [`matches`]: subset/exact matching producing a [`MatchReport`]
//!
//! # Example
//!
//! ```rust
//! use converge_state::{ClientState, ComponentState, ComponentUnitKey, ExpectationStep, StateSnapshot};
//!
//! let step = ExpectationStep::new("", ClientState::Healthy).with_component(
//!     "c1",
//!     ComponentState::new(ClientState::Healthy)
//!         .with_unit_state(ComponentUnitKey::input("u1"), ClientState::Healthy),
//! );
//!
//! let observed = StateSnapshot::new(ClientState::Healthy).with_component(
//!     "c1",
//!     ComponentState::new(ClientState::Healthy)
//!         .with_unit_state(ComponentUnitKey::input("u1"), ClientState::Healthy)
//!         .with_unit_state(ComponentUnitKey::output("o1"), ClientState::Healthy),
//! );
//!
//! assert!(step.evaluate(&observed).is_match());
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod expectation;
mod matcher;
mod report;
mod state;

pub use expectation::ExpectationStep;
pub use matcher::{match_component, matches, MatchMode};
pub use report::{MatchReport, Mismatch};
pub use state::{
    AgentState, ClientState, ComponentMap, ComponentState, ComponentUnitKey, ComponentUnitState,
    ParseStateError, StateSnapshot, UnitMap, UnitType,
};
