//! Policy oracle contract, action table and observation assembly.

mod actions;
mod adapter;
mod heuristic;

pub use actions::{ActionTable, DiscreteAction};
pub use adapter::{HostAgent, ObservationLayout, Policy, PolicyAdapter, RawAction};
pub use heuristic::HeuristicPolicy;
