//! Feasibility, action shaping, operating modes and the heading servo.

mod feasibility;
mod law;
mod mode;
mod shaper;

pub use feasibility::{FeasibilityProfile, FeasibilitySample};
pub use law::ControlLaw;
pub use mode::{ModeCommand, ModeStateMachine};
pub use shaper::{ActionShaper, ShapedAction};
