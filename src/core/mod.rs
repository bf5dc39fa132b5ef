//! Foundation layer: geometry helpers and shared value types.

pub mod math;
pub mod types;

pub use types::{
    DesiredAction, Mode, Point2D, Pose2D, StampedPose, VelocityCommand, Velocity2D,
};
