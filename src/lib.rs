//! GatiNav - reactive local-motion controller for VacuumTiger
//!
//! Steers the robot toward a goal through moving, pedestrian-like
//! obstacles, using a pretrained policy as an opaque action oracle.
//!
//! ## Layers
//!
//! - [`core`]: angles, poses, velocities, actions and modes
//! - [`messages`]: validated input records from perception and localization
//! - [`perception`]: obstacle tracking and velocity smoothing
//! - [`control`]: feasibility profile, action shaping, mode machine, heading servo
//! - [`policy`]: oracle contract, action table, observation layout
//! - [`shared`]: the state snapshot shared by producers and both loops
//! - [`threads`]: policy loop (10 Hz) and control loop (100 Hz)
//! - [`sim`]: closed-loop simulated world
//!
//! ## Data flow
//!
//! ```text
//! producers ──> RobotStateSnapshot ──> PolicyThread: tracker → oracle → shaper ──┐
//!                      ▲                                                         │
//!                      └──────────────── DesiredAction ◄─────────────────────────┘
//!                      │
//!                      └──> ControlThread: mode machine → servo ──> VelocitySink
//! ```

pub mod config;
pub mod control;
pub mod core;
pub mod error;
pub mod messages;
pub mod perception;
pub mod policy;
pub mod shared;
pub mod sim;
pub mod threads;

pub use config::GatiConfig;
pub use control::{
    ActionShaper, ControlLaw, FeasibilityProfile, FeasibilitySample, ModeCommand, ModeStateMachine,
    ShapedAction,
};
pub use crate::core::{DesiredAction, Mode, Point2D, Pose2D, StampedPose, Velocity2D, VelocityCommand};
pub use error::{GatiError, Result};
pub use messages::SensorUpdate;
pub use perception::{ObstacleAgent, ObstacleTracker, RawObservation};
pub use policy::{
    ActionTable, DiscreteAction, HeuristicPolicy, HostAgent, ObservationLayout, Policy,
    PolicyAdapter, RawAction,
};
pub use shared::RobotStateSnapshot;
pub use threads::{
    ChannelSink, ControlThread, PolicyOutcome, PolicyThread, ThreadHandles, VelocitySink,
    spawn_threads,
};
