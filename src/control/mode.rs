//! Operating-mode state machine.
//!
//! ```text
//!            goal update                 |bearing error| <= tolerance
//!   any ─────────────────> SPIN_IN_PLACE ────────────────────────────> NN
//!                                                                      │
//!                                   stop requested, no goal pending    │
//!                          STOPPED <───────────────────────────────────┘
//! ```
//!
//! `STOPPED` and `SPIN_IN_PLACE` are only left through external triggers.
//! Before the first goal arrives the robot behaves as if `STOPPED`.

use crate::core::math::angle_diff;
use crate::core::{Mode, Point2D, Pose2D};

/// What the control loop should do this tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ModeCommand {
    /// Emit zero velocity
    Stop,
    /// Rotate in place at a fixed rate
    Spin { angular_rate: f64 },
    /// Follow the latest desired action
    Navigate,
}

/// Governs navigation, spin-to-goal and stopped behavior.
#[derive(Debug, Clone)]
pub struct ModeStateMachine {
    mode: Mode,
    goal: Option<Point2D>,
    /// A fresh goal arrived and the spin toward it has not finished
    goal_pending: bool,
    /// Latest proximity flag from the action shaper
    stop_requested: bool,
    spin_rate: f64,
    spin_tolerance: f64,
}

impl ModeStateMachine {
    pub fn new(spin_rate: f64, spin_tolerance: f64) -> Self {
        Self {
            mode: Mode::Nn,
            goal: None,
            goal_pending: false,
            stop_requested: false,
            spin_rate,
            spin_tolerance,
        }
    }

    /// Stored mode.
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Mode as seen from outside: no goal yet reads as `Stopped`.
    pub fn effective_mode(&self) -> Mode {
        if self.goal.is_none() {
            Mode::Stopped
        } else {
            self.mode
        }
    }

    pub fn goal(&self) -> Option<Point2D> {
        self.goal
    }

    pub fn goal_pending(&self) -> bool {
        self.goal_pending
    }

    pub fn stop_requested(&self) -> bool {
        self.stop_requested
    }

    /// A new goal always restarts with a spin toward it.
    pub fn on_goal(&mut self, goal: Point2D) {
        tracing::info!(
            "New goal ({:.2}, {:.2}): {} -> {}",
            goal.x,
            goal.y,
            self.mode.as_str(),
            Mode::SpinInPlace.as_str()
        );
        self.goal = Some(goal);
        self.goal_pending = true;
        self.stop_requested = false;
        self.mode = Mode::SpinInPlace;
    }

    /// Record the proximity flag computed by the policy loop.
    pub fn on_stop_flag(&mut self, stop: bool) {
        self.stop_requested = stop;
        if self.mode == Mode::Nn && stop && !self.goal_pending {
            tracing::info!("Goal reached: {} -> {}", Mode::Nn.as_str(), Mode::Stopped.as_str());
            self.mode = Mode::Stopped;
        }
    }

    /// Supervisory override. Any request is coerced back to `NN`.
    pub fn on_override(&mut self, requested: Mode) {
        if requested != Mode::Nn {
            tracing::warn!(
                "Mode override {} requested, coercing to {}",
                requested.as_str(),
                Mode::Nn.as_str()
            );
        }
        self.mode = Mode::Nn;
    }

    /// Advance on a control tick and decide the command kind.
    pub fn step(&mut self, pose: &Pose2D) -> ModeCommand {
        let Some(goal) = self.goal else {
            return ModeCommand::Stop;
        };

        match self.mode {
            Mode::Stopped => ModeCommand::Stop,
            Mode::Nn => {
                if self.stop_requested && !self.goal_pending {
                    self.mode = Mode::Stopped;
                    ModeCommand::Stop
                } else {
                    ModeCommand::Navigate
                }
            }
            Mode::SpinInPlace => {
                let bearing = pose.position().bearing_to(&goal);
                let error = angle_diff(bearing, pose.theta);
                if error.abs() > self.spin_tolerance {
                    ModeCommand::Spin {
                        angular_rate: self.spin_rate,
                    }
                } else {
                    tracing::info!(
                        "Facing goal (error {:.1}°): {} -> {}",
                        error.to_degrees(),
                        Mode::SpinInPlace.as_str(),
                        Mode::Nn.as_str()
                    );
                    self.mode = Mode::Nn;
                    self.goal_pending = false;
                    ModeCommand::Navigate
                }
            }
        }
    }
}
