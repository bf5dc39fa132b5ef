//! Action shaping: feasibility clamp and goal-proximity blending.
//!
//! The clamp models the free space ahead as a quarter-circle velocity
//! envelope with legs `x` (fixed base leg) and `y` (forward clearance):
//!
//! ```text
//! v_max = clip(sqrt(x² + y²), 0, preferred_speed)
//! x     = 0 when x >= y
//! ```
//!
//! Small heading corrections skip the clamp entirely.

use crate::config::ShaperConfig;
use crate::control::FeasibilityProfile;
use crate::core::math::{angle_diff, normalize_angle};
use crate::policy::RawAction;

/// Action after feasibility and goal shaping.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShapedAction {
    /// Speed (m/s)
    pub speed: f64,
    /// World-frame heading (rad)
    pub heading: f64,
    /// Forward clearance used for the clamp (m)
    pub clearance: f64,
    /// Robot is close enough to the goal to stop
    pub stop_requested: bool,
}

/// Clamps policy actions against clearance and goal proximity.
#[derive(Debug, Clone)]
pub struct ActionShaper {
    config: ShaperConfig,
}

impl ActionShaper {
    pub fn new(config: ShaperConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ShaperConfig {
        &self.config
    }

    /// Maximum speed allowed by `clearance` for a turn of `heading_error`.
    pub fn find_vmax(&self, clearance: f64, heading_error: f64, preferred_speed: f64) -> f64 {
        if heading_error.abs() < self.config.small_turn_threshold {
            return preferred_speed;
        }

        let y = clearance.max(0.0);
        let mut x = self.config.base_leg;
        if x >= y {
            x = 0.0;
        }
        (x * x + y * y).sqrt().clamp(0.0, preferred_speed)
    }

    /// Shape a raw policy action.
    pub fn shape(
        &self,
        raw: RawAction,
        profile: &FeasibilityProfile,
        current_heading: f64,
        distance_to_goal: f64,
        preferred_speed: f64,
    ) -> ShapedAction {
        let clearance = profile.clearance_at(current_heading);
        let heading_error = angle_diff(current_heading, raw.heading);

        let mut speed = raw
            .speed
            .min(self.find_vmax(clearance, heading_error, preferred_speed));
        let mut heading = raw.heading;

        let c = &self.config;
        if distance_to_goal < c.near_goal_radius {
            let approach = distance_to_goal - c.approach_offset;
            let speed_target = (c.kp_v * approach).clamp(0.0, preferred_speed);
            let turn_factor = (c.kp_r * approach).clamp(0.0, 1.0);
            speed = speed.min(speed_target);
            heading = normalize_angle(current_heading + turn_factor * heading_error);
        }

        ShapedAction {
            speed,
            heading,
            clearance,
            stop_requested: distance_to_goal < c.stop_radius,
        }
    }
}
