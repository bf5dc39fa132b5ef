//! Heading servo run by the control loop.

use crate::control::{ActionShaper, ModeCommand};
use crate::core::math::angle_diff;
use crate::core::{DesiredAction, Pose2D, VelocityCommand};

/// Turns the latest desired action into a velocity command.
///
/// ```text
/// ω = heading_gain · angle_diff(ψ, ψ_desired)
/// v = min(speed_desired, find_vmax(clearance, ω / heading_gain))
/// ```
#[derive(Debug, Clone)]
pub struct ControlLaw {
    shaper: ActionShaper,
    heading_gain: f64,
    preferred_speed: f64,
}

impl ControlLaw {
    pub fn new(shaper: ActionShaper, heading_gain: f64, preferred_speed: f64) -> Self {
        Self {
            shaper,
            heading_gain,
            preferred_speed,
        }
    }

    /// Command for one control tick.
    ///
    /// Navigating without a desired action yields zero velocity.
    pub fn command(
        &self,
        mode: ModeCommand,
        pose: &Pose2D,
        desired: Option<&DesiredAction>,
    ) -> VelocityCommand {
        match mode {
            ModeCommand::Stop => VelocityCommand::stop(),
            ModeCommand::Spin { angular_rate } => VelocityCommand::new(0.0, angular_rate),
            ModeCommand::Navigate => match desired {
                Some(action) => self.track(pose, action),
                None => VelocityCommand::stop(),
            },
        }
    }

    fn track(&self, pose: &Pose2D, action: &DesiredAction) -> VelocityCommand {
        let yaw_error = angle_diff(pose.theta, action.heading);
        let v_max = self
            .shaper
            .find_vmax(action.clearance, yaw_error, self.preferred_speed);
        VelocityCommand::new(action.speed.min(v_max), self.heading_gain * yaw_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ShaperConfig;
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    fn law() -> ControlLaw {
        ControlLaw::new(ActionShaper::new(ShaperConfig::default()), 2.0, 1.0)
    }

    fn action(speed: f64, heading: f64, clearance: f64) -> DesiredAction {
        DesiredAction {
            speed,
            heading,
            clearance,
            pose_timestamp_us: 0,
        }
    }

    #[test]
    fn test_stop_and_spin() {
        let pose = Pose2D::default();
        assert!(law().command(ModeCommand::Stop, &pose, None).is_stop());

        let cmd = law().command(ModeCommand::Spin { angular_rate: 1.0 }, &pose, None);
        assert_eq!(cmd, VelocityCommand::new(0.0, 1.0));
    }

    #[test]
    fn test_navigate_without_action_is_stop() {
        let cmd = law().command(ModeCommand::Navigate, &Pose2D::default(), None);
        assert!(cmd.is_stop());
    }

    #[test]
    fn test_straight_ahead() {
        let desired = action(0.8, 0.0, 0.0);
        let cmd = law().command(ModeCommand::Navigate, &Pose2D::default(), Some(&desired));
        // Small turn: no clearance clamp
        assert_relative_eq!(cmd.linear_speed, 0.8);
        assert_eq!(cmd.angular_rate, 0.0);
    }

    #[test]
    fn test_sharp_turn_limited_by_clearance() {
        let desired = action(1.0, PI / 2.0, 0.3);
        let cmd = law().command(ModeCommand::Navigate, &Pose2D::default(), Some(&desired));
        assert_relative_eq!(cmd.linear_speed, 0.3, epsilon = 1e-12);
        assert_relative_eq!(cmd.angular_rate, PI, epsilon = 1e-12);
    }

    #[test]
    fn test_turns_the_short_way() {
        let desired = action(0.5, -PI + 0.1, 3.0);
        let pose = Pose2D::new(0.0, 0.0, PI - 0.1);
        let cmd = law().command(ModeCommand::Navigate, &pose, Some(&desired));
        assert_relative_eq!(cmd.angular_rate, 0.4, epsilon = 1e-9);
    }
}
