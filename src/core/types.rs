//! Core value types shared by every layer.

use serde::{Deserialize, Serialize};

use super::math::{bearing, distance, normalize_angle};

/// A 2D point in meters.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point2D {
    /// X coordinate in meters
    pub x: f64,
    /// Y coordinate in meters
    pub y: f64,
}

impl Point2D {
    /// Create a new point.
    #[inline]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Distance to another point.
    #[inline]
    pub fn distance(&self, other: &Point2D) -> f64 {
        distance(self.x, self.y, other.x, other.y)
    }

    /// World-frame bearing toward another point.
    #[inline]
    pub fn bearing_to(&self, other: &Point2D) -> f64 {
        bearing(self.x, self.y, other.x, other.y)
    }
}

/// Robot pose in 2D space.
///
/// Position in meters, heading (psi) in radians normalized to (-π, π].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose2D {
    /// X position in meters
    pub x: f64,
    /// Y position in meters
    pub y: f64,
    /// Heading in radians
    pub theta: f64,
}

impl Pose2D {
    /// Create a new pose with theta normalized to (-π, π].
    #[inline]
    pub fn new(x: f64, y: f64, theta: f64) -> Self {
        Self {
            x,
            y,
            theta: normalize_angle(theta),
        }
    }

    /// Position component.
    #[inline]
    pub fn position(&self) -> Point2D {
        Point2D::new(self.x, self.y)
    }
}

impl Default for Pose2D {
    fn default() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }
}

/// Planar velocity in world frame (m/s).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Velocity2D {
    pub vx: f64,
    pub vy: f64,
}

impl Velocity2D {
    #[inline]
    pub fn new(vx: f64, vy: f64) -> Self {
        Self { vx, vy }
    }

    /// Speed magnitude.
    #[inline]
    pub fn speed(&self) -> f64 {
        self.vx.hypot(self.vy)
    }

    /// Direction of travel. Zero for a stationary velocity.
    #[inline]
    pub fn heading(&self) -> f64 {
        normalize_angle(self.vy.atan2(self.vx))
    }

    /// Scale down so the magnitude never exceeds `max_speed`.
    pub fn capped(&self, max_speed: f64) -> Self {
        let speed = self.speed();
        if speed > max_speed && speed > 0.0 {
            let scale = max_speed / speed;
            Self::new(self.vx * scale, self.vy * scale)
        } else {
            *self
        }
    }
}

/// Pose together with the time it was measured at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StampedPose {
    pub pose: Pose2D,
    /// Measurement time in microseconds
    pub timestamp_us: u64,
}

/// Action the policy loop wants the robot to follow.
///
/// Written as one value so readers never see speed and heading
/// from different policy cycles.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DesiredAction {
    /// Commanded speed (m/s)
    pub speed: f64,
    /// Commanded world-frame heading (radians)
    pub heading: f64,
    /// Forward clearance at the time the action was computed (m)
    pub clearance: f64,
    /// Timestamp of the pose this action was computed against
    pub pose_timestamp_us: u64,
}

impl DesiredAction {
    /// Point one second ahead along the action, starting at `pose`.
    pub fn lookahead(&self, pose: &Pose2D) -> Point2D {
        let (sin_h, cos_h) = self.heading.sin_cos();
        Point2D::new(pose.x + self.speed * cos_h, pose.y + self.speed * sin_h)
    }
}

/// Final actuator command.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct VelocityCommand {
    /// Forward speed (m/s)
    pub linear_speed: f64,
    /// Yaw rate (rad/s)
    pub angular_rate: f64,
}

impl VelocityCommand {
    #[inline]
    pub fn new(linear_speed: f64, angular_rate: f64) -> Self {
        Self {
            linear_speed,
            angular_rate,
        }
    }

    /// Zero velocity.
    #[inline]
    pub fn stop() -> Self {
        Self::default()
    }

    #[inline]
    pub fn is_stop(&self) -> bool {
        self.linear_speed == 0.0 && self.angular_rate == 0.0
    }
}

/// Operating mode of the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Mode {
    /// Policy-driven navigation.
    #[default]
    Nn,
    /// Rotating in place to face a freshly received goal.
    SpinInPlace,
    /// Holding still after arriving near the goal.
    Stopped,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Nn => "NN",
            Mode::SpinInPlace => "SPIN_IN_PLACE",
            Mode::Stopped => "STOPPED",
        }
    }
}
