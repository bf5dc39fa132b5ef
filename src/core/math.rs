//! Geometry primitives for local motion control.
//!
//! Every angle that leaves this module is normalized to (-π, π].

use std::f64::consts::{PI, TAU};

/// Normalize angle to (-π, π].
///
/// # Example
/// ```
/// use gati_nav::core::math::normalize_angle;
/// use std::f64::consts::PI;
///
/// assert!((normalize_angle(3.0 * PI) - PI).abs() < 1e-9);
/// assert!((normalize_angle(-PI) - PI).abs() < 1e-9);
/// ```
#[inline]
pub fn normalize_angle(angle: f64) -> f64 {
    let mut a = angle % TAU;
    if a > PI {
        a -= TAU;
    } else if a <= -PI {
        a += TAU;
    }
    a
}

/// Shortest signed angular difference from angle `from` to angle `to`.
///
/// Returns the angle you need to add to `from` to reach `to`,
/// taking the shortest path around the circle.
///
/// # Example
/// ```
/// use gati_nav::core::math::angle_diff;
/// use std::f64::consts::PI;
///
/// // Crossing the ±π boundary takes the short way
/// let diff = angle_diff(PI - 0.1, -PI + 0.1);
/// assert!((diff - 0.2).abs() < 1e-9);
/// ```
#[inline]
pub fn angle_diff(from: f64, to: f64) -> f64 {
    normalize_angle(to - from)
}

/// Euclidean distance between two planar points.
#[inline]
pub fn distance(ax: f64, ay: f64, bx: f64, by: f64) -> f64 {
    (bx - ax).hypot(by - ay)
}

/// Bearing of point `(bx, by)` as seen from `(ax, ay)`, in world frame.
#[inline]
pub fn bearing(ax: f64, ay: f64, bx: f64, by: f64) -> f64 {
    (by - ay).atan2(bx - ax)
}

/// Yaw of a unit quaternion `(w, x, y, z)`.
///
/// `atan2(2(wz + xy), 1 - 2(y² + z²))`, normalized to (-π, π].
#[inline]
pub fn yaw_from_quaternion(w: f64, x: f64, y: f64, z: f64) -> f64 {
    normalize_angle((2.0 * (w * z + x * y)).atan2(1.0 - 2.0 * (y * y + z * z)))
}

/// Quaternion `(w, x, y, z)` for a pure rotation about the z axis.
#[inline]
pub fn quaternion_from_yaw(yaw: f64) -> (f64, f64, f64, f64) {
    let half = yaw / 2.0;
    (half.cos(), 0.0, 0.0, half.sin())
}
