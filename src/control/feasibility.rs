//! Angular clearance table built from raw ranging.
//!
//! Samples are sorted by angle and padded with one wrap-around sample at
//! each end, so lookups near ±π never leave the table:
//!
//! ```text
//! [ pad(last) | s0 | s1 | ... | sN-1 | pad(first) ]
//!   s0.θ - Δ                           sN-1.θ + Δ
//! ```

use crate::config::FeasibilityConfig;
use crate::core::math::normalize_angle;
use crate::error::{GatiError, Result};
use crate::messages::FeasibilityUpdate;

/// One angular sample of free space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeasibilitySample {
    /// Direction in world frame (rad)
    pub angle: f64,
    /// Free distance after the safety margin, zero for small gaps (m)
    pub clearance: f64,
    /// Reachable path length in this direction (m)
    pub path_length: f64,
}

/// Sorted, wrap-padded clearance table.
#[derive(Debug, Clone, PartialEq)]
pub struct FeasibilityProfile {
    samples: Vec<FeasibilitySample>,
}

impl FeasibilityProfile {
    /// Minimum number of raw samples for a usable profile.
    pub const MIN_SAMPLES: usize = 2;

    /// Build a profile from raw ranging.
    ///
    /// Fails on mismatched arrays or fewer than [`MIN_SAMPLES`](Self::MIN_SAMPLES) samples.
    pub fn from_update(update: &FeasibilityUpdate, config: &FeasibilityConfig) -> Result<Self> {
        update.validate()?;
        if update.angles.len() < Self::MIN_SAMPLES {
            return Err(GatiError::InvalidInput(format!(
                "feasibility profile needs at least {} samples, got {}",
                Self::MIN_SAMPLES,
                update.angles.len()
            )));
        }

        let mut raw: Vec<FeasibilitySample> = update
            .normalized_angles()
            .zip(update.max_speeds.iter())
            .zip(update.path_lengths.iter())
            .map(|((angle, max_range), path_length)| {
                let mut clearance = max_range - config.safety_margin;
                if clearance < config.small_gap_threshold {
                    clearance = 0.0;
                }
                FeasibilitySample {
                    angle,
                    clearance,
                    path_length: *path_length,
                }
            })
            .collect();
        raw.sort_by(|a, b| a.angle.total_cmp(&b.angle));

        let first = raw[0];
        let last = raw[raw.len() - 1];
        let increment = raw[1].angle - first.angle;

        let mut samples = Vec::with_capacity(raw.len() + 2);
        samples.push(FeasibilitySample {
            angle: first.angle - increment,
            clearance: last.clearance,
            path_length: last.path_length,
        });
        samples.extend(raw);
        samples.push(FeasibilitySample {
            angle: last.angle + increment,
            clearance: first.clearance,
            path_length: first.path_length,
        });

        Ok(Self { samples })
    }

    /// Padded samples, sorted by angle.
    pub fn samples(&self) -> &[FeasibilitySample] {
        &self.samples
    }

    /// Number of raw samples (padding excluded).
    pub fn len(&self) -> usize {
        self.samples.len() - 2
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clearance of the last sample at or before `theta`.
    pub fn clearance_at(&self, theta: f64) -> f64 {
        self.sample_at(theta).clearance
    }

    /// Path length of the last sample at or before `theta`.
    pub fn path_length_at(&self, theta: f64) -> f64 {
        self.sample_at(theta).path_length
    }

    fn sample_at(&self, theta: f64) -> &FeasibilitySample {
        let theta = normalize_angle(theta);
        // Number of samples strictly below theta
        let insert = self.samples.partition_point(|s| s.angle < theta);
        // Below the front pad: the pad already carries the wrapped value
        &self.samples[insert.saturating_sub(1)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    fn no_margin() -> FeasibilityConfig {
        FeasibilityConfig {
            safety_margin: 0.0,
            small_gap_threshold: 0.0,
        }
    }

    fn update(angles: &[f64], ranges: &[f64]) -> FeasibilityUpdate {
        FeasibilityUpdate::new(angles.to_vec(), ranges.to_vec(), ranges.to_vec()).unwrap()
    }

    #[test]
    fn test_rejects_too_few_samples() {
        let err = FeasibilityProfile::from_update(&update(&[0.0], &[1.0]), &no_margin());
        assert!(matches!(err, Err(GatiError::InvalidInput(_))));
        let err = FeasibilityProfile::from_update(&update(&[], &[]), &no_margin());
        assert!(err.is_err());
    }

    #[test]
    fn test_sorted_and_padded() {
        let profile =
            FeasibilityProfile::from_update(&update(&[0.5, -0.5, 0.0], &[3.0, 1.0, 2.0]), &no_margin())
                .unwrap();
        let angles: Vec<f64> = profile.samples().iter().map(|s| s.angle).collect();
        assert_eq!(profile.len(), 3);
        assert_relative_eq!(angles[0], -1.0);
        assert_relative_eq!(angles[1], -0.5);
        assert_relative_eq!(angles[3], 0.5);
        assert_relative_eq!(angles[4], 1.0);

        // Pads carry the opposite end's values
        assert_relative_eq!(profile.samples()[0].clearance, 3.0);
        assert_relative_eq!(profile.samples()[4].clearance, 1.0);
    }

    #[test]
    fn test_angles_are_normalized() {
        let profile = FeasibilityProfile::from_update(
            &update(&[3.0 * PI / 2.0, 0.0], &[1.0, 2.0]),
            &no_margin(),
        )
        .unwrap();
        // 3π/2 wraps to -π/2 and sorts first
        assert_relative_eq!(profile.samples()[1].angle, -PI / 2.0, epsilon = 1e-9);
        assert_relative_eq!(profile.samples()[1].clearance, 1.0);
    }

    #[test]
    fn test_margin_and_small_gaps() {
        let config = FeasibilityConfig::default();
        let profile =
            FeasibilityProfile::from_update(&update(&[-0.1, 0.0, 0.1], &[0.6, 2.3, 0.2]), &config)
                .unwrap();
        // 0.6 - 0.3 = 0.3 < 0.5 -> blocked
        assert_eq!(profile.clearance_at(-0.05), 0.0);
        assert_relative_eq!(profile.clearance_at(0.05), 2.0, epsilon = 1e-12);
        // Negative clearance is zeroed too
        assert_eq!(profile.clearance_at(0.15), 0.0);
    }

    #[test]
    fn test_clearance_uses_preceding_sample() {
        let profile = FeasibilityProfile::from_update(
            &update(&[-1.0, 0.0, 1.0], &[1.0, 2.0, 3.0]),
            &no_margin(),
        )
        .unwrap();
        assert_relative_eq!(profile.clearance_at(0.5), 2.0);
        assert_relative_eq!(profile.clearance_at(-0.5), 1.0);
        assert_relative_eq!(profile.clearance_at(1.5), 3.0);
        // Exactly on a sample: the strictly-lower neighbor is used
        assert_relative_eq!(profile.clearance_at(0.0), 1.0);
        assert_relative_eq!(profile.path_length_at(0.5), 2.0);
    }

    #[test]
    fn test_lookup_defined_everywhere() {
        let profile =
            FeasibilityProfile::from_update(&update(&[-0.2, 0.2], &[1.0, 2.0]), &no_margin())
                .unwrap();
        let mut theta = -PI + 1e-6;
        while theta <= PI {
            let c = profile.clearance_at(theta);
            assert!(c == 1.0 || c == 2.0, "clearance_at({}) = {}", theta, c);
            theta += 0.01;
        }
        // Behind the table wraps to the last sample's value
        assert_relative_eq!(profile.clearance_at(-PI + 0.01), 2.0);
        assert_relative_eq!(profile.clearance_at(PI), 1.0);
    }
}
