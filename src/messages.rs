//! Typed input records consumed by the controller.
//!
//! Each record is validated when it is constructed. Transport adapters
//! build these and hand them to [`RobotStateSnapshot::apply`](crate::shared::RobotStateSnapshot::apply).

use crate::core::math::{normalize_angle, yaw_from_quaternion};
use crate::core::{Point2D, Pose2D, Velocity2D};
use crate::error::{GatiError, Result};
use crate::perception::RawObservation;

/// Robot pose from localization.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseUpdate {
    pub position: (f64, f64),
    /// Orientation as `(w, x, y, z)`
    pub orientation: (f64, f64, f64, f64),
    /// Measurement time in microseconds
    pub timestamp_us: u64,
}

impl PoseUpdate {
    pub fn new(
        position: (f64, f64),
        orientation: (f64, f64, f64, f64),
        timestamp_us: u64,
    ) -> Result<Self> {
        let (w, x, y, z) = orientation;
        let norm = (w * w + x * x + y * y + z * z).sqrt();
        if !position.0.is_finite() || !position.1.is_finite() {
            return Err(GatiError::InvalidInput(format!(
                "pose position is not finite: {:?}",
                position
            )));
        }
        if !norm.is_finite() || norm < 1e-9 {
            return Err(GatiError::InvalidInput(format!(
                "degenerate orientation quaternion: {:?}",
                orientation
            )));
        }
        Ok(Self {
            position,
            orientation: (w / norm, x / norm, y / norm, z / norm),
            timestamp_us,
        })
    }

    /// Heading derived from the orientation quaternion.
    pub fn heading(&self) -> f64 {
        let (w, x, y, z) = self.orientation;
        yaw_from_quaternion(w, x, y, z)
    }

    pub fn to_pose(&self) -> Pose2D {
        Pose2D::new(self.position.0, self.position.1, self.heading())
    }
}

/// Robot velocity in world frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VelocityUpdate {
    pub x: f64,
    pub y: f64,
}

impl VelocityUpdate {
    pub fn to_velocity(&self) -> Velocity2D {
        Velocity2D::new(self.x, self.y)
    }
}

/// New navigation goal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GoalUpdate {
    pub position: (f64, f64),
}

impl GoalUpdate {
    pub fn to_point(&self) -> Point2D {
        Point2D::new(self.position.0, self.position.1)
    }
}

/// One perception cluster.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObstacleCluster {
    pub label: i32,
    pub mean: (f64, f64),
    pub min: (f64, f64),
    pub max: (f64, f64),
    pub velocity: (f64, f64),
}

/// Clustered obstacle estimates from perception.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ObstacleClusterUpdate {
    pub clusters: Vec<ObstacleCluster>,
}

impl ObstacleClusterUpdate {
    /// Convert clusters into tracker observations, keeping extents.
    pub fn observations(&self) -> Vec<RawObservation> {
        self.clusters
            .iter()
            .map(|c| RawObservation {
                label: Some(c.label),
                position: Point2D::new(c.mean.0, c.mean.1),
                velocity: Velocity2D::new(c.velocity.0, c.velocity.1),
                extents: Some((Point2D::new(c.min.0, c.min.1), Point2D::new(c.max.0, c.max.1))),
            })
            .collect()
    }
}

/// One sample of a pedestrian trajectory.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackPoint {
    pub position: (f64, f64),
    pub velocity: (f64, f64),
}

/// Trajectory of one tracked pedestrian.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PedestrianTrack {
    pub label: i32,
    pub trajectory: Vec<TrackPoint>,
}

/// Per-pedestrian trajectory tracks, the alternate perception stream.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PedestrianTrackUpdate {
    pub tracks: Vec<PedestrianTrack>,
}

impl PedestrianTrackUpdate {
    /// Latest point of every non-empty track. Tracks carry no extents.
    pub fn observations(&self) -> Vec<RawObservation> {
        self.tracks
            .iter()
            .filter_map(|track| {
                let last = track.trajectory.last()?;
                Some(RawObservation {
                    label: Some(track.label),
                    position: Point2D::new(last.position.0, last.position.1),
                    velocity: Velocity2D::new(last.velocity.0, last.velocity.1),
                    extents: None,
                })
            })
            .collect()
    }
}

/// Raw angular ranging used to build the feasibility profile.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FeasibilityUpdate {
    pub angles: Vec<f64>,
    pub max_speeds: Vec<f64>,
    pub path_lengths: Vec<f64>,
}

impl FeasibilityUpdate {
    /// Build an update, rejecting arrays of unequal length.
    pub fn new(angles: Vec<f64>, max_speeds: Vec<f64>, path_lengths: Vec<f64>) -> Result<Self> {
        let update = Self {
            angles,
            max_speeds,
            path_lengths,
        };
        update.validate()?;
        Ok(update)
    }

    pub fn validate(&self) -> Result<()> {
        if self.angles.len() != self.max_speeds.len()
            || self.angles.len() != self.path_lengths.len()
        {
            return Err(GatiError::InvalidInput(format!(
                "feasibility arrays differ in length: angles={}, max_speeds={}, path_lengths={}",
                self.angles.len(),
                self.max_speeds.len(),
                self.path_lengths.len()
            )));
        }
        if self.angles.iter().any(|a| !a.is_finite()) {
            return Err(GatiError::InvalidInput(
                "feasibility angles must be finite".into(),
            ));
        }
        Ok(())
    }

    /// Angles normalized to (-π, π].
    pub fn normalized_angles(&self) -> impl Iterator<Item = f64> + '_ {
        self.angles.iter().map(|a| normalize_angle(*a))
    }
}

/// Supervisory mode request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModeOverride {
    pub requested_mode: crate::core::Mode,
}

/// Any input the controller accepts, for transports that multiplex streams.
#[derive(Debug, Clone, PartialEq)]
pub enum SensorUpdate {
    Pose(PoseUpdate),
    Velocity(VelocityUpdate),
    Goal(GoalUpdate),
    Clusters(ObstacleClusterUpdate),
    Tracks(PedestrianTrackUpdate),
    Feasibility(FeasibilityUpdate),
    ModeOverride(ModeOverride),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::math::quaternion_from_yaw;
    use approx::assert_relative_eq;

    #[test]
    fn test_pose_update_heading() {
        let update = PoseUpdate::new((1.0, 2.0), quaternion_from_yaw(0.7), 10).unwrap();
        assert_relative_eq!(update.heading(), 0.7, epsilon = 1e-9);
        let pose = update.to_pose();
        assert_eq!(pose.x, 1.0);
        assert_eq!(pose.y, 2.0);
    }

    #[test]
    fn test_pose_update_normalizes_quaternion() {
        let (w, x, y, z) = quaternion_from_yaw(-1.0);
        let update = PoseUpdate::new((0.0, 0.0), (2.0 * w, 2.0 * x, 2.0 * y, 2.0 * z), 0).unwrap();
        assert_relative_eq!(update.heading(), -1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_pose_update_rejects_zero_quaternion() {
        assert!(PoseUpdate::new((0.0, 0.0), (0.0, 0.0, 0.0, 0.0), 0).is_err());
        assert!(PoseUpdate::new((f64::NAN, 0.0), (1.0, 0.0, 0.0, 0.0), 0).is_err());
    }

    #[test]
    fn test_feasibility_update_length_mismatch() {
        let err = FeasibilityUpdate::new(vec![0.0, 1.0], vec![1.0], vec![1.0, 1.0]);
        assert!(matches!(err, Err(GatiError::InvalidInput(_))));
    }

    #[test]
    fn test_track_observations_skip_empty() {
        let update = PedestrianTrackUpdate {
            tracks: vec![
                PedestrianTrack {
                    label: 1,
                    trajectory: vec![],
                },
                PedestrianTrack {
                    label: 2,
                    trajectory: vec![
                        TrackPoint {
                            position: (0.0, 0.0),
                            velocity: (0.0, 0.0),
                        },
                        TrackPoint {
                            position: (1.0, 1.0),
                            velocity: (0.5, 0.0),
                        },
                    ],
                },
            ],
        };
        let obs = update.observations();
        assert_eq!(obs.len(), 1);
        assert_eq!(obs[0].label, Some(2));
        assert_eq!(obs[0].position, Point2D::new(1.0, 1.0));
        assert!(obs[0].extents.is_none());
    }

    #[test]
    fn test_cluster_observations_keep_extents() {
        let update = ObstacleClusterUpdate {
            clusters: vec![ObstacleCluster {
                label: 4,
                mean: (2.0, 0.0),
                min: (1.8, -0.2),
                max: (2.3, 0.1),
                velocity: (0.0, 1.0),
            }],
        };
        let obs = update.observations();
        assert_eq!(obs.len(), 1);
        assert!(obs[0].extents.is_some());
    }
}
