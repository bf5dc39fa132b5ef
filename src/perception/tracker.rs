//! Obstacle tracker: turns perception clusters into policy neighbors.
//!
//! Each update runs the same pipeline:
//!
//! 1. Forward cone filter relative to the robot heading
//! 2. Radius estimate from cluster extents
//! 3. Partial selection of the closest observations up to capacity
//! 4. Exponential velocity smoothing against the previous cycle
//! 5. Synthetic goal assignment
//!
//! The output of one update is the smoothing memory of the next.

use crate::config::TrackerConfig;
use crate::core::math::angle_diff;
use crate::core::{Point2D, Pose2D, Velocity2D};

/// One obstacle as delivered by perception.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawObservation {
    /// Stable identity, when perception provides one
    pub label: Option<i32>,
    /// Cluster centroid (m)
    pub position: Point2D,
    /// World-frame velocity (m/s)
    pub velocity: Velocity2D,
    /// Bounding corners `(min, max)` of the cluster, if known
    pub extents: Option<(Point2D, Point2D)>,
}

/// Neighbor agent as seen by the policy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObstacleAgent {
    pub label: Option<i32>,
    pub position: Point2D,
    /// Smoothed world-frame velocity (m/s)
    pub velocity: Velocity2D,
    /// Direction of the observed velocity (rad)
    pub heading: f64,
    /// Smoothed speed, zero for near-static agents (m/s)
    pub preferred_speed: f64,
    pub radius: f64,
    /// Position plus a fixed offset; a heading proxy, not a destination
    pub goal: Point2D,
    /// Always zero for now
    pub turning_bias: f64,
}

/// Converts raw observations into a bounded, smoothed neighbor list.
#[derive(Debug, Clone)]
pub struct ObstacleTracker {
    config: TrackerConfig,
    /// Maximum neighbors handed to the policy (capacity minus the robot)
    max_neighbors: usize,
    /// Agents from the previous update
    previous: Vec<ObstacleAgent>,
}

impl ObstacleTracker {
    /// Create a tracker for an oracle observing `neighbor_capacity` agents
    /// including the robot itself.
    pub fn new(config: TrackerConfig, neighbor_capacity: usize) -> Self {
        Self {
            config,
            max_neighbors: neighbor_capacity.saturating_sub(1),
            previous: Vec::new(),
        }
    }

    /// Maximum number of agents [`update`](Self::update) returns.
    pub fn max_neighbors(&self) -> usize {
        self.max_neighbors
    }

    /// Agents produced by the last update.
    pub fn previous(&self) -> &[ObstacleAgent] {
        &self.previous
    }

    /// Forget the smoothing memory.
    pub fn reset(&mut self) {
        self.previous.clear();
    }

    /// Process one perception update relative to the robot pose.
    pub fn update(&mut self, observations: &[RawObservation], robot: &Pose2D) -> Vec<ObstacleAgent> {
        let robot_pos = robot.position();

        // Keep (input index, distance) of observations in front of the robot
        let candidates: Vec<(usize, f64)> = observations
            .iter()
            .enumerate()
            .filter(|(_, obs)| self.in_cone(obs, robot))
            .map(|(i, obs)| (i, robot_pos.distance(&obs.position)))
            .collect();

        let selected = self.select_closest(candidates);

        let agents: Vec<ObstacleAgent> = selected
            .into_iter()
            .map(|i| self.build_agent(&observations[i]))
            .collect();

        tracing::debug!(
            "Tracker: {} observations -> {} neighbors",
            observations.len(),
            agents.len()
        );

        self.previous = agents.clone();
        agents
    }

    fn in_cone(&self, obs: &RawObservation, robot: &Pose2D) -> bool {
        if !self.config.cone_filter {
            return true;
        }
        let bearing = robot.position().bearing_to(&obs.position);
        angle_diff(robot.theta, bearing).abs() < self.config.cone_half_angle
    }

    /// Indices of the closest candidates, in input order.
    ///
    /// Ties on distance go to the earlier observation.
    fn select_closest(&self, mut candidates: Vec<(usize, f64)>) -> Vec<usize> {
        if candidates.len() > self.max_neighbors {
            if self.max_neighbors == 0 {
                return Vec::new();
            }
            let by_distance =
                |a: &(usize, f64), b: &(usize, f64)| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0));
            candidates.select_nth_unstable_by(self.max_neighbors - 1, by_distance);
            candidates.truncate(self.max_neighbors);
            candidates.sort_unstable_by_key(|(i, _)| *i);
        }
        candidates.into_iter().map(|(i, _)| i).collect()
    }

    fn estimate_radius(&self, obs: &RawObservation) -> f64 {
        match obs.extents {
            Some((min, max)) => {
                let lower = obs.position.distance(&min);
                let upper = obs.position.distance(&max);
                self.config
                    .default_radius
                    .max(self.config.inflation_factor * lower.max(upper))
            }
            None => self.config.default_radius,
        }
    }

    fn build_agent(&self, obs: &RawObservation) -> ObstacleAgent {
        let heading = obs.velocity.heading();
        let mut velocity = obs.velocity;

        // First match wins. A closer candidate later in the list is ignored.
        let alpha = self.config.smoothing_alpha;
        if let Some(prev) = self.previous.iter().find(|prev| {
            prev.position.distance(&obs.position) < self.config.match_distance
                && angle_diff(prev.heading, heading).abs() < self.config.match_heading
        }) {
            velocity = Velocity2D::new(
                alpha * velocity.vx + (1.0 - alpha) * prev.velocity.vx,
                alpha * velocity.vy + (1.0 - alpha) * prev.velocity.vy,
            );
        }

        let mut preferred_speed = velocity.speed();
        if preferred_speed < self.config.min_speed {
            preferred_speed = 0.0;
            velocity = Velocity2D::default();
        }

        let offset = self.config.goal_offset;
        ObstacleAgent {
            label: obs.label,
            position: obs.position,
            velocity,
            heading,
            preferred_speed,
            radius: self.estimate_radius(obs),
            goal: Point2D::new(obs.position.x + offset, obs.position.y + offset),
            turning_bias: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    fn observation(x: f64, y: f64, vx: f64, vy: f64) -> RawObservation {
        RawObservation {
            label: None,
            position: Point2D::new(x, y),
            velocity: Velocity2D::new(vx, vy),
            extents: None,
        }
    }

    fn default_tracker(capacity: usize) -> ObstacleTracker {
        ObstacleTracker::new(TrackerConfig::default(), capacity)
    }

    #[test]
    fn test_cone_filter_drops_obstacles_behind() {
        let mut tracker = default_tracker(10);
        let robot = Pose2D::new(0.0, 0.0, 0.0);
        let obs = vec![
            observation(2.0, 0.0, 0.0, 0.0),  // ahead
            observation(-2.0, 0.1, 0.0, 0.0), // behind, ~177°
            observation(0.0, 2.0, 0.0, 0.0),  // left, 90°
        ];
        let agents = tracker.update(&obs, &robot);
        assert_eq!(agents.len(), 2);
        assert_eq!(agents[0].position, Point2D::new(2.0, 0.0));
        assert_eq!(agents[1].position, Point2D::new(0.0, 2.0));
    }

    #[test]
    fn test_cone_filter_can_be_disabled() {
        let config = TrackerConfig {
            cone_filter: false,
            ..Default::default()
        };
        let mut tracker = ObstacleTracker::new(config, 10);
        let agents = tracker.update(&[observation(-2.0, 0.0, 0.0, 0.0)], &Pose2D::default());
        assert_eq!(agents.len(), 1);
    }

    #[test]
    fn test_cone_follows_robot_heading() {
        let mut tracker = default_tracker(10);
        // Robot faces -x, so an obstacle at -x is ahead
        let robot = Pose2D::new(0.0, 0.0, PI);
        let agents = tracker.update(&[observation(-3.0, 0.0, 0.0, 0.0)], &robot);
        assert_eq!(agents.len(), 1);
    }

    #[test]
    fn test_empty_after_filter_is_valid() {
        let mut tracker = default_tracker(10);
        let agents = tracker.update(&[observation(-2.0, 0.0, 1.0, 0.0)], &Pose2D::default());
        assert!(agents.is_empty());
        assert!(tracker.previous().is_empty());
    }

    #[test]
    fn test_radius_from_extents() {
        let mut tracker = default_tracker(10);
        let mut obs = observation(2.0, 0.0, 0.0, 0.0);
        obs.extents = Some((Point2D::new(1.6, 0.0), Point2D::new(2.1, 0.0)));
        let agents = tracker.update(&[obs], &Pose2D::default());
        // max(0.3, 1.5 * max(0.4, 0.1)) = 0.6
        assert_relative_eq!(agents[0].radius, 0.6, epsilon = 1e-12);

        // Small cluster falls back to the default radius
        obs.extents = Some((Point2D::new(1.95, 0.0), Point2D::new(2.05, 0.0)));
        let agents = tracker.update(&[obs], &Pose2D::default());
        assert_relative_eq!(agents[0].radius, 0.3);
    }

    #[test]
    fn test_selects_closest_regardless_of_order() {
        // Capacity 4 -> 3 neighbors
        let positions = [5.0, 1.0, 4.0, 2.0, 3.0, 6.0];
        let forward: Vec<_> = positions
            .iter()
            .map(|&x| observation(x, 0.0, 0.0, 0.0))
            .collect();
        let mut reversed = forward.clone();
        reversed.reverse();

        for obs in [forward, reversed] {
            let mut tracker = default_tracker(4);
            let agents = tracker.update(&obs, &Pose2D::default());
            assert_eq!(agents.len(), 3);
            let mut xs: Vec<f64> = agents.iter().map(|a| a.position.x).collect();
            xs.sort_by(|a, b| a.total_cmp(b));
            assert_eq!(xs, vec![1.0, 2.0, 3.0]);
        }
    }

    #[test]
    fn test_selection_returns_min_of_capacity_and_count() {
        let obs: Vec<_> = (1..=5).map(|i| observation(i as f64, 0.0, 0.0, 0.0)).collect();
        let mut roomy = default_tracker(10);
        assert_eq!(roomy.update(&obs, &Pose2D::default()).len(), 5);
        let mut tight = default_tracker(3);
        assert_eq!(tight.update(&obs, &Pose2D::default()).len(), 2);
    }

    #[test]
    fn test_distance_ties_keep_input_order() {
        let obs = vec![
            observation(0.0, 2.0, 0.0, 0.0),
            observation(2.0, 0.0, 0.0, 0.0),
            observation(0.0, -2.0, 0.0, 0.0),
        ];
        let mut tracker = default_tracker(3);
        let agents = tracker.update(&obs, &Pose2D::default());
        assert_eq!(agents.len(), 2);
        assert_eq!(agents[0].position, Point2D::new(0.0, 2.0));
        assert_eq!(agents[1].position, Point2D::new(2.0, 0.0));
    }

    #[test]
    fn test_velocity_smoothing() {
        let mut tracker = default_tracker(10);
        let robot = Pose2D::default();
        tracker.update(&[observation(1.0, 1.0, 1.0, 0.0)], &robot);
        let agents = tracker.update(&[observation(1.2, 1.0, 2.0, 0.0)], &robot);

        // 0.2 * 2 + 0.8 * 1
        assert_relative_eq!(agents[0].velocity.vx, 1.2, epsilon = 1e-12);
        assert_relative_eq!(agents[0].velocity.vy, 0.0);
        assert_relative_eq!(agents[0].preferred_speed, 1.2, epsilon = 1e-12);
    }

    #[test]
    fn test_no_smoothing_outside_thresholds() {
        let mut tracker = default_tracker(10);
        let robot = Pose2D::default();

        // Too far away
        tracker.update(&[observation(1.0, 1.0, 1.0, 0.0)], &robot);
        let agents = tracker.update(&[observation(1.6, 1.0, 2.0, 0.0)], &robot);
        assert_relative_eq!(agents[0].velocity.vx, 2.0);

        // Heading differs by 90°
        tracker.update(&[observation(1.0, 1.0, 1.0, 0.0)], &robot);
        let agents = tracker.update(&[observation(1.1, 1.0, 0.0, 2.0)], &robot);
        assert_relative_eq!(agents[0].velocity.vy, 2.0);
    }

    #[test]
    fn test_first_match_wins() {
        // Input order decides the match, not proximity.
        let mut tracker = default_tracker(10);
        let robot = Pose2D::default();
        tracker.update(
            &[
                observation(1.4, 1.0, 1.0, 0.0),
                observation(1.0, 1.0, 3.0, 0.0),
            ],
            &robot,
        );
        assert_eq!(tracker.previous().len(), 2);

        let agents = tracker.update(&[observation(1.05, 1.0, 2.0, 0.0)], &robot);
        // Matched the first previous agent (vx = 1.0), not the closer one (vx = 3.0)
        assert_relative_eq!(agents[0].velocity.vx, 0.2 * 2.0 + 0.8 * 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_slow_agents_snap_to_zero() {
        let mut tracker = default_tracker(10);
        let agents = tracker.update(&[observation(2.0, 0.0, 0.1, 0.1)], &Pose2D::default());
        assert_eq!(agents[0].velocity, Velocity2D::default());
        assert_eq!(agents[0].preferred_speed, 0.0);
    }

    #[test]
    fn test_synthetic_goal_offset() {
        let mut tracker = default_tracker(10);
        let agents = tracker.update(&[observation(2.0, -1.0, 1.0, 0.0)], &Pose2D::default());
        assert_eq!(agents[0].goal, Point2D::new(7.0, 4.0));
        assert_eq!(agents[0].turning_bias, 0.0);
    }
}
