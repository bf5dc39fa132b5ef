//! Observation assembly and greedy decoding around the policy oracle.
//!
//! The observation is expressed in an ego frame whose x axis points from
//! the robot toward its goal:
//!
//! ```text
//! host      [n, d_goal, ψ_ego, v_pref, r, vx_ego, vy_ego]
//! neighbor  [px_ego, py_ego, vx_ego, vy_ego, r, r + r_host, d - r - r_host]  × (K-1)
//! ```
//!
//! Neighbors are written farthest first, so the closest agent always sits
//! in the last occupied slot. Unused slots stay zero.

use crate::core::math::normalize_angle;
use crate::core::{Point2D, Velocity2D};
use crate::error::{GatiError, Result};
use crate::perception::ObstacleAgent;

use super::actions::ActionTable;

/// Pretrained decision function consumed as a black box.
pub trait Policy: Send {
    /// Probability of each entry of the action table for `observation`.
    fn predict(&mut self, observation: &[f32]) -> Result<Vec<f32>>;
}

/// Decoded policy output in world frame, before shaping.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawAction {
    /// Speed (m/s)
    pub speed: f64,
    /// World-frame heading (rad)
    pub heading: f64,
}

/// Robot state as the oracle sees it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HostAgent {
    pub position: Point2D,
    pub velocity: Velocity2D,
    pub heading: f64,
    pub preferred_speed: f64,
    pub radius: f64,
    pub goal: Point2D,
}

impl HostAgent {
    pub fn distance_to_goal(&self) -> f64 {
        self.position.distance(&self.goal)
    }
}

/// Fixed-width observation layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObservationLayout {
    neighbor_slots: usize,
}

impl ObservationLayout {
    pub const HOST_FEATURES: usize = 7;
    pub const NEIGHBOR_FEATURES: usize = 7;

    /// Layout for an oracle observing `capacity` agents, robot included.
    pub fn new(capacity: usize) -> Self {
        Self {
            neighbor_slots: capacity.saturating_sub(1),
        }
    }

    pub fn neighbor_slots(&self) -> usize {
        self.neighbor_slots
    }

    pub fn width(&self) -> usize {
        Self::HOST_FEATURES + Self::NEIGHBOR_FEATURES * self.neighbor_slots
    }

    /// Offset of neighbor slot `i` inside the observation.
    pub fn neighbor_offset(&self, i: usize) -> usize {
        Self::HOST_FEATURES + Self::NEIGHBOR_FEATURES * i
    }

    /// Assemble the observation. Extra neighbors beyond the slot count are
    /// dropped farthest first.
    pub fn build(&self, host: &HostAgent, neighbors: &[ObstacleAgent]) -> Vec<f32> {
        let mut obs = vec![0.0f32; self.width()];

        let frame = EgoFrame::toward(host.position, host.goal);
        let velocity = host.velocity.capped(host.preferred_speed);
        let (vx, vy) = frame.rotate(velocity.vx, velocity.vy);

        let mut ordered: Vec<(f64, &ObstacleAgent)> = neighbors
            .iter()
            .map(|n| (host.position.distance(&n.position), n))
            .collect();
        // Stable: equal distances keep tracker order
        ordered.sort_by(|a, b| b.0.total_cmp(&a.0));
        let skip = ordered.len().saturating_sub(self.neighbor_slots);
        let ordered = &ordered[skip..];

        obs[0] = ordered.len() as f32;
        obs[1] = host.distance_to_goal() as f32;
        obs[2] = normalize_angle(host.heading - frame.angle) as f32;
        obs[3] = host.preferred_speed as f32;
        obs[4] = host.radius as f32;
        obs[5] = vx as f32;
        obs[6] = vy as f32;

        for (slot, (dist, agent)) in ordered.iter().enumerate() {
            let base = self.neighbor_offset(slot);
            let (px, py) = frame.rotate(
                agent.position.x - host.position.x,
                agent.position.y - host.position.y,
            );
            let (nvx, nvy) = frame.rotate(agent.velocity.vx, agent.velocity.vy);
            let combined = agent.radius + host.radius;
            obs[base] = px as f32;
            obs[base + 1] = py as f32;
            obs[base + 2] = nvx as f32;
            obs[base + 3] = nvy as f32;
            obs[base + 4] = agent.radius as f32;
            obs[base + 5] = combined as f32;
            obs[base + 6] = (dist - combined) as f32;
        }

        obs
    }
}

/// Rotation into the goal-aligned frame.
#[derive(Debug, Clone, Copy)]
struct EgoFrame {
    angle: f64,
    cos: f64,
    sin: f64,
}

impl EgoFrame {
    fn toward(from: Point2D, to: Point2D) -> Self {
        let angle = from.bearing_to(&to);
        let (sin, cos) = angle.sin_cos();
        Self { angle, cos, sin }
    }

    fn rotate(&self, x: f64, y: f64) -> (f64, f64) {
        (x * self.cos + y * self.sin, -x * self.sin + y * self.cos)
    }
}

/// Builds observations, queries the oracle and decodes its choice.
pub struct PolicyAdapter {
    layout: ObservationLayout,
    actions: ActionTable,
    policy: Box<dyn Policy>,
}

impl PolicyAdapter {
    pub fn new(neighbor_capacity: usize, actions: ActionTable, policy: Box<dyn Policy>) -> Self {
        Self {
            layout: ObservationLayout::new(neighbor_capacity),
            actions,
            policy,
        }
    }

    pub fn layout(&self) -> &ObservationLayout {
        &self.layout
    }

    pub fn actions(&self) -> &ActionTable {
        &self.actions
    }

    /// Pick the most probable action for the current state.
    ///
    /// Oracle failures and malformed distributions are returned as
    /// [`GatiError::Policy`]; the caller keeps its previous action.
    pub fn compute(&mut self, host: &HostAgent, neighbors: &[ObstacleAgent]) -> Result<RawAction> {
        let observation = self.layout.build(host, neighbors);
        let distribution = self.policy.predict(&observation)?;
        let index = self.select(&distribution)?;
        let action = self.decode(index, host)?;
        tracing::trace!(
            "Policy chose action {} -> speed {:.2}, heading {:.2}",
            index,
            action.speed,
            action.heading
        );
        Ok(action)
    }

    /// Greedy decoding: index of the largest probability, first on ties.
    pub fn select(&self, distribution: &[f32]) -> Result<usize> {
        if distribution.len() != self.actions.len() {
            return Err(GatiError::Policy(format!(
                "distribution has {} entries, action table '{}' has {}",
                distribution.len(),
                self.actions.version,
                self.actions.len()
            )));
        }
        if distribution.iter().any(|p| !p.is_finite() || *p < 0.0) {
            return Err(GatiError::Policy(
                "distribution contains negative or non-finite values".into(),
            ));
        }
        let total: f32 = distribution.iter().sum();
        if !total.is_finite() || total <= 0.0 {
            return Err(GatiError::Policy(format!(
                "distribution carries no probability mass (sum {})",
                total
            )));
        }

        let mut best = 0;
        for (i, p) in distribution.iter().enumerate() {
            if *p > distribution[best] {
                best = i;
            }
        }
        Ok(best)
    }

    /// World-frame action for table entry `index`.
    pub fn decode(&self, index: usize, host: &HostAgent) -> Result<RawAction> {
        let entry = self.actions.get(index).ok_or_else(|| {
            GatiError::Policy(format!("action index {} out of range", index))
        })?;
        Ok(RawAction {
            speed: host.preferred_speed * entry.speed_fraction,
            heading: normalize_angle(entry.heading_offset + host.heading),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    struct FixedPolicy(Vec<f32>);

    impl Policy for FixedPolicy {
        fn predict(&mut self, _observation: &[f32]) -> Result<Vec<f32>> {
            Ok(self.0.clone())
        }
    }

    struct FailingPolicy;

    impl Policy for FailingPolicy {
        fn predict(&mut self, _observation: &[f32]) -> Result<Vec<f32>> {
            Err(GatiError::Policy("inference backend unavailable".into()))
        }
    }

    fn host() -> HostAgent {
        HostAgent {
            position: Point2D::new(0.0, 0.0),
            velocity: Velocity2D::new(0.0, 0.0),
            heading: 0.0,
            preferred_speed: 1.0,
            radius: 0.5,
            goal: Point2D::new(0.0, 10.0),
        }
    }

    fn agent(x: f64, y: f64) -> ObstacleAgent {
        ObstacleAgent {
            label: None,
            position: Point2D::new(x, y),
            velocity: Velocity2D::new(0.0, 0.0),
            heading: 0.0,
            preferred_speed: 1.0,
            radius: 0.3,
            goal: Point2D::new(x + 5.0, y + 5.0),
            turning_bias: 0.0,
        }
    }

    fn one_hot(index: usize) -> Vec<f32> {
        let mut p = vec![0.0; 11];
        p[index] = 1.0;
        p
    }

    #[test]
    fn test_layout_width() {
        assert_eq!(ObservationLayout::new(10).width(), 7 + 7 * 9);
        assert_eq!(ObservationLayout::new(2).width(), 14);
    }

    #[test]
    fn test_host_features_in_goal_frame() {
        let mut h = host();
        h.velocity = Velocity2D::new(0.0, 3.0);
        let obs = ObservationLayout::new(3).build(&h, &[]);

        assert_eq!(obs.len(), 21);
        assert_eq!(obs[0], 0.0);
        assert_relative_eq!(obs[1], 10.0);
        // Facing +x with the goal along +y
        assert_relative_eq!(obs[2], (-PI / 2.0) as f32, epsilon = 1e-6);
        // Velocity capped to preferred speed and pointing at the goal
        assert_relative_eq!(obs[5], 1.0, epsilon = 1e-6);
        assert_relative_eq!(obs[6], 0.0, epsilon = 1e-6);
        assert!(obs[7..].iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_neighbors_farthest_first() {
        let h = HostAgent {
            goal: Point2D::new(10.0, 0.0),
            ..host()
        };
        let obs = ObservationLayout::new(3).build(&h, &[agent(1.0, 0.0), agent(3.0, 0.0)]);
        assert_eq!(obs[0], 2.0);
        assert_relative_eq!(obs[7], 3.0);
        assert_relative_eq!(obs[14], 1.0);
        assert_relative_eq!(obs[14 + 5], 0.8, epsilon = 1e-6);
        assert_relative_eq!(obs[14 + 6], 0.2, epsilon = 1e-6);
    }

    #[test]
    fn test_excess_neighbors_drop_farthest() {
        let h = HostAgent {
            goal: Point2D::new(10.0, 0.0),
            ..host()
        };
        let obs = ObservationLayout::new(2).build(&h, &[agent(4.0, 0.0), agent(2.0, 0.0)]);
        assert_eq!(obs.len(), 14);
        assert_eq!(obs[0], 1.0);
        assert_relative_eq!(obs[7], 2.0);
    }

    #[test]
    fn test_greedy_decode() {
        let mut adapter =
            PolicyAdapter::new(10, ActionTable::default(), Box::new(FixedPolicy(one_hot(4))));
        let mut h = host();
        h.heading = 0.2;
        let action = adapter.compute(&h, &[]).unwrap();
        assert_relative_eq!(action.speed, 1.0);
        assert_relative_eq!(action.heading, 0.2 + PI / 6.0, epsilon = 1e-12);
    }

    #[test]
    fn test_decode_wraps_heading() {
        let adapter =
            PolicyAdapter::new(10, ActionTable::default(), Box::new(FixedPolicy(one_hot(0))));
        let mut h = host();
        h.heading = -PI + 0.1;
        let action = adapter.decode(5, &h).unwrap();
        assert_relative_eq!(action.speed, 0.5);
        assert_relative_eq!(action.heading, PI + 0.1 - PI / 6.0, epsilon = 1e-9);
    }

    #[test]
    fn test_ties_pick_first() {
        let adapter =
            PolicyAdapter::new(10, ActionTable::default(), Box::new(FixedPolicy(vec![])));
        let mut p = vec![0.05f32; 11];
        p[3] = 0.25;
        p[7] = 0.25;
        assert_eq!(adapter.select(&p).unwrap(), 3);
    }

    #[test]
    fn test_malformed_distribution_rejected() {
        let mut adapter =
            PolicyAdapter::new(10, ActionTable::default(), Box::new(FixedPolicy(vec![1.0; 4])));
        assert!(matches!(adapter.compute(&host(), &[]), Err(GatiError::Policy(_))));

        let mut nan = one_hot(0);
        nan[1] = f32::NAN;
        assert!(adapter.select(&nan).is_err());
    }

    #[test]
    fn test_all_zero_distribution_rejected() {
        let mut adapter =
            PolicyAdapter::new(10, ActionTable::default(), Box::new(FixedPolicy(vec![0.0; 11])));
        assert!(matches!(adapter.compute(&host(), &[]), Err(GatiError::Policy(_))));

        let huge = vec![f32::MAX; 11];
        assert!(matches!(adapter.select(&huge), Err(GatiError::Policy(_))));
    }

    #[test]
    fn test_oracle_failure_propagates() {
        let mut adapter = PolicyAdapter::new(10, ActionTable::default(), Box::new(FailingPolicy));
        assert!(matches!(adapter.compute(&host(), &[]), Err(GatiError::Policy(_))));
    }
}
