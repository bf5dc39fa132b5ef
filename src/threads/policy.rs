//! Policy thread: tracking, oracle query and action shaping.
//!
//! Each tick reads the freshest inputs from the snapshot and either
//! publishes a new desired action or leaves the previous one in place.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::{GatiConfig, RobotConfig};
use crate::control::ActionShaper;
use crate::core::{DesiredAction, Mode, StampedPose};
use crate::perception::{ObstacleAgent, ObstacleTracker};
use crate::policy::{HostAgent, Policy, PolicyAdapter};
use crate::shared::RobotStateSnapshot;

use super::Ticker;

/// Result of one policy tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PolicyOutcome {
    /// Not in `NN` mode, or no pose/goal yet
    Idle,
    /// Required input invalid or oracle failed; previous action kept
    Aborted,
    /// A goal update arrived mid-tick; result dropped
    Superseded,
    Published(DesiredAction),
}

/// Policy thread state and logic.
pub struct PolicyThread {
    snapshot: Arc<RobotStateSnapshot>,
    tracker: ObstacleTracker,
    adapter: PolicyAdapter,
    shaper: ActionShaper,
    robot: RobotConfig,
    rate_hz: f64,
    /// Tracked agents from the last obstacle update
    neighbors: Vec<ObstacleAgent>,
    /// Obstacle sequence the neighbors were built from
    tracked_sequence: u64,
    last_status_time: Instant,
    status_interval: Duration,
}

impl PolicyThread {
    pub fn new(config: &GatiConfig, snapshot: Arc<RobotStateSnapshot>, policy: Box<dyn Policy>) -> Self {
        Self {
            snapshot,
            tracker: ObstacleTracker::new(config.tracker.clone(), config.policy.neighbor_capacity),
            adapter: PolicyAdapter::new(
                config.policy.neighbor_capacity,
                config.policy.actions.clone(),
                policy,
            ),
            shaper: ActionShaper::new(config.shaper.clone()),
            robot: config.robot.clone(),
            rate_hz: config.rates.policy_hz,
            neighbors: Vec::new(),
            tracked_sequence: 0,
            last_status_time: Instant::now(),
            status_interval: Duration::from_secs_f64(config.rates.status_interval_secs),
        }
    }

    /// Run the policy loop until shutdown.
    pub fn run(&mut self) {
        tracing::info!(
            "Policy thread started ({:.0} Hz, action table '{}', {} inputs)",
            self.rate_hz,
            self.adapter.actions().version,
            self.adapter.layout().width()
        );

        let mut ticker = Ticker::new(self.rate_hz);
        while !self.snapshot.should_shutdown() {
            self.tick();

            if self.last_status_time.elapsed() >= self.status_interval {
                self.log_status();
                self.last_status_time = Instant::now();
            }

            ticker.wait();
        }

        tracing::info!("Policy thread exited");
    }

    /// Tracked neighbors used by the most recent tick.
    pub fn neighbors(&self) -> &[ObstacleAgent] {
        &self.neighbors
    }

    /// One policy cycle.
    pub fn tick(&mut self) -> PolicyOutcome {
        let goal_epoch = self.snapshot.goal_epoch();
        if self.snapshot.mode() != Mode::Nn {
            return PolicyOutcome::Idle;
        }
        let (Some(stamped), Some(goal)) = (self.snapshot.pose(), self.snapshot.goal()) else {
            return PolicyOutcome::Idle;
        };

        let Some(profile) = self.snapshot.feasibility() else {
            tracing::debug!("No valid feasibility profile, keeping previous action");
            return PolicyOutcome::Aborted;
        };

        self.refresh_neighbors(&stamped);

        let pose = stamped.pose;
        let host = HostAgent {
            position: pose.position(),
            velocity: self.snapshot.velocity(),
            heading: pose.theta,
            preferred_speed: self.robot.preferred_speed,
            radius: self.robot.radius,
            goal,
        };

        let raw = match self.adapter.compute(&host, &self.neighbors) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!("Policy query failed, keeping previous action: {}", e);
                self.snapshot.record_policy_failure();
                return PolicyOutcome::Aborted;
            }
        };

        let shaped = self.shaper.shape(
            raw,
            &profile,
            pose.theta,
            host.distance_to_goal(),
            self.robot.preferred_speed,
        );
        let action = DesiredAction {
            speed: shaped.speed,
            heading: shaped.heading,
            clearance: shaped.clearance,
            pose_timestamp_us: stamped.timestamp_us,
        };

        let lookahead = action.lookahead(&pose);
        tracing::debug!(
            "Action: speed {:.2}, heading {:.1}°, clearance {:.2}, lookahead ({:.2}, {:.2}), {} neighbors",
            action.speed,
            action.heading.to_degrees(),
            action.clearance,
            lookahead.x,
            lookahead.y,
            self.neighbors.len()
        );

        if self
            .snapshot
            .publish_action(action, shaped.stop_requested, goal_epoch)
        {
            PolicyOutcome::Published(action)
        } else {
            tracing::debug!("Goal changed during policy tick, dropping action");
            PolicyOutcome::Superseded
        }
    }

    /// Re-run the tracker only when new obstacle data arrived, so smoothing
    /// applies once per perception update.
    fn refresh_neighbors(&mut self, stamped: &StampedPose) {
        let sequence = self.snapshot.obstacle_sequence();
        if sequence == self.tracked_sequence {
            return;
        }
        let frame = self.snapshot.obstacles();
        self.neighbors = self.tracker.update(&frame.observations, &stamped.pose);
        self.tracked_sequence = frame.sequence;
    }

    fn log_status(&self) {
        let mode = self.snapshot.mode();
        match self.snapshot.pose() {
            Some(stamped) => tracing::info!(
                "Policy: mode={}, pose=({:.2}, {:.2}, {:.1}°), neighbors={}, actions={}, failures={}, poses={}",
                mode.as_str(),
                stamped.pose.x,
                stamped.pose.y,
                stamped.pose.theta.to_degrees(),
                self.neighbors.len(),
                self.snapshot.actions_computed(),
                self.snapshot.policy_failures(),
                self.snapshot.poses_received()
            ),
            None => tracing::info!("Policy: mode={}, waiting for pose", mode.as_str()),
        }
    }
}
