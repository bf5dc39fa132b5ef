//! Shared state for the dual-rate architecture.
//!
//! Written by asynchronous producers (pose, velocity, goal, obstacles,
//! feasibility), read by:
//! - Policy thread (10 Hz): tracker, oracle, shaping
//! - Control thread (100 Hz): mode machine, heading servo
//!
//! Every multi-field value sits behind its own lock and is replaced whole,
//! so readers never see half of an update. Writes are last-writer-wins.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock};

use crate::config::{FeasibilityConfig, GatiConfig};
use crate::control::{FeasibilityProfile, ModeCommand, ModeStateMachine};
use crate::core::{DesiredAction, Mode, Point2D, Pose2D, StampedPose, Velocity2D, VelocityCommand};
use crate::messages::{
    FeasibilityUpdate, GoalUpdate, ModeOverride, ObstacleClusterUpdate, PedestrianTrackUpdate,
    PoseUpdate, SensorUpdate, VelocityUpdate,
};
use crate::perception::RawObservation;

/// Latest obstacle observations tagged with an update counter.
#[derive(Debug, Clone, Default)]
pub struct ObstacleFrame {
    /// Increments on every accepted obstacle update
    pub sequence: u64,
    pub observations: Vec<RawObservation>,
}

/// Mode machine plus the goal generation it belongs to.
#[derive(Debug)]
struct ModeState {
    machine: ModeStateMachine,
    /// Bumped on every goal update
    goal_epoch: u64,
}

/// Robot state shared between producers and both periodic loops.
#[derive(Debug)]
pub struct RobotStateSnapshot {
    use_clusters: bool,
    feasibility_config: FeasibilityConfig,

    pose: RwLock<Option<StampedPose>>,
    velocity: RwLock<Velocity2D>,
    obstacles: RwLock<ObstacleFrame>,
    feasibility: RwLock<Option<Arc<FeasibilityProfile>>>,
    desired: RwLock<Option<DesiredAction>>,
    mode: Mutex<ModeState>,
    last_command: RwLock<VelocityCommand>,

    /// Shutdown signal for graceful termination
    shutdown: AtomicBool,

    poses_received: AtomicU64,
    actions_computed: AtomicU64,
    policy_failures: AtomicU64,
}

impl RobotStateSnapshot {
    pub fn new(config: &GatiConfig) -> Self {
        let snapshot = Self {
            use_clusters: config.tracker.use_clusters,
            feasibility_config: config.feasibility.clone(),
            pose: RwLock::new(None),
            velocity: RwLock::new(Velocity2D::default()),
            obstacles: RwLock::new(ObstacleFrame::default()),
            feasibility: RwLock::new(None),
            desired: RwLock::new(None),
            mode: Mutex::new(ModeState {
                machine: ModeStateMachine::new(config.robot.spin_rate, config.robot.spin_tolerance),
                goal_epoch: 0,
            }),
            last_command: RwLock::new(VelocityCommand::stop()),
            shutdown: AtomicBool::new(false),
            poses_received: AtomicU64::new(0),
            actions_computed: AtomicU64::new(0),
            policy_failures: AtomicU64::new(0),
        };

        if let Some([x, y]) = config.robot.default_goal {
            snapshot.set_goal(&GoalUpdate { position: (x, y) });
        }
        snapshot
    }

    /// Route any input record to its setter.
    pub fn apply(&self, update: SensorUpdate) {
        match update {
            SensorUpdate::Pose(u) => self.set_pose(&u),
            SensorUpdate::Velocity(u) => self.set_velocity(&u),
            SensorUpdate::Goal(u) => self.set_goal(&u),
            SensorUpdate::Clusters(u) => self.set_clusters(&u),
            SensorUpdate::Tracks(u) => self.set_tracks(&u),
            SensorUpdate::Feasibility(u) => self.set_feasibility(&u),
            SensorUpdate::ModeOverride(u) => self.set_mode_override(&u),
        }
    }

    // Producers

    pub fn set_pose(&self, update: &PoseUpdate) {
        *self.pose.write() = Some(StampedPose {
            pose: update.to_pose(),
            timestamp_us: update.timestamp_us,
        });
        self.poses_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_velocity(&self, update: &VelocityUpdate) {
        *self.velocity.write() = update.to_velocity();
    }

    /// New goal: spin toward it and drop the action computed for the old one.
    pub fn set_goal(&self, update: &GoalUpdate) {
        let mut mode = self.mode.lock();
        mode.goal_epoch += 1;
        mode.machine.on_goal(update.to_point());
        *self.desired.write() = None;
    }

    /// Clustered obstacles. Ignored when the tracker is fed from tracks.
    pub fn set_clusters(&self, update: &ObstacleClusterUpdate) {
        if self.use_clusters {
            self.set_obstacles(update.observations());
        } else {
            tracing::trace!("Ignoring cluster update, tracker uses pedestrian tracks");
        }
    }

    /// Pedestrian tracks. Ignored when the tracker is fed from clusters.
    pub fn set_tracks(&self, update: &PedestrianTrackUpdate) {
        if !self.use_clusters {
            self.set_obstacles(update.observations());
        } else {
            tracing::trace!("Ignoring track update, tracker uses clusters");
        }
    }

    pub fn set_obstacles(&self, observations: Vec<RawObservation>) {
        let mut frame = self.obstacles.write();
        frame.sequence += 1;
        frame.observations = observations;
    }

    /// Rebuild the feasibility profile. An invalid update invalidates the
    /// profile until the next valid one arrives.
    pub fn set_feasibility(&self, update: &FeasibilityUpdate) {
        let profile = match FeasibilityProfile::from_update(update, &self.feasibility_config) {
            Ok(profile) => Some(Arc::new(profile)),
            Err(e) => {
                tracing::warn!("Discarding feasibility update: {}", e);
                None
            }
        };
        *self.feasibility.write() = profile;
    }

    pub fn set_mode_override(&self, update: &ModeOverride) {
        self.mode.lock().machine.on_override(update.requested_mode);
    }

    // Readers

    pub fn pose(&self) -> Option<StampedPose> {
        *self.pose.read()
    }

    pub fn velocity(&self) -> Velocity2D {
        *self.velocity.read()
    }

    pub fn goal(&self) -> Option<Point2D> {
        self.mode.lock().machine.goal()
    }

    /// Goal generation, for discarding actions computed against an older goal.
    pub fn goal_epoch(&self) -> u64 {
        self.mode.lock().goal_epoch
    }

    /// Externally visible mode. No goal yet reads as `STOPPED`.
    pub fn mode(&self) -> Mode {
        self.mode.lock().machine.effective_mode()
    }

    pub fn obstacle_sequence(&self) -> u64 {
        self.obstacles.read().sequence
    }

    pub fn obstacles(&self) -> ObstacleFrame {
        self.obstacles.read().clone()
    }

    pub fn feasibility(&self) -> Option<Arc<FeasibilityProfile>> {
        self.feasibility.read().clone()
    }

    pub fn desired_action(&self) -> Option<DesiredAction> {
        *self.desired.read()
    }

    pub fn last_command(&self) -> VelocityCommand {
        *self.last_command.read()
    }

    // Loop outputs

    /// Publish a shaped action and its proximity flag.
    ///
    /// Returns false, leaving state untouched, when a goal update arrived
    /// after `goal_epoch` was read.
    pub fn publish_action(&self, action: DesiredAction, stop_requested: bool, goal_epoch: u64) -> bool {
        let mut mode = self.mode.lock();
        if mode.goal_epoch != goal_epoch {
            return false;
        }
        *self.desired.write() = Some(action);
        mode.machine.on_stop_flag(stop_requested);
        self.actions_computed.fetch_add(1, Ordering::Relaxed);
        true
    }

    /// Advance the mode machine for one control tick.
    pub fn step_mode(&self, pose: &Pose2D) -> ModeCommand {
        self.mode.lock().machine.step(pose)
    }

    pub fn set_last_command(&self, command: VelocityCommand) {
        *self.last_command.write() = command;
    }

    // Lifecycle and counters

    /// Signal shutdown.
    pub fn signal_shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
    }

    /// Check if shutdown is signaled.
    pub fn should_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    pub fn poses_received(&self) -> u64 {
        self.poses_received.load(Ordering::Relaxed)
    }

    pub fn actions_computed(&self) -> u64 {
        self.actions_computed.load(Ordering::Relaxed)
    }

    pub fn record_policy_failure(&self) {
        self.policy_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn policy_failures(&self) -> u64 {
        self.policy_failures.load(Ordering::Relaxed)
    }
}
