//! Closed-loop simulation harness.
//!
//! Plays the part of the robot's transport layer: publishes synthetic
//! sensing into the snapshot and integrates the commands the control
//! thread emits.

mod world;

pub use world::{Pedestrian, SimWorld};

use std::time::Instant;

use crossbeam_channel::Receiver;

use crate::config::GatiConfig;
use crate::core::{Mode, Pose2D, VelocityCommand};
use crate::error::Result;
use crate::shared::RobotStateSnapshot;
use crate::threads::Ticker;

/// Summary of a simulated run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimReport {
    pub steps: u64,
    pub sim_secs: f64,
    pub final_pose: Pose2D,
    pub reached_goal: bool,
    /// Closest robot-pedestrian gap seen during the run (m)
    pub min_separation: f64,
}

/// Drive `world` in real time until the goal is reached, the configured
/// duration elapses or shutdown is signalled.
pub fn run(
    config: &GatiConfig,
    world: &mut SimWorld,
    snapshot: &RobotStateSnapshot,
    commands: &Receiver<VelocityCommand>,
) -> Result<SimReport> {
    let dt = 1.0 / config.sim.step_hz;
    let mut ticker = Ticker::new(config.sim.step_hz);
    let started = Instant::now();
    let mut steps = 0u64;
    let mut min_separation = f64::INFINITY;

    tracing::info!(
        "Simulation started: {} pedestrians, arena ±{:.1} m, {:.0} Hz",
        world.pedestrians().len(),
        config.sim.arena_half_size,
        config.sim.step_hz
    );

    let reached_goal = loop {
        if let Some(command) = commands.try_iter().last() {
            world.apply_command(command);
        }
        world.step(dt);
        world.publish(snapshot)?;
        steps += 1;
        min_separation = min_separation.min(world.min_separation());

        if snapshot.mode() == Mode::Stopped && snapshot.goal().is_some() {
            break true;
        }
        if snapshot.should_shutdown() || started.elapsed().as_secs_f64() >= config.sim.duration_secs {
            break false;
        }
        ticker.wait();
    };

    let report = SimReport {
        steps,
        sim_secs: world.time_secs(),
        final_pose: world.robot_pose(),
        reached_goal,
        min_separation,
    };
    tracing::info!(
        "Simulation finished after {:.1} s: pose=({:.2}, {:.2}), reached_goal={}, min_separation={:.2} m",
        report.sim_secs,
        report.final_pose.x,
        report.final_pose.y,
        report.reached_goal,
        report.min_separation
    );
    Ok(report)
}
