//! Simulated world: unicycle robot, wandering pedestrians, synthetic sensing.

use rand::prelude::*;
use std::f64::consts::PI;

use crate::config::SimConfig;
use crate::core::math::quaternion_from_yaw;
use crate::core::{Point2D, Pose2D, Velocity2D, VelocityCommand};
use crate::error::Result;
use crate::messages::{
    FeasibilityUpdate, ObstacleCluster, ObstacleClusterUpdate, PoseUpdate, VelocityUpdate,
};
use crate::shared::RobotStateSnapshot;

/// Pedestrians are never spawned closer than this to the robot (m).
const SPAWN_CLEARANCE: f64 = 1.5;
const PEDESTRIAN_RADIUS: f64 = 0.3;

/// A constant-velocity pedestrian bouncing inside the arena.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pedestrian {
    pub id: i32,
    pub position: Point2D,
    pub velocity: Velocity2D,
    pub radius: f64,
}

/// Closed-loop test world for the controller.
pub struct SimWorld {
    config: SimConfig,
    robot_radius: f64,
    robot: Pose2D,
    command: VelocityCommand,
    pedestrians: Vec<Pedestrian>,
    rng: StdRng,
    time_us: u64,
}

impl SimWorld {
    pub fn new(config: &SimConfig, robot_radius: f64, start: Pose2D) -> Self {
        let mut rng = StdRng::seed_from_u64(config.seed);
        let half = (config.arena_half_size - PEDESTRIAN_RADIUS).max(0.0);

        let mut pedestrians = Vec::with_capacity(config.pedestrians);
        let mut attempts = 0;
        while pedestrians.len() < config.pedestrians && attempts < 1000 {
            attempts += 1;
            let position = Point2D::new(rng.gen_range(-half..=half), rng.gen_range(-half..=half));
            if position.distance(&start.position()) < SPAWN_CLEARANCE {
                continue;
            }
            let heading = rng.gen_range(-PI..PI);
            pedestrians.push(Pedestrian {
                id: pedestrians.len() as i32,
                position,
                velocity: Velocity2D::new(
                    config.pedestrian_speed * heading.cos(),
                    config.pedestrian_speed * heading.sin(),
                ),
                radius: PEDESTRIAN_RADIUS,
            });
        }

        Self {
            config: config.clone(),
            robot_radius,
            robot: start,
            command: VelocityCommand::stop(),
            pedestrians,
            rng,
            time_us: 0,
        }
    }

    pub fn robot_pose(&self) -> Pose2D {
        self.robot
    }

    pub fn pedestrians(&self) -> &[Pedestrian] {
        &self.pedestrians
    }

    pub fn time_secs(&self) -> f64 {
        self.time_us as f64 * 1e-6
    }

    /// Command held until the next call.
    pub fn apply_command(&mut self, command: VelocityCommand) {
        self.command = command;
    }

    /// World-frame robot velocity under the current command.
    pub fn robot_velocity(&self) -> Velocity2D {
        let (sin_t, cos_t) = self.robot.theta.sin_cos();
        Velocity2D::new(
            self.command.linear_speed * cos_t,
            self.command.linear_speed * sin_t,
        )
    }

    /// Advance the world by `dt` seconds.
    pub fn step(&mut self, dt: f64) {
        let v = self.robot_velocity();
        self.robot = Pose2D::new(
            self.robot.x + v.vx * dt,
            self.robot.y + v.vy * dt,
            self.robot.theta + self.command.angular_rate * dt,
        );

        let half = self.config.arena_half_size;
        for ped in &mut self.pedestrians {
            ped.position.x += ped.velocity.vx * dt;
            ped.position.y += ped.velocity.vy * dt;
            if ped.position.x.abs() > half - ped.radius {
                ped.velocity.vx = -ped.velocity.vx;
                ped.position.x = ped.position.x.clamp(-half + ped.radius, half - ped.radius);
            }
            if ped.position.y.abs() > half - ped.radius {
                ped.velocity.vy = -ped.velocity.vy;
                ped.position.y = ped.position.y.clamp(-half + ped.radius, half - ped.radius);
            }
        }

        self.time_us += (dt * 1e6).round() as u64;
    }

    /// Smallest gap between the robot and any pedestrian (m).
    pub fn min_separation(&self) -> f64 {
        let robot = self.robot.position();
        self.pedestrians
            .iter()
            .map(|p| p.position.distance(&robot) - p.radius - self.robot_radius)
            .fold(f64::INFINITY, f64::min)
    }

    pub fn pose_update(&self) -> Result<PoseUpdate> {
        PoseUpdate::new(
            (self.robot.x, self.robot.y),
            quaternion_from_yaw(self.robot.theta),
            self.time_us,
        )
    }

    pub fn velocity_update(&self) -> VelocityUpdate {
        let v = self.robot_velocity();
        VelocityUpdate { x: v.vx, y: v.vy }
    }

    /// Pedestrians as perception clusters, with velocity noise.
    pub fn cluster_update(&mut self) -> ObstacleClusterUpdate {
        let noise = self.config.perception_noise.abs();
        let clusters = self
            .pedestrians
            .iter()
            .map(|p| {
                let (nx, ny) = if noise > 0.0 {
                    (
                        self.rng.gen_range(-noise..=noise),
                        self.rng.gen_range(-noise..=noise),
                    )
                } else {
                    (0.0, 0.0)
                };
                ObstacleCluster {
                    label: p.id,
                    mean: (p.position.x, p.position.y),
                    min: (p.position.x - p.radius, p.position.y - p.radius),
                    max: (p.position.x + p.radius, p.position.y + p.radius),
                    velocity: (p.velocity.vx + nx, p.velocity.vy + ny),
                }
            })
            .collect();
        ObstacleClusterUpdate { clusters }
    }

    /// Ray-cast ranging around the robot, world-frame angles.
    pub fn feasibility_update(&self) -> Result<FeasibilityUpdate> {
        let rays = self.config.scan_rays.max(2);
        let origin = self.robot.position();
        let mut angles = Vec::with_capacity(rays);
        let mut ranges = Vec::with_capacity(rays);
        for i in 0..rays {
            let angle = -PI + (i as f64 + 0.5) * 2.0 * PI / rays as f64;
            angles.push(angle);
            ranges.push(self.cast(origin, angle));
        }
        FeasibilityUpdate::new(angles, ranges.clone(), ranges)
    }

    /// Publish every sensor stream into the snapshot.
    pub fn publish(&mut self, snapshot: &RobotStateSnapshot) -> Result<()> {
        snapshot.set_pose(&self.pose_update()?);
        snapshot.set_velocity(&self.velocity_update());
        let clusters = self.cluster_update();
        snapshot.set_clusters(&clusters);
        snapshot.set_feasibility(&self.feasibility_update()?);
        Ok(())
    }

    fn cast(&self, origin: Point2D, angle: f64) -> f64 {
        let (dy, dx) = angle.sin_cos();
        let mut range = self.config.scan_range;

        let half = self.config.arena_half_size;
        if dx > 0.0 {
            range = range.min((half - origin.x) / dx);
        } else if dx < 0.0 {
            range = range.min((-half - origin.x) / dx);
        }
        if dy > 0.0 {
            range = range.min((half - origin.y) / dy);
        } else if dy < 0.0 {
            range = range.min((-half - origin.y) / dy);
        }

        for ped in &self.pedestrians {
            let fx = origin.x - ped.position.x;
            let fy = origin.y - ped.position.y;
            let b = fx * dx + fy * dy;
            let c = fx * fx + fy * fy - ped.radius * ped.radius;
            if c <= 0.0 {
                return 0.0;
            }
            let disc = b * b - c;
            if disc < 0.0 {
                continue;
            }
            let t = -b - disc.sqrt();
            if t >= 0.0 {
                range = range.min(t);
            }
        }

        range.max(0.0)
    }
}
