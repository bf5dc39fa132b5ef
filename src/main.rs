//! GatiNav demo runner
//!
//! Runs the controller against the built-in simulated world:
//!
//! - **Control Thread** (100Hz): mode machine and heading servo
//! - **Policy Thread** (10Hz): obstacle tracking, oracle query, action shaping
//! - **Main Thread**: simulated robot, pedestrians and sensing

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;
use tracing::{info, warn};

use gati_nav::policy::{HeuristicPolicy, ObservationLayout};
use gati_nav::sim::{self, SimWorld};
use gati_nav::{ChannelSink, GatiConfig, GatiError, Pose2D, Result, RobotStateSnapshot, spawn_threads};

#[derive(Parser, Debug)]
#[command(name = "gati-nav")]
#[command(about = "Reactive crowd-navigation controller, simulated run")]
struct Args {
    /// TOML configuration file (defaults to gati.toml if present)
    config: Option<PathBuf>,

    /// Goal as X,Y in meters
    #[arg(short, long, value_parser = parse_goal, allow_hyphen_values = true)]
    goal: Option<[f64; 2]>,

    /// Maximum run time in seconds
    #[arg(short, long)]
    duration: Option<f64>,

    /// Number of simulated pedestrians
    #[arg(short, long)]
    pedestrians: Option<usize>,

    /// Random seed for the simulated world
    #[arg(long)]
    seed: Option<u64>,
}

fn parse_goal(s: &str) -> std::result::Result<[f64; 2], String> {
    let (x, y) = s
        .split_once(',')
        .ok_or_else(|| format!("expected X,Y, got '{}'", s))?;
    let x = x.trim().parse::<f64>().map_err(|e| e.to_string())?;
    let y = y.trim().parse::<f64>().map_err(|e| e.to_string())?;
    Ok([x, y])
}

fn main() -> Result<()> {
    // Initialize logging
    let directive = "gati_nav=info"
        .parse()
        .map_err(|e| GatiError::Config(format!("Invalid log directive: {}", e)))?;
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(directive))
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            GatiConfig::load(path)?
        }
        None if Path::new("gati.toml").exists() => {
            info!("Loading configuration from gati.toml");
            GatiConfig::load(Path::new("gati.toml"))?
        }
        None => {
            info!("Using default configuration");
            GatiConfig::default()
        }
    };

    if let Some(goal) = args.goal {
        config.robot.default_goal = Some(goal);
    }
    if let Some(duration) = args.duration {
        config.sim.duration_secs = duration;
    }
    if let Some(pedestrians) = args.pedestrians {
        config.sim.pedestrians = pedestrians;
    }
    if let Some(seed) = args.seed {
        config.sim.seed = seed;
    }
    config.validate()?;

    info!("GatiNav v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "Robot: preferred speed {:.2} m/s, radius {:.2} m, oracle capacity {} agents",
        config.robot.preferred_speed, config.robot.radius, config.policy.neighbor_capacity
    );
    match config.robot.default_goal {
        Some([x, y]) => info!("Goal: ({:.2}, {:.2})", x, y),
        None => warn!("No goal configured, robot will hold still"),
    }

    let snapshot = Arc::new(RobotStateSnapshot::new(&config));
    let mut world = SimWorld::new(&config.sim, config.robot.radius, Pose2D::default());
    // Sensing must be in place before the loops start
    world.publish(&snapshot)?;

    let policy = HeuristicPolicy::new(
        config.policy.heuristic.clone(),
        config.policy.actions.clone(),
        ObservationLayout::new(config.policy.neighbor_capacity),
    );
    let (command_tx, command_rx) = crossbeam_channel::unbounded();

    info!("Starting control loops...");
    let handles = spawn_threads(
        &config,
        Arc::clone(&snapshot),
        Box::new(policy),
        ChannelSink::new(command_tx),
    )?;

    let outcome = sim::run(&config, &mut world, &snapshot, &command_rx);

    // Signal shutdown to both loops, even if the simulation failed
    snapshot.signal_shutdown();
    info!("Waiting for threads to finish...");
    handles.join()?;

    // Drain the final commands; the last one must be a stop
    match command_rx.try_iter().last() {
        Some(last) if last.is_stop() => info!("Final command: stop"),
        Some(last) => warn!(
            "Final command was not a stop: ({:.2}, {:.2})",
            last.linear_speed, last.angular_rate
        ),
        None => {}
    }

    let report = outcome?;
    info!(
        "GatiNav finished: {} steps, reached_goal={}, min_separation={:.2} m",
        report.steps, report.reached_goal, report.min_separation
    );
    Ok(())
}
