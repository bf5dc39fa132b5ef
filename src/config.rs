//! Configuration loading for GatiNav
//!
//! Every field has a default so a partial TOML file is enough:
//!
//! ```toml
//! [robot]
//! preferred_speed = 0.8
//!
//! [rates]
//! policy_hz = 5.0
//! ```

use crate::error::{GatiError, Result};
use crate::policy::ActionTable;
use serde::Deserialize;
use std::f64::consts::PI;
use std::path::Path;

/// Main configuration structure
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct GatiConfig {
    pub robot: RobotConfig,
    pub tracker: TrackerConfig,
    pub feasibility: FeasibilityConfig,
    pub shaper: ShaperConfig,
    pub policy: PolicyConfig,
    pub rates: RatesConfig,
    pub sim: SimConfig,
}

/// Robot physical and control parameters
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct RobotConfig {
    /// Nominal cruising speed, upper bound on commanded speed (m/s)
    pub preferred_speed: f64,

    /// Robot footprint radius (m)
    pub radius: f64,

    /// Goal applied at startup, if any
    pub default_goal: Option<[f64; 2]>,

    /// Proportional gain of the heading servo
    pub heading_gain: f64,

    /// Fixed yaw rate while spinning to face a new goal (rad/s)
    pub spin_rate: f64,

    /// Bearing error below which spinning ends (rad)
    pub spin_tolerance: f64,
}

impl Default for RobotConfig {
    fn default() -> Self {
        Self {
            preferred_speed: 1.0,
            radius: 0.5,
            default_goal: Some([5.0, 0.0]),
            heading_gain: 2.0,
            spin_rate: 1.0,
            spin_tolerance: 0.5,
        }
    }
}

/// Obstacle tracking parameters
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Feed the tracker from clustered obstacles (true) or pedestrian tracks (false)
    pub use_clusters: bool,

    /// Drop observations behind the robot
    pub cone_filter: bool,

    /// Half-angle of the forward cone (rad)
    pub cone_half_angle: f64,

    /// Radius used when no extents are available (m)
    pub default_radius: f64,

    /// Multiplier applied to the measured cluster extent
    pub inflation_factor: f64,

    /// Weight of the new velocity observation in exponential smoothing
    pub smoothing_alpha: f64,

    /// Maximum position delta for a smoothing match (m)
    pub match_distance: f64,

    /// Maximum heading delta for a smoothing match (rad)
    pub match_heading: f64,

    /// Speeds below this snap to zero (m/s)
    pub min_speed: f64,

    /// Offset applied to both axes to synthesize an agent goal (m)
    pub goal_offset: f64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            use_clusters: true,
            cone_filter: true,
            cone_half_angle: 5.0 / 6.0 * PI,
            default_radius: 0.3,
            inflation_factor: 1.5,
            smoothing_alpha: 0.2,
            match_distance: 0.5,
            match_heading: PI / 4.0,
            min_speed: 0.2,
            goal_offset: 5.0,
        }
    }
}

/// Feasibility profile parameters
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct FeasibilityConfig {
    /// Subtracted from every raw range (m)
    pub safety_margin: f64,

    /// Clearances below this are treated as blocked (m)
    pub small_gap_threshold: f64,
}

impl Default for FeasibilityConfig {
    fn default() -> Self {
        Self {
            safety_margin: 0.3,
            small_gap_threshold: 0.5,
        }
    }
}

/// Action shaping parameters
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ShaperConfig {
    /// Fixed base leg of the velocity envelope (m)
    pub base_leg: f64,

    /// Heading errors below this skip the feasibility clamp (rad)
    pub small_turn_threshold: f64,

    /// Distance at which goal-proximity blending starts (m)
    pub near_goal_radius: f64,

    /// Distance at which the robot stops (m)
    pub stop_radius: f64,

    /// Speed gain while approaching the goal
    pub kp_v: f64,

    /// Turn gain while approaching the goal
    pub kp_r: f64,

    /// Distance subtracted before applying the approach gains (m)
    pub approach_offset: f64,
}

impl Default for ShaperConfig {
    fn default() -> Self {
        Self {
            base_leg: 0.3,
            small_turn_threshold: PI / 18.0,
            near_goal_radius: 2.0,
            stop_radius: 0.3,
            kp_v: 0.5,
            kp_r: 1.0,
            approach_offset: 0.1,
        }
    }
}

/// Policy oracle parameters
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Number of agents the oracle observes, robot included
    pub neighbor_capacity: usize,

    /// Discrete action set shared with the oracle
    pub actions: ActionTable,

    /// Parameters of the built-in heuristic oracle
    pub heuristic: HeuristicConfig,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            neighbor_capacity: 10,
            actions: ActionTable::default(),
            heuristic: HeuristicConfig::default(),
        }
    }
}

/// Heuristic oracle parameters
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct HeuristicConfig {
    /// Look-ahead time used to score actions (s)
    pub horizon_secs: f64,

    /// Softmax temperature
    pub temperature: f64,

    /// Score penalty for a predicted overlap with a neighbor
    pub collision_penalty: f64,

    /// Extra separation required beyond the combined radius (m)
    pub separation_margin: f64,
}

impl Default for HeuristicConfig {
    fn default() -> Self {
        Self {
            horizon_secs: 1.0,
            temperature: 0.1,
            collision_penalty: 10.0,
            separation_margin: 0.1,
        }
    }
}

/// Loop rates
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct RatesConfig {
    /// Policy loop rate (Hz)
    pub policy_hz: f64,

    /// Control loop rate (Hz)
    pub control_hz: f64,

    /// Interval between status log lines (s)
    pub status_interval_secs: f64,
}

impl Default for RatesConfig {
    fn default() -> Self {
        Self {
            policy_hz: 10.0,
            control_hz: 100.0,
            status_interval_secs: 3.0,
        }
    }
}

/// Simulated world used by the demo binary
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Maximum run time (s)
    pub duration_secs: f64,

    /// World integration rate (Hz)
    pub step_hz: f64,

    /// Random seed for pedestrian placement and perception noise
    pub seed: u64,

    /// Number of simulated pedestrians
    pub pedestrians: usize,

    /// Pedestrian walking speed (m/s)
    pub pedestrian_speed: f64,

    /// Half side length of the square arena (m)
    pub arena_half_size: f64,

    /// Number of rays in the synthetic feasibility scan
    pub scan_rays: usize,

    /// Maximum range of the synthetic scan (m)
    pub scan_range: f64,

    /// Standard deviation-like amplitude of velocity noise (m/s)
    pub perception_noise: f64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            duration_secs: 60.0,
            step_hz: 50.0,
            seed: 7,
            pedestrians: 4,
            pedestrian_speed: 0.6,
            arena_half_size: 8.0,
            scan_rays: 72,
            scan_range: 5.0,
            perception_noise: 0.05,
        }
    }
}

impl GatiConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| GatiError::Config(format!("Failed to read config file: {}", e)))?;
        let config: GatiConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the control loops cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.robot.preferred_speed <= 0.0 {
            return Err(GatiError::Config(
                "robot.preferred_speed must be positive".into(),
            ));
        }
        if self.robot.radius < 0.0 || self.tracker.default_radius < 0.0 {
            return Err(GatiError::Config("radii must be non-negative".into()));
        }
        for (name, rate) in [
            ("rates.policy_hz", self.rates.policy_hz),
            ("rates.control_hz", self.rates.control_hz),
            ("sim.step_hz", self.sim.step_hz),
        ] {
            if !rate.is_finite() || rate <= 0.0 {
                return Err(GatiError::Config(format!(
                    "{} must be finite and positive, got {}",
                    name, rate
                )));
            }
        }
        if !self.rates.status_interval_secs.is_finite() || self.rates.status_interval_secs < 0.0 {
            return Err(GatiError::Config(format!(
                "rates.status_interval_secs must be finite and non-negative, got {}",
                self.rates.status_interval_secs
            )));
        }
        if self.sim.duration_secs.is_nan() || self.sim.duration_secs < 0.0 {
            return Err(GatiError::Config(
                "sim.duration_secs must be non-negative".into(),
            ));
        }
        if self.policy.neighbor_capacity < 2 {
            return Err(GatiError::Config(format!(
                "policy.neighbor_capacity must be at least 2, got {}",
                self.policy.neighbor_capacity
            )));
        }
        if !(0.0..=1.0).contains(&self.tracker.smoothing_alpha) {
            return Err(GatiError::Config(
                "tracker.smoothing_alpha must be within [0, 1]".into(),
            ));
        }
        self.policy.actions.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = GatiConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.policy.neighbor_capacity, 10);
        assert_eq!(config.policy.actions.len(), 11);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[robot]\npreferred_speed = 0.8\n\n[rates]\npolicy_hz = 5.0").unwrap();

        let config = GatiConfig::load(file.path()).unwrap();
        assert_eq!(config.robot.preferred_speed, 0.8);
        assert_eq!(config.rates.policy_hz, 5.0);
        assert_eq!(config.rates.control_hz, 100.0);
        assert_eq!(config.tracker.smoothing_alpha, 0.2);
    }

    #[test]
    fn test_custom_action_table() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"[policy.actions]
version = "forward-only"
entries = [
  {{ speed_fraction = 1.0, heading_offset = 0.0 }},
  {{ speed_fraction = 0.0, heading_offset = 0.0 }},
]"#
        )
        .unwrap();

        let config = GatiConfig::load(file.path()).unwrap();
        assert_eq!(config.policy.actions.version, "forward-only");
        assert_eq!(config.policy.actions.len(), 2);
    }

    #[test]
    fn test_invalid_capacity_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[policy]\nneighbor_capacity = 1").unwrap();

        let err = GatiConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, GatiError::Config(_)));
    }

    #[test]
    fn test_non_finite_rates_rejected() {
        let mut config = GatiConfig::default();
        config.rates.policy_hz = f64::NAN;
        assert!(matches!(config.validate(), Err(GatiError::Config(_))));

        let mut config = GatiConfig::default();
        config.rates.control_hz = f64::INFINITY;
        assert!(matches!(config.validate(), Err(GatiError::Config(_))));

        let mut config = GatiConfig::default();
        config.sim.step_hz = 0.0;
        assert!(matches!(config.validate(), Err(GatiError::Config(_))));

        let mut config = GatiConfig::default();
        config.sim.step_hz = f64::NAN;
        assert!(matches!(config.validate(), Err(GatiError::Config(_))));
    }

    #[test]
    fn test_status_interval_must_be_non_negative() {
        let mut config = GatiConfig::default();
        config.rates.status_interval_secs = -1.0;
        assert!(matches!(config.validate(), Err(GatiError::Config(_))));

        config.rates.status_interval_secs = f64::NAN;
        assert!(matches!(config.validate(), Err(GatiError::Config(_))));

        config.rates.status_interval_secs = 0.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_negative_sim_rate_in_file_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[sim]\nstep_hz = -50.0").unwrap();

        let err = GatiConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, GatiError::Config(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = GatiConfig::load(Path::new("/nonexistent/gati.toml")).unwrap_err();
        assert!(matches!(err, GatiError::Config(_)));
    }
}
