//! Deterministic stand-in oracle.
//!
//! Scores every table entry by goal progress over a short horizon, minus a
//! penalty for predicted overlap with any neighbor, then applies a softmax.
//! Reads only the observation, so it is interchangeable with a trained
//! network behind [`Policy`].

use crate::config::HeuristicConfig;
use crate::error::{GatiError, Result};

use super::actions::ActionTable;
use super::adapter::{ObservationLayout, Policy};

/// Sub-steps checked along the horizon for collisions.
const HORIZON_STEPS: usize = 4;

pub struct HeuristicPolicy {
    config: HeuristicConfig,
    actions: ActionTable,
    layout: ObservationLayout,
}

impl HeuristicPolicy {
    pub fn new(config: HeuristicConfig, actions: ActionTable, layout: ObservationLayout) -> Self {
        Self {
            config,
            actions,
            layout,
        }
    }

    fn score(&self, obs: &[f32], speed_fraction: f64, heading_offset: f64) -> f64 {
        let dist_to_goal = obs[1] as f64;
        let heading = obs[2] as f64 + heading_offset;
        let speed = obs[3] as f64 * speed_fraction;
        let neighbors = (obs[0] as usize).min(self.layout.neighbor_slots());

        let (sin_h, cos_h) = heading.sin_cos();
        let horizon = self.config.horizon_secs;

        // Goal sits at (d, 0) in the ego frame
        let end_x = speed * horizon * cos_h;
        let end_y = speed * horizon * sin_h;
        let progress = dist_to_goal - (dist_to_goal - end_x).hypot(end_y);

        let mut penalty = 0.0;
        for slot in 0..neighbors {
            let base = self.layout.neighbor_offset(slot);
            let (px, py) = (obs[base] as f64, obs[base + 1] as f64);
            let (vx, vy) = (obs[base + 2] as f64, obs[base + 3] as f64);
            let combined = obs[base + 5] as f64;

            let mut worst = f64::INFINITY;
            for step in 1..=HORIZON_STEPS {
                let t = horizon * step as f64 / HORIZON_STEPS as f64;
                let rx = px + vx * t - speed * t * cos_h;
                let ry = py + vy * t - speed * t * sin_h;
                worst = worst.min(rx.hypot(ry) - combined);
            }
            if worst < self.config.separation_margin {
                penalty +=
                    self.config.collision_penalty * (1.0 + self.config.separation_margin - worst);
            }
        }

        progress - penalty
    }
}

impl Policy for HeuristicPolicy {
    fn predict(&mut self, observation: &[f32]) -> Result<Vec<f32>> {
        if observation.len() != self.layout.width() {
            return Err(GatiError::Policy(format!(
                "observation has {} features, expected {}",
                observation.len(),
                self.layout.width()
            )));
        }

        let scores: Vec<f64> = self
            .actions
            .entries
            .iter()
            .map(|a| self.score(observation, a.speed_fraction, a.heading_offset))
            .collect();

        let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let temperature = self.config.temperature.max(1e-6);
        let weights: Vec<f64> = scores
            .iter()
            .map(|s| ((s - max) / temperature).exp())
            .collect();
        let total: f64 = weights.iter().sum();

        Ok(weights.iter().map(|w| (w / total) as f32).collect())
    }
}
