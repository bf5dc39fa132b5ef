//! Discrete action set shared with the policy oracle.

use serde::Deserialize;
use std::f64::consts::PI;

use crate::error::{GatiError, Result};

/// One selectable action, relative to the robot.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct DiscreteAction {
    /// Fraction of preferred speed, in [0, 1]
    pub speed_fraction: f64,
    /// Heading change relative to the current heading (rad)
    pub heading_offset: f64,
}

impl DiscreteAction {
    pub const fn new(speed_fraction: f64, heading_offset: f64) -> Self {
        Self {
            speed_fraction,
            heading_offset,
        }
    }
}

/// Versioned lookup table indexed by the oracle's output.
///
/// The oracle and the adapter must agree on both order and length,
/// so the table is loaded once at startup and never edited.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ActionTable {
    /// Identifier of the training-time action set
    pub version: String,
    pub entries: Vec<DiscreteAction>,
}

impl ActionTable {
    pub const DEFAULT_VERSION: &'static str = "ga3c-cadrl-11";

    pub fn new(version: impl Into<String>, entries: Vec<DiscreteAction>) -> Result<Self> {
        let table = Self {
            version: version.into(),
            entries,
        };
        table.validate()?;
        Ok(table)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&DiscreteAction> {
        self.entries.get(index)
    }

    pub fn validate(&self) -> Result<()> {
        if self.entries.is_empty() {
            return Err(GatiError::Config(format!(
                "action table '{}' is empty",
                self.version
            )));
        }
        for (i, action) in self.entries.iter().enumerate() {
            if !(0.0..=1.0).contains(&action.speed_fraction) {
                return Err(GatiError::Config(format!(
                    "action {} of '{}': speed_fraction {} outside [0, 1]",
                    i, self.version, action.speed_fraction
                )));
            }
            if !action.heading_offset.is_finite()
                || action.heading_offset <= -PI
                || action.heading_offset > PI
            {
                return Err(GatiError::Config(format!(
                    "action {} of '{}': heading_offset {} outside (-π, π]",
                    i, self.version, action.heading_offset
                )));
            }
        }
        Ok(())
    }
}

impl Default for ActionTable {
    /// Eleven actions: five headings at full speed, three at half speed,
    /// three turning in place.
    fn default() -> Self {
        let turn = PI / 6.0;
        let fine = PI / 12.0;
        Self {
            version: Self::DEFAULT_VERSION.to_string(),
            entries: vec![
                DiscreteAction::new(1.0, -turn),
                DiscreteAction::new(1.0, -fine),
                DiscreteAction::new(1.0, 0.0),
                DiscreteAction::new(1.0, fine),
                DiscreteAction::new(1.0, turn),
                DiscreteAction::new(0.5, -turn),
                DiscreteAction::new(0.5, 0.0),
                DiscreteAction::new(0.5, turn),
                DiscreteAction::new(0.0, -turn),
                DiscreteAction::new(0.0, 0.0),
                DiscreteAction::new(0.0, turn),
            ],
        }
    }
}
