//! Perception layer: neighbor agents from clustered obstacle estimates.

mod tracker;

pub use tracker::{ObstacleAgent, ObstacleTracker, RawObservation};
