//! Simulation configuration
//!
//! Loaded from JSON; every field falls back to its default when omitted.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{SimError, SimResult};

/// Simulation tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Seed for the simulation RNG
    pub seed: u64,

    // === World ===
    /// World extent along x
    pub world_width: f32,
    /// World extent along y
    pub world_height: f32,
    /// Vehicles are kept this far inside the world edges
    pub boundary_margin: f32,

    // === Cadence ===
    /// Seconds between AI decisions (per vehicle)
    pub ai_decision_interval: f32,
    /// Seconds between collision passes
    pub collision_check_interval: f32,

    // === AI behavior ===
    /// Chance that a decision is a parking attempt
    pub parking_attempt_rate: f32,
    /// Length of lane behind a space's run-up within which a lined-up AI
    /// vehicle starts its maneuver
    pub parking_range: f32,
    /// Chance that a wander decision changes steering
    pub wander_steer_chance: f32,
    /// Chance that a wander decision changes throttle
    pub wander_throttle_chance: f32,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 0,

            world_width: 1000.0,
            world_height: 800.0,
            boundary_margin: 5.0,

            ai_decision_interval: 1.5,
            collision_check_interval: 0.1,

            parking_attempt_rate: 0.3,
            parking_range: 15.0,
            wander_steer_chance: 0.2,
            wander_throttle_chance: 0.3,
        }
    }
}

impl SimConfig {
    /// Parse and validate a JSON document
    pub fn from_json(json: &str) -> SimResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and validate a JSON config file
    pub fn load(path: impl AsRef<Path>) -> SimResult<Self> {
        let json = std::fs::read_to_string(path.as_ref())?;
        let config = Self::from_json(&json)?;
        log::info!("Loaded config from {}", path.as_ref().display());
        Ok(config)
    }

    /// Reject values the simulation cannot run with
    pub fn validate(&self) -> SimResult<()> {
        let finite = [
            self.world_width,
            self.world_height,
            self.boundary_margin,
            self.ai_decision_interval,
            self.collision_check_interval,
            self.parking_range,
        ];
        if finite.iter().any(|v| !v.is_finite()) {
            return Err(SimError::NonFinite("config value"));
        }
        if self.boundary_margin < 0.0
            || self.world_width <= 2.0 * self.boundary_margin
            || self.world_height <= 2.0 * self.boundary_margin
        {
            return Err(SimError::Config(format!(
                "world {}x{} too small for margin {}",
                self.world_width, self.world_height, self.boundary_margin
            )));
        }
        if self.ai_decision_interval <= 0.0 || self.collision_check_interval <= 0.0 {
            return Err(SimError::Config("intervals must be positive".into()));
        }
        if self.parking_range < 0.0 {
            return Err(SimError::Config("parking range must not be negative".into()));
        }
        for (name, p) in [
            ("parking_attempt_rate", self.parking_attempt_rate),
            ("wander_steer_chance", self.wander_steer_chance),
            ("wander_throttle_chance", self.wander_throttle_chance),
        ] {
            if !(0.0..=1.0).contains(&p) {
                return Err(SimError::Config(format!("{name} must be in [0, 1], got {p}")));
            }
        }
        Ok(())
    }
}
