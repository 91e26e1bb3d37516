//! Engine-wide tuning knobs.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::plane::MAX_PLANES;
use crate::{Error, Result};

// ============================================================================
// EngineConfig
// ============================================================================

/// Tuning shared by every world built from it.
///
/// Missing fields in JSON fall back to the defaults below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub ticks_per_second: u32,
    /// Gravity when the terrain does not override it (m/s²).
    pub gravity: f64,
    /// Blood a heart pushes into each neighbour per tick.
    pub heart_increment: f64,
    /// Energy a core generates per tick.
    pub energy_generation: f64,
    /// Whether nerve signal fades from parts the brain no longer reaches.
    /// Signal is a presence flag, so any positive value clears it in one
    /// tick and `0.0` latches the last signal.
    pub signal_decay: f64,
    /// Planes a universe may register (at most 15).
    pub max_planes: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ticks_per_second: 20,
            gravity: 9.81,
            heart_increment: 0.05,
            energy_generation: 0.1,
            signal_decay: 1.0,
            max_planes: MAX_PLANES,
        }
    }
}

impl EngineConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_planes > MAX_PLANES {
            return Err(Error::PlaneLimit { max: MAX_PLANES });
        }
        if self.signal_decay < 0.0 {
            return Err(Error::ConstraintViolation("signal_decay must not be negative".into()));
        }
        if self.ticks_per_second == 0 {
            return Err(Error::ConstraintViolation("ticks_per_second must be positive".into()));
        }
        Ok(())
    }
}
