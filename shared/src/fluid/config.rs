//! Fluid simulation configuration.
//!
//! Loaded once at startup (RON) and static afterwards. The defaults are
//! a 128x128 grid of 100-unit cells stepped at 30 Hz.

use std::path::Path;

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use super::coords::{centered_origin, GridMapper};
use crate::constants::{
    CELL_WORLD_SIZE, DEFAULT_FLOW_RATE, DEFAULT_OSCILLATION_CLAMP, DEFAULT_STEP_INTERVAL,
    GRID_SIZE,
};
use crate::error::{load_ron_file, ConfigError};

/// Largest grid side accepted by [`FluidConfig::validate`].
pub const MAX_GRID_SIZE: usize = 2048;

#[derive(Resource, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FluidConfig {
    /// Cells per side.
    pub grid_size: usize,
    /// World units per cell edge.
    pub cell_size: f32,
    /// World-space corner of cell (0, 0) on the X/Z plane. `None` centers the
    /// grid on the world origin.
    pub origin: Option<Vec2>,
    /// Fraction of the surface difference moved per step, in (0, 1].
    pub flow_rate: f32,
    /// Cap on any single transfer as a fraction of the difference, in (0, 1].
    pub oscillation_clamp: f32,
    /// Seconds between flow steps.
    pub step_interval: f32,
    /// Emit the per-cell debug overlay.
    pub debug_overlay: bool,
}

impl Default for FluidConfig {
    fn default() -> Self {
        Self {
            grid_size: GRID_SIZE,
            cell_size: CELL_WORLD_SIZE,
            origin: None,
            flow_rate: DEFAULT_FLOW_RATE,
            oscillation_clamp: DEFAULT_OSCILLATION_CLAMP,
            step_interval: DEFAULT_STEP_INTERVAL,
            debug_overlay: false,
        }
    }
}

impl FluidConfig {
    /// Loads and validates a RON configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let config: Self = load_ron_file(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Parses and validates RON text.
    pub fn from_ron_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self =
            ron::de::from_str(text).map_err(|err| ConfigError::parse("<inline>", err))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.grid_size == 0 || self.grid_size > MAX_GRID_SIZE {
            return Err(ConfigError::Invalid(format!(
                "grid_size must be in 1..={MAX_GRID_SIZE}, got {}",
                self.grid_size
            )));
        }
        if !(self.cell_size.is_finite() && self.cell_size > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "cell_size must be positive, got {}",
                self.cell_size
            )));
        }
        if !unit_fraction(self.flow_rate) {
            return Err(ConfigError::Invalid(format!(
                "flow_rate must be in (0, 1], got {}",
                self.flow_rate
            )));
        }
        if !unit_fraction(self.oscillation_clamp) {
            return Err(ConfigError::Invalid(format!(
                "oscillation_clamp must be in (0, 1], got {}",
                self.oscillation_clamp
            )));
        }
        if !(self.step_interval.is_finite() && self.step_interval > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "step_interval must be positive, got {}",
                self.step_interval
            )));
        }
        if let Some(origin) = self.origin {
            if !origin.is_finite() {
                return Err(ConfigError::Invalid("origin must be finite".to_string()));
            }
        }
        Ok(())
    }

    /// Resolved world-space origin of the grid.
    pub fn resolved_origin(&self) -> Vec2 {
        self.origin
            .unwrap_or_else(|| centered_origin(self.grid_size, self.cell_size))
    }

    pub fn mapper(&self) -> GridMapper {
        GridMapper::new(self.grid_size, self.cell_size, self.resolved_origin())
    }
}

fn unit_fraction(value: f32) -> bool {
    value > 0.0 && value <= 1.0
}
