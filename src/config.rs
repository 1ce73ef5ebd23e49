//! World configuration.
//!
//! Every field has a default, so a JSON file only needs the settings it
//! changes. Subsystem parameters live next to the code that consumes them
//! and are grouped here.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::biomes::BiomeParams;
use crate::chunk::RuntimeParams;
use crate::climate::ClimateParams;
use crate::coords::{TileCoord, WorldBounds};
use crate::hydrology::HydrologyParams;
use crate::noise_fields::NoiseParams;
use crate::rivers::RiverParams;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Largest accepted `chunk_size`. Keeps every local tile index below the
/// terminal-lake flag bit of `WaterBodyId`.
pub const MAX_CHUNK_SIZE: u32 = 4096;

/// Largest accepted river or connectivity horizon, in chunks.
pub const MAX_HORIZON: u32 = 64;

/// Largest accepted world extent on either axis, in chunks.
pub const MAX_WORLD_CHUNKS: u32 = 1 << 30;

/// Configuration parameters for world generation and streaming.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// World seed. Same seed and coordinate always give the same tile.
    pub seed: u64,

    /// Elevation below which a tile is water.
    pub sea_level: f32,

    /// Elevation above which land is always Mountain.
    pub mountain_threshold: f32,

    /// Tiles per chunk side.
    pub chunk_size: u32,

    /// Default keep radius in chunks (Chebyshev) around the active center.
    pub active_radius: u32,

    /// Minimum moisture for a tile to start a river.
    pub river_moisture_threshold: f32,

    /// Elevation subtracted at the world boundary, fading inward.
    pub edge_falloff_strength: f32,

    /// Tiles over which the edge falloff fades to zero.
    pub edge_falloff_width: u32,

    /// World extent in chunks. `None` means unbounded.
    pub bounds: Option<WorldBounds>,

    /// Tiles this close to the world boundary anchor oceans.
    pub edge_margin: u32,

    /// Extra ocean anchors (water components containing one are Ocean).
    pub ocean_seeds: Vec<TileCoord>,

    /// Tiles from y = 0 to a pole when the world is unbounded.
    pub pole_distance: u32,

    pub noise: NoiseParams,
    pub climate: ClimateParams,
    pub biome: BiomeParams,
    pub hydrology: HydrologyParams,
    pub rivers: RiverParams,
    pub runtime: RuntimeParams,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            sea_level: 0.0,
            mountain_threshold: 0.55,
            chunk_size: 64,
            active_radius: 2,
            river_moisture_threshold: 0.4,
            edge_falloff_strength: 0.6,
            edge_falloff_width: 48,
            bounds: Some(WorldBounds::new(32, 16)),
            edge_margin: 0,
            ocean_seeds: Vec::new(),
            pole_distance: 1024,
            noise: NoiseParams::default(),
            climate: ClimateParams::default(),
            biome: BiomeParams::default(),
            hydrology: HydrologyParams::default(),
            rivers: RiverParams::default(),
            runtime: RuntimeParams::default(),
        }
    }
}

impl WorldConfig {
    /// Default configuration with a different seed.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            seed,
            ..Self::default()
        }
    }

    /// Load from a JSON file, then validate.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let config: WorldConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_string(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check ranges the generators rely on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn invalid(msg: impl Into<String>) -> Result<(), ConfigError> {
            Err(ConfigError::Invalid(msg.into()))
        }

        if !(2..=MAX_CHUNK_SIZE).contains(&self.chunk_size) {
            return invalid(format!("chunk_size must be within [2, {MAX_CHUNK_SIZE}]"));
        }
        if let Some(bounds) = self.bounds {
            if bounds.width_chunks == 0 || bounds.height_chunks == 0 {
                return invalid("bounds must be at least one chunk on each axis");
            }
            if bounds.width_chunks > MAX_WORLD_CHUNKS || bounds.height_chunks > MAX_WORLD_CHUNKS {
                return invalid(format!(
                    "bounds must not exceed {MAX_WORLD_CHUNKS} chunks per axis"
                ));
            }
        } else if self.pole_distance == 0 {
            return invalid("pole_distance must be positive for unbounded worlds");
        }
        if self.mountain_threshold <= self.sea_level {
            return invalid("mountain_threshold must be above sea_level");
        }
        if !(0.0..=1.0).contains(&self.river_moisture_threshold) {
            return invalid("river_moisture_threshold must be within [0, 1]");
        }
        if self.edge_falloff_strength < 0.0 {
            return invalid("edge_falloff_strength must not be negative");
        }
        if self.noise.octaves == 0 {
            return invalid("noise.octaves must be at least 1");
        }
        if self.climate.equator_temp <= self.climate.pole_temp {
            return invalid("climate.equator_temp must exceed climate.pole_temp");
        }
        if self.biome.habitability_exponent <= 0.0 {
            return invalid("biome.habitability_exponent must be positive");
        }
        if !(0.0..=1.0).contains(&self.biome.polar_anomaly_damping) {
            return invalid("biome.polar_anomaly_damping must be within [0, 1]");
        }
        if self.rivers.river_horizon > MAX_HORIZON || self.hydrology.connectivity_horizon > MAX_HORIZON {
            return invalid(format!("horizons must not exceed {MAX_HORIZON} chunks"));
        }
        if self.hydrology.probe_tile_budget == 0 {
            return invalid("hydrology.probe_tile_budget must be positive");
        }
        if self.runtime.patch_cache_capacity == 0 || self.runtime.river_cache_capacity == 0 {
            return invalid("runtime cache capacities must be positive");
        }
        Ok(())
    }
}
