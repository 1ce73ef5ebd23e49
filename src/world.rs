//! Generation context
//!
//! Bundles the immutable inputs every generation stage needs: the validated
//! configuration, the derived seeds, the noise fields and the biome
//! classifier. Built once per world and shared by `Arc`; there is no
//! process-wide seed.

use std::collections::HashSet;

use crate::biomes::BiomeClassifier;
use crate::config::{ConfigError, WorldConfig};
use crate::coords::{ChunkBounds, ChunkCoord, TileCoord};
use crate::error::WorldError;
use crate::noise_fields::NoiseFields;
use crate::seeds::WorldSeeds;

/// Everything needed to generate any tile of one world.
pub struct GenerationContext {
    config: WorldConfig,
    seeds: WorldSeeds,
    fields: NoiseFields,
    classifier: BiomeClassifier,
    ocean_seeds: HashSet<TileCoord>,
}

impl GenerationContext {
    /// Validate the configuration and derive seeds and noise generators.
    pub fn new(config: WorldConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let seeds = WorldSeeds::from_master(config.seed);
        let fields = NoiseFields::new(&seeds, &config.noise);
        let classifier = BiomeClassifier::new(&config);
        let ocean_seeds = config.ocean_seeds.iter().copied().collect();
        Ok(Self {
            config,
            seeds,
            fields,
            classifier,
            ocean_seeds,
        })
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    pub fn seeds(&self) -> &WorldSeeds {
        &self.seeds
    }

    pub fn fields(&self) -> &NoiseFields {
        &self.fields
    }

    pub fn classifier(&self) -> &BiomeClassifier {
        &self.classifier
    }

    pub fn chunk_size(&self) -> u32 {
        self.config.chunk_size
    }

    pub fn sea_level(&self) -> f32 {
        self.config.sea_level
    }

    /// Normalized latitude: 0 at the equator, 1 at a pole.
    ///
    /// Bounded worlds put the equator on the middle row. Unbounded worlds
    /// put it on y = 0 and reach the poles at `pole_distance` tiles.
    pub fn latitude(&self, y: i64) -> f32 {
        match self.config.bounds {
            Some(bounds) => {
                let half = bounds.height_tiles(self.chunk_size()) as f64 / 2.0;
                let from_equator = ((y as f64 + 0.5) - half).abs();
                (from_equator / half).clamp(0.0, 1.0) as f32
            }
            None => {
                let pole = self.config.pole_distance as f64;
                ((y as f64).abs() / pole).min(1.0) as f32
            }
        }
    }

    /// Largest chunk index on either axis. Leaves room for the river and
    /// connectivity horizons so every chunk they reach still fits in an `i32`.
    pub fn chunk_limit(&self) -> i64 {
        let rivers = self.config.rivers.river_horizon as i64;
        let connectivity = self.config.hydrology.connectivity_horizon as i64;
        i32::MAX as i64 - 2 * rivers - connectivity - 2
    }

    fn chunk_index_in_range(&self, x: i64, y: i64) -> bool {
        let limit = self.chunk_limit();
        (-limit..=limit).contains(&x) && (-limit..=limit).contains(&y)
    }

    pub fn contains_tile(&self, tile: TileCoord) -> bool {
        let size = self.chunk_size() as i64;
        if !self.chunk_index_in_range(tile.x.div_euclid(size), tile.y.div_euclid(size)) {
            return false;
        }
        self.config
            .bounds
            .map_or(true, |b| b.contains_tile(tile, self.chunk_size()))
    }

    pub fn contains_chunk(&self, chunk: ChunkCoord) -> bool {
        self.chunk_index_in_range(chunk.x as i64, chunk.y as i64)
            && self.config.bounds.map_or(true, |b| b.contains_chunk(chunk))
    }

    /// Tiles on the outermost row or column of a bounded world.
    pub fn is_boundary_tile(&self, tile: TileCoord) -> bool {
        self.edge_distance(tile) == Some(0)
    }

    /// Distance to the nearest world edge, `None` when unbounded.
    pub fn edge_distance(&self, tile: TileCoord) -> Option<i64> {
        self.config
            .bounds
            .map(|b| b.distance_to_edge(tile, self.chunk_size()))
    }

    /// Water containing this tile is Ocean.
    pub fn is_anchor(&self, tile: TileCoord) -> bool {
        if self.ocean_seeds.contains(&tile) {
            return true;
        }
        matches!(self.edge_distance(tile), Some(d) if d <= self.config.edge_margin as i64)
    }

    pub fn validate_tile(&self, tile: TileCoord) -> Result<(), WorldError> {
        if self.contains_tile(tile) {
            Ok(())
        } else {
            Err(WorldError::invalid_tile(tile.x, tile.y))
        }
    }

    pub fn validate_chunk(&self, chunk: ChunkCoord) -> Result<(), WorldError> {
        if self.contains_chunk(chunk) {
            Ok(())
        } else {
            Err(WorldError::invalid_chunk(chunk))
        }
    }

    pub fn chunk_bounds(&self, chunk: ChunkCoord) -> ChunkBounds {
        chunk.bounds(self.chunk_size())
    }
}
