//! Chunked world streaming.
//!
//! The world is cut into square chunks of `chunk_size` tiles. A chunk is
//! produced by the generation pipeline (or read back from disk), published
//! as an immutable `Arc<Chunk>`, and later evicted when it falls outside the
//! active area.

pub mod manager;
pub mod pipeline;
pub mod storage;

pub use manager::ChunkManager;
pub use pipeline::generate_chunk;
pub use storage::{ChunkStorage, PersistedChunk, StorageError};

use std::collections::BTreeSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::biomes::Biome;
use crate::coords::{ChunkCoord, TileCoord};
use crate::hydrology::{ChunkHydrology, WaterBodyId, WaterBodyKind};
use crate::rivers::{RiverFlow, RiverPath};
use crate::tilemap::Tilemap;

/// Lifecycle of a chunk slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChunkState {
    Unloaded,
    Generating,
    Ready,
}

/// Stored per-tile data.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TileData {
    pub elevation: f32,
    /// Raw temperature in degrees C, before latitude correction
    pub temperature: f32,
    pub moisture: f32,
    /// Ocean and Lake here are provisional, see `Chunk::refresh_water_biomes`
    pub biome: Biome,
    /// Body this tile belongs to, or drains into for rivers
    pub water_body: Option<WaterBodyId>,
    pub river: Option<RiverFlow>,
}

/// Snapshot of one tile handed to callers, with its water body resolved.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Tile {
    pub coord: TileCoord,
    pub elevation: f32,
    pub temperature: f32,
    pub moisture: f32,
    pub biome: Biome,
    /// Canonical id of the water body
    pub water_body: Option<WaterBodyId>,
    pub water_kind: Option<WaterBodyKind>,
    pub river: Option<RiverFlow>,
}

impl Tile {
    pub fn is_water(&self) -> bool {
        self.biome.is_water()
    }
}

/// A generated chunk. Never mutated once published.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub coord: ChunkCoord,
    pub tiles: Tilemap<TileData>,
    /// Rivers that cross this chunk
    pub rivers: Vec<RiverPath>,
    pub hydrology: ChunkHydrology,
}

impl Chunk {
    pub fn size(&self) -> u32 {
        self.tiles.width as u32
    }

    /// Tile at a world coordinate, if it lies in this chunk.
    pub fn get(&self, tile: TileCoord) -> Option<&TileData> {
        let size = self.size();
        if tile.chunk(size) != self.coord {
            return None;
        }
        let (x, y) = tile.local(size);
        Some(self.tiles.get(x, y))
    }

    /// Every water body id referenced by a tile.
    pub fn water_ids(&self) -> BTreeSet<WaterBodyId> {
        self.tiles.values().iter().filter_map(|t| t.water_body).collect()
    }

    /// Rewrite Ocean/Lake biomes from the registry's current kinds.
    ///
    /// Returns the number of tiles that changed.
    pub fn refresh_water_biomes(&mut self, mut kind_of: impl FnMut(WaterBodyId) -> WaterBodyKind) -> usize {
        let mut changed = 0;
        for (_, _, tile) in self.tiles.iter_mut() {
            if !matches!(tile.biome, Biome::Ocean | Biome::Lake) {
                continue;
            }
            let Some(id) = tile.water_body else { continue };
            let biome = water_biome(kind_of(id));
            if tile.biome != biome {
                tile.biome = biome;
                changed += 1;
            }
        }
        changed
    }

    /// Tile count per biome.
    pub fn biome_counts(&self) -> Vec<(Biome, usize)> {
        Biome::all()
            .iter()
            .map(|&b| (b, self.tiles.values().iter().filter(|t| t.biome == b).count()))
            .filter(|&(_, n)| n > 0)
            .collect()
    }
}

pub fn water_biome(kind: WaterBodyKind) -> Biome {
    match kind {
        WaterBodyKind::Ocean => Biome::Ocean,
        WaterBodyKind::Lake => Biome::Lake,
    }
}

/// Notifications sent to subscribers.
#[derive(Clone, Debug, PartialEq)]
pub enum ChunkEvent {
    Ready(ChunkCoord),
    Evicted { coord: ChunkCoord, persisted: bool },
    /// A persisted chunk was unreadable and has been regenerated
    Discarded { coord: ChunkCoord, reason: String },
}

/// Worker pool, cache sizes and persistence.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeParams {
    /// Generation threads (0 = one per core)
    pub worker_threads: usize,
    pub patch_cache_capacity: usize,
    pub river_cache_capacity: usize,
    /// Directory for evicted chunks. `None` regenerates instead.
    pub storage_dir: Option<PathBuf>,
}

impl Default for RuntimeParams {
    fn default() -> Self {
        Self {
            worker_threads: 0,
            patch_cache_capacity: 256,
            river_cache_capacity: 256,
            storage_dir: None,
        }
    }
}
