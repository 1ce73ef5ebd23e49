//! Deterministic streamed terrain and hydrology
//!
//! Re-exports modules for use by binaries and tools.

pub mod ascii;
pub mod biomes;
pub mod cache;
pub mod chunk;
pub mod climate;
pub mod config;
pub mod coords;
pub mod error;
pub mod heightmap;
pub mod hydrology;
pub mod noise_fields;
pub mod rivers;
pub mod seeds;
pub mod terrain;
pub mod tilemap;
pub mod world;

pub use biomes::{Biome, BiomeClassifier};
pub use chunk::manager::AreaUpdate;
pub use chunk::{Chunk, ChunkEvent, ChunkManager, ChunkState, Tile};
pub use config::{ConfigError, WorldConfig};
pub use coords::{ChunkBounds, ChunkCoord, TileCoord, WorldBounds};
pub use error::WorldError;
pub use hydrology::{WaterBody, WaterBodyId, WaterBodyKind};
pub use noise_fields::{Field, NoiseFields};
pub use rivers::{RiverFlow, RiverPath, RiverTerminus};
pub use world::GenerationContext;
