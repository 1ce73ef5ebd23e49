//! Error types surfaced by the world API.

use thiserror::Error;

use crate::chunk::storage::StorageError;
use crate::config::ConfigError;
use crate::coords::ChunkCoord;

/// Errors returned by the chunk manager and generation context.
#[derive(Debug, Error)]
pub enum WorldError {
    /// Requested coordinate lies outside the configured world bounds.
    #[error("{kind} coordinate ({x}, {y}) is outside the world bounds")]
    InvalidCoordinate { kind: &'static str, x: i64, y: i64 },

    /// A bounded cross-chunk search ran out of room. Recovered internally by
    /// hydrology and river tracing; callers of tile queries never see it.
    #[error("generation horizon of {horizon} chunks exceeded around chunk {origin}")]
    GenerationHorizonExceeded { origin: ChunkCoord, horizon: u32 },

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to build worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}

impl WorldError {
    pub fn invalid_tile(x: i64, y: i64) -> Self {
        WorldError::InvalidCoordinate { kind: "tile", x, y }
    }

    pub fn invalid_chunk(chunk: ChunkCoord) -> Self {
        WorldError::InvalidCoordinate {
            kind: "chunk",
            x: chunk.x as i64,
            y: chunk.y as i64,
        }
    }
}
