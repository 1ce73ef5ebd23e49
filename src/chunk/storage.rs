//! Chunk persistence.
//!
//! Evicted chunks are written to one bincode file each so reloading them
//! does not rerun the pipeline. Files live in a directory per world seed:
//! `{base_dir}/world_{seed}/chunk_{x}_{y}.bin`

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use thiserror::Error;

use crate::coords::ChunkCoord;
use crate::hydrology::WaterBodyRecord;

use super::Chunk;

/// Bumped whenever the on-disk layout changes.
pub const FORMAT_VERSION: u32 = 1;

/// Errors that can occur during chunk storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    /// Unreadable bytes (truncated or corrupted file)
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// Readable, but not a chunk of this world
    #[error("corrupted chunk file: {0}")]
    Corrupted(String),
}

/// A chunk as stored on disk, with the kinds of the bodies it references.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PersistedChunk {
    pub version: u32,
    pub world_seed: u64,
    pub chunk_size: u32,
    pub chunk: Chunk,
    pub water_bodies: Vec<WaterBodyRecord>,
}

/// Borrowed form written by `save_chunk`. Same layout as `PersistedChunk`.
#[derive(Serialize)]
struct PersistedChunkRef<'a> {
    version: u32,
    world_seed: u64,
    chunk_size: u32,
    chunk: &'a Chunk,
    water_bodies: &'a [WaterBodyRecord],
}

/// Storage manager for persisting chunks to disk.
pub struct ChunkStorage {
    base_dir: PathBuf,
    world_seed: u64,
    chunk_size: u32,
}

impl ChunkStorage {
    pub fn new<P: AsRef<Path>>(base_dir: P, world_seed: u64, chunk_size: u32) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
            world_seed,
            chunk_size,
        }
    }

    /// Directory holding this world's chunks
    pub fn world_dir(&self) -> PathBuf {
        self.base_dir.join(format!("world_{}", self.world_seed))
    }

    pub fn chunk_path(&self, coord: ChunkCoord) -> PathBuf {
        self.world_dir().join(format!("chunk_{}_{}.bin", coord.x, coord.y))
    }

    pub fn chunk_exists(&self, coord: ChunkCoord) -> bool {
        self.chunk_path(coord).exists()
    }

    /// Save a chunk to disk.
    ///
    /// Writes a uniquely named temporary file in the world directory and
    /// renames it over the target. Concurrent saves of the same chunk each
    /// use their own temporary file and the last rename wins.
    pub fn save_chunk(&self, chunk: &Chunk, water_bodies: &[WaterBodyRecord]) -> Result<(), StorageError> {
        fs::create_dir_all(self.world_dir())?;

        let path = self.chunk_path(chunk.coord);
        let record = PersistedChunkRef {
            version: FORMAT_VERSION,
            world_seed: self.world_seed,
            chunk_size: self.chunk_size,
            chunk,
            water_bodies,
        };

        let mut tmp = NamedTempFile::new_in(self.world_dir())?;
        {
            let mut writer = BufWriter::new(tmp.as_file_mut());
            bincode::serialize_into(&mut writer, &record)
                .map_err(|e| StorageError::Serialization(e.to_string()))?;
            writer.flush()?;
        }
        tmp.persist(&path).map_err(|e| StorageError::Io(e.error))?;

        Ok(())
    }

    /// Load and validate a chunk. Returns `None` if the chunk isn't on disk.
    pub fn load_chunk(&self, coord: ChunkCoord) -> Result<Option<PersistedChunk>, StorageError> {
        let path = self.chunk_path(coord);
        if !path.exists() {
            return Ok(None);
        }

        let reader = BufReader::new(File::open(&path)?);
        let persisted: PersistedChunk = bincode::deserialize_from(reader)
            .map_err(|e| StorageError::Deserialization(e.to_string()))?;

        self.validate(coord, &persisted)?;
        Ok(Some(persisted))
    }

    fn validate(&self, coord: ChunkCoord, persisted: &PersistedChunk) -> Result<(), StorageError> {
        let corrupted = |msg: String| Err(StorageError::Corrupted(msg));

        if persisted.version != FORMAT_VERSION {
            return corrupted(format!(
                "format version {} (expected {FORMAT_VERSION})",
                persisted.version
            ));
        }
        if persisted.world_seed != self.world_seed {
            return corrupted(format!(
                "world seed {} (expected {})",
                persisted.world_seed, self.world_seed
            ));
        }
        if persisted.chunk.coord != coord {
            return corrupted(format!("chunk {} stored under {coord}", persisted.chunk.coord));
        }

        let size = self.chunk_size as usize;
        let tiles = &persisted.chunk.tiles;
        if persisted.chunk_size != self.chunk_size
            || tiles.width != size
            || tiles.height != size
            || tiles.len() != size * size
        {
            return corrupted(format!(
                "{}x{} grid (expected {size}x{size})",
                tiles.width, tiles.height
            ));
        }
        Ok(())
    }

    /// Delete a chunk from disk (if it exists).
    pub fn delete_chunk(&self, coord: ChunkCoord) -> std::io::Result<()> {
        let path = self.chunk_path(coord);
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }

    /// All chunks saved for this world.
    pub fn list_chunks(&self) -> Result<Vec<ChunkCoord>, StorageError> {
        let dir = self.world_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut chunks = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("bin") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let Some(rest) = stem.strip_prefix("chunk_") else {
                continue;
            };
            if let Some((x, y)) = rest.split_once('_') {
                if let (Ok(x), Ok(y)) = (x.parse(), y.parse()) {
                    chunks.push(ChunkCoord::new(x, y));
                }
            }
        }

        chunks.sort();
        Ok(chunks)
    }

    /// Total size of stored chunks in bytes.
    pub fn total_size(&self) -> std::io::Result<u64> {
        let dir = self.world_dir();
        if !dir.exists() {
            return Ok(0);
        }

        let mut total = 0;
        for entry in fs::read_dir(dir)? {
            total += entry?.metadata()?.len();
        }
        Ok(total)
    }

    /// Remove every stored chunk of this world.
    pub fn clear(&self) -> std::io::Result<()> {
        let dir = self.world_dir();
        if dir.exists() {
            fs::remove_dir_all(&dir)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::biomes::Biome;
    use crate::chunk::TileData;
    use crate::hydrology::{ChunkHydrology, WaterBodyId, WaterBodyKind};
    use crate::rivers::RiverFlow;
    use crate::tilemap::Tilemap;
    use tempfile::tempdir;

    fn make_test_chunk(x: i32, y: i32) -> Chunk {
        let coord = ChunkCoord::new(x, y);
        let lake = WaterBodyId::component(coord, 0);
        let tiles = Tilemap::from_fn(4, 4, |tx, ty| TileData {
            elevation: tx as f32 * 0.1 - 0.2,
            temperature: 12.5,
            moisture: ty as f32 * 0.2,
            biome: if tx < 2 { Biome::Lake } else { Biome::River },
            water_body: Some(lake),
            river: (tx >= 2).then_some(RiverFlow {
                direction: Some(2),
                order: 1,
            }),
        });
        Chunk {
            coord,
            tiles,
            rivers: Vec::new(),
            hydrology: ChunkHydrology::default(),
        }
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let storage = ChunkStorage::new(dir.path(), 12345, 4);

        let chunk = make_test_chunk(-3, 2);
        let records = vec![WaterBodyRecord {
            id: WaterBodyId::component(chunk.coord, 0),
            kind: WaterBodyKind::Ocean,
        }];
        storage.save_chunk(&chunk, &records).unwrap();

        assert!(storage.chunk_exists(ChunkCoord::new(-3, 2)));
        assert!(!storage.chunk_exists(ChunkCoord::new(-3, 3)));

        let loaded = storage.load_chunk(ChunkCoord::new(-3, 2)).unwrap().unwrap();
        assert_eq!(loaded.chunk, chunk);
        assert_eq!(loaded.water_bodies, records);
        assert_eq!(loaded.version, FORMAT_VERSION);
    }

    #[test]
    fn test_list_chunks() {
        let dir = tempdir().unwrap();
        let storage = ChunkStorage::new(dir.path(), 12345, 4);

        storage.save_chunk(&make_test_chunk(1, 2), &[]).unwrap();
        storage.save_chunk(&make_test_chunk(-3, 4), &[]).unwrap();
        storage.save_chunk(&make_test_chunk(5, 6), &[]).unwrap();

        let chunks = storage.list_chunks().unwrap();
        assert_eq!(
            chunks,
            vec![ChunkCoord::new(-3, 4), ChunkCoord::new(1, 2), ChunkCoord::new(5, 6)]
        );
        assert!(storage.total_size().unwrap() > 0);

        storage.clear().unwrap();
        assert!(storage.list_chunks().unwrap().is_empty());
    }

    #[test]
    fn test_load_nonexistent() {
        let dir = tempdir().unwrap();
        let storage = ChunkStorage::new(dir.path(), 12345, 4);
        assert!(storage.load_chunk(ChunkCoord::new(99, 99)).unwrap().is_none());
    }

    #[test]
    fn test_garbage_file_is_rejected() {
        let dir = tempdir().unwrap();
        let storage = ChunkStorage::new(dir.path(), 1, 4);
        let coord = ChunkCoord::new(0, 0);
        fs::create_dir_all(storage.world_dir()).unwrap();
        fs::write(storage.chunk_path(coord), b"not a chunk").unwrap();

        assert!(matches!(
            storage.load_chunk(coord),
            Err(StorageError::Deserialization(_))
        ));
    }

    #[test]
    fn test_mismatched_world_is_corrupted() {
        let dir = tempdir().unwrap();
        let chunk = make_test_chunk(0, 0);
        ChunkStorage::new(dir.path(), 7, 4).save_chunk(&chunk, &[]).unwrap();

        // Same directory, different chunk size
        let other = ChunkStorage::new(dir.path(), 7, 8);
        assert!(matches!(
            other.load_chunk(chunk.coord),
            Err(StorageError::Corrupted(_))
        ));

        // File moved under the wrong name
        let storage = ChunkStorage::new(dir.path(), 7, 4);
        fs::rename(storage.chunk_path(chunk.coord), storage.chunk_path(ChunkCoord::new(1, 0))).unwrap();
        assert!(matches!(
            storage.load_chunk(ChunkCoord::new(1, 0)),
            Err(StorageError::Corrupted(_))
        ));
    }

    #[test]
    fn test_concurrent_saves_of_one_chunk() {
        let dir = tempdir().unwrap();
        let storage = ChunkStorage::new(dir.path(), 3, 4);
        let chunk = make_test_chunk(2, -1);

        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    for _ in 0..10 {
                        storage.save_chunk(&chunk, &[]).unwrap();
                    }
                });
            }
        });

        let loaded = storage.load_chunk(chunk.coord).unwrap().unwrap();
        assert_eq!(loaded.chunk, chunk);
        assert_eq!(storage.list_chunks().unwrap(), vec![chunk.coord]);
        // No temporary files left behind
        assert_eq!(fs::read_dir(storage.world_dir()).unwrap().count(), 1);
    }
}
