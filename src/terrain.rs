//! Shared read-only elevation patches.
//!
//! Hydrology probes and river tracing need elevation from chunks around the
//! one being generated. They never generate those chunks: they read a
//! per-chunk elevation patch, which is a pure function of the seed and so
//! can be memoized, evicted and recomputed freely.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;

use crate::cache::LruCache;
use crate::coords::{ChunkCoord, TileCoord};
use crate::heightmap::generate_chunk_elevation;
use crate::hydrology::labeling::{label_components, ChunkLabels, WaterBodyId};
use crate::tilemap::Tilemap;
use crate::world::GenerationContext;

/// Elevation grid of one chunk, with its water labeling computed on demand.
pub struct ElevationPatch {
    coord: ChunkCoord,
    elevation: Tilemap<f32>,
    labels: OnceLock<ChunkLabels>,
}

impl ElevationPatch {
    pub fn generate(ctx: &GenerationContext, coord: ChunkCoord) -> Self {
        Self {
            coord,
            elevation: generate_chunk_elevation(ctx, coord),
            labels: OnceLock::new(),
        }
    }

    pub fn coord(&self) -> ChunkCoord {
        self.coord
    }

    pub fn elevation(&self) -> &Tilemap<f32> {
        &self.elevation
    }

    /// Elevation at a local tile.
    pub fn get(&self, x: usize, y: usize) -> f32 {
        *self.elevation.get(x, y)
    }

    /// Per-chunk water components (phase one of hydrology).
    pub fn labels(&self, ctx: &GenerationContext) -> &ChunkLabels {
        self.labels.get_or_init(|| {
            let origin = self.coord.origin(ctx.chunk_size());
            label_components(&self.elevation, ctx.sea_level(), self.coord, |x, y| {
                ctx.is_anchor(origin.offset(x as i64, y as i64))
            })
        })
    }
}

/// Bounded LRU of elevation patches shared by all workers.
pub struct PatchCache {
    patches: Mutex<LruCache<ChunkCoord, Arc<ElevationPatch>>>,
}

impl PatchCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            patches: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Cached patch, generating it outside the lock on a miss.
    pub fn get_or_generate(&self, ctx: &GenerationContext, coord: ChunkCoord) -> Arc<ElevationPatch> {
        if let Some(patch) = self.patches.lock().get(&coord) {
            return Arc::clone(patch);
        }

        let patch = Arc::new(ElevationPatch::generate(ctx, coord));

        let mut patches = self.patches.lock();
        if let Some(existing) = patches.get(&coord) {
            return Arc::clone(existing);
        }
        patches.insert(coord, Arc::clone(&patch));
        patch
    }

    pub fn len(&self) -> usize {
        self.patches.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.patches.lock().is_empty()
    }
}

/// Per-task view over the patch cache that pins the patches it has touched,
/// so a long trace is not slowed by evictions from other workers.
pub struct ElevationSampler<'a> {
    ctx: &'a GenerationContext,
    cache: &'a PatchCache,
    pinned: HashMap<ChunkCoord, Arc<ElevationPatch>>,
}

impl<'a> ElevationSampler<'a> {
    pub fn new(ctx: &'a GenerationContext, cache: &'a PatchCache) -> Self {
        Self {
            ctx,
            cache,
            pinned: HashMap::new(),
        }
    }

    pub fn context(&self) -> &'a GenerationContext {
        self.ctx
    }

    pub fn patch(&mut self, coord: ChunkCoord) -> Arc<ElevationPatch> {
        let (ctx, cache) = (self.ctx, self.cache);
        Arc::clone(
            self.pinned
                .entry(coord)
                .or_insert_with(|| cache.get_or_generate(ctx, coord)),
        )
    }

    pub fn elevation(&mut self, tile: TileCoord) -> f32 {
        let size = self.ctx.chunk_size();
        let (x, y) = tile.local(size);
        self.patch(tile.chunk(size)).get(x, y)
    }

    /// Water component id of a below-sea tile.
    pub fn water_id(&mut self, tile: TileCoord) -> Option<WaterBodyId> {
        let size = self.ctx.chunk_size();
        let (x, y) = tile.local(size);
        let patch = self.patch(tile.chunk(size));
        patch.labels(self.ctx).id_at(x, y)
    }

    pub fn is_water(&mut self, tile: TileCoord) -> bool {
        self.elevation(tile) < self.ctx.sea_level()
    }
}
