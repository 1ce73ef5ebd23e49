//! River network tracing.
//!
//! Sources are picked per chunk, then each river follows steepest descent
//! over the shared elevation patches until it reaches water, the world
//! boundary, a pit (which becomes a new single-tile lake) or the edge of the
//! box of chunks it is allowed to cover. Every path is a pure function of its
//! source, so neighbouring chunks always agree on the rivers they share.

use std::fmt;
use std::sync::Arc;

use log::trace;
use parking_lot::Mutex;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::cache::LruCache;
use crate::climate;
use crate::coords::{ChunkCoord, TileCoord};
use crate::seeds::chunk_seed;
use crate::terrain::ElevationSampler;
use crate::tilemap::DIR_OFFSETS;

/// River source and tracing parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiverParams {
    /// Minimum height above sea level for a source tile
    pub river_source_min_elevation: f32,
    /// Sources kept per chunk after shuffling
    pub max_river_sources_per_chunk: usize,
    /// Chunks around the source chunk a river may cover
    pub river_horizon: u32,
    /// Hard cap on path length in tiles
    pub max_river_length: usize,
}

impl Default for RiverParams {
    fn default() -> Self {
        Self {
            river_source_min_elevation: 0.25,
            max_river_sources_per_chunk: 2,
            river_horizon: 2,
            max_river_length: 4096,
        }
    }
}

/// Source chunk plus ordinal among that chunk's sources.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RiverId {
    pub source_chunk: ChunkCoord,
    pub ordinal: u16,
}

impl fmt::Display for RiverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "river {}#{}", self.source_chunk, self.ordinal)
    }
}

/// Where a river stopped. The coordinate is the last tile of the path.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiverTerminus {
    /// Reached a below-sea tile (Ocean or Lake)
    Water(TileCoord),
    /// No strictly lower neighbour; the tile becomes a single-tile lake
    NewLake(TileCoord),
    /// Reached the world boundary
    MapEdge(TileCoord),
    /// Ran out of room (horizon box or length cap)
    Horizon(TileCoord),
}

impl RiverTerminus {
    pub fn tile(&self) -> TileCoord {
        match *self {
            RiverTerminus::Water(t)
            | RiverTerminus::NewLake(t)
            | RiverTerminus::MapEdge(t)
            | RiverTerminus::Horizon(t) => t,
        }
    }

    /// Whether the final tile is a water body rather than river.
    pub fn ends_in_body(&self) -> bool {
        matches!(self, RiverTerminus::Water(_) | RiverTerminus::NewLake(_))
    }

    pub fn name(&self) -> &'static str {
        match self {
            RiverTerminus::Water(_) => "water",
            RiverTerminus::NewLake(_) => "new lake",
            RiverTerminus::MapEdge(_) => "map edge",
            RiverTerminus::Horizon(_) => "horizon",
        }
    }
}

/// One traced river, source first.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RiverPath {
    pub id: RiverId,
    pub tiles: Vec<TileCoord>,
    /// D8 direction of each step; one shorter than `tiles`
    pub directions: Vec<u8>,
    pub terminus: RiverTerminus,
}

impl RiverPath {
    pub fn source(&self) -> TileCoord {
        self.tiles[0]
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn passes_through(&self, chunk: ChunkCoord, chunk_size: u32) -> bool {
        self.tiles.iter().any(|t| t.chunk(chunk_size) == chunk)
    }

    /// Tiles rendered as River, i.e. all but a final water tile.
    pub fn river_tiles(&self) -> &[TileCoord] {
        if self.terminus.ends_in_body() {
            &self.tiles[..self.tiles.len() - 1]
        } else {
            &self.tiles
        }
    }

    /// Outgoing direction at path index `i`, `None` for the last tile.
    pub fn direction_at(&self, i: usize) -> Option<u8> {
        self.directions.get(i).copied()
    }
}

/// River data stored on a tile.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiverFlow {
    /// D8 direction toward the next tile, `None` where the river stops
    pub direction: Option<u8>,
    /// Number of traced paths through this tile
    pub order: u16,
}

// =============================================================================
// SOURCES
// =============================================================================

/// Pick river sources in one chunk, in row-major order.
pub fn find_river_sources(sampler: &mut ElevationSampler<'_>, coord: ChunkCoord) -> Vec<TileCoord> {
    let ctx = sampler.context();
    let config = ctx.config();
    let params = &config.rivers;
    let min_elevation = ctx.sea_level() + params.river_source_min_elevation;

    let mut candidates = Vec::new();
    let bounds = ctx.chunk_bounds(coord);
    for y in bounds.min.y..bounds.max.y {
        for x in bounds.min.x..bounds.max.x {
            let tile = TileCoord::new(x, y);
            if !ctx.contains_tile(tile) || ctx.is_boundary_tile(tile) {
                continue;
            }
            let elevation = sampler.elevation(tile);
            if elevation < min_elevation || !is_local_maximum(sampler, tile, elevation) {
                continue;
            }
            let upwind = sampler.elevation(tile.offset(1, 0));
            if climate::moisture(ctx, tile, elevation, upwind) < config.river_moisture_threshold {
                continue;
            }
            candidates.push(tile);
        }
    }

    let mut rng = ChaCha8Rng::seed_from_u64(chunk_seed(ctx.seeds().rivers, coord.x, coord.y));
    candidates.shuffle(&mut rng);
    candidates.truncate(params.max_river_sources_per_chunk);
    candidates.sort_by_key(|t| (t.y, t.x));
    candidates
}

/// Strictly higher than every in-world 8-neighbour.
fn is_local_maximum(sampler: &mut ElevationSampler<'_>, tile: TileCoord, elevation: f32) -> bool {
    let ctx = sampler.context();
    DIR_OFFSETS.iter().all(|&(dx, dy)| {
        let next = tile.offset(dx as i64, dy as i64);
        !ctx.contains_tile(next) || sampler.elevation(next) < elevation
    })
}

// =============================================================================
// TRACING
// =============================================================================

/// Direction of the lowest neighbour strictly below `center`.
///
/// Ties go to the first direction clockwise from north.
pub fn steepest_descent(center: f32, neighbors: &[Option<f32>; 8]) -> Option<u8> {
    let mut best: Option<(u8, f32)> = None;
    for (dir, elevation) in neighbors.iter().enumerate() {
        let Some(elevation) = *elevation else { continue };
        if elevation >= center {
            continue;
        }
        if best.map_or(true, |(_, lowest)| elevation < lowest) {
            best = Some((dir as u8, elevation));
        }
    }
    best.map(|(dir, _)| dir)
}

/// Follow steepest descent from `source` until the river terminates.
pub fn trace_river(sampler: &mut ElevationSampler<'_>, id: RiverId, source: TileCoord) -> RiverPath {
    let ctx = sampler.context();
    let size = ctx.chunk_size();
    let params = &ctx.config().rivers;

    let mut tiles = vec![source];
    let mut directions = Vec::new();
    let mut current = source;

    let terminus = loop {
        if sampler.is_water(current) {
            break RiverTerminus::Water(current);
        }
        if ctx.is_boundary_tile(current) {
            break RiverTerminus::MapEdge(current);
        }
        if tiles.len() >= params.max_river_length {
            trace!("{id} hit the length cap of {}", params.max_river_length);
            break RiverTerminus::Horizon(current);
        }

        let elevation = sampler.elevation(current);
        let mut neighbors = [None; 8];
        for (dir, &(dx, dy)) in DIR_OFFSETS.iter().enumerate() {
            let next = current.offset(dx as i64, dy as i64);
            if ctx.contains_tile(next) {
                neighbors[dir] = Some(sampler.elevation(next));
            }
        }

        let Some(dir) = steepest_descent(elevation, &neighbors) else {
            break RiverTerminus::NewLake(current);
        };
        let (dx, dy) = DIR_OFFSETS[dir as usize];
        let next = current.offset(dx as i64, dy as i64);
        if next.chunk(size).chebyshev_distance(&id.source_chunk) > params.river_horizon {
            trace!("{id} truncated at {current}, past the {}-chunk horizon", params.river_horizon);
            break RiverTerminus::Horizon(current);
        }

        directions.push(dir);
        tiles.push(next);
        current = next;
    };

    RiverPath {
        id,
        tiles,
        directions,
        terminus,
    }
}

/// Sources of one chunk traced to completion.
pub fn trace_chunk_rivers(sampler: &mut ElevationSampler<'_>, coord: ChunkCoord) -> Vec<RiverPath> {
    find_river_sources(sampler, coord)
        .into_iter()
        .enumerate()
        .map(|(ordinal, source)| {
            let id = RiverId {
                source_chunk: coord,
                ordinal: ordinal as u16,
            };
            trace_river(sampler, id, source)
        })
        .collect()
}

/// Bounded memo of traced rivers keyed by source chunk.
pub struct RiverCache {
    paths: Mutex<LruCache<ChunkCoord, Arc<Vec<RiverPath>>>>,
}

impl RiverCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            paths: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn get_or_trace(&self, sampler: &mut ElevationSampler<'_>, source_chunk: ChunkCoord) -> Arc<Vec<RiverPath>> {
        if let Some(paths) = self.paths.lock().get(&source_chunk) {
            return Arc::clone(paths);
        }

        let traced = Arc::new(trace_chunk_rivers(sampler, source_chunk));

        let mut paths = self.paths.lock();
        if let Some(existing) = paths.get(&source_chunk) {
            return Arc::clone(existing);
        }
        paths.insert(source_chunk, Arc::clone(&traced));
        traced
    }

    pub fn len(&self) -> usize {
        self.paths.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.lock().is_empty()
    }
}

/// Every river that crosses `coord`, from sources within the river horizon.
pub fn rivers_through_chunk(
    sampler: &mut ElevationSampler<'_>,
    cache: &RiverCache,
    coord: ChunkCoord,
) -> Vec<RiverPath> {
    let ctx = sampler.context();
    let size = ctx.chunk_size();
    let horizon = ctx.config().rivers.river_horizon;

    let mut rivers = Vec::new();
    for source_chunk in coord.square_around(horizon) {
        if !ctx.contains_chunk(source_chunk) {
            continue;
        }
        let paths = cache.get_or_trace(sampler, source_chunk);
        rivers.extend(paths.iter().filter(|p| p.passes_through(coord, size)).cloned());
    }
    rivers
}
