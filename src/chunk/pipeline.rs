//! Chunk generation pipeline.
//!
//! elevation patch -> water labeling and probe -> rivers -> climate ->
//! biome classification. Pure apart from the shared memo caches, whose
//! contents are themselves pure functions of the seed.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use crate::biomes::Biome;
use crate::climate::sample_climate;
use crate::coords::ChunkCoord;
use crate::hydrology::{resolve_chunk_hydrology, ChunkHydrology, WaterBodyId, WaterBodyKind, WaterComponent};
use crate::rivers::{rivers_through_chunk, RiverCache, RiverFlow, RiverPath, RiverTerminus};
use crate::terrain::{ElevationSampler, PatchCache};
use crate::tilemap::Tilemap;
use crate::world::GenerationContext;

use super::{water_biome, Chunk, TileData};

/// River data collected for one tile before the grid is built.
#[derive(Default)]
struct FlowAccum {
    flow: RiverFlow,
    drain: Option<WaterBodyId>,
}

/// Generate one chunk.
///
/// Reads elevation of neighbouring chunks through `patches` but never
/// generates them. Ocean/Lake biomes reflect what was known locally; the
/// manager refreshes them from the registry before publishing.
pub fn generate_chunk(
    ctx: &GenerationContext,
    patches: &PatchCache,
    river_cache: &RiverCache,
    coord: ChunkCoord,
) -> Chunk {
    let size = ctx.chunk_size();
    let mut sampler = ElevationSampler::new(ctx, patches);
    let patch = sampler.patch(coord);
    let labels = patch.labels(ctx);

    let mut hydrology = resolve_chunk_hydrology(&mut sampler, coord);
    let rivers = rivers_through_chunk(&mut sampler, river_cache, coord);

    // Pits where rivers stop become single-tile lakes
    let mut terminal_lakes: HashMap<(usize, usize), WaterBodyId> = HashMap::new();
    for path in &rivers {
        let RiverTerminus::NewLake(tile) = path.terminus else { continue };
        if tile.chunk(size) != coord {
            continue;
        }
        let (x, y) = tile.local(size);
        if let Entry::Vacant(slot) = terminal_lakes.entry((x, y)) {
            let component = WaterComponent::terminal_lake(coord, x, y, patch.get(x, y), size);
            slot.insert(component.id);
            hydrology.components.push(component);
        }
    }

    let flows = river_flows(&mut sampler, &rivers, coord);
    let local_kinds = local_kinds(&hydrology);

    let origin = coord.origin(size);
    let classifier = ctx.classifier();
    let tiles = Tilemap::from_fn(size as usize, size as usize, |x, y| {
        let tile = origin.offset(x as i64, y as i64);
        let elevation = patch.get(x, y);
        let upwind = sampler.elevation(tile.offset(1, 0));
        let climate = sample_climate(ctx, tile, elevation, upwind);
        let latitude = ctx.latitude(tile.y);

        let (biome, water_body, river) =
            match classifier.classify(elevation, climate.temperature, climate.moisture, latitude) {
                None => {
                    let id = labels.id_at(x, y);
                    let kind = id
                        .and_then(|id| local_kinds.get(&id).copied())
                        .unwrap_or(WaterBodyKind::Lake);
                    (water_biome(kind), id, None)
                }
                Some(land) => {
                    if let Some(&id) = terminal_lakes.get(&(x, y)) {
                        (Biome::Lake, Some(id), None)
                    } else if let Some(accum) = flows.get(&(x, y)) {
                        (Biome::River, accum.drain, Some(accum.flow))
                    } else {
                        (land, None, None)
                    }
                }
            };

        TileData {
            elevation,
            temperature: climate.temperature,
            moisture: climate.moisture,
            biome,
            water_body,
            river,
        }
    });

    Chunk {
        coord,
        tiles,
        rivers,
        hydrology,
    }
}

fn local_kinds(hydrology: &ChunkHydrology) -> HashMap<WaterBodyId, WaterBodyKind> {
    hydrology
        .components
        .iter()
        .map(|c| (c.id, c.initial_kind()))
        .collect()
}

/// Flow direction, order and drain of every river tile in `coord`.
fn river_flows(
    sampler: &mut ElevationSampler<'_>,
    rivers: &[RiverPath],
    coord: ChunkCoord,
) -> HashMap<(usize, usize), FlowAccum> {
    let size = sampler.context().chunk_size();
    let mut flows: HashMap<(usize, usize), FlowAccum> = HashMap::new();

    for path in rivers {
        let drain = drain_id(sampler, path);
        for (i, tile) in path.river_tiles().iter().enumerate() {
            if tile.chunk(size) != coord {
                continue;
            }
            let accum = flows.entry(tile.local(size)).or_default();
            accum.flow.order = accum.flow.order.saturating_add(1);
            accum.flow.direction = accum.flow.direction.or(path.direction_at(i));
            accum.drain = accum.drain.or(drain);
        }
    }
    flows
}

/// Body a river empties into, `None` off the map or past its horizon.
fn drain_id(sampler: &mut ElevationSampler<'_>, path: &RiverPath) -> Option<WaterBodyId> {
    let size = sampler.context().chunk_size();
    match path.terminus {
        RiverTerminus::Water(tile) => sampler.water_id(tile),
        RiverTerminus::NewLake(tile) => {
            let (x, y) = tile.local(size);
            let index = y * size as usize + x;
            Some(WaterBodyId::terminal_lake(tile.chunk(size), index as u32))
        }
        RiverTerminus::MapEdge(_) | RiverTerminus::Horizon(_) => None,
    }
}

/// Memo caches shared by every generation task.
pub struct GenerationCaches {
    pub patches: PatchCache,
    pub rivers: RiverCache,
}

impl GenerationCaches {
    pub fn new(ctx: &GenerationContext) -> Self {
        let runtime = &ctx.config().runtime;
        Self {
            patches: PatchCache::new(runtime.patch_cache_capacity),
            rivers: RiverCache::new(runtime.river_cache_capacity),
        }
    }

    pub fn generate(&self, ctx: &GenerationContext, coord: ChunkCoord) -> Chunk {
        generate_chunk(ctx, &self.patches, &self.rivers, coord)
    }
}
