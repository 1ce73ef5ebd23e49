//! Hydrology: telling oceans from lakes by connectivity.
//!
//! Water is classified in phases:
//!
//! 1. **Labeling** (`labeling`): flood fill of below-sea tiles inside one
//!    chunk, producing components and border labels. Pure.
//! 2. **Probe** (`probe`): components that touch the chunk border without an
//!    anchor flood outward over neighbouring elevation, within a few chunks,
//!    to find an anchor early. Pure.
//! 3. **Registry** (`registry`): components are unioned across chunk edges in
//!    a global disjoint-set under one lock. Lake joined with Ocean is Ocean.

pub mod labeling;
pub mod probe;
pub mod registry;

pub use labeling::{
    detect_water_bodies, label_components, BorderLabels, ChunkLabels, WaterBodyId, WaterBodyKind,
    WaterComponent,
};
pub use probe::{probe_ocean_connectivity, ProbeOutcome};
pub use registry::{
    RegistrationReport, WaterBody, WaterBodyRecord, WaterBodyRegistry, WaterBodyStats,
};

use log::trace;
use serde::{Deserialize, Serialize};

use crate::coords::{ChunkCoord, Edge, TileCoord};
use crate::terrain::ElevationSampler;

/// Hydrology tuning.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HydrologyParams {
    /// Chunks around the origin a connectivity probe may explore
    pub connectivity_horizon: u32,
    /// Tiles a single probe may visit before giving up
    pub probe_tile_budget: usize,
    /// Lakes at least this large are reported as inland seas (0 disables)
    pub inland_sea_min_tiles: u64,
}

impl Default for HydrologyParams {
    fn default() -> Self {
        Self {
            connectivity_horizon: 1,
            probe_tile_budget: 65_536,
            inland_sea_min_tiles: 2048,
        }
    }
}

/// Water summary stored with each chunk.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkHydrology {
    pub components: Vec<WaterComponent>,
    pub border: BorderLabels,
}

impl ChunkHydrology {
    pub fn ids(&self) -> impl Iterator<Item = WaterBodyId> + '_ {
        self.components.iter().map(|c| c.id)
    }
}

/// Label a chunk's water and probe its unanchored border components.
pub fn resolve_chunk_hydrology(sampler: &mut ElevationSampler<'_>, coord: ChunkCoord) -> ChunkHydrology {
    let ctx = sampler.context();
    let params = &ctx.config().hydrology;
    let patch = sampler.patch(coord);
    let labels = patch.labels(ctx);

    let mut components = labels.components.clone();
    for component in components.iter_mut() {
        if component.anchored || !component.touches_border {
            continue;
        }

        let start = border_tiles(&labels.border, component.id, coord, ctx.chunk_size());
        match probe_ocean_connectivity(
            sampler,
            coord,
            &start,
            params.connectivity_horizon,
            params.probe_tile_budget,
        ) {
            Ok(ProbeOutcome::ReachesAnchor) => component.probe_reached_anchor = true,
            Ok(ProbeOutcome::Enclosed) => {}
            Err(err) => trace!("{err}; {} stays provisional", component.id),
        }
    }

    ChunkHydrology {
        components,
        border: labels.border.clone(),
    }
}

/// World coordinates of a component's tiles on the chunk border.
fn border_tiles(border: &BorderLabels, id: WaterBodyId, coord: ChunkCoord, size: u32) -> Vec<TileCoord> {
    let origin = coord.origin(size);
    let mut tiles = Vec::new();
    for edge in Edge::ALL {
        for (i, label) in border.get(edge).iter().enumerate() {
            if *label == Some(id) {
                let (x, y) = edge.local_tile(i, size);
                let tile = origin.offset(x as i64, y as i64);
                if !tiles.contains(&tile) {
                    tiles.push(tile);
                }
            }
        }
    }
    tiles
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WorldConfig;
    use crate::coords::WorldBounds;
    use crate::terrain::PatchCache;
    use crate::world::GenerationContext;

    #[test]
    fn test_border_tiles_dedup_corners() {
        let chunk = ChunkCoord::new(1, 1);
        let id = WaterBodyId::component(chunk, 0);
        let border = BorderLabels {
            north: vec![Some(id), None],
            south: vec![None, None],
            west: vec![Some(id), None],
            east: vec![None, None],
        };
        let tiles = border_tiles(&border, id, chunk, 2);
        assert_eq!(tiles, vec![TileCoord::new(2, 2)]);
    }

    #[test]
    fn test_probe_flags_match_registry_outcome() {
        let config = WorldConfig {
            seed: 5,
            chunk_size: 16,
            bounds: Some(WorldBounds::new(4, 4)),
            edge_falloff_width: 10,
            ..WorldConfig::default()
        };
        let ctx = GenerationContext::new(config).unwrap();
        let cache = PatchCache::new(32);
        let mut sampler = ElevationSampler::new(&ctx, &cache);

        let mut registry = WaterBodyRegistry::new();
        let mut flagged = Vec::new();
        for y in 0..4 {
            for x in 0..4 {
                let coord = ChunkCoord::new(x, y);
                let hydrology = resolve_chunk_hydrology(&mut sampler, coord);
                flagged.extend(
                    hydrology
                        .components
                        .iter()
                        .filter(|c| c.initial_kind() == WaterBodyKind::Ocean)
                        .map(|c| c.id),
                );
                registry.integrate_chunk(coord, &hydrology.components, &hydrology.border);
            }
        }

        // Anything flagged early must still be Ocean once the world is whole
        for id in flagged {
            assert_eq!(registry.resolve(id).1, WaterBodyKind::Ocean);
        }
    }
}
