//! Bounded ocean-connectivity probe.
//!
//! A component that touches its chunk border but holds no anchor might still
//! be part of an ocean. Before the chunk is published we flood outward over
//! neighbouring elevation patches, confined to a box of chunks around the
//! origin. Reaching an anchor settles it as Ocean early; running out of room
//! leaves it Lake until a later chunk merge says otherwise.

use std::collections::{HashSet, VecDeque};

use log::trace;

use crate::coords::{ChunkCoord, TileCoord};
use crate::error::WorldError;
use crate::terrain::ElevationSampler;

/// Outcome of a probe that stayed inside its horizon.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// Connected to an anchor through below-sea tiles
    ReachesAnchor,
    /// The whole connected region was explored without finding one
    Enclosed,
}

/// Flood fill from `start` over below-sea tiles within `horizon` chunks of
/// `origin`.
///
/// Returns `GenerationHorizonExceeded` if the region spills past the box or
/// the tile budget runs out before an answer is found.
pub fn probe_ocean_connectivity(
    sampler: &mut ElevationSampler<'_>,
    origin: ChunkCoord,
    start: &[TileCoord],
    horizon: u32,
    tile_budget: usize,
) -> Result<ProbeOutcome, WorldError> {
    let ctx = sampler.context();
    let size = ctx.chunk_size();
    let exceeded = WorldError::GenerationHorizonExceeded { origin, horizon };

    let mut visited: HashSet<TileCoord> = start.iter().copied().collect();
    let mut queue: VecDeque<TileCoord> = start.iter().copied().collect();
    let mut truncated = false;

    while let Some(tile) = queue.pop_front() {
        if ctx.is_anchor(tile) {
            return Ok(ProbeOutcome::ReachesAnchor);
        }

        for next in tile.neighbors4() {
            if !ctx.contains_tile(next) || visited.contains(&next) {
                continue;
            }
            if next.chunk(size).chebyshev_distance(&origin) > horizon {
                if sampler.is_water(next) {
                    truncated = true;
                }
                continue;
            }
            if !sampler.is_water(next) {
                continue;
            }

            visited.insert(next);
            if visited.len() > tile_budget {
                trace!("probe from {origin} hit its tile budget of {tile_budget}");
                return Err(exceeded);
            }
            queue.push_back(next);
        }
    }

    if truncated {
        trace!("probe from {origin} left the {horizon}-chunk horizon");
        Err(exceeded)
    } else {
        Ok(ProbeOutcome::Enclosed)
    }
}
