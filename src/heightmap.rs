use crate::coords::{ChunkCoord, TileCoord};
use crate::noise_fields::{smooth_step, Field};
use crate::tilemap::Tilemap;
use crate::world::GenerationContext;

// =============================================================================
// ELEVATION
// =============================================================================

/// Final elevation of a tile: the noise elevation minus the edge falloff.
///
/// This is the only elevation function in the crate. Chunk generation,
/// hydrology probes and river tracing all read it (directly or through a
/// cached patch), so neighbouring chunks always agree on shared tiles.
pub fn elevation_at(ctx: &GenerationContext, tile: TileCoord) -> f32 {
    let base = ctx.fields().sample(Field::Elevation, tile.x, tile.y) as f32;
    base - edge_falloff(ctx, tile)
}

/// Amount subtracted near the world boundary so edges sink toward ocean.
/// Full strength on the boundary row, fading to zero `edge_falloff_width`
/// tiles inward. Unbounded worlds have no falloff.
pub fn edge_falloff(ctx: &GenerationContext, tile: TileCoord) -> f32 {
    let config = ctx.config();
    let Some(distance) = ctx.edge_distance(tile) else {
        return 0.0;
    };
    if config.edge_falloff_width == 0 || config.edge_falloff_strength == 0.0 {
        return 0.0;
    }
    let width = config.edge_falloff_width as f64;
    let fade = 1.0 - smooth_step(0.0, width, distance.max(0) as f64);
    config.edge_falloff_strength * fade as f32
}

/// Elevation grid for one chunk, in local row-major order.
pub fn generate_chunk_elevation(ctx: &GenerationContext, chunk: ChunkCoord) -> Tilemap<f32> {
    let size = ctx.chunk_size() as usize;
    let origin = chunk.origin(ctx.chunk_size());
    Tilemap::from_fn(size, size, |x, y| elevation_at(ctx, origin.offset(x as i64, y as i64)))
}
