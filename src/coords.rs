//! Coordinate system for the streamed world.
//!
//! Two levels: tiles (the unit of terrain data) and chunks (fixed-size square
//! groups of tiles, the unit of generation and streaming). Tile coordinates are
//! absolute and signed so the world may extend in every direction; chunk
//! coordinates are derived with euclidean division so negative tiles land in
//! negative chunks.

use serde::{Deserialize, Serialize};

/// Absolute tile coordinate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileCoord {
    pub x: i64,
    pub y: i64,
}

impl TileCoord {
    pub const fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }

    /// Chunk containing this tile.
    pub fn chunk(&self, chunk_size: u32) -> ChunkCoord {
        let size = chunk_size as i64;
        ChunkCoord::new(self.x.div_euclid(size) as i32, self.y.div_euclid(size) as i32)
    }

    /// Position of this tile inside its chunk (0..chunk_size on both axes).
    pub fn local(&self, chunk_size: u32) -> (usize, usize) {
        let size = chunk_size as i64;
        (self.x.rem_euclid(size) as usize, self.y.rem_euclid(size) as usize)
    }

    pub fn offset(&self, dx: i64, dy: i64) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }

    /// The four edge-adjacent neighbours (north, east, south, west).
    pub fn neighbors4(&self) -> [TileCoord; 4] {
        [
            self.offset(0, -1),
            self.offset(1, 0),
            self.offset(0, 1),
            self.offset(-1, 0),
        ]
    }
}

impl std::fmt::Display for TileCoord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Chunk coordinate (chunk grid position, not tiles).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkCoord {
    pub x: i32,
    pub y: i32,
}

impl ChunkCoord {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// World coordinate of the chunk's top-left tile.
    pub fn origin(&self, chunk_size: u32) -> TileCoord {
        TileCoord::new(self.x as i64 * chunk_size as i64, self.y as i64 * chunk_size as i64)
    }

    /// Tile rectangle covered by this chunk.
    pub fn bounds(&self, chunk_size: u32) -> ChunkBounds {
        let min = self.origin(chunk_size);
        ChunkBounds {
            min,
            max: min.offset(chunk_size as i64, chunk_size as i64),
        }
    }

    /// Chebyshev distance in chunks (square rings around a center).
    pub fn chebyshev_distance(&self, other: &ChunkCoord) -> u32 {
        let dx = (self.x as i64 - other.x as i64).unsigned_abs();
        let dy = (self.y as i64 - other.y as i64).unsigned_abs();
        dx.max(dy) as u32
    }

    /// Squared euclidean distance, used to order loads nearest-first.
    pub fn distance_sq(&self, other: &ChunkCoord) -> u64 {
        let dx = self.x as i64 - other.x as i64;
        let dy = self.y as i64 - other.y as i64;
        (dx * dx + dy * dy) as u64
    }

    pub fn neighbor(&self, edge: Edge) -> ChunkCoord {
        let (dx, dy) = edge.offset();
        ChunkCoord::new(self.x.saturating_add(dx), self.y.saturating_add(dy))
    }

    /// All chunks within `radius` (Chebyshev) of this one, row-major.
    pub fn square_around(&self, radius: u32) -> impl Iterator<Item = ChunkCoord> + '_ {
        let r = radius.min(i32::MAX as u32) as i32;
        (-r..=r).flat_map(move |dy| {
            (-r..=r).map(move |dx| {
                ChunkCoord::new(self.x.saturating_add(dx), self.y.saturating_add(dy))
            })
        })
    }
}

impl std::fmt::Display for ChunkCoord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {}]", self.x, self.y)
    }
}

/// Side of a chunk. North is toward negative y.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Edge {
    North,
    South,
    West,
    East,
}

impl Edge {
    pub const ALL: [Edge; 4] = [Edge::North, Edge::South, Edge::West, Edge::East];

    pub fn opposite(&self) -> Edge {
        match self {
            Edge::North => Edge::South,
            Edge::South => Edge::North,
            Edge::West => Edge::East,
            Edge::East => Edge::West,
        }
    }

    /// Chunk offset toward the neighbour on this side.
    pub fn offset(&self) -> (i32, i32) {
        match self {
            Edge::North => (0, -1),
            Edge::South => (0, 1),
            Edge::West => (-1, 0),
            Edge::East => (1, 0),
        }
    }

    /// Local tile position of the `i`-th tile along this edge.
    pub fn local_tile(&self, i: usize, chunk_size: u32) -> (usize, usize) {
        let last = chunk_size as usize - 1;
        match self {
            Edge::North => (i, 0),
            Edge::South => (i, last),
            Edge::West => (0, i),
            Edge::East => (last, i),
        }
    }
}

/// Half-open tile rectangle `[min, max)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkBounds {
    pub min: TileCoord,
    pub max: TileCoord,
}

impl ChunkBounds {
    pub fn contains(&self, tile: TileCoord) -> bool {
        tile.x >= self.min.x && tile.x < self.max.x && tile.y >= self.min.y && tile.y < self.max.y
    }

    pub fn width(&self) -> u64 {
        (self.max.x - self.min.x) as u64
    }

    pub fn height(&self) -> u64 {
        (self.max.y - self.min.y) as u64
    }
}

/// Finite world extent measured in chunks, anchored at chunk (0, 0).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldBounds {
    pub width_chunks: u32,
    pub height_chunks: u32,
}

impl WorldBounds {
    pub fn new(width_chunks: u32, height_chunks: u32) -> Self {
        Self { width_chunks, height_chunks }
    }

    pub fn width_tiles(&self, chunk_size: u32) -> i64 {
        self.width_chunks as i64 * chunk_size as i64
    }

    pub fn height_tiles(&self, chunk_size: u32) -> i64 {
        self.height_chunks as i64 * chunk_size as i64
    }

    pub fn contains_chunk(&self, chunk: ChunkCoord) -> bool {
        chunk.x >= 0
            && chunk.y >= 0
            && (chunk.x as u32) < self.width_chunks
            && (chunk.y as u32) < self.height_chunks
    }

    pub fn contains_tile(&self, tile: TileCoord, chunk_size: u32) -> bool {
        tile.x >= 0
            && tile.y >= 0
            && tile.x < self.width_tiles(chunk_size)
            && tile.y < self.height_tiles(chunk_size)
    }

    /// Distance in tiles to the nearest world edge (0 on the boundary row/column).
    pub fn distance_to_edge(&self, tile: TileCoord, chunk_size: u32) -> i64 {
        let right = self.width_tiles(chunk_size) - 1 - tile.x;
        let bottom = self.height_tiles(chunk_size) - 1 - tile.y;
        tile.x.min(tile.y).min(right).min(bottom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negative_tiles_map_to_negative_chunks() {
        let tile = TileCoord::new(-1, -65);
        assert_eq!(tile.chunk(64), ChunkCoord::new(-1, -2));
        assert_eq!(tile.local(64), (63, 63));
    }

    #[test]
    fn test_chunk_round_trip() {
        let chunk = ChunkCoord::new(3, -2);
        let origin = chunk.origin(32);
        assert_eq!(origin, TileCoord::new(96, -64));
        assert_eq!(origin.chunk(32), chunk);
        assert_eq!(origin.offset(31, 31).chunk(32), chunk);
        assert_eq!(origin.offset(32, 0).chunk(32), ChunkCoord::new(4, -2));
    }

    #[test]
    fn test_bounds_contains_half_open() {
        let bounds = ChunkCoord::new(1, 1).bounds(16);
        assert!(bounds.contains(TileCoord::new(16, 16)));
        assert!(bounds.contains(TileCoord::new(31, 31)));
        assert!(!bounds.contains(TileCoord::new(32, 16)));
        assert_eq!(bounds.width(), 16);
    }

    #[test]
    fn test_chebyshev_and_square() {
        let center = ChunkCoord::new(0, 0);
        assert_eq!(center.chebyshev_distance(&ChunkCoord::new(-2, 1)), 2);
        let ring: Vec<_> = center.square_around(1).collect();
        assert_eq!(ring.len(), 9);
        assert_eq!(ring[0], ChunkCoord::new(-1, -1));
        assert_eq!(ring[8], ChunkCoord::new(1, 1));
    }

    #[test]
    fn test_square_and_neighbor_saturate_at_extremes() {
        let corner = ChunkCoord::new(i32::MAX, i32::MIN);
        let ring: Vec<_> = corner.square_around(1).collect();
        assert_eq!(ring.len(), 9);
        assert!(ring.iter().all(|c| c.x >= i32::MAX - 1 && c.y <= i32::MIN + 1));
        assert_eq!(corner.neighbor(Edge::East), corner);
        assert_eq!(corner.neighbor(Edge::North), corner);
        assert_eq!(corner.neighbor(Edge::West), ChunkCoord::new(i32::MAX - 1, i32::MIN));
    }

    #[test]
    fn test_world_bounds_edges() {
        let world = WorldBounds::new(2, 2);
        assert!(world.contains_chunk(ChunkCoord::new(1, 1)));
        assert!(!world.contains_chunk(ChunkCoord::new(2, 0)));
        assert!(!world.contains_tile(TileCoord::new(-1, 3), 8));
        assert_eq!(world.distance_to_edge(TileCoord::new(0, 5), 8), 0);
        assert_eq!(world.distance_to_edge(TileCoord::new(15, 7), 8), 0);
        assert_eq!(world.distance_to_edge(TileCoord::new(7, 8), 8), 7);
    }

    #[test]
    fn test_edge_tiles_face_each_other() {
        let size = 8;
        for edge in Edge::ALL {
            let (x, y) = edge.local_tile(3, size);
            let (ox, oy) = edge.opposite().local_tile(3, size);
            match edge {
                Edge::North | Edge::South => {
                    assert_eq!(x, ox);
                    assert_eq!(y + oy, size as usize - 1);
                }
                Edge::West | Edge::East => {
                    assert_eq!(y, oy);
                    assert_eq!(x + ox, size as usize - 1);
                }
            }
        }
    }
}
