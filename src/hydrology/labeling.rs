//! Per-chunk water component labeling.
//!
//! A 4-connected flood fill over the below-sea tiles of one chunk. The result
//! depends only on the chunk's elevation grid and the anchor rule, so it can
//! run on any worker without touching shared state.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::coords::{ChunkCoord, Edge};
use crate::tilemap::Tilemap;

/// Kind of a water body.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WaterBodyKind {
    /// Connected to an anchor (world edge or ocean seed)
    Ocean,
    /// Enclosed water with no path to an anchor
    Lake,
}

impl WaterBodyKind {
    /// Ocean absorbs Lake; never the reverse.
    pub fn merge(self, other: WaterBodyKind) -> WaterBodyKind {
        if self == WaterBodyKind::Ocean || other == WaterBodyKind::Ocean {
            WaterBodyKind::Ocean
        } else {
            WaterBodyKind::Lake
        }
    }
}

/// Deterministic water body identifier: the chunk that first labeled the
/// component plus a local index. Ordering is by chunk, then index, and the
/// smallest member id names a merged body.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WaterBodyId {
    pub chunk: ChunkCoord,
    pub local: u32,
}

impl WaterBodyId {
    /// Flag marking single-tile lakes created where a river ends in a pit.
    pub const TERMINAL_LAKE_FLAG: u32 = 1 << 31;

    /// The `ordinal`-th component found in the chunk's row-major scan.
    pub fn component(chunk: ChunkCoord, ordinal: u32) -> Self {
        Self { chunk, local: ordinal }
    }

    /// Single-tile lake at local tile index `tile_index`.
    pub fn terminal_lake(chunk: ChunkCoord, tile_index: u32) -> Self {
        Self {
            chunk,
            local: Self::TERMINAL_LAKE_FLAG | tile_index,
        }
    }

    pub fn is_terminal_lake(&self) -> bool {
        self.local & Self::TERMINAL_LAKE_FLAG != 0
    }
}

impl std::fmt::Display for WaterBodyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_terminal_lake() {
            write!(f, "{}/pit{}", self.chunk, self.local & !Self::TERMINAL_LAKE_FLAG)
        } else {
            write!(f, "{}/{}", self.chunk, self.local)
        }
    }
}

/// One connected patch of below-sea tiles inside a chunk.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WaterComponent {
    pub id: WaterBodyId,
    pub tile_count: u32,
    pub min_elevation: f32,
    /// Contains an anchor tile
    pub anchored: bool,
    /// Touches the chunk border, so it may continue into a neighbour
    pub touches_border: bool,
    /// A bounded probe through neighbouring terrain reached an anchor
    pub probe_reached_anchor: bool,
    /// Bounding box in local tiles (min_x, min_y, max_x, max_y)
    pub bounds: (u32, u32, u32, u32),
}

impl WaterComponent {
    fn new(id: WaterBodyId) -> Self {
        Self {
            id,
            tile_count: 0,
            min_elevation: f32::MAX,
            anchored: false,
            touches_border: false,
            probe_reached_anchor: false,
            bounds: (u32::MAX, u32::MAX, 0, 0),
        }
    }

    fn add_tile(&mut self, x: usize, y: usize, elevation: f32, width: usize, height: usize) {
        self.tile_count += 1;
        self.min_elevation = self.min_elevation.min(elevation);

        self.bounds.0 = self.bounds.0.min(x as u32);
        self.bounds.1 = self.bounds.1.min(y as u32);
        self.bounds.2 = self.bounds.2.max(x as u32);
        self.bounds.3 = self.bounds.3.max(y as u32);

        if x == 0 || y == 0 || x + 1 == width || y + 1 == height {
            self.touches_border = true;
        }
    }

    /// Lone lake on a land tile where a river has nowhere lower to go.
    pub fn terminal_lake(chunk: ChunkCoord, x: usize, y: usize, elevation: f32, chunk_size: u32) -> Self {
        let size = chunk_size as usize;
        let mut component = Self::new(WaterBodyId::terminal_lake(chunk, (y * size + x) as u32));
        component.add_tile(x, y, elevation, size, size);
        component
    }

    /// Kind as far as this chunk alone can tell.
    pub fn initial_kind(&self) -> WaterBodyKind {
        if self.anchored || self.probe_reached_anchor {
            WaterBodyKind::Ocean
        } else {
            WaterBodyKind::Lake
        }
    }
}

/// Component id of every tile along each chunk edge, `None` for land.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BorderLabels {
    pub north: Vec<Option<WaterBodyId>>,
    pub south: Vec<Option<WaterBodyId>>,
    pub west: Vec<Option<WaterBodyId>>,
    pub east: Vec<Option<WaterBodyId>>,
}

impl BorderLabels {
    pub fn get(&self, edge: Edge) -> &[Option<WaterBodyId>] {
        match edge {
            Edge::North => &self.north,
            Edge::South => &self.south,
            Edge::West => &self.west,
            Edge::East => &self.east,
        }
    }

    fn edge_mut(&mut self, edge: Edge) -> &mut Vec<Option<WaterBodyId>> {
        match edge {
            Edge::North => &mut self.north,
            Edge::South => &mut self.south,
            Edge::West => &mut self.west,
            Edge::East => &mut self.east,
        }
    }

    /// Pairs of water ids that face each other across the shared edge, where
    /// `other` is the neighbour on `edge`.
    pub fn facing_pairs(&self, edge: Edge, other: &BorderLabels) -> Vec<(WaterBodyId, WaterBodyId)> {
        self.get(edge)
            .iter()
            .zip(other.get(edge.opposite()))
            .filter_map(|(ours, theirs)| Some(((*ours)?, (*theirs)?)))
            .collect()
    }
}

/// Labeling result for one chunk.
#[derive(Clone, Debug, PartialEq)]
pub struct ChunkLabels {
    /// Component ordinal per tile, `None` for land
    pub ordinals: Tilemap<Option<u32>>,
    pub components: Vec<WaterComponent>,
    pub border: BorderLabels,
    chunk: ChunkCoord,
}

impl ChunkLabels {
    /// Water body id of a local tile, if it is below sea level.
    pub fn id_at(&self, x: usize, y: usize) -> Option<WaterBodyId> {
        self.ordinals
            .get(x, y)
            .map(|ordinal| WaterBodyId::component(self.chunk, ordinal))
    }

    pub fn component(&self, id: WaterBodyId) -> Option<&WaterComponent> {
        if id.chunk != self.chunk || id.is_terminal_lake() {
            return None;
        }
        self.components.get(id.local as usize)
    }
}

/// Label the below-sea components of a square chunk grid.
///
/// Components are numbered in row-major order of their first tile.
/// `is_anchor(x, y)` says whether a local tile counts as an ocean anchor.
pub fn label_components(
    elevation: &Tilemap<f32>,
    sea_level: f32,
    chunk: ChunkCoord,
    is_anchor: impl Fn(usize, usize) -> bool,
) -> ChunkLabels {
    let width = elevation.width;
    let height = elevation.height;

    let mut ordinals: Tilemap<Option<u32>> = Tilemap::new_with(width, height, None);
    let mut components = Vec::new();
    let mut queue = VecDeque::new();

    for y in 0..height {
        for x in 0..width {
            if *elevation.get(x, y) >= sea_level || ordinals.get(x, y).is_some() {
                continue;
            }

            let ordinal = components.len() as u32;
            let mut component = WaterComponent::new(WaterBodyId::component(chunk, ordinal));

            ordinals.set(x, y, Some(ordinal));
            queue.push_back((x, y));

            while let Some((cx, cy)) = queue.pop_front() {
                component.add_tile(cx, cy, *elevation.get(cx, cy), width, height);
                if is_anchor(cx, cy) {
                    component.anchored = true;
                }

                for (nx, ny) in elevation.neighbors(cx, cy) {
                    if *elevation.get(nx, ny) < sea_level && ordinals.get(nx, ny).is_none() {
                        ordinals.set(nx, ny, Some(ordinal));
                        queue.push_back((nx, ny));
                    }
                }
            }

            components.push(component);
        }
    }

    let mut border = BorderLabels::default();
    if width == height && width > 0 {
        for edge in Edge::ALL {
            let labels = (0..width)
                .map(|i| {
                    let (x, y) = edge.local_tile(i, width as u32);
                    ordinals.get(x, y).map(|o| WaterBodyId::component(chunk, o))
                })
                .collect();
            *border.edge_mut(edge) = labels;
        }
    }

    ChunkLabels {
        ordinals,
        components,
        border,
        chunk,
    }
}

/// Classify the water of a standalone grid, treating its outer rows and
/// columns as the world edge.
///
/// Returns the id map and the components; a component is Ocean exactly when
/// `initial_kind()` says so.
pub fn detect_water_bodies(
    heightmap: &Tilemap<f32>,
    sea_level: f32,
) -> (Tilemap<Option<WaterBodyId>>, Vec<WaterComponent>) {
    let (w, h) = (heightmap.width, heightmap.height);
    let origin = ChunkCoord::new(0, 0);
    let labels = label_components(heightmap, sea_level, origin, |x, y| {
        x == 0 || y == 0 || x + 1 == w || y + 1 == h
    });

    let ids = Tilemap::from_fn(w, h, |x, y| labels.id_at(x, y));
    (ids, labels.components)
}
