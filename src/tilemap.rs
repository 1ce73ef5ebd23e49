use serde::{Deserialize, Serialize};

/// A dense 2D grid stored row-major. Edges do not wrap.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Tilemap<T> {
    pub width: usize,
    pub height: usize,
    data: Vec<T>,
}

impl<T: Clone> Tilemap<T> {
    pub fn new_with(width: usize, height: usize, value: T) -> Self {
        Self {
            width,
            height,
            data: vec![value; width * height],
        }
    }

    /// Build a map by evaluating `f(x, y)` for every cell in row-major order.
    pub fn from_fn(width: usize, height: usize, mut f: impl FnMut(usize, usize) -> T) -> Self {
        let mut data = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                data.push(f(x, y));
            }
        }
        Self { width, height, data }
    }

    /// Build from rows. Panics on ragged input, which only tests construct.
    pub fn from_rows(rows: &[Vec<T>]) -> Self {
        let height = rows.len();
        let width = rows.first().map_or(0, |r| r.len());
        assert!(rows.iter().all(|r| r.len() == width), "ragged rows");
        Self {
            width,
            height,
            data: rows.iter().flat_map(|r| r.iter().cloned()).collect(),
        }
    }

    /// Row-major index of a cell.
    pub fn index(&self, x: usize, y: usize) -> usize {
        y * self.width + x
    }

    pub fn get(&self, x: usize, y: usize) -> &T {
        &self.data[self.index(x, y)]
    }

    pub fn set(&mut self, x: usize, y: usize, value: T) {
        let idx = self.index(x, y);
        self.data[idx] = value;
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// 4-connected neighbours inside the map (up, down, left, right).
    pub fn neighbors(&self, x: usize, y: usize) -> Vec<(usize, usize)> {
        let mut result = Vec::with_capacity(4);

        if y > 0 {
            result.push((x, y - 1));
        }
        if y + 1 < self.height {
            result.push((x, y + 1));
        }
        if x > 0 {
            result.push((x - 1, y));
        }
        if x + 1 < self.width {
            result.push((x + 1, y));
        }

        result
    }

    /// Iterate over all cells with their coordinates.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, &T)> {
        let width = self.width;
        self.data.iter().enumerate().map(move |(idx, val)| (idx % width, idx / width, val))
    }

    /// Iterate mutably over all cells with their coordinates.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (usize, usize, &mut T)> {
        let width = self.width;
        self.data
            .iter_mut()
            .enumerate()
            .map(move |(idx, val)| (idx % width, idx / width, val))
    }

    pub fn values(&self) -> &[T] {
        &self.data
    }
}

// =============================================================================
// 8-NEIGHBOR DIRECTIONS
// =============================================================================

/// Direction indices, clockwise from north.
/// Order: N, NE, E, SE, S, SW, W, NW
pub const DIR_N: u8 = 0;
pub const DIR_NE: u8 = 1;
pub const DIR_E: u8 = 2;
pub const DIR_SE: u8 = 3;
pub const DIR_S: u8 = 4;
pub const DIR_SW: u8 = 5;
pub const DIR_W: u8 = 6;
pub const DIR_NW: u8 = 7;

/// Direction offsets (dx, dy), indexed by the constants above.
pub const DIR_OFFSETS: [(i32, i32); 8] = [
    (0, -1),  // N
    (1, -1),  // NE
    (1, 0),   // E
    (1, 1),   // SE
    (0, 1),   // S
    (-1, 1),  // SW
    (-1, 0),  // W
    (-1, -1), // NW
];
