//! Seed management for world generation
//!
//! Every generation system gets its own seed derived from the world seed, so
//! the elevation, climate and river layers are decorrelated but reproducible.
//! Derivation uses fixed splitmix64 mixing rather than `std` hashers, whose
//! output is not guaranteed stable across Rust releases.

/// Seeds for all world generation systems.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorldSeeds {
    /// Master seed (the configured world seed)
    pub master: u64,
    /// Continental mask (large-scale land/sea layout)
    pub continental: u64,
    /// Terrain detail octaves layered on the continents
    pub terrain: u64,
    /// Temperature anomaly noise
    pub temperature: u64,
    /// Moisture noise
    pub moisture: u64,
    /// River source selection
    pub rivers: u64,
}

impl WorldSeeds {
    /// Create seeds from a master seed, deriving all sub-seeds deterministically.
    pub fn from_master(master: u64) -> Self {
        Self {
            master,
            continental: derive_seed(master, "continental"),
            terrain: derive_seed(master, "terrain"),
            temperature: derive_seed(master, "temperature"),
            moisture: derive_seed(master, "moisture"),
            rivers: derive_seed(master, "rivers"),
        }
    }
}

/// One splitmix64 finalization round.
pub fn mix64(mut hash: u64) -> u64 {
    hash ^= hash >> 30;
    hash = hash.wrapping_mul(0xbf58476d1ce4e5b9);
    hash ^= hash >> 27;
    hash = hash.wrapping_mul(0x94d049bb133111eb);
    hash ^= hash >> 31;
    hash
}

/// Derive a sub-seed from a master seed and a system name.
pub fn derive_seed(master: u64, system: &str) -> u64 {
    let mut hash = mix64(master.wrapping_add(0x9e3779b97f4a7c15));
    for byte in system.bytes() {
        hash = mix64(hash ^ byte as u64);
    }
    hash
}

/// Seed for per-chunk random decisions (river source selection).
pub fn chunk_seed(system_seed: u64, chunk_x: i32, chunk_y: i32) -> u64 {
    let mut hash = system_seed;

    hash = hash.wrapping_add(chunk_x as i64 as u64);
    hash ^= hash >> 30;
    hash = hash.wrapping_mul(0xbf58476d1ce4e5b9);

    hash = hash.wrapping_add(chunk_y as i64 as u64);
    hash ^= hash >> 27;
    hash = hash.wrapping_mul(0x94d049bb133111eb);

    hash ^= hash >> 33;
    hash
}

/// Fold a 64-bit seed into the 32 bits the noise generators accept.
pub fn noise_seed(seed: u64) -> u32 {
    (seed ^ (seed >> 32)) as u32
}
