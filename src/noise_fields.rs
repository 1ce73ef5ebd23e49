//! Seeded coherent noise fields.
//!
//! Three scalar fields drive generation: elevation, a temperature anomaly and
//! moisture. Each is a pure function of the world seed and an absolute tile
//! coordinate, so a tile evaluates identically no matter which chunk asks for
//! it or in what order chunks are produced.

use noise::{NoiseFn, Perlin, Seedable};
use serde::{Deserialize, Serialize};

use crate::seeds::{noise_seed, WorldSeeds};

/// Which field to sample.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Field {
    /// Relative elevation in [-1, 1], before edge falloff.
    Elevation,
    /// Temperature anomaly in [-1, 1].
    Temperature,
    /// Moisture in [0, 1].
    Moisture,
}

/// Noise shaping parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseParams {
    /// Base frequency of the terrain detail octaves (cycles per tile).
    pub terrain_scale: f64,
    /// Frequency of the continental mask.
    pub continental_scale: f64,
    /// Octaves of terrain detail.
    pub octaves: u32,
    /// Amplitude falloff per octave.
    pub persistence: f64,
    /// Frequency growth per octave.
    pub lacunarity: f64,
    /// Frequency of the temperature anomaly.
    pub temperature_scale: f64,
    /// Frequency of the moisture field.
    pub moisture_scale: f64,
    /// Shifts the continental mask down so open water dominates slightly.
    pub sea_bias: f64,
}

impl Default for NoiseParams {
    fn default() -> Self {
        Self {
            terrain_scale: 0.012,
            continental_scale: 0.0018,
            octaves: 6,
            persistence: 0.5,
            lacunarity: 2.0,
            temperature_scale: 0.01,
            moisture_scale: 0.012,
            sea_bias: 0.075,
        }
    }
}

// Offsets keep integer tile coordinates away from the Perlin lattice, where
// every octave evaluates to zero.
const TERRAIN_OFFSET: (f64, f64) = (0.3711, 0.1937);
const CONTINENT_OFFSET: (f64, f64) = (17.137, 41.593);
const TEMPERATURE_OFFSET: (f64, f64) = (5.2, 1.3);
const MOISTURE_OFFSET: (f64, f64) = (9.7, 3.1);

/// The seeded noise generators for one world.
#[derive(Clone)]
pub struct NoiseFields {
    continental: Perlin,
    terrain: Perlin,
    temperature: Perlin,
    moisture: Perlin,
    params: NoiseParams,
}

impl NoiseFields {
    pub fn new(seeds: &WorldSeeds, params: &NoiseParams) -> Self {
        Self {
            continental: Perlin::new(1).set_seed(noise_seed(seeds.continental)),
            terrain: Perlin::new(1).set_seed(noise_seed(seeds.terrain)),
            temperature: Perlin::new(1).set_seed(noise_seed(seeds.temperature)),
            moisture: Perlin::new(1).set_seed(noise_seed(seeds.moisture)),
            params: params.clone(),
        }
    }

    pub fn params(&self) -> &NoiseParams {
        &self.params
    }

    /// Sample a field at an absolute tile coordinate.
    pub fn sample(&self, field: Field, x: i64, y: i64) -> f64 {
        let (fx, fy) = (x as f64, y as f64);
        match field {
            Field::Elevation => self.elevation(fx, fy),
            Field::Temperature => {
                let s = self.params.temperature_scale;
                fbm(
                    &self.temperature,
                    fx * s + TEMPERATURE_OFFSET.0,
                    fy * s + TEMPERATURE_OFFSET.1,
                    3,
                    0.5,
                    2.0,
                )
                .clamp(-1.0, 1.0)
            }
            Field::Moisture => {
                let s = self.params.moisture_scale;
                let n = fbm(
                    &self.moisture,
                    fx * s + MOISTURE_OFFSET.0,
                    fy * s + MOISTURE_OFFSET.1,
                    4,
                    0.5,
                    2.0,
                );
                ((n + 1.0) * 0.5).clamp(0.0, 1.0)
            }
        }
    }

    /// Continental mask in roughly [-1, 1]; positive means landmass.
    pub fn continental(&self, x: f64, y: f64) -> f64 {
        let s = self.params.continental_scale;
        fbm(
            &self.continental,
            x * s + CONTINENT_OFFSET.0,
            y * s + CONTINENT_OFFSET.1,
            3,
            0.5,
            2.0,
        )
    }

    /// Continents plus detail octaves whose amplitude grows inland, so open
    /// ocean stays calm and interiors get relief.
    fn elevation(&self, x: f64, y: f64) -> f64 {
        let p = &self.params;
        let continental = self.continental(x, y);
        let detail = fbm(
            &self.terrain,
            x * p.terrain_scale + TERRAIN_OFFSET.0,
            y * p.terrain_scale + TERRAIN_OFFSET.1,
            p.octaves,
            p.persistence,
            p.lacunarity,
        );
        let height = (continental - p.sea_bias) + detail * land_strength(continental) * 0.6;
        height.clamp(-1.0, 1.0)
    }
}

/// Weight of the detail octaves as a function of the continental mask.
fn land_strength(continental: f64) -> f64 {
    0.1 + 0.9 * smooth_step(-0.5, 0.5, continental)
}

/// Fractional Brownian Motion noise, normalized to the single-octave range.
pub fn fbm(
    noise: &impl NoiseFn<f64, 2>,
    x: f64,
    y: f64,
    octaves: u32,
    persistence: f64,
    lacunarity: f64,
) -> f64 {
    let mut total = 0.0;
    let mut amplitude = 1.0;
    let mut frequency = 1.0;
    let mut max_value = 0.0;

    for _ in 0..octaves.max(1) {
        total += amplitude * noise.get([x * frequency, y * frequency]);
        max_value += amplitude;
        amplitude *= persistence;
        frequency *= lacunarity;
    }

    total / max_value
}

/// Hermite interpolation between two edges, 0 below `edge0` and 1 above `edge1`.
pub fn smooth_step(edge0: f64, edge1: f64, x: f64) -> f64 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(seed: u64) -> NoiseFields {
        NoiseFields::new(&WorldSeeds::from_master(seed), &NoiseParams::default())
    }

    #[test]
    fn test_same_seed_same_values() {
        let a = fields(42);
        let b = fields(42);
        for &(x, y) in &[(0, 0), (-513, 77), (100_000, -3), (31, 32)] {
            for field in [Field::Elevation, Field::Temperature, Field::Moisture] {
                assert_eq!(a.sample(field, x, y), b.sample(field, x, y));
            }
        }
    }

    #[test]
    fn test_different_seeds_differ() {
        let a = fields(1);
        let b = fields(2);
        let differs = (0..64).any(|i| a.sample(Field::Elevation, i * 7, i * 3) != b.sample(Field::Elevation, i * 7, i * 3));
        assert!(differs);
    }

    #[test]
    fn test_ranges() {
        let f = fields(7);
        for y in (-400..400).step_by(37) {
            for x in (-400..400).step_by(29) {
                let e = f.sample(Field::Elevation, x, y);
                let t = f.sample(Field::Temperature, x, y);
                let m = f.sample(Field::Moisture, x, y);
                assert!((-1.0..=1.0).contains(&e));
                assert!((-1.0..=1.0).contains(&t));
                assert!((0.0..=1.0).contains(&m));
            }
        }
    }

    #[test]
    fn test_elevation_is_continuous() {
        let f = fields(99);
        let mut max_step = 0.0f64;
        for y in 0..64 {
            for x in 0..64 {
                let here = f.sample(Field::Elevation, x, y);
                let right = f.sample(Field::Elevation, x + 1, y);
                let down = f.sample(Field::Elevation, x, y + 1);
                max_step = max_step.max((here - right).abs()).max((here - down).abs());
            }
        }
        assert!(max_step < 0.25, "adjacent tiles jump by {max_step}");
    }

    #[test]
    fn test_land_strength_monotonic() {
        let mut last = land_strength(-1.0);
        for i in -9..=10 {
            let s = land_strength(i as f64 / 10.0);
            assert!(s >= last);
            last = s;
        }
        assert!((land_strength(-1.0) - 0.1).abs() < 1e-9);
        assert!((land_strength(1.0) - 1.0).abs() < 1e-9);
    }
}
