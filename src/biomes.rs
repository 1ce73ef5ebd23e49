//! Biome classification with latitude-aware habitability balancing.
//!
//! Raw temperatures follow a linear equator-to-pole gradient, which leaves
//! too little temperate land at mid latitudes and too much ice. Before the
//! threshold lookup the classifier swaps that linear baseline for a curved
//! one and damps local anomalies toward the poles.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::climate::sample_climate;
use crate::config::WorldConfig;
use crate::coords::{ChunkBounds, TileCoord};
use crate::heightmap::elevation_at;
use crate::world::GenerationContext;

/// Latitude range treated as "mid latitude" by the survey.
pub const MIDLATITUDE_RANGE: (f32, f32) = (0.3, 0.6);

/// Terrain classification of a tile. Exactly one per tile.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Biome {
    // Water (decided by hydrology, never by the classifier)
    Ocean,
    Lake,
    River,

    // Frozen and high
    IceCap,
    Snow,
    Alpine,

    // Cold
    Tundra,
    BorealForest,
    Taiga,

    // Temperate
    ColdDesert,
    Grassland,
    TemperateForest,
    TemperateRainforest,

    // Warm
    Desert,
    Savanna,
    SubtropicalForest,
    Rainforest,

    Mountain,
}

impl Biome {
    pub fn all() -> &'static [Biome] {
        &[
            Biome::Ocean,
            Biome::Lake,
            Biome::River,
            Biome::IceCap,
            Biome::Snow,
            Biome::Alpine,
            Biome::Tundra,
            Biome::BorealForest,
            Biome::Taiga,
            Biome::ColdDesert,
            Biome::Grassland,
            Biome::TemperateForest,
            Biome::TemperateRainforest,
            Biome::Desert,
            Biome::Savanna,
            Biome::SubtropicalForest,
            Biome::Rainforest,
            Biome::Mountain,
        ]
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Biome::Ocean => "Ocean",
            Biome::Lake => "Lake",
            Biome::River => "River",
            Biome::IceCap => "Ice Cap",
            Biome::Snow => "Snow",
            Biome::Alpine => "Alpine",
            Biome::Tundra => "Tundra",
            Biome::BorealForest => "Boreal Forest",
            Biome::Taiga => "Taiga",
            Biome::ColdDesert => "Cold Desert",
            Biome::Grassland => "Grassland",
            Biome::TemperateForest => "Temperate Forest",
            Biome::TemperateRainforest => "Temperate Rainforest",
            Biome::Desert => "Desert",
            Biome::Savanna => "Savanna",
            Biome::SubtropicalForest => "Subtropical Forest",
            Biome::Rainforest => "Rainforest",
            Biome::Mountain => "Mountain",
        }
    }

    /// Character used by the ASCII preview.
    pub fn ascii_char(&self) -> char {
        match self {
            Biome::Ocean => '~',
            Biome::Lake => 'o',
            Biome::River => '=',
            Biome::IceCap => '#',
            Biome::Snow => '*',
            Biome::Alpine => '^',
            Biome::Tundra => ':',
            Biome::BorealForest => 'B',
            Biome::Taiga => 'b',
            Biome::ColdDesert => ',',
            Biome::Grassland => '"',
            Biome::TemperateForest => 'T',
            Biome::TemperateRainforest => 'R',
            Biome::Desert => '.',
            Biome::Savanna => ';',
            Biome::SubtropicalForest => 'S',
            Biome::Rainforest => '%',
            Biome::Mountain => 'M',
        }
    }

    pub fn is_water(&self) -> bool {
        matches!(self, Biome::Ocean | Biome::Lake | Biome::River)
    }

    /// Green, temperate-to-warm land that a settler would call hospitable.
    pub fn is_habitable(&self) -> bool {
        matches!(
            self,
            Biome::Grassland
                | Biome::TemperateForest
                | Biome::TemperateRainforest
                | Biome::Savanna
                | Biome::SubtropicalForest
                | Biome::Rainforest
        )
    }
}

impl std::fmt::Display for Biome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

// =============================================================================
// CLASSIFIER
// =============================================================================

/// Classifier tuning.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BiomeParams {
    /// Exponent of the corrected latitude baseline (1.0 = linear).
    pub habitability_exponent: f32,
    /// Fraction of the local anomaly removed at the poles.
    pub polar_anomaly_damping: f32,
    /// Elevation above which freezing land is Snow.
    pub snow_line: f32,
    /// Elevation above which cold land is Alpine.
    pub alpine_line: f32,
    /// Habitable share of mid-latitude land the classifier should reach.
    pub min_midlatitude_habitable_share: f32,
}

impl Default for BiomeParams {
    fn default() -> Self {
        Self {
            habitability_exponent: 2.0,
            polar_anomaly_damping: 0.5,
            snow_line: 0.45,
            alpine_line: 0.35,
            min_midlatitude_habitable_share: 0.5,
        }
    }
}

/// Maps climate to biome.
#[derive(Clone, Debug)]
pub struct BiomeClassifier {
    sea_level: f32,
    mountain_threshold: f32,
    equator_temp: f32,
    pole_temp: f32,
    params: BiomeParams,
}

impl BiomeClassifier {
    pub fn new(config: &WorldConfig) -> Self {
        Self {
            sea_level: config.sea_level,
            mountain_threshold: config.mountain_threshold,
            equator_temp: config.climate.equator_temp,
            pole_temp: config.climate.pole_temp,
            params: config.biome.clone(),
        }
    }

    pub fn params(&self) -> &BiomeParams {
        &self.params
    }

    /// Replace the linear latitude baseline with the curved one and damp the
    /// remaining anomaly toward the poles.
    pub fn corrected_temperature(&self, temperature: f32, latitude: f32) -> f32 {
        let lat = latitude.clamp(0.0, 1.0);
        let span = self.equator_temp - self.pole_temp;

        let linear = self.equator_temp - span * lat;
        let curved = self.equator_temp - span * lat.powf(self.params.habitability_exponent);
        let damping = 1.0 - self.params.polar_anomaly_damping * lat * lat;

        curved + (temperature - linear) * damping
    }

    /// Classify a tile. Returns `None` below sea level; water kind is decided
    /// by hydrology.
    pub fn classify(&self, elevation: f32, temperature: f32, moisture: f32, latitude: f32) -> Option<Biome> {
        let corrected = self.corrected_temperature(temperature, latitude);
        self.classify_corrected(elevation, corrected, moisture)
    }

    /// Classify without the latitude correction, for comparison surveys.
    pub fn classify_uncorrected(&self, elevation: f32, temperature: f32, moisture: f32) -> Option<Biome> {
        self.classify_corrected(elevation, temperature, moisture)
    }

    fn classify_corrected(&self, elevation: f32, temperature: f32, moisture: f32) -> Option<Biome> {
        if elevation < self.sea_level {
            return None;
        }
        if elevation > self.mountain_threshold {
            return Some(Biome::Mountain);
        }

        let height = elevation - self.sea_level;
        let biome = match temperature {
            t if t < -10.0 => Biome::IceCap,
            t if height > self.params.snow_line && t <= 0.0 => Biome::Snow,
            t if height > self.params.alpine_line && t <= 2.0 => Biome::Alpine,
            t => Self::classify_lowland(t, moisture),
        };
        Some(biome)
    }

    /// Temperature/moisture table for land below the alpine zones.
    fn classify_lowland(temperature: f32, moisture: f32) -> Biome {
        match (temperature, moisture) {
            (t, m) if t < -5.0 => {
                if m < 0.4 { Biome::Tundra } else { Biome::BorealForest }
            }
            (t, m) if t < 5.0 => {
                if m < 0.3 { Biome::Tundra } else { Biome::Taiga }
            }
            (t, m) if t < 18.0 => {
                if m < 0.2 { Biome::ColdDesert }
                else if m < 0.5 { Biome::Grassland }
                else if m < 0.75 { Biome::TemperateForest }
                else { Biome::TemperateRainforest }
            }
            (t, m) if t < 25.0 => {
                if m < 0.2 { Biome::Desert }
                else if m < 0.5 { Biome::Savanna }
                else { Biome::SubtropicalForest }
            }
            (_, m) => {
                if m < 0.2 { Biome::Desert }
                else if m < 0.45 { Biome::Savanna }
                else { Biome::Rainforest }
            }
        }
    }
}

// =============================================================================
// HABITABILITY SURVEY
// =============================================================================

/// Land counts for one latitude band.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct LatitudeBand {
    pub min_latitude: f32,
    pub max_latitude: f32,
    pub land: u64,
    /// Habitable land under the corrected classifier
    pub habitable: u64,
    /// Habitable land if the linear gradient were used unchanged
    pub habitable_uncorrected: u64,
}

impl LatitudeBand {
    pub fn share(&self) -> f32 {
        if self.land == 0 { 0.0 } else { self.habitable as f32 / self.land as f32 }
    }

    pub fn uncorrected_share(&self) -> f32 {
        if self.land == 0 { 0.0 } else { self.habitable_uncorrected as f32 / self.land as f32 }
    }

    fn center(&self) -> f32 {
        0.5 * (self.min_latitude + self.max_latitude)
    }
}

/// Habitable share of sampled land per latitude band.
#[derive(Clone, Debug, PartialEq)]
pub struct HabitabilitySurvey {
    pub bands: Vec<LatitudeBand>,
}

impl HabitabilitySurvey {
    fn midlatitude(&self) -> LatitudeBand {
        let (lo, hi) = MIDLATITUDE_RANGE;
        self.bands
            .iter()
            .filter(|b| b.center() >= lo && b.center() <= hi)
            .fold(LatitudeBand::default(), |mut acc, b| {
                acc.land += b.land;
                acc.habitable += b.habitable;
                acc.habitable_uncorrected += b.habitable_uncorrected;
                acc
            })
    }

    /// Habitable share of mid-latitude land with the correction applied.
    pub fn midlatitude_share(&self) -> f32 {
        self.midlatitude().share()
    }

    /// Habitable share of mid-latitude land under the plain linear gradient.
    pub fn midlatitude_uncorrected_share(&self) -> f32 {
        self.midlatitude().uncorrected_share()
    }

    pub fn midlatitude_land(&self) -> u64 {
        self.midlatitude().land
    }

    pub fn total_land(&self) -> u64 {
        self.bands.iter().map(|b| b.land).sum()
    }
}

/// Sample every `stride`-th tile of `area` and tally habitable land per
/// latitude band. Rows are surveyed in parallel.
pub fn habitability_survey(
    ctx: &GenerationContext,
    area: ChunkBounds,
    stride: usize,
    band_count: usize,
) -> HabitabilitySurvey {
    let stride = stride.max(1);
    let band_count = band_count.max(1);
    let empty: Vec<LatitudeBand> = (0..band_count)
        .map(|i| LatitudeBand {
            min_latitude: i as f32 / band_count as f32,
            max_latitude: (i + 1) as f32 / band_count as f32,
            ..LatitudeBand::default()
        })
        .collect();

    let rows: Vec<i64> = (area.min.y..area.max.y).step_by(stride).collect();
    let bands = rows
        .par_iter()
        .map(|&y| {
            let mut bands = empty.clone();
            let latitude = ctx.latitude(y);
            let band = ((latitude * band_count as f32) as usize).min(band_count - 1);

            for x in (area.min.x..area.max.x).step_by(stride) {
                let tile = TileCoord::new(x, y);
                let elevation = elevation_at(ctx, tile);
                if elevation < ctx.sea_level() {
                    continue;
                }
                let upwind = elevation_at(ctx, tile.offset(1, 0));
                let climate = sample_climate(ctx, tile, elevation, upwind);
                let classifier = ctx.classifier();

                bands[band].land += 1;
                if classifier
                    .classify(elevation, climate.temperature, climate.moisture, latitude)
                    .is_some_and(|b| b.is_habitable())
                {
                    bands[band].habitable += 1;
                }
                if classifier
                    .classify_uncorrected(elevation, climate.temperature, climate.moisture)
                    .is_some_and(|b| b.is_habitable())
                {
                    bands[band].habitable_uncorrected += 1;
                }
            }
            bands
        })
        .reduce(
            || empty.clone(),
            |mut a, b| {
                for (acc, band) in a.iter_mut().zip(b.iter()) {
                    acc.land += band.land;
                    acc.habitable += band.habitable;
                    acc.habitable_uncorrected += band.habitable_uncorrected;
                }
                a
            },
        );

    HabitabilitySurvey { bands }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::{ChunkCoord, WorldBounds};

    fn classifier() -> BiomeClassifier {
        BiomeClassifier::new(&WorldConfig::default())
    }

    #[test]
    fn test_below_sea_is_deferred() {
        let c = classifier();
        assert_eq!(c.classify(-0.01, 20.0, 0.5, 0.2), None);
        assert!(c.classify(0.0, 20.0, 0.5, 0.2).is_some());
    }

    #[test]
    fn test_mountain_regardless_of_temperature() {
        let c = classifier();
        for t in [-40.0, 0.0, 35.0] {
            assert_eq!(c.classify(0.9, t, 0.5, 0.5), Some(Biome::Mountain));
        }
    }

    #[test]
    fn test_threshold_table() {
        let c = classifier();
        assert_eq!(c.classify_uncorrected(0.1, -15.0, 0.5), Some(Biome::IceCap));
        assert_eq!(c.classify_uncorrected(0.5, -1.0, 0.5), Some(Biome::Snow));
        assert_eq!(c.classify_uncorrected(0.4, 1.0, 0.5), Some(Biome::Alpine));
        assert_eq!(c.classify_uncorrected(0.1, -7.0, 0.3), Some(Biome::Tundra));
        assert_eq!(c.classify_uncorrected(0.1, -7.0, 0.6), Some(Biome::BorealForest));
        assert_eq!(c.classify_uncorrected(0.1, 2.0, 0.5), Some(Biome::Taiga));
        assert_eq!(c.classify_uncorrected(0.1, 10.0, 0.1), Some(Biome::ColdDesert));
        assert_eq!(c.classify_uncorrected(0.1, 10.0, 0.3), Some(Biome::Grassland));
        assert_eq!(c.classify_uncorrected(0.1, 10.0, 0.6), Some(Biome::TemperateForest));
        assert_eq!(c.classify_uncorrected(0.1, 10.0, 0.9), Some(Biome::TemperateRainforest));
        assert_eq!(c.classify_uncorrected(0.1, 20.0, 0.1), Some(Biome::Desert));
        assert_eq!(c.classify_uncorrected(0.1, 20.0, 0.3), Some(Biome::Savanna));
        assert_eq!(c.classify_uncorrected(0.1, 20.0, 0.6), Some(Biome::SubtropicalForest));
        assert_eq!(c.classify_uncorrected(0.1, 28.0, 0.6), Some(Biome::Rainforest));
    }

    #[test]
    fn test_correction_warms_midlatitudes_and_keeps_poles_cold() {
        let c = classifier();
        let params = crate::climate::ClimateParams::default();

        let mid = params.linear_baseline(0.45);
        assert!(c.corrected_temperature(mid, 0.45) > mid + 5.0);

        // Equator and poles keep their baseline
        assert!((c.corrected_temperature(30.0, 0.0) - 30.0).abs() < 1e-4);
        assert!((c.corrected_temperature(-30.0, 1.0) + 30.0).abs() < 1e-4);

        // Anomalies shrink toward the poles
        let warm_pole = c.corrected_temperature(-20.0, 1.0);
        assert!((warm_pole - -25.0).abs() < 1e-4);
    }

    #[test]
    fn test_every_biome_has_distinct_char() {
        let mut chars: Vec<char> = Biome::all().iter().map(|b| b.ascii_char()).collect();
        chars.sort_unstable();
        chars.dedup();
        assert_eq!(chars.len(), Biome::all().len());
    }

    #[test]
    fn test_midlatitude_habitability_balance() {
        let config = WorldConfig {
            seed: 42,
            chunk_size: 64,
            bounds: Some(WorldBounds::new(32, 32)),
            ..WorldConfig::default()
        };
        let ctx = GenerationContext::new(config).unwrap();
        let area = ChunkBounds {
            min: ChunkCoord::new(0, 0).origin(64),
            max: ChunkCoord::new(32, 32).origin(64),
        };
        let survey = habitability_survey(&ctx, area, 8, 10);

        assert!(survey.midlatitude_land() > 1000, "too little land sampled");
        let corrected = survey.midlatitude_share();
        let linear = survey.midlatitude_uncorrected_share();
        let minimum = ctx.classifier().params().min_midlatitude_habitable_share;
        assert!(corrected >= minimum, "corrected share {corrected} below {minimum}");
        assert!(corrected > linear, "corrected {corrected} not above linear {linear}");
    }
}
