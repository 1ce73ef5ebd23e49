//! Climate system for temperature and moisture
//! Based on latitude, elevation, a temperature anomaly field and rain shadow

use serde::{Deserialize, Serialize};

use crate::coords::TileCoord;
use crate::noise_fields::Field;
use crate::world::GenerationContext;

// =============================================================================
// CLIMATE PARAMETERS
// =============================================================================

/// Climate shaping parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClimateParams {
    /// Temperature at the equator at sea level (Celsius)
    pub equator_temp: f32,
    /// Temperature at the poles at sea level (Celsius)
    pub pole_temp: f32,
    /// Peak size of the noise anomaly (Celsius)
    pub temperature_noise_amplitude: f32,
    /// Temperature drop per unit of elevation above sea level (Celsius)
    pub lapse_rate: f32,
    /// Moisture lost per unit of elevation climbed from the upwind tile
    pub rain_loss: f32,
}

impl Default for ClimateParams {
    fn default() -> Self {
        Self {
            equator_temp: 30.0,
            pole_temp: -30.0,
            temperature_noise_amplitude: 5.0,
            lapse_rate: 12.0,
            rain_loss: 1.5,
        }
    }
}

impl ClimateParams {
    /// Sea-level temperature of the plain linear equator-to-pole gradient.
    pub fn linear_baseline(&self, latitude: f32) -> f32 {
        self.equator_temp - (self.equator_temp - self.pole_temp) * latitude
    }
}

/// Raw climate values for one tile.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClimateSample {
    /// Celsius, before any latitude correction
    pub temperature: f32,
    /// 0.0-1.0
    pub moisture: f32,
}

// =============================================================================
// TEMPERATURE
// =============================================================================

/// Raw temperature: linear latitude gradient, noise anomaly, lapse rate.
pub fn raw_temperature(ctx: &GenerationContext, tile: TileCoord, elevation: f32) -> f32 {
    let params = &ctx.config().climate;
    let latitude = ctx.latitude(tile.y);
    let anomaly = ctx.fields().sample(Field::Temperature, tile.x, tile.y) as f32
        * params.temperature_noise_amplitude;

    // Lapse rate only applies above sea level
    let height = (elevation - ctx.sea_level()).max(0.0);

    params.linear_baseline(latitude) + anomaly - height * params.lapse_rate
}

// =============================================================================
// MOISTURE
// =============================================================================

/// Moisture before rain shadow: noise, a wet equatorial band, a dry
/// subtropical belt around latitude 0.3 and drying with altitude.
pub fn base_moisture(ctx: &GenerationContext, tile: TileCoord, elevation: f32) -> f32 {
    let latitude = ctx.latitude(tile.y);
    let noise = ctx.fields().sample(Field::Moisture, tile.x, tile.y) as f32;

    let equatorial = 0.3 * (-3.0 * latitude).exp();
    let subtropical_dry = 0.15 * (-(latitude - 0.3).powi(2) / 0.02).exp();
    let altitude_dry = 0.2 * (elevation - ctx.sea_level()).max(0.0);

    (0.8 * noise + equatorial - subtropical_dry - altitude_dry).clamp(0.0, 1.0)
}

/// Final moisture with rain shadow.
///
/// Prevailing wind blows toward -x, so the upwind neighbour is at x + 1.
/// Air arriving from upwind carries that tile's moisture and loses some in
/// proportion to the climb onto this tile. A single upwind step keeps the
/// result a pure function of the coordinate, so it is seamless across chunks.
pub fn moisture(
    ctx: &GenerationContext,
    tile: TileCoord,
    elevation: f32,
    upwind_elevation: f32,
) -> f32 {
    let upwind = tile.offset(1, 0);
    let carried = base_moisture(ctx, upwind, upwind_elevation);
    let own = base_moisture(ctx, tile, elevation);

    let climb = (elevation - upwind_elevation).max(0.0);
    let shadowed = carried - climb * ctx.config().climate.rain_loss;

    (0.5 * (own + shadowed)).clamp(0.0, 1.0)
}

/// Temperature and moisture for one tile given its and its upwind
/// neighbour's elevation.
pub fn sample_climate(
    ctx: &GenerationContext,
    tile: TileCoord,
    elevation: f32,
    upwind_elevation: f32,
) -> ClimateSample {
    ClimateSample {
        temperature: raw_temperature(ctx, tile, elevation),
        moisture: moisture(ctx, tile, elevation, upwind_elevation),
    }
}
