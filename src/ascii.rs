//! ASCII rendering of streamed regions
//!
//! Renders tiles served by a `ChunkManager` as text, one character per
//! sampled tile.

use std::collections::BTreeMap;

use crate::biomes::Biome;
use crate::chunk::{ChunkManager, Tile};
use crate::coords::{ChunkBounds, TileCoord};
use crate::error::WorldError;
use crate::hydrology::WaterBodyKind;

/// ASCII rendering modes
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AsciiMode {
    /// Show biome characters
    Biome,
    /// Show elevation gradient
    Height,
    /// Show temperature gradient
    Temperature,
    /// Show moisture gradient
    Moisture,
    /// Show resolved water kinds and rivers only
    Water,
}

impl AsciiMode {
    pub fn name(&self) -> &'static str {
        match self {
            AsciiMode::Biome => "Biome",
            AsciiMode::Height => "Height",
            AsciiMode::Temperature => "Temperature",
            AsciiMode::Moisture => "Moisture",
            AsciiMode::Water => "Water",
        }
    }

    pub fn all() -> &'static [AsciiMode] {
        &[
            AsciiMode::Biome,
            AsciiMode::Height,
            AsciiMode::Temperature,
            AsciiMode::Moisture,
            AsciiMode::Water,
        ]
    }

    pub fn from_name(name: &str) -> Option<AsciiMode> {
        AsciiMode::all()
            .iter()
            .copied()
            .find(|m| m.name().eq_ignore_ascii_case(name))
    }
}

/// Get ASCII character for elevation (11-level gradient over [-1, 1])
pub fn height_char(elevation: f32) -> char {
    const CHARS: &[char] = &['~', '.', '-', '=', '+', '*', '#', '%', '^', 'A', 'M'];
    let normalized = ((elevation + 1.0) / 2.0).clamp(0.0, 1.0);
    let idx = (normalized * (CHARS.len() - 1) as f32) as usize;
    CHARS[idx.min(CHARS.len() - 1)]
}

/// Get ASCII character for temperature
pub fn temperature_char(temp: f32) -> char {
    // -30°C to +30°C
    const CHARS: &[char] = &['#', '=', '-', '.', ',', ';', ':', '+', '*', '@'];
    let normalized = ((temp + 30.0) / 60.0).clamp(0.0, 1.0);
    let idx = (normalized * (CHARS.len() - 1) as f32) as usize;
    CHARS[idx.min(CHARS.len() - 1)]
}

/// Get ASCII character for moisture
pub fn moisture_char(moisture: f32) -> char {
    const CHARS: &[char] = &['_', '.', '-', ':', ';', '=', '+', '#', '%', '~'];
    let idx = (moisture.clamp(0.0, 1.0) * (CHARS.len() - 1) as f32) as usize;
    CHARS[idx.min(CHARS.len() - 1)]
}

fn water_char(tile: &Tile) -> char {
    match (tile.biome, tile.water_kind) {
        (Biome::River, _) => '=',
        (_, Some(WaterBodyKind::Ocean)) => '~',
        (_, Some(WaterBodyKind::Lake)) => 'o',
        _ => ' ',
    }
}

pub fn tile_char(tile: &Tile, mode: AsciiMode) -> char {
    match mode {
        AsciiMode::Biome => tile.biome.ascii_char(),
        AsciiMode::Height => height_char(tile.elevation),
        AsciiMode::Temperature => temperature_char(tile.temperature),
        AsciiMode::Moisture => moisture_char(tile.moisture),
        AsciiMode::Water => water_char(tile),
    }
}

/// Render a tile rectangle, sampling every `step` tiles. Loads chunks as needed.
pub fn render_ascii_map(
    manager: &ChunkManager,
    area: ChunkBounds,
    step: usize,
    mode: AsciiMode,
) -> Result<String, WorldError> {
    let step = step.max(1);
    let mut result = String::new();

    for y in (area.min.y..area.max.y).step_by(step) {
        for x in (area.min.x..area.max.x).step_by(step) {
            let tile = manager.query_tile(TileCoord::new(x, y))?;
            result.push(tile_char(&tile, mode));
        }
        result.push('\n');
    }

    Ok(result)
}

/// Generate legend for biome characters
pub fn biome_legend() -> String {
    let mut legend = String::from("=== BIOME LEGEND ===\n");
    for row in Biome::all().chunks(4) {
        legend.push(' ');
        for biome in row {
            legend.push_str(&format!(" {} {:<22}", biome.ascii_char(), biome.display_name()));
        }
        legend.push('\n');
    }
    legend
}

/// Generate height legend
pub fn height_legend() -> String {
    "=== HEIGHT LEGEND ===\n\
     Deep ocean → High peaks:\n\
     ~ . - = + * # % ^ A M\n\
     (-1.0)          (+1.0)\n"
        .to_string()
}

/// Count tiles per biome
pub fn calculate_biome_stats<'a>(tiles: impl IntoIterator<Item = &'a Tile>) -> BTreeMap<Biome, usize> {
    let mut stats = BTreeMap::new();
    for tile in tiles {
        *stats.entry(tile.biome).or_insert(0) += 1;
    }
    stats
}
