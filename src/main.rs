use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use terrastream::ascii::{self, AsciiMode};
use terrastream::coords::{ChunkBounds, ChunkCoord, TileCoord};
use terrastream::{ChunkManager, WorldConfig, WorldError};

#[derive(Parser, Debug)]
#[command(name = "terrastream")]
#[command(about = "Stream a deterministic tile world around a chunk and print an ASCII preview")]
struct Args {
    /// JSON world configuration (defaults are used for missing fields)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// World seed (overrides the config file)
    #[arg(short, long)]
    seed: Option<u64>,

    /// Tiles per chunk side (overrides the config file)
    #[arg(long)]
    chunk_size: Option<u32>,

    /// Active radius in chunks (overrides the config file)
    #[arg(short, long)]
    radius: Option<u32>,

    /// Chunk X of the active center
    #[arg(long, default_value = "0", allow_hyphen_values = true)]
    center_x: i32,

    /// Chunk Y of the active center
    #[arg(long, default_value = "0", allow_hyphen_values = true)]
    center_y: i32,

    /// Persist evicted chunks under this directory
    #[arg(long)]
    storage_dir: Option<PathBuf>,

    /// Worker threads for background generation (0 = one per core)
    #[arg(short, long)]
    workers: Option<usize>,

    /// Preview mode: biome, height, temperature, moisture or water
    #[arg(short, long, default_value = "biome")]
    mode: String,

    /// Sample every Nth tile in the preview
    #[arg(long, default_value = "2")]
    step: usize,

    /// Write the effective configuration as JSON and exit
    #[arg(long)]
    save_config: Option<PathBuf>,
}

fn build_config(args: &Args) -> Result<WorldConfig, WorldError> {
    let mut config = match &args.config {
        Some(path) => WorldConfig::from_json_file(path)?,
        None => WorldConfig::default(),
    };

    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    if let Some(size) = args.chunk_size {
        config.chunk_size = size;
    }
    if let Some(radius) = args.radius {
        config.active_radius = radius;
    }
    if let Some(workers) = args.workers {
        config.runtime.worker_threads = workers;
    }
    if args.storage_dir.is_some() {
        config.runtime.storage_dir = args.storage_dir.clone();
    }

    config.validate()?;
    Ok(config)
}

/// Tile rectangle covered by the loaded area.
fn area_bounds(manager: &ChunkManager, chunks: &[ChunkCoord]) -> Option<ChunkBounds> {
    let size = manager.context().chunk_size();
    let min_x = chunks.iter().map(|c| c.x).min()?;
    let min_y = chunks.iter().map(|c| c.y).min()?;
    let max_x = chunks.iter().map(|c| c.x).max()?;
    let max_y = chunks.iter().map(|c| c.y).max()?;
    Some(ChunkBounds {
        min: ChunkCoord::new(min_x, min_y).origin(size),
        max: ChunkCoord::new(max_x + 1, max_y + 1).origin(size),
    })
}

fn run(args: Args) -> Result<(), WorldError> {
    let mode = AsciiMode::from_name(&args.mode).unwrap_or_else(|| {
        eprintln!("Unknown mode '{}', using biome", args.mode);
        AsciiMode::Biome
    });

    let config = build_config(&args)?;

    if let Some(path) = &args.save_config {
        let json = config.to_json_string()?;
        std::fs::write(path, json).map_err(terrastream::ConfigError::from)?;
        println!("Configuration written to {}", path.display());
        return Ok(());
    }

    println!("Streaming world with seed: {}", config.seed);
    println!("Chunk size: {} tiles", config.chunk_size);
    if let Some(bounds) = config.bounds {
        println!("World bounds: {}x{} chunks", bounds.width_chunks, bounds.height_chunks);
    } else {
        println!("World bounds: unbounded");
    }

    let radius = config.active_radius;
    let manager = ChunkManager::new(config)?;
    let center = ChunkCoord::new(args.center_x, args.center_y);

    let update = manager.recenter(center);
    println!(
        "Active area around {} (radius {}): {} chunks scheduled",
        center, radius, update.scheduled
    );

    // Block on each chunk of the area so the preview sees a complete region
    let wanted: Vec<ChunkCoord> = center
        .square_around(radius)
        .filter(|c| manager.context().contains_chunk(*c))
        .collect();
    let mut tiles = Vec::new();
    let mut river_count = 0;
    for &coord in &wanted {
        let chunk = manager.ensure_loaded(coord)?;
        river_count += chunk.rivers.len();
        for (x, y, _) in chunk.tiles.iter() {
            let tile = chunk.coord.origin(chunk.size()).offset(x as i64, y as i64);
            tiles.push(manager.query_tile(tile)?);
        }
    }
    println!("Loaded {} chunks ({} tiles)", wanted.len(), tiles.len());

    let water = manager.water_body_stats();
    println!(
        "Water bodies: {} oceans ({} tiles), {} lakes ({} tiles, {} inland seas)",
        water.ocean_count, water.ocean_tiles, water.lake_count, water.lake_tiles, water.inland_seas
    );
    if water.lake_count > 0 {
        println!(
            "Lake sizes: smallest {}, largest {}, average {:.1}",
            water.smallest_lake, water.largest_lake, water.avg_lake_size
        );
    }
    println!("River paths through area: {}", river_count);

    println!("\nBiome distribution:");
    let total = tiles.len().max(1);
    for (biome, count) in ascii::calculate_biome_stats(&tiles) {
        println!(
            "  {:<22} {:>7} ({:.1}%)",
            biome.display_name(),
            count,
            100.0 * count as f64 / total as f64
        );
    }

    if let Some(area) = area_bounds(&manager, &wanted) {
        println!("\n{} preview from {} to {}:", mode.name(), area.min, TileCoord::new(area.max.x - 1, area.max.y - 1));
        print!("{}", ascii::render_ascii_map(&manager, area, args.step, mode)?);
        match mode {
            AsciiMode::Biome => print!("{}", ascii::biome_legend()),
            AsciiMode::Height => print!("{}", ascii::height_legend()),
            _ => {}
        }
    }

    println!("\nCache: {}", manager.stats().summary());
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
