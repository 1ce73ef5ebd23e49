//! Survey habitable land per latitude band, with and without the
//! latitude correction applied to the biome classifier.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use terrastream::biomes::{habitability_survey, MIDLATITUDE_RANGE};
use terrastream::coords::{ChunkBounds, TileCoord};
use terrastream::{GenerationContext, WorldConfig, WorldError};

#[derive(Parser, Debug)]
#[command(name = "biome_survey")]
#[command(about = "Compare habitable land share per latitude band")]
struct Args {
    /// JSON world configuration
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// World seed (overrides the config file)
    #[arg(short, long)]
    seed: Option<u64>,

    /// Sample every Nth tile on both axes
    #[arg(long, default_value = "4")]
    stride: usize,

    /// Number of latitude bands
    #[arg(short, long, default_value = "10")]
    bands: usize,

    /// Half-width in tiles of the surveyed strip when the world is unbounded
    #[arg(long, default_value = "2048")]
    half_width: i64,
}

/// Whole world when bounded, otherwise a strip from pole to pole.
fn survey_area(ctx: &GenerationContext, half_width: i64) -> ChunkBounds {
    let config = ctx.config();
    match config.bounds {
        Some(bounds) => ChunkBounds {
            min: TileCoord::new(0, 0),
            max: TileCoord::new(
                bounds.width_tiles(config.chunk_size),
                bounds.height_tiles(config.chunk_size),
            ),
        },
        None => {
            let pole = config.pole_distance as i64;
            ChunkBounds {
                min: TileCoord::new(-half_width, -pole),
                max: TileCoord::new(half_width, pole + 1),
            }
        }
    }
}

fn run(args: Args) -> Result<(), WorldError> {
    let mut config = match &args.config {
        Some(path) => WorldConfig::from_json_file(path)?,
        None => WorldConfig::default(),
    };
    if let Some(seed) = args.seed {
        config.seed = seed;
    }

    let ctx = GenerationContext::new(config)?;
    let area = survey_area(&ctx, args.half_width.max(1));
    println!(
        "=== HABITABILITY SURVEY seed={} area={}..{} stride={} ===",
        ctx.config().seed,
        area.min,
        area.max,
        args.stride
    );

    let survey = habitability_survey(&ctx, area, args.stride, args.bands);

    println!("{:>13} {:>9} {:>11} {:>13}", "latitude", "land", "corrected", "uncorrected");
    for band in &survey.bands {
        println!(
            "{:>5.2}..{:<5.2} {:>9} {:>10.1}% {:>12.1}%",
            band.min_latitude,
            band.max_latitude,
            band.land,
            band.share() * 100.0,
            band.uncorrected_share() * 100.0
        );
    }

    let (lo, hi) = MIDLATITUDE_RANGE;
    println!();
    println!("Sampled land tiles: {}", survey.total_land());
    println!(
        "Mid-latitudes ({lo:.2}..{hi:.2}): {} land tiles, {:.1}% habitable ({:.1}% without correction)",
        survey.midlatitude_land(),
        survey.midlatitude_share() * 100.0,
        survey.midlatitude_uncorrected_share() * 100.0
    );
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
