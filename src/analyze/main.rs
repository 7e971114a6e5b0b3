//! Landmark distance analysis.
//!
//! Computes, for every landmark, the shortest surface distance to each
//! country's land area, reusing results from the previous run where the
//! landmark has not moved.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use landmark_distances::config::Settings;
use landmark_distances::pipeline::{self, RunOptions};

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[derive(Parser, Debug)]
#[command(name = "analyze")]
#[command(about = "Compute landmark-to-country distances")]
struct Args {
    /// Result file; prior distances are read from it, then it is rewritten
    results: PathBuf,

    /// Active landmark list (CSV, optionally .gz/.bz2/.xz/.lzma)
    landmarks: PathBuf,

    /// Political map (GeoJSON FeatureCollection)
    map: PathBuf,

    /// Country merge rules (YAML or TOML)
    rules: PathBuf,

    /// Country code table (ISO_A2, ISO_A3, NAME)
    countrycodes: PathBuf,

    /// Only log warnings and errors; no progress bar
    #[arg(short, long)]
    quiet: bool,

    /// Number of worker threads
    #[arg(short, long, value_parser = clap::value_parser!(u64).range(1..))]
    parallel: Option<u64>,

    /// Round distances to a multiple of this many metres
    #[arg(short, long)]
    resolution: Option<f64>,

    /// Optional TOML settings file
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.quiet { Level::WARN } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(level.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut settings = match &args.config {
        Some(path) => Settings::load_from_file(path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?,
        None => Settings::default(),
    };
    if let Some(n) = args.parallel {
        settings.parallel = usize::try_from(n).context("--parallel out of range")?;
    }
    if let Some(r) = args.resolution {
        settings.resolution = r;
    }

    let opts = RunOptions {
        results: args.results,
        landmarks: args.landmarks,
        map: args.map,
        rules: args.rules,
        countries: args.countrycodes,
        settings,
        show_progress: !args.quiet,
    };

    let summary = pipeline::run(&opts).context("Analysis failed")?;
    if summary.written {
        info!(
            "Done: {} carried over, {} analyzed, {} pairs unresolved",
            summary.already_complete, summary.analyzed, summary.unresolved_pairs
        );
    }
    Ok(())
}
