//! Earthquake catalog classification.
//!
//! Reads a catalog CSV, assigns every event to the region containing its
//! epicenter and writes the catalog back out with a region column.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use hashbrown::{HashMap, HashSet};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use regionjoin::catalog::{load_regions, Catalog};
use regionjoin::config::RunConfig;
use regionjoin::{IndexStrategy, MalformedPolicy, PipService, RegionSpec, OUTSIDE_LABEL};

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[derive(Parser, Debug)]
#[command(name = "classify")]
#[command(about = "Assign catalog events to the region containing them")]
struct Args {
    /// Catalog CSV (optionally .gz)
    #[arg(short, long)]
    file: PathBuf,

    /// Region CSV with a name column and a WKT column
    #[arg(short, long)]
    regions: Option<PathBuf>,

    /// TOML run configuration
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output CSV, stdout when omitted
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Latitude column in the catalog
    #[arg(long, default_value = "LATITUD")]
    lat_column: String,

    /// Longitude column in the catalog
    #[arg(long, default_value = "LONGITUD")]
    lon_column: String,

    /// Region name column in the region CSV
    #[arg(long, default_value = "NOMBDEP")]
    name_column: String,

    /// Geometry column in the region CSV
    #[arg(long, default_value = "WKT")]
    wkt_column: String,

    /// Label column added to the output
    #[arg(long, default_value = "DEPARTAMENTO")]
    label_column: String,

    /// Leave out events that fall outside every region
    #[arg(long)]
    drop_outside: bool,

    /// Worker threads (default: all cores, capped by --max-workers)
    #[arg(short, long)]
    workers: Option<usize>,

    /// Upper bound on worker threads (default: all cores)
    #[arg(long)]
    max_workers: Option<usize>,

    /// Fail instead of skipping regions with malformed geometry
    #[arg(long)]
    strict: bool,

    /// Test every region linearly instead of using the R-tree
    #[arg(long)]
    scan: bool,

    /// Write per-call statistics as JSON to this file
    #[arg(long)]
    stats_json: Option<PathBuf>,
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {:#}", e);
        eprintln!("The catalog could not be classified; no map data was produced.");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();

    info!("regionjoin classify");
    info!("Catalog: {}", args.file.display());

    let mut run_config = match &args.config {
        Some(path) => RunConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => RunConfig::default(),
    };
    apply_overrides(&args, &mut run_config);

    let regions = resolve_regions(&args, &run_config)?;
    if regions.is_empty() {
        warn!("No regions given; every event will be labeled '{}'", OUTSIDE_LABEL);
    }

    let catalog = Catalog::load(&args.file, &args.lat_column, &args.lon_column)?;

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?,
    );
    spinner.enable_steady_tick(Duration::from_millis(120));
    spinner.set_message(format!(
        "Classifying {} events against {} regions...",
        catalog.points.len(),
        regions.len()
    ));

    let started = Instant::now();
    let service = PipService::new(run_config.engine.clone());
    let result = service
        .classify(&catalog.points, &regions)
        .context("Classification engine failed")?;
    spinner.finish_and_clear();

    for skipped in result.skipped() {
        warn!(
            "Region '{}' (#{}) was skipped: {}",
            skipped.name, skipped.order, skipped.reason
        );
    }

    let written = write_output(&args, &catalog, result.labels())?;

    print_summary(&regions, result.labels());
    info!(
        "Wrote {} row(s) in {:.3}s ({} dropped for missing coordinates)",
        written,
        started.elapsed().as_secs_f64(),
        catalog.dropped
    );

    if let Some(path) = &args.stats_json {
        let json = serde_json::to_string_pretty(result.stats())?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }

    Ok(())
}

fn apply_overrides(args: &Args, run_config: &mut RunConfig) {
    let engine = &mut run_config.engine;
    if args.workers.is_some() {
        engine.workers = args.workers;
    }
    if args.max_workers.is_some() {
        engine.max_workers = args.max_workers;
    }
    if args.strict {
        engine.malformed = MalformedPolicy::Abort;
    }
    if args.scan {
        engine.index = IndexStrategy::Scan;
    }
}

fn resolve_regions(args: &Args, run_config: &RunConfig) -> Result<Vec<RegionSpec>> {
    if let Some(path) = &args.regions {
        return load_regions(path, &args.name_column, &args.wkt_column);
    }
    if let Some(path) = &run_config.regions_file {
        // Relative paths in the config are relative to the config file
        let path = match &args.config {
            Some(config) if path.is_relative() => config
                .parent()
                .unwrap_or_else(|| Path::new("."))
                .join(path),
            _ => path.clone(),
        };
        return load_regions(&path, &args.name_column, &args.wkt_column);
    }
    if args.config.is_none() {
        anyhow::bail!("No regions given: pass --regions or a --config with regions");
    }
    Ok(run_config.regions.clone())
}

fn write_output(args: &Args, catalog: &Catalog, labels: &[String]) -> Result<usize> {
    let keep = |label: &str| !(args.drop_outside && label == OUTSIDE_LABEL);
    match &args.output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            catalog.write_labeled(BufWriter::new(file), &args.label_column, labels, keep)
        }
        None => {
            let stdout = io::stdout();
            let mut lock = stdout.lock();
            let n = catalog.write_labeled(&mut lock, &args.label_column, labels, keep)?;
            lock.flush()?;
            Ok(n)
        }
    }
}

fn print_summary(regions: &[RegionSpec], labels: &[String]) {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for label in labels {
        *counts.entry(label.as_str()).or_default() += 1;
    }

    let mut seen: HashSet<&str> = HashSet::new();
    for region in regions {
        if !seen.insert(region.name.as_str()) {
            continue;
        }
        let n = counts.get(region.name.as_str()).copied().unwrap_or(0);
        info!("  {}: {}", region.name, n);
    }
    info!(
        "  {}: {}",
        OUTSIDE_LABEL,
        counts.get(OUTSIDE_LABEL).copied().unwrap_or(0)
    );
}
