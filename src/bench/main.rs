//! Throughput comparison: one worker against the full pool.
//!
//! The catalog is replicated `--factor` times in memory to simulate larger
//! datasets, then classified sequentially and in parallel.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use regionjoin::catalog::{load_regions, Catalog};
use regionjoin::{EngineConfig, GeoPoint, IndexStrategy, PipService, RegionSpec};

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[derive(Parser, Debug)]
#[command(name = "bench")]
#[command(about = "Compare single-worker and parallel classification times")]
struct Args {
    /// Catalog CSV (optionally .gz)
    #[arg(short, long)]
    file: PathBuf,

    /// Region CSV with a name column and a WKT column
    #[arg(short, long)]
    regions: PathBuf,

    /// Dataset size multiplier
    #[arg(long, default_value = "5")]
    factor: usize,

    /// Worker threads for the parallel run (default and maximum: all cores)
    #[arg(short, long)]
    workers: Option<usize>,

    /// Timed repetitions per configuration; the fastest is kept
    #[arg(long, default_value = "3")]
    repeat: usize,

    /// Improvement over the single-worker run to report as reached, in percent
    #[arg(long, default_value = "75")]
    target: f64,

    #[arg(long, default_value = "LATITUD")]
    lat_column: String,

    #[arg(long, default_value = "LONGITUD")]
    lon_column: String,

    #[arg(long, default_value = "NOMBDEP")]
    name_column: String,

    #[arg(long, default_value = "WKT")]
    wkt_column: String,

    /// Use the linear scan instead of the R-tree
    #[arg(long)]
    scan: bool,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Serialize)]
struct BenchReport {
    points: usize,
    regions: usize,
    factor: usize,
    workers: usize,
    sequential_secs: f64,
    parallel_secs: f64,
    improvement_pct: f64,
    speedup: f64,
    target_pct: f64,
    target_reached: bool,
}

fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();
    anyhow::ensure!(args.factor >= 1, "--factor must be at least 1");
    anyhow::ensure!(args.repeat >= 1, "--repeat must be at least 1");

    let catalog = Catalog::load(&args.file, &args.lat_column, &args.lon_column)?;
    let regions = load_regions(&args.regions, &args.name_column, &args.wkt_column)?;
    let points = inflate(&catalog.points, args.factor);
    info!(
        "Benchmarking {} points ({}x) against {} regions",
        points.len(),
        args.factor,
        regions.len()
    );

    let index = if args.scan {
        IndexStrategy::Scan
    } else {
        IndexStrategy::Rtree
    };
    let parallel_config = EngineConfig {
        workers: args.workers,
        index,
        ..Default::default()
    };
    let workers = parallel_config.resolve_workers();

    let pb = ProgressBar::new((args.repeat * 2) as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("#>-"),
    );

    pb.set_message("1 worker");
    let sequential = time_best(
        &PipService::new(EngineConfig::default().with_workers(1).with_index(index)),
        &points,
        &regions,
        args.repeat,
        &pb,
    )?;

    pb.set_message(format!("{} workers", workers));
    let parallel = time_best(
        &PipService::new(parallel_config),
        &points,
        &regions,
        args.repeat,
        &pb,
    )?;
    pb.finish_and_clear();

    let report = build_report(&args, points.len(), regions.len(), workers, sequential, parallel);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Points:        {} ({}x)", report.points, report.factor);
        println!("Regions:       {}", report.regions);
        println!("1 worker:      {:.3} s", report.sequential_secs);
        println!(
            "{} worker(s):  {:.3} s",
            report.workers, report.parallel_secs
        );
        println!("Speed-up:      {:.2}x", report.speedup);
        println!("Improvement:   {:.2}%", report.improvement_pct);
        if report.target_reached {
            println!("Target of {:.0}% reached", report.target_pct);
        } else {
            println!("Target of {:.0}% NOT reached", report.target_pct);
        }
    }

    if !report.target_reached {
        warn!(
            "Improvement {:.2}% is below the {:.0}% target",
            report.improvement_pct, report.target_pct
        );
    }

    Ok(())
}

fn inflate(points: &[GeoPoint], factor: usize) -> Vec<GeoPoint> {
    let mut out = Vec::with_capacity(points.len() * factor);
    for _ in 0..factor {
        out.extend_from_slice(points);
    }
    out
}

fn time_best(
    service: &PipService,
    points: &[GeoPoint],
    regions: &[RegionSpec],
    repeat: usize,
    pb: &ProgressBar,
) -> Result<Duration> {
    let mut best = Duration::MAX;
    for _ in 0..repeat {
        let started = Instant::now();
        let result = service
            .classify(points, regions)
            .context("Classification engine failed")?;
        best = best.min(started.elapsed());
        anyhow::ensure!(result.len() == points.len(), "Result length mismatch");
        pb.inc(1);
    }
    Ok(best)
}

fn build_report(
    args: &Args,
    points: usize,
    regions: usize,
    workers: usize,
    sequential: Duration,
    parallel: Duration,
) -> BenchReport {
    let sequential_secs = sequential.as_secs_f64();
    let parallel_secs = parallel.as_secs_f64();
    let (improvement_pct, speedup) = if sequential_secs > 0.0 && parallel_secs > 0.0 {
        (
            (1.0 - parallel_secs / sequential_secs) * 100.0,
            sequential_secs / parallel_secs,
        )
    } else {
        (0.0, 1.0)
    };

    BenchReport {
        points,
        regions,
        factor: args.factor,
        workers,
        sequential_secs,
        parallel_secs,
        improvement_pct,
        speedup,
        target_pct: args.target,
        target_reached: improvement_pct >= args.target,
    }
}
