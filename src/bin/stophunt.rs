use std::{fs, path::PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use stophunt::prelude::*;

/// Scan CSV bar files for bull and bear traps
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// CSV files, one instrument each (instrument = file stem)
    files: Vec<PathBuf>,

    /// JSON configuration file; missing fields keep their defaults
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the minimum confidence of reported signals
    #[arg(long)]
    min_confidence: Option<f64>,

    /// Print signals as JSON lines
    #[arg(long)]
    json: bool,

    /// Also print liquidity zones and the top volume clusters
    #[arg(long)]
    levels: bool,

    /// List tunable parameters and exit
    #[arg(long)]
    list_params: bool,

    /// Debug logging (overridden by RUST_LOG)
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    if args.list_params {
        for p in HuntConfig::param_meta() {
            println!(
                "{:<22} {:<7} default {:<7} [{}, {}]  {}",
                p.name,
                format!("{:?}", p.param_type),
                p.default,
                p.range.0,
                p.range.1,
                p.description
            );
        }
        return Ok(());
    }

    if args.files.is_empty() {
        bail!("no input files given");
    }

    let config = match &args.config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config: {:?}", path))?;
            HuntConfig::from_json(&text)
                .with_context(|| format!("Invalid config: {:?}", path))?
        }
        None => HuntConfig::default(),
    };

    let mut builder = EngineBuilder::new().config(config);
    if let Some(min) = args.min_confidence {
        builder = builder.min_confidence(min);
    }
    let engine = builder.build().context("Failed to build engine")?;

    let (watchlist, load_errors) = load_watchlist(args.files.as_slice());

    info!("Scanning {} instruments", watchlist.len());
    let pairs: Vec<(&str, &BarSeries)> = watchlist
        .iter()
        .map(|(instrument, series)| (instrument.as_str(), series))
        .collect();
    let (results, scan_errors) = scan_parallel(&engine, pairs);
    let errors: Vec<ScanError> = load_errors.into_iter().chain(scan_errors).collect();

    for result in &results {
        if args.levels && !args.json {
            print_levels(&result.analysis);
        }
        for signal in result.signals() {
            if args.json {
                println!("{}", serde_json::to_string(signal)?);
            } else {
                print_signal(signal);
            }
        }
    }

    for e in &errors {
        eprintln!("{}: {}", e.instrument, e.error);
    }

    if results.is_empty() {
        bail!("every instrument failed");
    }
    Ok(())
}

fn print_signal(signal: &Signal) {
    let target = signal
        .target_price
        .map_or_else(|| "-".to_string(), |t| format!("{t:.4}"));
    let cluster = signal
        .cluster_rank
        .map_or_else(|| "-".to_string(), |r| r.to_string());
    println!(
        "{:<10} {:>12} {:<9} entry {:>10.4} stop {:>10.4} target {:>10} conf {:.3} cluster {}",
        signal.instrument,
        signal.timestamp,
        signal.kind,
        signal.entry_price,
        signal.stop_price,
        target,
        signal.confidence,
        cluster
    );
}

fn print_levels(analysis: &Analysis) {
    println!("== {} ==", analysis.instrument);
    for zone in &analysis.zones {
        println!(
            "  {:?} {:.4} strength {:.3} touches {}",
            zone.kind, zone.price, zone.strength, zone.touch_count
        );
    }
    for cluster in analysis.profile.top(3) {
        println!(
            "  cluster #{} {:.4}-{:.4} volume {}",
            cluster.rank, cluster.price_low, cluster.price_high, cluster.aggregated_volume
        );
    }
}
