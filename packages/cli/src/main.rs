#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for drivetime queries.
//!
//! `RUST_LOG` controls log output (`RUST_LOG=info` shows load milestones).

mod report;

use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::{Parser, Subcommand};
use drivetime_isochrone::{build_http_client, service_registry};
use drivetime_isochrone_models::TravelMode;
use drivetime_overlay::{Engine, EngineConfig, QueryRequest, ReferenceData};
use drivetime_prices::{hex, load_prices};
use drivetime_prices_models::JoinStrategy;

#[derive(Parser)]
#[command(name = "drivetime", about = "Travel-time area demographics and prices")]
struct Cli {
    /// Engine config TOML (defaults to the built-in config)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Profile the area reachable from an address
    Query {
        /// Free-text address
        address: String,
        /// Travel mode (walk, bicycle, transit, drive, truck)
        #[arg(long, default_value = "drive")]
        mode: TravelMode,
        /// Travel-time budget in minutes
        #[arg(long, default_value = "15")]
        minutes: u32,
        /// Price join strategy (direct or hex)
        #[arg(long, default_value = "direct")]
        strategy: JoinStrategy,
        /// Write origin, isochrone and fragments as `GeoJSON`
        #[arg(long)]
        geojson: Option<PathBuf>,
        /// Write the result summary as JSON
        #[arg(long)]
        json: Option<PathBuf>,
    },
    /// Run a JSON array of queries concurrently and print their summaries
    Batch {
        /// File holding `[{"address", "mode", "durationSeconds", "strategy"}]`
        requests: PathBuf,
    },
    /// Build hex cells from the price dataset and write them as `GeoJSON`
    Hexbin {
        /// Output path
        output: PathBuf,
        /// H3 resolution (overrides config)
        #[arg(long)]
        resolution: Option<u8>,
        /// Drop cells with this many sales or fewer (overrides config)
        #[arg(long)]
        cutoff: Option<u64>,
    },
    /// List the registered isochrone providers
    Services,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };

    match cli.command {
        Commands::Services => {
            println!("{:<12} {:<24} {:<8} KEY", "ID", "NAME", "ENABLED");
            println!("{}", "-".repeat(60));
            for service in service_registry::all_services() {
                println!(
                    "{:<12} {:<24} {:<8} {}",
                    service.id,
                    service.name,
                    service.enabled,
                    service.provider.api_key_env()
                );
            }
        }
        Commands::Query {
            address,
            mode,
            minutes,
            strategy,
            geojson,
            json,
        } => {
            let engine = connect(&config).await?;
            let request = QueryRequest::new(address, mode, minutes.saturating_mul(60))
                .with_strategy(strategy);

            let start = Instant::now();
            let result = engine.query(&request).await?;
            log::info!("Query finished in {:.1}s", start.elapsed().as_secs_f64());

            print!("{}", report::render(&result.summary()));

            if let Some(path) = geojson {
                write_json(&path, &result.to_geojson()?).await?;
            }
            if let Some(path) = json {
                write_json(&path, &serde_json::to_value(result.summary())?).await?;
            }
        }
        Commands::Batch { requests } => {
            let raw = tokio::fs::read(&requests).await?;
            let requests: Vec<QueryRequest> = serde_json::from_slice(&raw)?;
            let engine = connect(&config).await?;

            let summaries: Vec<serde_json::Value> = engine
                .query_all(&requests)
                .await
                .into_iter()
                .zip(&requests)
                .map(|(result, request)| match result {
                    Ok(result) => serde_json::to_value(result.summary()),
                    Err(e) => {
                        log::error!("Query for '{}' failed: {e}", request.address);
                        Ok(serde_json::json!({
                            "address": request.address,
                            "error": e.to_string(),
                        }))
                    }
                })
                .collect::<Result<_, _>>()?;

            println!("{}", serde_json::to_string_pretty(&summaries)?);
        }
        Commands::Hexbin {
            output,
            resolution,
            cutoff,
        } => {
            let resolution = resolution.unwrap_or(config.hex.resolution);
            let cutoff = cutoff.unwrap_or(config.hex.count_cutoff);

            let raw = tokio::fs::read(&config.data.prices).await?;
            let prices = load_prices(raw.as_slice())?;
            let cells = hex::build(prices.points(), resolution, cutoff)?;
            log::info!(
                "Built {} cells at resolution {resolution} (cutoff {cutoff})",
                cells.len()
            );

            write_json(&output, &hex::to_feature_collection(&cells)?).await?;
        }
    }

    Ok(())
}

async fn connect(config: &EngineConfig) -> Result<Engine, Box<dyn std::error::Error>> {
    let client = build_http_client(&config.transport())?;
    let start = Instant::now();
    let reference = ReferenceData::load(config, &client).await?;
    log::info!(
        "Reference data loaded in {:.1}s: {} units, {} sales",
        start.elapsed().as_secs_f64(),
        reference.units().len(),
        reference.prices().points().len()
    );
    Ok(Engine::connect(config, reference)?)
}

async fn write_json(
    path: &Path,
    value: &serde_json::Value,
) -> Result<(), Box<dyn std::error::Error>> {
    tokio::fs::write(path, serde_json::to_vec_pretty(value)?).await?;
    log::info!("Wrote {}", path.display());
    Ok(())
}
