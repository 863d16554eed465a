use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use sqlx::SqlitePool;
use tracing::info;

use makan_match::database::{connect_and_migrate, current_version, latest_version, rebuild, run_script};
use makan_match::enrich::{
    assign_categories, assign_prices, assign_regions, enrich_from_overpass, import_geojson,
    OverpassClient,
};
use makan_match::env::{load_environment, Settings};
use makan_match::telemetry::{init_tracing, shutdown_telemetry};

#[derive(Parser, Debug)]
#[command(author, version, about = "Bootstrap and enrich the restaurant database")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the database if needed and apply pending migrations
    Init,
    /// Delete the database file and rebuild the schema from scratch
    Reset,
    /// Run a SQL script, e.g. seed data
    Seed { script: PathBuf },
    /// Append restaurants from one or more GeoJSON exports
    Import {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Assign regions from coordinates
    Regions,
    /// Assign price ranges from cuisine
    Prices,
    /// Assign categories from names
    Categories,
    /// Look up unenriched restaurants on OpenStreetMap
    Overpass {
        #[arg(long)]
        batch_size: Option<i64>,
        #[arg(long)]
        max_batches: Option<usize>,
    },
    /// Print schema version and enrichment progress
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if let Err(e) = load_environment() {
        eprintln!("Failed to load environment files: {}", e);
    }
    init_tracing();

    let mut settings = Settings::from_env().context("invalid configuration")?;

    let pool = match &args.command {
        Command::Reset => rebuild(&settings.database_url)
            .await
            .with_context(|| format!("failed to rebuild {}", settings.database_url))?,
        _ => connect_and_migrate(&settings.database_url)
            .await
            .with_context(|| format!("failed to open {}", settings.database_url))?,
    };

    let result = run(args.command, &pool, &mut settings).await;

    pool.close().await;
    shutdown_telemetry();

    result
}

async fn run(command: Command, pool: &SqlitePool, settings: &mut Settings) -> anyhow::Result<()> {
    match command {
        Command::Init | Command::Reset => {
            let version = current_version(pool).await?;
            info!(version, "Database ready");
        }
        Command::Seed { script } => {
            run_script(pool, &script)
                .await
                .with_context(|| format!("failed to run {}", script.display()))?;
        }
        Command::Import { files } => {
            let mut total = 0;
            for file in &files {
                let count = import_geojson(pool, file)
                    .await
                    .with_context(|| format!("failed to import {}", file.display()))?;
                total += count;
            }
            info!(total, files = files.len(), "Import finished");
        }
        Command::Regions => {
            let updated = assign_regions(pool).await.context("region assignment failed")?;
            info!(updated, "Regions assigned");
        }
        Command::Prices => {
            let updated = assign_prices(pool).await.context("price assignment failed")?;
            info!(updated, "Price ranges assigned");
        }
        Command::Categories => {
            let updated = assign_categories(pool)
                .await
                .context("category assignment failed")?;
            info!(updated, "Categories assigned");
        }
        Command::Overpass {
            batch_size,
            max_batches,
        } => {
            if let Some(size) = batch_size {
                anyhow::ensure!(size > 0, "--batch-size must be positive");
                settings.overpass.batch_size = size;
            }
            let client = OverpassClient::new(&settings.overpass)?;
            let summary = enrich_from_overpass(pool, &client, &settings.overpass, max_batches)
                .await
                .context("Overpass enrichment failed")?;
            println!(
                "processed {} | matched {} | no match {} | failed {}",
                summary.processed, summary.matched, summary.no_match, summary.failed
            );
        }
        Command::Status => print_status(pool).await?,
    }

    Ok(())
}

async fn print_status(pool: &SqlitePool) -> anyhow::Result<()> {
    let version = current_version(pool).await?;
    println!("schema version: {} of {}", version, latest_version());

    let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM restaurants")
        .fetch_one(pool)
        .await?;
    println!("restaurants: {}", total);

    for column in ["region", "price_range", "category", "cuisine"] {
        let sql = format!("SELECT COUNT(*) FROM restaurants WHERE {} IS NOT NULL", column);
        let filled = sqlx::query_scalar::<_, i64>(&sql).fetch_one(pool).await?;
        println!("  with {}: {}", column, filled);
    }

    let statuses = sqlx::query_as::<_, (Option<String>, i64)>(
        "SELECT osm_status, COUNT(*) FROM restaurants GROUP BY osm_status ORDER BY osm_status",
    )
    .fetch_all(pool)
    .await?;
    for (status, count) in statuses {
        println!(
            "  osm_status {}: {}",
            status.as_deref().unwrap_or("pending"),
            count
        );
    }

    Ok(())
}
