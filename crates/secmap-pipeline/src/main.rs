//! secmap - census-section map data pipeline

use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use secmap_common::logging::{init_logging, LogConfig, LogLevel};
use secmap_pipeline::{convert, merge, publish, render, sections, storage};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "secmap")]
#[command(author, version, about = "Census-section tourist housing map pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Parser, Debug)]
enum Command {
    /// Convert the Excel tourist housing release to CSV
    Convert {
        /// Input workbook (.xlsx)
        input: PathBuf,

        /// Sheet to convert
        #[arg(short, long, default_value = convert::DEFAULT_SHEET)]
        sheet: String,

        /// Output CSV path
        #[arg(short, long, default_value = "data/input/secciones.csv")]
        output: PathBuf,
    },

    /// Describe a shapefile bundle: columns, CRS, candidate join columns
    Inspect {
        /// Shapefile path (.shp)
        shapefile: PathBuf,

        /// Sample values to show per candidate join column
        #[arg(short, long, default_value_t = 5)]
        sample: usize,
    },

    /// Merge the shapefile with the CSV and write shapefile + GeoJSON
    Merge {
        /// Input shapefile (.shp)
        #[arg(long, default_value = "data/input/seccionado_2024/SECC_CE_20240101.shp")]
        shapefile: PathBuf,

        /// Input CSV with the CUSEC column
        #[arg(long, default_value = "data/input/secciones.csv")]
        csv: PathBuf,

        /// Output directory
        #[arg(short, long, default_value = "data/output")]
        output: PathBuf,

        /// Simplification tolerance in degrees
        #[arg(long, default_value_t = 0.0001)]
        tolerance: f64,

        /// Publish the merged GeoJSON to object storage
        #[arg(long)]
        publish: bool,

        /// Key prefix for the timestamped object
        #[arg(long, default_value = "secciones_with_shapes")]
        prefix: String,

        /// Fixed key for the always-overwritten latest object
        #[arg(long, default_value = "secciones_latest.geojson")]
        latest_key: String,

        /// Pointer file destinations (defaults to the pipeline and webapp
        /// locations)
        #[arg(long = "pointer", value_name = "PATH")]
        pointer_paths: Vec<PathBuf>,
    },

    /// Render the merged GeoJSON as a PNG choropleth and print statistics
    Render {
        /// Merged GeoJSON path
        #[arg(long, default_value = "data/output/secciones_with_shapes.geojson")]
        input: PathBuf,

        /// Output PNG path
        #[arg(short, long, default_value = "data/output/tourist_accommodations_map.png")]
        output: PathBuf,

        #[arg(long, default_value_t = 1200)]
        width: u32,

        #[arg(long, default_value_t = 1000)]
        height: u32,
    },

    /// List published objects in the bucket
    List {
        /// Restrict to keys with this prefix
        #[arg(short, long)]
        prefix: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Initialize logging from the environment; --verbose raises the level
    let mut log_config = LogConfig::from_env().unwrap_or_default();
    if cli.verbose {
        log_config = log_config.with_level(LogLevel::Debug);
    }
    init_logging(&log_config)?;

    match cli.command {
        Command::Convert {
            input,
            sheet,
            output,
        } => {
            // A bad path or sheet name ends the command without output
            if let Err(e) = convert::excel_to_csv(&input, &sheet, &output) {
                error!("Conversion failed: {}", e);
                std::process::exit(1);
            }
        },

        Command::Inspect { shapefile, sample } => {
            let summary = sections::describe(&shapefile, sample)?;
            println!("{}: {} rows, {}", shapefile.display(), summary.rows, summary.crs);
            println!("Columns: {}", summary.columns.join(", "));
            for (name, values) in &summary.join_candidates {
                println!("{} - first values: {}", name, values.join(", "));
            }
        },

        Command::Merge {
            shapefile,
            csv,
            output,
            tolerance,
            publish,
            prefix,
            latest_key,
            pointer_paths,
        } => {
            let report = merge::run(&merge::MergeOptions {
                shapefile,
                csv,
                output_dir: output,
                tolerance,
            })?;
            info!(
                "Merge complete: {} sections ({} without tabular data)",
                report.sections, report.unmatched
            );

            if publish {
                let mut options = publish::PublishOptions {
                    prefix,
                    latest_key,
                    ..Default::default()
                };
                if !pointer_paths.is_empty() {
                    options.pointer_paths = pointer_paths;
                }
                publish_step(&report.geojson_out, &options).await;
            }
        },

        Command::Render {
            input,
            output,
            width,
            height,
        } => {
            let merged = merge::read_geojson(&input)?;
            render::choropleth(&merged, &output, width, height)?;

            let summary = render::summarize(&merged, 10);
            println!(
                "{} sections, {} without tourist dwelling data",
                summary.sections, summary.missing_dwellings
            );
            println!(
                "Total tourist dwellings: {}, max in a single section: {}, mean: {:.2}",
                summary.total_dwellings, summary.max_dwellings, summary.mean_dwellings
            );
            println!("Top sections:");
            for top in &summary.top {
                println!(
                    "  CUSEC {} ({}) - {}",
                    top.cusec,
                    top.municipality.as_deref().unwrap_or("unknown"),
                    top.tourist_dwellings
                );
            }
        },

        Command::List { prefix } => {
            let config = storage::StorageConfig::from_env()?;
            let client = storage::Storage::new(config)?;
            let entries = client.list(prefix.as_deref()).await?;
            for entry in &entries {
                let modified = entry
                    .last_modified
                    .map(|dt| dt.to_rfc3339())
                    .unwrap_or_default();
                println!("{}\t{}\t{}", entry.key, entry.size, modified);
            }
            info!("{} objects listed", entries.len());
        },
    }

    Ok(())
}

/// Optional publish step: any failure is logged and the pipeline completes
/// in local-only mode.
async fn publish_step(geojson: &Path, options: &publish::PublishOptions) {
    let config = match storage::StorageConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            warn!("Object storage not configured ({}), skipping publish", e);
            return;
        },
    };

    let client = match storage::Storage::new(config) {
        Ok(client) => client,
        Err(e) => {
            warn!("Could not build storage client ({}), skipping publish", e);
            return;
        },
    };

    match publish::publish_latest(&client, geojson, options, Utc::now()).await {
        Ok(pointer) => info!("Published; latest object at {}", pointer.data_url),
        Err(e) => warn!("Publish failed ({:#}); completing in local-only mode", e),
    }
}
