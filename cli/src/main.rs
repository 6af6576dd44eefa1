use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use env_logger::Env;
use log::info;
use serde::Serialize;

use medallion_kernel::codec::decode_parquet;
use medallion_kernel::metadata::{
    preview_markdown, AssetOutput, DatasetMetadata, DEFAULT_PREVIEW_ROWS,
};
use medallion_kernel::timing::{time_operation, OperationTimer};
use medallion_kernel::validate::validate_batch;
use medallion_kernel::{Layer, StorageConfig, StorageGateway};

/// Medallion storage CLI
#[derive(Parser, Debug)]
#[command(name = "medallion")]
#[command(about = "Bronze/silver/gold dataset storage on local disk or ADLS", long_about = None)]
struct Cli {
    /// Path to storage config JSON (defaults to environment variables)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Route all storage to in-memory stores; nothing is persisted
    #[arg(long, global = true)]
    dry_run: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the resolved storage configuration
    Config,

    /// Store a parquet file as a new timestamped dataset
    Write {
        /// Target layer (bronze, silver, gold)
        #[arg(long)]
        layer: Layer,

        /// Dataset name prefix, e.g. bronze_orders
        #[arg(long)]
        prefix: String,

        /// Local parquet file to store
        #[arg(long)]
        input: PathBuf,

        /// Column that must be present (repeatable)
        #[arg(long = "require")]
        required: Vec<String>,

        /// Rows to include in the preview
        #[arg(long, default_value_t = DEFAULT_PREVIEW_ROWS)]
        preview: usize,
    },

    /// Describe the latest dataset matching a prefix
    Latest {
        /// Layer to search
        #[arg(long)]
        layer: Layer,

        /// Filename prefix to match
        #[arg(long)]
        prefix: String,

        /// Rows to include in the preview
        #[arg(long, default_value_t = DEFAULT_PREVIEW_ROWS)]
        preview: usize,
    },
}

/// Wrapper for JSON output of `latest`
#[derive(Debug, Serialize)]
struct LatestOutput {
    layer: Layer,
    filename: String,
    metadata: DatasetMetadata,
    preview: String,
}

fn load_config(path: Option<&PathBuf>) -> Result<StorageConfig> {
    match path {
        Some(path) => {
            let data = fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            Ok(serde_json::from_str(&data)?)
        }
        None => Ok(StorageConfig::from_env()?),
    }
}

fn build_gateway(config: StorageConfig, dry_run: bool) -> Result<StorageGateway> {
    if dry_run {
        info!("dry run: datasets are kept in memory only");
        return Ok(StorageGateway::in_memory(config)?);
    }
    Ok(StorageGateway::new(config)?)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    // ----------------------------
    // Load configuration
    // ----------------------------
    let config = load_config(cli.config.as_ref())?;

    match cli.command {
        Command::Config => {
            config.validate()?;
            print_json(&config.redacted())
        }

        // ----------------------------
        // Write
        // ----------------------------
        Command::Write {
            layer,
            prefix,
            input,
            required,
            preview,
        } => {
            let gateway = build_gateway(config, cli.dry_run)?;
            let mut timer = OperationTimer::new();

            timer.start("read input");
            let data = fs::read(&input)
                .with_context(|| format!("reading input {}", input.display()))?;
            let batch = decode_parquet(data)?;
            timer.stop("read input");

            timer.start("validate");
            let required: Vec<&str> = required.iter().map(String::as_str).collect();
            validate_batch(&batch, &required)?;
            timer.stop("validate");

            timer.start("store");
            let outcome = gateway.write_dataset(batch, layer, &prefix)?;
            timer.stop("store");
            info!("stored {} rows at {}", outcome.metadata.row_count, outcome.path);
            timer.log_summary();

            print_json(&AssetOutput::from_write(&outcome, preview)?)
        }

        // ----------------------------
        // Latest
        // ----------------------------
        Command::Latest {
            layer,
            prefix,
            preview,
        } => {
            let gateway = build_gateway(config, cli.dry_run)?;
            let latest = time_operation(&format!("{layer} read of {prefix}"), || {
                gateway.read_latest_with_name(layer, &prefix)
            })?;

            print_json(&LatestOutput {
                layer,
                filename: latest.filename,
                metadata: DatasetMetadata::from_batch(&latest.batch, latest.backend),
                preview: preview_markdown(&latest.batch, preview)?,
            })
        }
    }
}
