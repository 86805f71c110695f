//! ImputeX CLI: terminal client for the ImputeX imputation service.
//!
//! Runs the full upload → review → impute → monitor workflow in one command,
//! or performs single service operations.

mod commands;
mod render;

use clap::Parser;
use imputex_core::model::{Estimator, KnnMetric, KnnWeights, ModelKind, Normalization};
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// ImputeX: fill the gaps in your time series
#[derive(Parser, Debug)]
#[command(name = "imputex", version, about, long_about = None)]
struct Cli {
    /// Workspace directory (looked up for `.imputex/config.toml`)
    #[arg(short, long, default_value = ".")]
    workspace: PathBuf,

    /// Override the service base URL
    #[arg(long)]
    base_url: Option<String>,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Upload a dataset, configure it and run an imputation job to completion
    Run(RunArgs),
    /// Upload a dataset and print the inferred schema
    Analyze {
        /// CSV or XLSX file
        file: PathBuf,
    },
    /// Show the current status of a job
    Status {
        job_id: String,
        /// Print the raw status snapshot as JSON
        #[arg(long)]
        json: bool,
    },
    /// Ask the service to cancel a job
    Cancel { job_id: String },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Subcommand, Debug)]
enum ConfigAction {
    /// Show the effective configuration
    Show,
}

#[derive(clap::Args, Debug)]
struct RunArgs {
    /// CSV or XLSX file
    file: PathBuf,

    /// Columns to impute
    #[arg(long = "target", value_name = "COLUMN")]
    targets: Vec<String>,

    /// Columns used only as inputs
    #[arg(long = "feature", value_name = "COLUMN")]
    features: Vec<String>,

    /// Columns left out of the job
    #[arg(long = "ignore", value_name = "COLUMN")]
    ignored: Vec<String>,

    /// Override a column type, e.g. `--type site=CATEGORICAL`
    #[arg(long = "type", value_name = "COLUMN=TYPE")]
    types: Vec<String>,

    /// Mark every column with missing values as a target
    #[arg(long)]
    targets_with_missing: bool,

    /// Ignore every ID column
    #[arg(long)]
    ignore_ids: bool,

    /// Imputation model
    #[arg(short, long, default_value = "MICE")]
    model: ModelKind,

    #[command(flatten)]
    params: HyperparameterArgs,

    /// Preview date to chart (defaults to the first one)
    #[arg(long)]
    date: Option<String>,

    /// Open the download location in the browser when done
    #[arg(long)]
    open: bool,
}

/// Model parameters. Only the ones the chosen model accepts are sent.
#[derive(clap::Args, Debug, Default)]
struct HyperparameterArgs {
    /// MICE/REGRESSION: iterations
    #[arg(long)]
    max_iter: Option<u32>,
    /// MICE/REGRESSION: random seed
    #[arg(long)]
    random_state: Option<u64>,
    /// MICE/REGRESSION: bayesian_ridge, random_forest or extra_trees
    #[arg(long)]
    estimator: Option<Estimator>,
    /// KNN: neighbours considered
    #[arg(long)]
    n_neighbors: Option<u32>,
    /// KNN: uniform or distance
    #[arg(long)]
    weights: Option<KnnWeights>,
    /// KNN: nan_euclidean or euclidean
    #[arg(long)]
    metric: Option<KnnMetric>,
    /// NAOMI: hidden layer width
    #[arg(long)]
    hidden_dim: Option<u32>,
    /// NAOMI: training epochs
    #[arg(long)]
    epochs: Option<u32>,
    /// NAOMI: learning rate
    #[arg(long)]
    lr: Option<f64>,
    /// NAOMI: window size
    #[arg(long)]
    window_size: Option<u32>,
    /// NAOMI: batch size
    #[arg(long)]
    batch_size: Option<u32>,
    /// NAOMI: recurrent layers
    #[arg(long)]
    n_layers: Option<u32>,
    /// NAOMI: highest resolution
    #[arg(long)]
    highest: Option<u32>,
    /// NAOMI: gradient clip
    #[arg(long)]
    clip: Option<f64>,
    /// NAOMI: preview snapshots during training
    #[arg(long)]
    preview_updates: Option<u32>,
    /// TOTEM: window size
    #[arg(long)]
    totem_window_size: Option<u32>,
    /// TOTEM: zscore or minmax
    #[arg(long)]
    totem_normalization: Option<Normalization>,
    /// TOTEM: preview snapshots during training
    #[arg(long)]
    totem_preview_updates: Option<u32>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Set up tracing: human-readable stderr + JSON file logging
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info",
        _ => "debug",
    };

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::new(filter));

    let log_dir = directories::ProjectDirs::from("dev", "imputex", "imputex")
        .map(|d| d.data_dir().join("logs"))
        .unwrap_or_else(|| PathBuf::from("."));
    let _ = std::fs::create_dir_all(&log_dir);
    let file_appender = tracing_appender::rolling::daily(&log_dir, "imputex.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let workspace = cli
        .workspace
        .canonicalize()
        .unwrap_or_else(|_| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    let mut config = imputex_core::load_config(Some(&workspace), None)
        .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;
    if let Some(base_url) = cli.base_url {
        config.api.base_url = base_url;
    }
    config
        .ensure_valid()
        .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;

    commands::handle_command(cli.command, config, cli.quiet).await
}
