//! Model Trainer
//!
//! Loads the engineered feature table, selects features, trains one model
//! per configured target and saves the artifacts used by `quality-predict`.

use anyhow::{Context, Result};
use clap::Parser;
use quality_forecast::{
    config::{AppConfig, DEFAULT_CONFIG_PATH},
    logging::init_logging,
    FeatureSelector, FeatureTable, ModelRegistry,
};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "train-models")]
#[command(about = "Train and save the outcome prediction models")]
struct Cli {
    /// Configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Engineered feature table (overrides the configuration)
    #[arg(short, long)]
    data: Option<PathBuf>,

    /// Output directory for model artifacts (overrides the configuration)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load_from_path(&cli.config)?;
    init_logging(&config.logging, "train_models")?;

    info!("Starting model training");

    let data_path = cli.data.unwrap_or_else(|| config.training.data_path.clone());
    let models_dir = cli.output.unwrap_or_else(|| config.models.models_dir.clone());

    let table = FeatureTable::from_csv(&data_path, &config.selection.excluded_columns)
        .with_context(|| format!("Failed to load feature table {}", data_path.display()))?;

    let selector = FeatureSelector::new(config.selection.clone(), config.target_columns());
    let selection = selector.select(&table);
    info!(
        selected = selection.selected.len(),
        features = ?selection.selected,
        "Feature selection complete"
    );

    let registry = ModelRegistry::new(config.targets.clone(), config.training.clone());
    let run = registry
        .train(&table, &selection.selected)
        .context("Training failed")?
        .with_selection(selection);

    let written = ModelRegistry::persist(&run, &models_dir)
        .with_context(|| format!("Failed to save models to {}", models_dir.display()))?;

    info!(
        artifacts = written.len(),
        dir = %models_dir.display(),
        run_id = %run.report.run_id,
        "Training complete"
    );
    Ok(())
}
