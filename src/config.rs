//! Configuration management for the prediction pipeline

use crate::models::linear::ModelKind;
use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default location of the configuration file
pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub models: ModelsConfig,
    pub targets: Vec<TargetSpec>,
    pub selection: SelectionConfig,
    pub training: TrainingConfig,
    pub logging: LoggingConfig,
}

/// Persisted artifact location
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsConfig {
    /// Directory holding models, scalers, metadata and the feature list
    pub models_dir: PathBuf,
}

/// One predicted outcome and how its model is built.
///
/// The model family and the scaling flag are declared together here and
/// never inferred from each other.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetSpec {
    /// Name used in artifacts and in prediction output
    pub name: String,
    /// Column of the training table holding the target values
    pub column: String,
    /// Whether features pass through a fitted standard scaler
    pub needs_scaling: bool,
    /// Model family and its hyperparameters
    pub model: ModelKind,
}

impl TargetSpec {
    pub fn new(name: &str, column: &str, model: ModelKind, needs_scaling: bool) -> Self {
        Self {
            name: name.to_string(),
            column: column.to_string(),
            needs_scaling,
            model,
        }
    }
}

/// Feature selection configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionConfig {
    /// Substrings marking a column as a disguised target
    pub leakage_patterns: Vec<String>,
    /// Absolute Pearson correlation above which the later column is dropped
    pub correlation_threshold: f64,
    /// Identifier columns removed when the table is loaded
    #[serde(default)]
    pub excluded_columns: Vec<String>,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            leakage_patterns: vec![
                "timeToMarket".to_string(),
                "communityGrowth".to_string(),
                "overallScore".to_string(),
            ],
            correlation_threshold: 0.95,
            excluded_columns: vec!["name".to_string()],
        }
    }
}

/// Offline training configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Engineered feature table (CSV)
    pub data_path: PathBuf,
    /// Fraction of rows held out for evaluation
    pub test_size: f64,
    /// Seed for the train/test split and CV folds
    pub seed: u64,
    /// Number of cross-validation folds (0 or 1 disables CV)
    #[serde(default = "default_cv_folds")]
    pub cv_folds: usize,
}

fn default_cv_folds() -> usize {
    5
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from("reports/statistical/engineered_features.csv"),
            test_size: 0.15,
            seed: 42,
            cv_folds: default_cv_folds(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

/// Targets the study predicts, with the families that scored best on them.
pub fn default_targets() -> Vec<TargetSpec> {
    vec![
        TargetSpec::new(
            "overallScore",
            "overallScore",
            ModelKind::LinearRegression,
            false,
        ),
        TargetSpec::new("timeToMarket", "bi_timeToMarket", ModelKind::lasso(0.1), true),
        TargetSpec::new(
            "communityGrowth",
            "bi_communityGrowth",
            ModelKind::lasso(0.1),
            true,
        ),
    ]
}

impl AppConfig {
    /// Load configuration from a specific path.
    ///
    /// Layers, lowest first: built-in defaults, the TOML file (if present),
    /// `QUALITY_*` environment variables (`__` separates nesting levels, as
    /// in `QUALITY_MODELS__MODELS_DIR`).
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let defaults = Config::try_from(&AppConfig::default())
            .context("Failed to serialize default configuration")?;

        let config = Config::builder()
            .add_source(defaults)
            .add_source(File::from(path.as_ref()).required(false))
            .add_source(
                Environment::with_prefix("QUALITY")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Column names of all configured targets.
    pub fn target_columns(&self) -> Vec<String> {
        self.targets.iter().map(|t| t.column.clone()).collect()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            models: ModelsConfig {
                models_dir: PathBuf::from("reports/ml/saved_models"),
            },
            targets: default_targets(),
            selection: SelectionConfig::default(),
            training: TrainingConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}
