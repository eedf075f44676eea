//! Project Quality Forecast - prediction CLI
//!
//! Takes one JSON argument (a raw metrics record, or a what-if request) and
//! prints the predictions as JSON on stdout. Failures print `{"error": ..}`
//! and exit with status 1. Logs go to stderr.

use clap::Parser;
use quality_forecast::{
    config::{AppConfig, LoggingConfig, DEFAULT_CONFIG_PATH},
    logging::init_logging,
    models::{InferenceEngine, WhatIfEngine},
    types::{
        report::MISSING_FEATURES_SHOWN, ErrorResponse, PredictionRequest, PredictionResponse,
    },
};
use serde::Serialize;
use std::path::PathBuf;
use tracing::{info, warn};

const USAGE: &str = r#"quality-predict '{"developerExperience": {...}, "technicalPerformance": {...}, "businessImpact": {...}}'
quality-predict '{"metrics": {...}, "whatif": {"tp_testCoverage": 90}}'"#;

#[derive(Parser, Debug)]
#[command(name = "quality-predict")]
#[command(about = "Predict project outcome metrics from raw quality metrics")]
struct Cli {
    /// Raw metrics record or what-if request, as a JSON object
    input: Option<String>,

    /// Configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Model artifact directory (overrides the configuration)
    #[arg(short, long)]
    models_dir: Option<PathBuf>,

    /// Log level for stderr output
    #[arg(long, default_value = "warn")]
    log_level: String,
}

fn main() {
    let cli = Cli::parse();

    let outcome = run(cli);
    let failed = outcome.is_err();
    match outcome {
        Ok(response) => print_json(&response),
        Err(error) => print_json(&error),
    }
    if failed {
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<PredictionResponse, ErrorResponse> {
    let Some(input) = cli.input else {
        return Err(ErrorResponse::new("No input provided").with_usage(USAGE));
    };

    let request =
        PredictionRequest::parse(&input).map_err(|e| ErrorResponse::new(e.to_string()))?;

    let config = AppConfig::load_from_path(&cli.config)
        .map_err(|e| ErrorResponse::new(format!("Failed to load configuration: {:#}", e)))?;

    let logging = LoggingConfig {
        level: cli.log_level,
        format: config.logging.format.clone(),
    };
    if let Err(e) = init_logging(&logging, "quality_predict") {
        eprintln!("{:#}", e);
    }

    let models_dir = cli.models_dir.unwrap_or(config.models.models_dir);
    let predictor = InferenceEngine::from_dir(&models_dir)
        .map_err(|e| ErrorResponse::new(format!("Failed to load models: {}", e)))?;
    info!(
        targets = ?predictor.target_names(),
        dir = %models_dir.display(),
        "Predictor ready"
    );

    match request {
        PredictionRequest::Predict(record) => {
            let prediction = predictor
                .predict(&record)
                .map_err(|e| ErrorResponse::new(format!("Prediction failed: {}", e)))?;

            let warnings = prediction.warning(MISSING_FEATURES_SHOWN);
            if let Some(warning) = &warnings {
                warn!(
                    total_missing = warning.total_missing,
                    shown = ?warning.missing_features,
                    "Features missing from input were defaulted to 0"
                );
            }

            Ok(PredictionResponse::Prediction {
                predictions: prediction.predictions,
                warnings,
            })
        }
        PredictionRequest::WhatIf { metrics, overrides } => {
            let analysis = WhatIfEngine::new(predictor)
                .analyze(&metrics, &overrides)
                .map_err(|e| ErrorResponse::new(format!("What-if analysis failed: {}", e)))?;

            Ok(PredictionResponse::Whatif {
                changes: overrides,
                analysis,
            })
        }
    }
}

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => println!(
            "{{\"error\": \"Failed to serialize output: {}\"}}",
            e.to_string().replace('"', "'")
        ),
    }
}
