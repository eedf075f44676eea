//! Synthetic Dataset Generator
//!
//! Writes an engineered-features CSV shaped like the study's training table:
//! a `name` column, every engineered feature, a few scaled variants and leaked
//! target proxies, and the three target columns. Used to exercise
//! `train-models` without the study data.

use anyhow::{Context, Result};
use clap::Parser;
use polars::prelude::*;
use quality_forecast::{
    config::{AppConfig, DEFAULT_CONFIG_PATH},
    feature_extractor::{group_metrics, FeatureExtractor},
    logging::init_logging,
    types::{GroupKind, RawMetricsRecord},
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fs::{self, File};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "generate-dataset")]
#[command(about = "Generate a synthetic engineered-features table")]
struct Cli {
    /// Number of projects to generate
    #[arg(short, long, default_value_t = 200)]
    rows: usize,

    /// Random seed
    #[arg(short, long, default_value_t = 42)]
    seed: u64,

    /// Output CSV (defaults to the configured training data path)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
}

/// Plausible value range of a base metric
fn metric_range(kind: GroupKind, metric: &str) -> (f64, f64) {
    match (kind, metric) {
        (GroupKind::DeveloperExperience, "codeReviewDuration") => (1.0, 72.0),
        (GroupKind::DeveloperExperience, "debuggingTime") => (0.5, 40.0),
        (GroupKind::DeveloperExperience, "buildTime") => (10.0, 600.0),
        (GroupKind::DeveloperExperience, "successfulDeploymentsRatio") => (0.5, 1.0),
        (GroupKind::DeveloperExperience, "timeToFirstCommit") => (0.5, 30.0),
        (GroupKind::DeveloperExperience, "averageCommentsPerPR") => (0.0, 15.0),
        (GroupKind::DeveloperExperience, "prIterationRate") => (1.0, 6.0),
        (GroupKind::TechnicalPerformance, "buildTime") => (10.0, 600.0),
        (GroupKind::TechnicalPerformance, "testCoverage") => (10.0, 95.0),
        (GroupKind::TechnicalPerformance, "typeScriptErrorRate") => (0.0, 0.3),
        (GroupKind::TechnicalPerformance, "bundleSize") => (50.0, 3000.0),
        (GroupKind::TechnicalPerformance, "bundleLoadTime") => (0.2, 8.0),
        (GroupKind::TechnicalPerformance, "performanceScore") => (30.0, 100.0),
        (GroupKind::BusinessImpact, "featureSuccessRate") => (0.3, 0.95),
        (GroupKind::BusinessImpact, "activeContributors") => (1.0, 200.0),
        (GroupKind::BusinessImpact, "issueResolutionRate") => (0.2, 0.98),
        (GroupKind::BusinessImpact, "deploymentFrequency") => (0.1, 20.0),
        (GroupKind::BusinessImpact, "changeFailureRate") => (0.0, 0.4),
        _ => (0.0, 1.0),
    }
}

fn random_record(rng: &mut StdRng) -> RawMetricsRecord {
    let mut record = RawMetricsRecord::new();
    for kind in GroupKind::ALL {
        for metric in group_metrics(kind) {
            let (low, high) = metric_range(kind, metric);
            record.set_metric(kind, *metric, rng.gen_range(low..high));
        }
    }
    record
}

/// Targets as noisy linear functions of the raw metrics:
/// (overallScore, timeToMarket, communityGrowth)
fn targets(record: &RawMetricsRecord, rng: &mut StdRng) -> (f64, f64, f64) {
    use GroupKind::*;
    let m = |kind: GroupKind, name: &str| record.metric(kind, name);

    let overall = 20.0 + 0.35 * m(TechnicalPerformance, "testCoverage")
        + 0.25 * m(TechnicalPerformance, "performanceScore")
        - 0.15 * m(DeveloperExperience, "codeReviewDuration")
        + 20.0 * m(BusinessImpact, "featureSuccessRate")
        - 30.0 * m(BusinessImpact, "changeFailureRate")
        + rng.gen_range(-2.0..2.0);

    let time_to_market = 30.0 + 0.4 * m(DeveloperExperience, "codeReviewDuration")
        + 0.02 * m(DeveloperExperience, "buildTime")
        - 1.2 * m(BusinessImpact, "deploymentFrequency")
        + 25.0 * m(TechnicalPerformance, "typeScriptErrorRate")
        + rng.gen_range(-3.0..3.0);

    let community_growth = 2.0 + 0.05 * m(BusinessImpact, "activeContributors")
        + 3.0 * m(BusinessImpact, "issueResolutionRate")
        + 0.02 * m(TechnicalPerformance, "testCoverage")
        + rng.gen_range(-0.5..0.5);

    (overall, time_to_market.max(1.0), community_growth)
}

fn standardized(values: &[f64]) -> Vec<f64> {
    let n = values.len().max(1) as f64;
    let mean = values.iter().sum::<f64>() / n;
    let std = (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt();
    let std = if std > 0.0 { std } else { 1.0 };
    values.iter().map(|v| (v - mean) / std).collect()
}

fn normalized(values: &[f64]) -> Vec<f64> {
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = if max > min { max - min } else { 1.0 };
    values.iter().map(|v| (v - min) / range).collect()
}

/// Build the synthetic table in the training file's column order.
fn generate(rows: usize, seed: u64) -> Result<DataFrame> {
    let mut rng = StdRng::seed_from_u64(seed);
    let extractor = FeatureExtractor::new();
    let names = extractor.feature_names();

    let mut project_names = Vec::with_capacity(rows);
    let mut features: Vec<Vec<f64>> = vec![Vec::with_capacity(rows); names.len()];
    let mut overall = Vec::with_capacity(rows);
    let mut time_to_market = Vec::with_capacity(rows);
    let mut community_growth = Vec::with_capacity(rows);

    for i in 0..rows {
        let record = random_record(&mut rng);
        let engineered = extractor.engineer(&record);
        for (column, name) in features.iter_mut().zip(&names) {
            column.push(engineered.get(name).unwrap_or(0.0));
        }
        let (o, t, c) = targets(&record, &mut rng);
        overall.push(o);
        time_to_market.push(t);
        community_growth.push(c);
        project_names.push(format!("project-{:04}", i + 1));
    }

    let column_of = |name: &str| -> Vec<f64> {
        names
            .iter()
            .position(|n| n == name)
            .map(|idx| features[idx].clone())
            .unwrap_or_default()
    };

    let mut columns: Vec<Column> = vec![Series::new("name".into(), project_names).into()];
    for (name, values) in names.iter().zip(&features) {
        columns.push(Series::new(name.as_str().into(), values.clone()).into());
    }

    // Scaled variants, as produced by the study's preprocessing step
    let test_coverage = column_of("tp_testCoverage");
    let review_duration = column_of("dx_codeReviewDuration");
    let contributors = column_of("bi_activeContributors");
    columns.push(Series::new("tp_testCoverage_std".into(), standardized(&test_coverage)).into());
    columns.push(Series::new("tp_testCoverage_norm".into(), normalized(&test_coverage)).into());
    columns.push(
        Series::new("dx_codeReviewDuration_std".into(), standardized(&review_duration)).into(),
    );
    columns.push(
        Series::new("bi_activeContributors_norm".into(), normalized(&contributors)).into(),
    );

    // Leaked target proxies
    let ttm_log: Vec<f64> = time_to_market.iter().map(|v: &f64| v.ln_1p()).collect();
    let overall_norm = normalized(&overall);
    columns.push(Series::new("bi_timeToMarket_log".into(), ttm_log).into());
    columns.push(Series::new("overallScore_norm".into(), overall_norm).into());

    columns.push(Series::new("overallScore".into(), overall).into());
    columns.push(Series::new("bi_timeToMarket".into(), time_to_market).into());
    columns.push(Series::new("bi_communityGrowth".into(), community_growth).into());

    DataFrame::new(columns).context("Failed to build synthetic table")
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load_from_path(&cli.config)?;
    init_logging(&config.logging, "generate_dataset")?;

    let output = cli.output.unwrap_or(config.training.data_path);
    let mut df = generate(cli.rows, cli.seed)?;

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let mut file = File::create(&output)
        .with_context(|| format!("Failed to create {}", output.display()))?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .finish(&mut df)
        .context("Failed to write CSV")?;

    info!(
        rows = df.height(),
        columns = df.width(),
        seed = cli.seed,
        path = %output.display(),
        "Synthetic dataset written"
    );
    Ok(())
}
