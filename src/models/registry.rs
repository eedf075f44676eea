//! Model Registry: fits one model per configured target, evaluates it, and
//! persists everything inference needs.
//!
//! All targets share one train/test split and one feature list. Scalers are
//! fitted on training rows only and saved next to their model, so inference
//! never refits anything.

use crate::config::{TargetSpec, TrainingConfig};
use crate::dataset::{k_fold, take_rows, take_values, train_test_split, FeatureTable};
use crate::error::{PipelineError, Result};
use crate::feature_selection::SelectionReport;
use crate::metrics::{log_evaluation, CvSummary, RegressionMetrics};
use crate::models::linear::LinearModel;
use crate::models::scaler::StandardScaler;
use crate::types::PerTarget;
use chrono::{DateTime, Utc};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use uuid::Uuid;

/// Ordered feature list shared by every target
pub const FEATURE_LIST_FILE: &str = "feature_list.json";
/// Target list plus family and scaling flag per target
pub const METADATA_FILE: &str = "metadata.json";
/// Selection and evaluation summary of a training run
pub const REPORT_FILE: &str = "training_report.json";

/// Number of coefficients listed per target in the training report
const TOP_COEFFICIENTS: usize = 5;

pub fn model_file(target: &str) -> String {
    format!("{}_model.json", target)
}

pub fn scaler_file(target: &str) -> String {
    format!("{}_scaler.json", target)
}

/// Fitted model for one target, with its scaler when the target needs one.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainedModel {
    pub target: String,
    pub model: LinearModel,
    pub scaler: Option<StandardScaler>,
}

impl TrainedModel {
    pub fn needs_scaling(&self) -> bool {
        self.scaler.is_some()
    }

    /// Predict from an assembled feature vector, scaling it first if needed.
    pub fn predict_vector(&self, features: &[f64]) -> Result<f64> {
        match &self.scaler {
            Some(scaler) => self.model.predict_one(&scaler.transform_one(features)?),
            None => self.model.predict_one(features),
        }
    }

    fn predict_matrix(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        match &self.scaler {
            Some(scaler) => self.model.predict(&scaler.transform(x)?),
            None => self.model.predict(x),
        }
    }
}

/// Family and scaling flag recorded for one target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    #[serde(rename = "type")]
    pub model_type: String,
    pub needs_scaling: bool,
}

/// Contents of `metadata.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    #[serde(default)]
    pub run_id: Option<Uuid>,
    #[serde(default)]
    pub trained_at: Option<DateTime<Utc>>,
    pub targets: Vec<String>,
    #[serde(default)]
    pub feature_count: usize,
    #[serde(default)]
    pub training_samples: usize,
    #[serde(default)]
    pub test_samples: usize,
    pub models: BTreeMap<String, ModelInfo>,
}

/// Everything the Predictor needs: feature order, fitted models, metadata.
///
/// Read-only once built; share it behind an `Arc` across readers.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelBundleSet {
    feature_names: Vec<String>,
    models: Vec<TrainedModel>,
    metadata: ModelMetadata,
}

impl ModelBundleSet {
    pub(crate) fn new(
        feature_names: Vec<String>,
        models: Vec<TrainedModel>,
        metadata: ModelMetadata,
    ) -> Self {
        Self {
            feature_names,
            models,
            metadata,
        }
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Models in target order
    pub fn models(&self) -> &[TrainedModel] {
        &self.models
    }

    pub fn model(&self, target: &str) -> Option<&TrainedModel> {
        self.models.iter().find(|m| m.target == target)
    }

    pub fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }

    pub fn targets(&self) -> impl Iterator<Item = &str> {
        self.models.iter().map(|m| m.target.as_str())
    }
}

/// One feature's weight, for the coefficient ranking
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedCoefficient {
    pub feature: String,
    pub coefficient: f64,
}

/// Evaluation summary of one target
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TargetReport {
    pub column: String,
    pub model_type: String,
    pub needs_scaling: bool,
    pub holdout: Option<RegressionMetrics>,
    pub cross_validation: Option<CvSummary>,
    pub top_coefficients: Vec<RankedCoefficient>,
}

/// Contents of `training_report.json`
#[derive(Debug, Clone, Serialize)]
pub struct TrainingReport {
    pub run_id: Uuid,
    pub trained_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selection: Option<SelectionReport>,
    pub targets: PerTarget<TargetReport>,
}

/// Result of a training run: the bundle plus its evaluation report.
#[derive(Debug, Clone)]
pub struct TrainingRun {
    pub bundle: ModelBundleSet,
    pub report: TrainingReport,
}

impl TrainingRun {
    /// Attach the selection summary to the report.
    pub fn with_selection(mut self, selection: SelectionReport) -> Self {
        self.report.selection = Some(selection);
        self
    }
}

/// Trains and persists the outcome models.
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    targets: Vec<TargetSpec>,
    training: TrainingConfig,
}

impl ModelRegistry {
    pub fn new(targets: Vec<TargetSpec>, training: TrainingConfig) -> Self {
        Self { targets, training }
    }

    pub fn targets(&self) -> &[TargetSpec] {
        &self.targets
    }

    /// Train every configured target on the `features` columns of `table`.
    pub fn train(&self, table: &FeatureTable, features: &[String]) -> Result<TrainingRun> {
        if self.targets.is_empty() {
            return Err(PipelineError::Training("no targets configured".to_string()));
        }
        if features.is_empty() {
            return Err(PipelineError::Training("feature list is empty".to_string()));
        }

        let x = table.matrix(features)?;
        let split = train_test_split(table.n_rows(), self.training.test_size, self.training.seed);
        if split.train.is_empty() {
            return Err(PipelineError::Training(format!(
                "not enough rows to train ({})",
                table.n_rows()
            )));
        }
        let x_train = take_rows(&x, &split.train);
        let x_test = take_rows(&x, &split.test);

        info!(
            features = features.len(),
            train_rows = split.train.len(),
            test_rows = split.test.len(),
            "Training outcome models"
        );

        let mut models = Vec::with_capacity(self.targets.len());
        let mut reports = PerTarget::with_capacity(self.targets.len());
        for spec in &self.targets {
            let y = table.target(&spec.column)?;
            let y_train = take_values(&y, &split.train);
            let y_test = take_values(&y, &split.test);

            let trained = fit_target(spec, &x_train, &y_train)?;

            let holdout = if split.test.is_empty() {
                None
            } else {
                let predicted = trained.predict_matrix(&x_test)?;
                Some(RegressionMetrics::evaluate(&y_test, &predicted))
            };
            let cv = self.cross_validate(spec, &x_train, &y_train)?;
            if let Some(metrics) = &holdout {
                log_evaluation(&spec.name, metrics, cv.as_ref());
            }

            reports.push(
                spec.name.clone(),
                TargetReport {
                    column: spec.column.clone(),
                    model_type: spec.model.name().to_string(),
                    needs_scaling: spec.needs_scaling,
                    holdout,
                    cross_validation: cv,
                    top_coefficients: rank_coefficients(features, &trained.model),
                },
            );
            models.push(trained);
        }

        let run_id = Uuid::new_v4();
        let trained_at = Utc::now();
        let metadata = ModelMetadata {
            run_id: Some(run_id),
            trained_at: Some(trained_at),
            targets: self.targets.iter().map(|t| t.name.clone()).collect(),
            feature_count: features.len(),
            training_samples: split.train.len(),
            test_samples: split.test.len(),
            models: self
                .targets
                .iter()
                .map(|t| {
                    (
                        t.name.clone(),
                        ModelInfo {
                            model_type: t.model.name().to_string(),
                            needs_scaling: t.needs_scaling,
                        },
                    )
                })
                .collect(),
        };

        Ok(TrainingRun {
            bundle: ModelBundleSet::new(features.to_vec(), models, metadata),
            report: TrainingReport {
                run_id,
                trained_at,
                selection: None,
                targets: reports,
            },
        })
    }

    /// k-fold R² on the training rows; the scaler is refitted inside every fold.
    fn cross_validate(
        &self,
        spec: &TargetSpec,
        x: &Array2<f64>,
        y: &Array1<f64>,
    ) -> Result<Option<CvSummary>> {
        let folds = k_fold(x.nrows(), self.training.cv_folds, self.training.seed);
        if folds.is_empty() {
            debug!(target = %spec.name, "Cross-validation skipped");
            return Ok(None);
        }

        let mut scores = Vec::with_capacity(folds.len());
        for fold in &folds {
            let trained = fit_target(spec, &take_rows(x, &fold.train), &take_values(y, &fold.train))?;
            let predicted = trained.predict_matrix(&take_rows(x, &fold.test))?;
            scores.push(RegressionMetrics::evaluate(&take_values(y, &fold.test), &predicted).r2);
        }
        Ok(Some(CvSummary::from_scores(scores)))
    }

    /// Write the bundle and report into `dir`, returning the paths written.
    pub fn persist(run: &TrainingRun, dir: &Path) -> Result<Vec<PathBuf>> {
        fs::create_dir_all(dir)?;
        let bundle = &run.bundle;
        let mut written = Vec::new();

        written.push(write_json(&dir.join(FEATURE_LIST_FILE), &bundle.feature_names)?);
        for trained in &bundle.models {
            written.push(write_json(&dir.join(model_file(&trained.target)), &trained.model)?);
            if let Some(scaler) = &trained.scaler {
                written.push(write_json(&dir.join(scaler_file(&trained.target)), scaler)?);
            }
        }
        written.push(write_json(&dir.join(METADATA_FILE), &bundle.metadata)?);
        written.push(write_json(&dir.join(REPORT_FILE), &run.report)?);

        for path in &written {
            info!(path = %path.display(), "Saved artifact");
        }
        Ok(written)
    }
}

/// Fit one target's family, scaling first when the target declares it.
fn fit_target(spec: &TargetSpec, x: &Array2<f64>, y: &Array1<f64>) -> Result<TrainedModel> {
    let (model, scaler) = if spec.needs_scaling {
        let scaler = StandardScaler::fit(x)?;
        let model = spec.model.fit(&scaler.transform(x)?, y)?;
        (model, Some(scaler))
    } else {
        (spec.model.fit(x, y)?, None)
    };

    Ok(TrainedModel {
        target: spec.name.clone(),
        model,
        scaler,
    })
}

fn rank_coefficients(features: &[String], model: &LinearModel) -> Vec<RankedCoefficient> {
    let mut ranked: Vec<RankedCoefficient> = features
        .iter()
        .zip(&model.coefficients)
        .map(|(feature, &coefficient)| RankedCoefficient {
            feature: feature.clone(),
            coefficient,
        })
        .collect();
    ranked.sort_by(|a, b| {
        b.coefficient
            .abs()
            .partial_cmp(&a.coefficient.abs())
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    ranked.truncate(TOP_COEFFICIENTS);
    ranked
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<PathBuf> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.flush()?;
    Ok(path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_targets;
    use crate::models::linear::ModelKind;

    /// 40 rows, three features, targets that are exact linear functions.
    fn synthetic_table() -> FeatureTable {
        let n = 40;
        let a: Vec<f64> = (0..n).map(|i| i as f64).collect();
        let b: Vec<f64> = (0..n).map(|i| ((i * 7) % 13) as f64).collect();
        let c: Vec<f64> = (0..n).map(|i| ((i * 5) % 11) as f64 * 0.5).collect();
        let overall: Vec<f64> = (0..n).map(|i| 2.0 * a[i] - b[i] + 3.0 * c[i] + 10.0).collect();
        let ttm: Vec<f64> = (0..n).map(|i| 0.5 * a[i] + 4.0 * b[i]).collect();
        let growth: Vec<f64> = (0..n).map(|i| c[i] - 0.2 * b[i] + 1.0).collect();

        FeatureTable::from_columns(vec![
            ("dx_a".to_string(), a),
            ("tp_b".to_string(), b),
            ("bi_c".to_string(), c),
            ("overallScore".to_string(), overall),
            ("bi_timeToMarket".to_string(), ttm),
            ("bi_communityGrowth".to_string(), growth),
        ])
        .unwrap()
    }

    fn features() -> Vec<String> {
        vec!["dx_a".to_string(), "tp_b".to_string(), "bi_c".to_string()]
    }

    #[test]
    fn test_train_all_targets() {
        let registry = ModelRegistry::new(default_targets(), TrainingConfig::default());
        let run = registry.train(&synthetic_table(), &features()).unwrap();

        let bundle = &run.bundle;
        assert_eq!(
            bundle.targets().collect::<Vec<_>>(),
            vec!["overallScore", "timeToMarket", "communityGrowth"]
        );
        assert!(!bundle.model("overallScore").unwrap().needs_scaling());
        assert!(bundle.model("timeToMarket").unwrap().needs_scaling());

        let metadata = bundle.metadata();
        assert_eq!(metadata.feature_count, 3);
        assert_eq!(metadata.test_samples, 6);
        assert_eq!(metadata.training_samples, 34);
        assert_eq!(metadata.models["timeToMarket"].model_type, "Lasso");

        let overall = run.report.targets.get("overallScore").unwrap();
        assert!(overall.holdout.unwrap().r2 > 0.999);
        assert_eq!(overall.cross_validation.as_ref().unwrap().fold_scores.len(), 5);
        assert_eq!(overall.top_coefficients[0].feature, "bi_c");
    }

    #[test]
    fn test_scaled_prediction_matches_matrix_path() {
        let registry = ModelRegistry::new(default_targets(), TrainingConfig::default());
        let run = registry.train(&synthetic_table(), &features()).unwrap();
        let trained = run.bundle.model("communityGrowth").unwrap();

        let x = ndarray::array![[3.0, 4.0, 1.5]];
        let by_matrix = trained.predict_matrix(&x).unwrap()[0];
        let by_vector = trained.predict_vector(&[3.0, 4.0, 1.5]).unwrap();
        assert!((by_matrix - by_vector).abs() < 1e-9);
    }

    #[test]
    fn test_missing_target_column() {
        let targets = vec![TargetSpec::new(
            "latency",
            "tp_latency",
            ModelKind::LinearRegression,
            false,
        )];
        let registry = ModelRegistry::new(targets, TrainingConfig::default());
        let result = registry.train(&synthetic_table(), &features());
        assert!(matches!(result, Err(PipelineError::Data(_))));
    }

    #[test]
    fn test_empty_feature_list_rejected() {
        let registry = ModelRegistry::new(default_targets(), TrainingConfig::default());
        assert!(registry.train(&synthetic_table(), &[]).is_err());
    }

    #[test]
    fn test_cv_disabled() {
        let training = TrainingConfig {
            cv_folds: 0,
            ..TrainingConfig::default()
        };
        let registry = ModelRegistry::new(default_targets(), training);
        let run = registry.train(&synthetic_table(), &features()).unwrap();
        assert!(run
            .report
            .targets
            .iter()
            .all(|(_, r)| r.cross_validation.is_none()));
    }

    #[test]
    fn test_persist_writes_expected_files() {
        let dir = tempfile::tempdir().unwrap();
        let registry = ModelRegistry::new(default_targets(), TrainingConfig::default());
        let run = registry.train(&synthetic_table(), &features()).unwrap();

        ModelRegistry::persist(&run, dir.path()).unwrap();

        for name in [
            FEATURE_LIST_FILE,
            METADATA_FILE,
            REPORT_FILE,
            "overallScore_model.json",
            "timeToMarket_model.json",
            "timeToMarket_scaler.json",
            "communityGrowth_scaler.json",
        ] {
            assert!(dir.path().join(name).exists(), "{} not written", name);
        }
        assert!(!dir.path().join("overallScore_scaler.json").exists());

        let list: Vec<String> =
            serde_json::from_str(&fs::read_to_string(dir.path().join(FEATURE_LIST_FILE)).unwrap())
                .unwrap();
        assert_eq!(list, features());

        let metadata: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(dir.path().join(METADATA_FILE)).unwrap())
                .unwrap();
        assert_eq!(metadata["models"]["overallScore"]["type"], "LinearRegression");
        assert_eq!(metadata["models"]["overallScore"]["needs_scaling"], false);
        assert_eq!(metadata["targets"][2], "communityGrowth");
    }

    #[test]
    fn test_write_json_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("features.json");
        let names: Vec<String> = (0..2000).map(|i| format!("dx_metric_{}", i)).collect();

        assert_eq!(write_json(&path, &names).unwrap(), path);
        let read: Vec<String> = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(read, names);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_write_json_reports_failed_flush() {
        // Every write to /dev/full fails with ENOSPC.
        let full = Path::new("/dev/full");
        if !full.exists() {
            return;
        }
        let result = write_json(full, &features());
        assert!(matches!(result, Err(PipelineError::Io(_))));
    }
}
