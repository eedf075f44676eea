//! Predictor: raw metrics in, one rounded prediction per target out.

use crate::error::{PipelineError, Result};
use crate::feature_extractor::{FeatureExtractor, FeatureMap};
use crate::models::loader::ModelLoader;
use crate::models::registry::ModelBundleSet;
use crate::types::{round2, MissingFeatureWarning, PerTarget, RawMetricsRecord};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Result of one prediction
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    /// Rounded prediction per target, in target order
    pub predictions: PerTarget<f64>,
    /// Features that were defaulted to 0, in feature-list order
    pub missing_features: Vec<String>,
}

impl Prediction {
    /// Advisory warning listing at most `shown` missing names.
    pub fn warning(&self, shown: usize) -> Option<MissingFeatureWarning> {
        MissingFeatureWarning::from_missing(&self.missing_features, shown)
    }
}

/// Build the positional feature vector for `feature_names`.
///
/// A name absent from `features` is retried with its first `<prefix>_`
/// segment removed (`tp_avg_tp` -> `avg_tp`). This is a best-effort
/// compatibility lookup, not a schema mapping. Anything still unresolved
/// becomes 0 and is reported as missing.
pub fn assemble_vector(feature_names: &[String], features: &FeatureMap) -> (Vec<f64>, Vec<String>) {
    let mut vector = Vec::with_capacity(feature_names.len());
    let mut missing = Vec::new();

    for name in feature_names {
        let value = features.get(name).or_else(|| {
            name.split_once('_')
                .and_then(|(_, stripped)| features.get(stripped))
        });
        match value {
            Some(v) => vector.push(v),
            None => {
                vector.push(0.0);
                missing.push(name.clone());
            }
        }
    }

    (vector, missing)
}

/// Predictor over a loaded, read-only bundle set
#[derive(Debug, Clone)]
pub struct InferenceEngine {
    extractor: FeatureExtractor,
    bundles: Arc<ModelBundleSet>,
}

impl InferenceEngine {
    pub fn new(bundles: Arc<ModelBundleSet>) -> Self {
        Self {
            extractor: FeatureExtractor::new(),
            bundles,
        }
    }

    /// Load the bundle set from `models_dir`.
    pub fn from_dir<P: AsRef<Path>>(models_dir: P) -> Result<Self> {
        let bundles = ModelLoader::new(models_dir.as_ref()).load()?;
        Ok(Self::new(Arc::new(bundles)))
    }

    pub fn target_count(&self) -> usize {
        self.bundles.models().len()
    }

    pub fn target_names(&self) -> Vec<&str> {
        self.bundles.targets().collect()
    }

    /// Engineer features from `raw` and predict every target.
    pub fn predict(&self, raw: &RawMetricsRecord) -> Result<Prediction> {
        let features = self.extractor.engineer(raw);
        self.predict_features(&features)
    }

    /// Predict every target from already engineered features.
    ///
    /// Either every target gets a finite value or an error is returned.
    pub fn predict_features(&self, features: &FeatureMap) -> Result<Prediction> {
        let (vector, missing_features) = assemble_vector(self.bundles.feature_names(), features);
        if !missing_features.is_empty() {
            debug!(
                missing = missing_features.len(),
                total = vector.len(),
                "Defaulted missing features to 0"
            );
        }

        let mut predictions = PerTarget::with_capacity(self.target_count());
        for trained in self.bundles.models() {
            let value = trained.predict_vector(&vector)?;
            if !value.is_finite() {
                return Err(PipelineError::Inference(format!(
                    "{} prediction is not a finite number ({})",
                    trained.target, value
                )));
            }
            predictions.push(trained.target.clone(), round2(value));
        }

        Ok(Prediction {
            predictions,
            missing_features,
        })
    }
}
