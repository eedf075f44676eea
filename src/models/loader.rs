//! Persisted model loader

use crate::error::{PipelineError, Result};
use crate::models::linear::LinearModel;
use crate::models::registry::{
    model_file, scaler_file, ModelBundleSet, ModelMetadata, TrainedModel, FEATURE_LIST_FILE,
    METADATA_FILE,
};
use crate::models::scaler::StandardScaler;
use serde::de::DeserializeOwned;
use std::fs;
use std::path::PathBuf;
use tracing::{debug, info};

/// Loader for the artifacts written by the model registry
pub struct ModelLoader {
    models_dir: PathBuf,
}

impl ModelLoader {
    pub fn new<P: Into<PathBuf>>(models_dir: P) -> Self {
        Self {
            models_dir: models_dir.into(),
        }
    }

    /// Load the full bundle set.
    ///
    /// All or nothing: if any target's model or scaler is missing, corrupt,
    /// or sized for a different feature list, no bundle is returned.
    pub fn load(&self) -> Result<ModelBundleSet> {
        let metadata: ModelMetadata = self.read_json(METADATA_FILE)?;
        let feature_names: Vec<String> = self.read_json(FEATURE_LIST_FILE)?;

        if metadata.targets.is_empty() {
            return Err(PipelineError::artifact(
                self.models_dir.join(METADATA_FILE),
                "no targets listed",
            ));
        }

        let mut models = Vec::with_capacity(metadata.targets.len());
        for target in &metadata.targets {
            let info = metadata.models.get(target).ok_or_else(|| {
                PipelineError::artifact(
                    self.models_dir.join(METADATA_FILE),
                    format!("no model entry for target '{}'", target),
                )
            })?;

            let file = model_file(target);
            let model: LinearModel = self.read_json(&file)?;
            if !model.is_consistent() || model.n_features() != feature_names.len() {
                return Err(PipelineError::artifact(
                    self.models_dir.join(&file),
                    format!(
                        "model has {} features, feature list has {}",
                        model.coefficients.len(),
                        feature_names.len()
                    ),
                ));
            }
            if model.kind.name() != info.model_type {
                return Err(PipelineError::artifact(
                    self.models_dir.join(&file),
                    format!(
                        "model family {} does not match metadata ({})",
                        model.kind.name(),
                        info.model_type
                    ),
                ));
            }

            let scaler = if info.needs_scaling {
                let file = scaler_file(target);
                let scaler: StandardScaler = self.read_json(&file)?;
                if scaler.n_features() != feature_names.len()
                    || scaler.scale.len() != scaler.mean.len()
                {
                    return Err(PipelineError::artifact(
                        self.models_dir.join(&file),
                        format!(
                            "scaler has {} features, feature list has {}",
                            scaler.n_features(),
                            feature_names.len()
                        ),
                    ));
                }
                Some(scaler)
            } else {
                None
            };

            debug!(
                target = %target,
                family = %info.model_type,
                scaled = scaler.is_some(),
                "Loaded model"
            );
            models.push(TrainedModel {
                target: target.clone(),
                model,
                scaler,
            });
        }

        info!(
            count = models.len(),
            features = feature_names.len(),
            dir = %self.models_dir.display(),
            "Loaded outcome models"
        );

        Ok(ModelBundleSet::new(feature_names, models, metadata))
    }

    fn read_json<T: DeserializeOwned>(&self, file: &str) -> Result<T> {
        let path = self.models_dir.join(file);
        let contents =
            fs::read_to_string(&path).map_err(|e| PipelineError::artifact(&path, e))?;
        serde_json::from_str(&contents).map_err(|e| PipelineError::artifact(&path, e))
    }
}
