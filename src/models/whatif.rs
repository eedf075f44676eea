//! What-if analysis: predict a record, predict an edited copy, diff the two.

use crate::error::Result;
use crate::models::inference::InferenceEngine;
use crate::types::{GroupKind, PerTarget, RawMetricsRecord, TargetChange};
use std::collections::BTreeMap;
use tracing::debug;

/// Copy `raw` with `overrides` applied.
///
/// Keys are `<prefix>_<metric>` with prefix `dx`, `tp` or `bi`; the group is
/// created when absent. Keys with any other prefix are skipped.
pub fn apply_overrides(raw: &RawMetricsRecord, overrides: &BTreeMap<String, f64>) -> RawMetricsRecord {
    let mut modified = raw.clone();
    for (key, &value) in overrides {
        match GroupKind::parse_feature_key(key) {
            Some((kind, metric)) => modified.set_metric(kind, metric, value),
            None => debug!(key = %key, "Ignoring override with unknown prefix"),
        }
    }
    modified
}

/// Compares baseline predictions with predictions on overridden metrics.
#[derive(Debug, Clone)]
pub struct WhatIfEngine {
    predictor: InferenceEngine,
}

impl WhatIfEngine {
    pub fn new(predictor: InferenceEngine) -> Self {
        Self { predictor }
    }

    /// Per-target baseline, modified value and change.
    ///
    /// `raw` is never modified; overrides go to a copy.
    pub fn analyze(
        &self,
        raw: &RawMetricsRecord,
        overrides: &BTreeMap<String, f64>,
    ) -> Result<PerTarget<TargetChange>> {
        let baseline = self.predictor.predict(raw)?;
        let modified = self.predictor.predict(&apply_overrides(raw, overrides))?;

        Ok(baseline
            .predictions
            .iter()
            .map(|(target, &base)| {
                let predicted = modified.predictions.get(target).copied().unwrap_or(base);
                (target.to_string(), TargetChange::between(base, predicted))
            })
            .collect())
    }
}
