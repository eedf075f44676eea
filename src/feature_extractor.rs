//! Feature engineering for project quality model inference.
//!
//! This module turns a raw metrics record into the named features used
//! when the models were trained. The same function produces the columns of
//! the training table, so its output names must not drift.

use crate::types::metrics::{GroupKind, RawMetricsRecord};
use std::collections::BTreeMap;

/// Developer-experience metrics read from `developerExperience`.
pub const DX_METRICS: [&str; 7] = [
    "codeReviewDuration",
    "debuggingTime",
    "buildTime",
    "successfulDeploymentsRatio",
    "timeToFirstCommit",
    "averageCommentsPerPR",
    "prIterationRate",
];

/// Technical-performance metrics read from `technicalPerformance`.
pub const TP_METRICS: [&str; 6] = [
    "buildTime",
    "testCoverage",
    "typeScriptErrorRate",
    "bundleSize",
    "bundleLoadTime",
    "performanceScore",
];

/// Business-impact metrics read from `businessImpact`.
pub const BI_METRICS: [&str; 5] = [
    "featureSuccessRate",
    "activeContributors",
    "issueResolutionRate",
    "deploymentFrequency",
    "changeFailureRate",
];

/// Enumerated base metrics of a group.
pub fn group_metrics(kind: GroupKind) -> &'static [&'static str] {
    match kind {
        GroupKind::DeveloperExperience => &DX_METRICS,
        GroupKind::TechnicalPerformance => &TP_METRICS,
        GroupKind::BusinessImpact => &BI_METRICS,
    }
}

/// Named feature values produced by [`FeatureExtractor::engineer`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureMap(BTreeMap<String, f64>);

impl FeatureMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.0.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: f64) {
        self.0.insert(name.into(), value);
    }

    pub fn remove(&mut self, name: &str) -> Option<f64> {
        self.0.remove(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Value of a feature that the extractor always emits.
    fn value(&self, name: &str) -> f64 {
        self.get(name).unwrap_or(0.0)
    }
}

/// Feature extractor that transforms raw records into model input features.
///
/// Engineering is a pure function of the record: no state is kept between
/// calls and two calls on equal records yield equal maps.
#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureExtractor;

impl FeatureExtractor {
    /// Create a new feature extractor.
    pub fn new() -> Self {
        Self
    }

    /// Engineer features from a raw metrics record.
    pub fn engineer(&self, raw: &RawMetricsRecord) -> FeatureMap {
        let mut features = FeatureMap::new();

        // Base metrics (18), prefixed by group
        for kind in GroupKind::ALL {
            for metric in group_metrics(kind) {
                features.insert(
                    format!("{}_{}", kind.prefix(), metric),
                    raw.metric(kind, metric),
                );
            }
        }

        // Category averages
        let avg_dx = group_mean(raw, GroupKind::DeveloperExperience);
        let avg_tp = group_mean(raw, GroupKind::TechnicalPerformance);
        let avg_bi = group_mean(raw, GroupKind::BusinessImpact);
        features.insert("avg_dx", avg_dx);
        features.insert("avg_tp", avg_tp);
        features.insert("avg_bi", avg_bi);

        // Interactions
        features.insert("dx_tp_interaction", avg_dx * avg_tp);
        features.insert("tp_bi_interaction", avg_tp * avg_bi);
        features.insert("dx_bi_interaction", avg_dx * avg_bi);

        let review_duration = features.value("dx_codeReviewDuration");
        let test_coverage = features.value("tp_testCoverage");
        let bundle_size = features.value("tp_bundleSize");
        let comments_per_pr = features.value("dx_averageCommentsPerPR");

        // Polynomial terms
        features.insert("dx_codeReviewDuration_squared", review_duration.powi(2));
        features.insert("tp_testCoverage_squared", test_coverage.powi(2));

        // Log transforms of skew-prone metrics; negative inputs clamp to 0
        features.insert("dx_codeReviewDuration_log", review_duration.max(0.0).ln_1p());
        features.insert("tp_bundleSize_log", bundle_size.max(0.0).ln_1p());

        // Ratios
        features.insert("tp_efficiency_ratio", safe_ratio(test_coverage, bundle_size));
        features.insert(
            "dx_review_efficiency",
            safe_ratio(comments_per_pr, review_duration),
        );

        features
    }

    /// Get the number of features produced.
    pub fn feature_count(&self) -> usize {
        DX_METRICS.len() + TP_METRICS.len() + BI_METRICS.len() + 12
    }

    /// Get feature names in generation order.
    pub fn feature_names(&self) -> Vec<String> {
        let mut names: Vec<String> = GroupKind::ALL
            .iter()
            .flat_map(|&kind| {
                group_metrics(kind)
                    .iter()
                    .map(move |metric| format!("{}_{}", kind.prefix(), metric))
            })
            .collect();

        names.extend(
            [
                "avg_dx",
                "avg_tp",
                "avg_bi",
                "dx_tp_interaction",
                "tp_bi_interaction",
                "dx_bi_interaction",
                "dx_codeReviewDuration_squared",
                "tp_testCoverage_squared",
                "dx_codeReviewDuration_log",
                "tp_bundleSize_log",
                "tp_efficiency_ratio",
                "dx_review_efficiency",
            ]
            .iter()
            .map(|name| name.to_string()),
        );
        names
    }
}

/// Mean over all enumerated metrics of a group, missing ones counted as 0.
fn group_mean(raw: &RawMetricsRecord, kind: GroupKind) -> f64 {
    let metrics = group_metrics(kind);
    if metrics.is_empty() {
        return 0.0;
    }
    metrics.iter().map(|m| raw.metric(kind, m)).sum::<f64>() / metrics.len() as f64
}

/// `numerator / denominator`, or 0 when the denominator is not positive.
fn safe_ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}
