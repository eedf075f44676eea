//! Request and response payloads of the prediction CLI.

use crate::error::{PipelineError, Result};
use crate::types::metrics::RawMetricsRecord;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;

/// Number of missing feature names echoed back in a prediction warning
pub const MISSING_FEATURES_SHOWN: usize = 5;

/// Round to two decimal places, half away from zero.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Values keyed by target name, kept in target configuration order.
///
/// Serializes as a JSON object.
#[derive(Debug, Clone, PartialEq)]
pub struct PerTarget<T>(Vec<(String, T)>);

impl<T> PerTarget<T> {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self(Vec::with_capacity(capacity))
    }

    pub fn push(&mut self, target: impl Into<String>, value: T) {
        self.0.push((target.into(), value));
    }

    pub fn get(&self, target: &str) -> Option<&T> {
        self.0
            .iter()
            .find(|(name, _)| name == target)
            .map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &T)> {
        self.0.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn targets(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<T> Default for PerTarget<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FromIterator<(String, T)> for PerTarget<T> {
    fn from_iter<I: IntoIterator<Item = (String, T)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<T: Serialize> Serialize for PerTarget<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, value) in &self.0 {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Parsed CLI input.
#[derive(Debug, Clone, PartialEq)]
pub enum PredictionRequest {
    /// Plain prediction on a raw record
    Predict(RawMetricsRecord),
    /// What-if comparison of a record against overridden metric values
    WhatIf {
        metrics: RawMetricsRecord,
        overrides: BTreeMap<String, f64>,
    },
}

impl PredictionRequest {
    /// Parse the single JSON argument accepted by the CLI.
    ///
    /// An object carrying a `whatif` key is a what-if request; any other
    /// object is read as a raw metrics record.
    pub fn parse(input: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(input)
            .map_err(|e| PipelineError::InvalidInput(format!("Invalid JSON: {}", e)))?;

        let Value::Object(mut object) = value else {
            return Err(PipelineError::InvalidInput(
                "Input must be a JSON object".to_string(),
            ));
        };

        if let Some(whatif) = object.remove("whatif") {
            let metrics = match object.remove("metrics") {
                None | Some(Value::Null) => RawMetricsRecord::default(),
                Some(metrics) => serde_json::from_value(metrics).map_err(|e| {
                    PipelineError::InvalidInput(format!("Invalid metrics: {}", e))
                })?,
            };
            let overrides = match whatif {
                Value::Null => BTreeMap::new(),
                other => serde_json::from_value(other).map_err(|e| {
                    PipelineError::InvalidInput(format!("Invalid whatif changes: {}", e))
                })?,
            };
            return Ok(PredictionRequest::WhatIf { metrics, overrides });
        }

        let record = serde_json::from_value(Value::Object(object))
            .map_err(|e| PipelineError::InvalidInput(format!("Invalid metrics: {}", e)))?;
        Ok(PredictionRequest::Predict(record))
    }
}

/// Advisory list of features that had to be defaulted to 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MissingFeatureWarning {
    pub missing_features: Vec<String>,
    pub total_missing: usize,
}

impl MissingFeatureWarning {
    /// Build a warning showing at most `shown` names, or `None` if nothing is missing.
    pub fn from_missing(missing: &[String], shown: usize) -> Option<Self> {
        if missing.is_empty() {
            return None;
        }
        Some(Self {
            missing_features: missing.iter().take(shown).cloned().collect(),
            total_missing: missing.len(),
        })
    }
}

/// Baseline versus modified prediction for one target.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetChange {
    pub baseline: f64,
    pub predicted: f64,
    pub change: f64,
    pub change_percent: f64,
}

impl TargetChange {
    /// Compare two predictions. The percentage is 0 when the baseline is 0.
    pub fn between(baseline: f64, predicted: f64) -> Self {
        let diff = predicted - baseline;
        let change_percent = if baseline != 0.0 {
            round2(diff / baseline * 100.0)
        } else {
            0.0
        };
        Self {
            baseline,
            predicted,
            change: round2(diff),
            change_percent,
        }
    }
}

/// Successful CLI output document.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PredictionResponse {
    Prediction {
        predictions: PerTarget<f64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        warnings: Option<MissingFeatureWarning>,
    },
    Whatif {
        changes: BTreeMap<String, f64>,
        analysis: PerTarget<TargetChange>,
    },
}

/// Failure document printed by the CLI.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            usage: None,
        }
    }

    pub fn with_usage(mut self, usage: impl Into<String>) -> Self {
        self.usage = Some(usage.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::metrics::GroupKind;
    use serde_json::json;

    #[test]
    fn test_parse_plain_prediction() {
        let request =
            PredictionRequest::parse(r#"{"developerExperience": {"codeReviewDuration": 50}}"#)
                .unwrap();
        match request {
            PredictionRequest::Predict(record) => assert_eq!(
                record.metric(GroupKind::DeveloperExperience, "codeReviewDuration"),
                50.0
            ),
            other => panic!("unexpected request: {:?}", other),
        }
    }

    #[test]
    fn test_parse_whatif_request() {
        let request = PredictionRequest::parse(
            r#"{"metrics": {"technicalPerformance": {"testCoverage": 70}},
                "whatif": {"tp_testCoverage": 90, "dx_codeReviewDuration": 24}}"#,
        )
        .unwrap();
        match request {
            PredictionRequest::WhatIf { metrics, overrides } => {
                assert_eq!(metrics.metric(GroupKind::TechnicalPerformance, "testCoverage"), 70.0);
                assert_eq!(overrides.len(), 2);
                assert_eq!(overrides["tp_testCoverage"], 90.0);
            }
            other => panic!("unexpected request: {:?}", other),
        }
    }

    #[test]
    fn test_parse_whatif_without_metrics() {
        let request = PredictionRequest::parse(r#"{"whatif": {"tp_testCoverage": 90}}"#).unwrap();
        assert!(matches!(
            request,
            PredictionRequest::WhatIf { ref metrics, .. } if *metrics == RawMetricsRecord::default()
        ));
    }

    #[test]
    fn test_parse_rejects_invalid_json() {
        let err = PredictionRequest::parse("{not json").unwrap_err();
        assert!(matches!(err, PipelineError::InvalidInput(_)));
        assert!(err.to_string().starts_with("Invalid JSON"));
    }

    #[test]
    fn test_parse_rejects_non_object() {
        let err = PredictionRequest::parse("[1, 2, 3]").unwrap_err();
        assert!(matches!(err, PipelineError::InvalidInput(_)));
    }

    #[test]
    fn test_target_change_example() {
        let change = TargetChange::between(70.0, 73.5);
        assert_eq!(change.change, 3.5);
        assert_eq!(change.change_percent, 5.0);
    }

    #[test]
    fn test_target_change_zero_baseline() {
        let change = TargetChange::between(0.0, 12.0);
        assert_eq!(change.change, 12.0);
        assert_eq!(change.change_percent, 0.0);
    }

    #[test]
    fn test_missing_warning_truncates() {
        let missing: Vec<String> = (0..8).map(|i| format!("feature_{}", i)).collect();
        let warning = MissingFeatureWarning::from_missing(&missing, MISSING_FEATURES_SHOWN).unwrap();
        assert_eq!(warning.missing_features.len(), 5);
        assert_eq!(warning.total_missing, 8);
        assert!(MissingFeatureWarning::from_missing(&[], MISSING_FEATURES_SHOWN).is_none());
    }

    #[test]
    fn test_prediction_response_shape() {
        let mut predictions = PerTarget::new();
        predictions.push("overallScore", 71.25);
        predictions.push("timeToMarket", 12.0);
        let response = PredictionResponse::Prediction {
            predictions,
            warnings: None,
        };

        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(
            value,
            json!({"type": "prediction", "predictions": {"overallScore": 71.25, "timeToMarket": 12.0}})
        );
    }

    #[test]
    fn test_whatif_response_shape() {
        let mut analysis = PerTarget::new();
        analysis.push("overallScore", TargetChange::between(70.0, 73.5));
        let mut changes = BTreeMap::new();
        changes.insert("dx_codeReviewDuration".to_string(), 24.0);

        let value = serde_json::to_value(PredictionResponse::Whatif { changes, analysis }).unwrap();
        assert_eq!(value["type"], "whatif");
        assert_eq!(value["changes"]["dx_codeReviewDuration"], 24.0);
        assert_eq!(value["analysis"]["overallScore"]["changePercent"], 5.0);
        assert_eq!(value["analysis"]["overallScore"]["predicted"], 73.5);
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(3.14159), 3.14);
        assert_eq!(round2(-2.675001), -2.68);
        assert_eq!(round2(10.0), 10.0);
    }
}
