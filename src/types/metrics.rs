//! Raw project metric records as produced by the metrics collectors.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// The three metric groups a project record is organised into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GroupKind {
    DeveloperExperience,
    TechnicalPerformance,
    BusinessImpact,
}

impl GroupKind {
    pub const ALL: [GroupKind; 3] = [
        GroupKind::DeveloperExperience,
        GroupKind::TechnicalPerformance,
        GroupKind::BusinessImpact,
    ];

    /// Feature-name prefix used for metrics of this group (`dx`, `tp`, `bi`).
    pub fn prefix(self) -> &'static str {
        match self {
            GroupKind::DeveloperExperience => "dx",
            GroupKind::TechnicalPerformance => "tp",
            GroupKind::BusinessImpact => "bi",
        }
    }

    /// Split a prefixed feature key such as `dx_codeReviewDuration` into its
    /// group and bare metric name. Returns `None` for unknown prefixes.
    pub fn parse_feature_key(key: &str) -> Option<(GroupKind, &str)> {
        Self::ALL.iter().find_map(|&group| {
            key.strip_prefix(group.prefix())
                .and_then(|rest| rest.strip_prefix('_'))
                .map(|metric| (group, metric))
        })
    }
}

/// Metric name to value mapping for one group.
///
/// Non-numeric values in the incoming JSON are dropped during
/// deserialization and therefore read back as 0.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct MetricGroup(BTreeMap<String, f64>);

impl MetricGroup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, metric: &str) -> Option<f64> {
        self.0.get(metric).copied()
    }

    pub fn insert(&mut self, metric: impl Into<String>, value: f64) {
        self.0.insert(metric.into(), value);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'de> Deserialize<'de> for MetricGroup {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = BTreeMap::<String, serde_json::Value>::deserialize(deserializer)?;
        Ok(MetricGroup(
            raw.into_iter()
                .filter_map(|(name, value)| value.as_f64().map(|v| (name, v)))
                .collect(),
        ))
    }
}

/// A single project's raw metrics, grouped by outcome category.
///
/// Any group or metric may be absent; absent values read as 0.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMetricsRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub developer_experience: Option<MetricGroup>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub technical_performance: Option<MetricGroup>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_impact: Option<MetricGroup>,
}

impl RawMetricsRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn group(&self, kind: GroupKind) -> Option<&MetricGroup> {
        match kind {
            GroupKind::DeveloperExperience => self.developer_experience.as_ref(),
            GroupKind::TechnicalPerformance => self.technical_performance.as_ref(),
            GroupKind::BusinessImpact => self.business_impact.as_ref(),
        }
    }

    /// Mutable access to a group, creating it when absent.
    pub fn group_mut(&mut self, kind: GroupKind) -> &mut MetricGroup {
        let slot = match kind {
            GroupKind::DeveloperExperience => &mut self.developer_experience,
            GroupKind::TechnicalPerformance => &mut self.technical_performance,
            GroupKind::BusinessImpact => &mut self.business_impact,
        };
        slot.get_or_insert_with(MetricGroup::new)
    }

    /// Metric value, defaulting to 0 when the group or metric is missing.
    pub fn metric(&self, kind: GroupKind, metric: &str) -> f64 {
        self.group(kind)
            .and_then(|group| group.get(metric))
            .unwrap_or(0.0)
    }

    pub fn set_metric(&mut self, kind: GroupKind, metric: impl Into<String>, value: f64) {
        self.group_mut(kind).insert(metric, value);
    }

    /// Builder-style setter.
    pub fn with_metric(mut self, kind: GroupKind, metric: &str, value: f64) -> Self {
        self.set_metric(kind, metric, value);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_deserialization() {
        let json = r#"{
            "developerExperience": {"codeReviewDuration": 50, "debuggingTime": 12.5},
            "technicalPerformance": {"testCoverage": 80},
            "businessImpact": {}
        }"#;
        let record: RawMetricsRecord = serde_json::from_str(json).unwrap();

        assert_eq!(
            record.metric(GroupKind::DeveloperExperience, "codeReviewDuration"),
            50.0
        );
        assert_eq!(record.metric(GroupKind::DeveloperExperience, "debuggingTime"), 12.5);
        assert_eq!(record.metric(GroupKind::TechnicalPerformance, "testCoverage"), 80.0);
        assert!(record.group(GroupKind::BusinessImpact).unwrap().is_empty());
    }

    #[test]
    fn test_missing_groups_default_to_zero() {
        let record: RawMetricsRecord = serde_json::from_str("{}").unwrap();
        assert_eq!(record.metric(GroupKind::BusinessImpact, "activeContributors"), 0.0);

        let record: RawMetricsRecord =
            serde_json::from_str(r#"{"developerExperience": null}"#).unwrap();
        assert!(record.developer_experience.is_none());
    }

    #[test]
    fn test_non_numeric_values_are_dropped() {
        let json = r#"{"technicalPerformance": {"testCoverage": "high", "bundleSize": 120}}"#;
        let record: RawMetricsRecord = serde_json::from_str(json).unwrap();
        let group = record.group(GroupKind::TechnicalPerformance).unwrap();

        assert_eq!(group.len(), 1);
        assert_eq!(group.get("testCoverage"), None);
        assert_eq!(group.get("bundleSize"), Some(120.0));
    }

    #[test]
    fn test_parse_feature_key() {
        assert_eq!(
            GroupKind::parse_feature_key("dx_codeReviewDuration"),
            Some((GroupKind::DeveloperExperience, "codeReviewDuration"))
        );
        assert_eq!(
            GroupKind::parse_feature_key("bi_activeContributors"),
            Some((GroupKind::BusinessImpact, "activeContributors"))
        );
        assert_eq!(GroupKind::parse_feature_key("avg_dx"), None);
        assert_eq!(GroupKind::parse_feature_key("dxcodeReviewDuration"), None);
    }

    #[test]
    fn test_group_mut_creates_missing_group() {
        let mut record = RawMetricsRecord::new();
        record.set_metric(GroupKind::BusinessImpact, "activeContributors", 7.0);

        assert_eq!(record.metric(GroupKind::BusinessImpact, "activeContributors"), 7.0);
        assert!(record.developer_experience.is_none());
    }
}
