//! Offline feature selection for the outcome models.
//!
//! Narrows a training table down to an ordered feature list in four passes:
//! drop targets, drop leaked target proxies, drop highly correlated columns,
//! drop scaled duplicates. Each pass only removes columns, and the survivors
//! keep the table's column order, so the result depends on that order.

use crate::config::SelectionConfig;
use crate::dataset::FeatureTable;
use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info};

const STD_SUFFIX: &str = "_std";
const NORM_SUFFIX: &str = "_norm";

/// Outcome of a selection run, including what each pass removed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionReport {
    /// Ordered feature list; vector positions at inference follow this order
    pub selected: Vec<String>,
    /// Columns whose names contain a target concept
    pub leaked: Vec<String>,
    /// Columns dropped for correlating with an earlier column
    pub correlated: Vec<String>,
    /// `_std` / `_norm` columns whose unscaled (or `_std`) form was kept
    pub scaled_duplicates: Vec<String>,
}

/// Feature selector for the training table.
#[derive(Debug, Clone)]
pub struct FeatureSelector {
    config: SelectionConfig,
    target_columns: Vec<String>,
}

impl FeatureSelector {
    pub fn new(config: SelectionConfig, target_columns: Vec<String>) -> Self {
        Self {
            config,
            target_columns,
        }
    }

    /// Run all passes over `table`.
    pub fn select(&self, table: &FeatureTable) -> SelectionReport {
        let candidates: Vec<String> = table
            .columns()
            .iter()
            .filter(|c| !self.is_target(c))
            .cloned()
            .collect();
        debug!(count = candidates.len(), "Initial feature candidates");

        let (candidates, leaked) = self.drop_leaked(candidates);
        info!(
            removed = leaked.len(),
            remaining = candidates.len(),
            "Removed leaked features"
        );

        let (candidates, correlated) = self.drop_correlated(table, candidates);
        info!(
            removed = correlated.len(),
            remaining = candidates.len(),
            threshold = self.config.correlation_threshold,
            "Removed highly correlated features"
        );

        let (selected, scaled_duplicates) = drop_scaled_duplicates(candidates);
        info!(
            removed = scaled_duplicates.len(),
            selected = selected.len(),
            "Removed scaled duplicates"
        );

        SelectionReport {
            selected,
            leaked,
            correlated,
            scaled_duplicates,
        }
    }

    fn is_target(&self, column: &str) -> bool {
        self.target_columns.iter().any(|t| t == column)
    }

    fn drop_leaked(&self, candidates: Vec<String>) -> (Vec<String>, Vec<String>) {
        candidates.into_iter().partition(|column| {
            self.is_target(column)
                || !self
                    .config
                    .leakage_patterns
                    .iter()
                    .any(|pattern| column.contains(pattern.as_str()))
        })
    }

    /// Upper-triangle scan: a column goes if it correlates above the
    /// threshold with any earlier candidate, dropped or not.
    fn drop_correlated(
        &self,
        table: &FeatureTable,
        candidates: Vec<String>,
    ) -> (Vec<String>, Vec<String>) {
        let columns: Vec<ArrayView1<'_, f64>> = candidates
            .iter()
            .filter_map(|name| table.column(name))
            .collect();

        let mut keep = Vec::with_capacity(candidates.len());
        let mut dropped = Vec::new();
        for (j, name) in candidates.into_iter().enumerate() {
            let over = (0..j).find(|&i| {
                pearson_correlation(columns[i], columns[j]).abs()
                    > self.config.correlation_threshold
            });
            match over {
                Some(i) => {
                    debug!(column = %name, earlier_index = i, "Correlated column dropped");
                    dropped.push(name);
                }
                None => keep.push(name),
            }
        }
        (keep, dropped)
    }
}

/// Keep unscaled columns; keep `_std` only without its base; keep `_norm`
/// only without its base or its `_std` form.
fn drop_scaled_duplicates(candidates: Vec<String>) -> (Vec<String>, Vec<String>) {
    let mut original = Vec::new();
    let mut std_cols = Vec::new();
    let mut norm_cols = Vec::new();

    for column in candidates {
        if column.ends_with(STD_SUFFIX) {
            std_cols.push(column);
        } else if column.ends_with(NORM_SUFFIX) {
            norm_cols.push(column);
        } else {
            original.push(column);
        }
    }

    let original_set: HashSet<String> = original.iter().cloned().collect();
    let mut kept = original;
    let mut dropped = Vec::new();

    for column in std_cols {
        let base = &column[..column.len() - STD_SUFFIX.len()];
        if original_set.contains(base) {
            dropped.push(column);
        } else {
            kept.push(column);
        }
    }

    for column in norm_cols {
        let base = &column[..column.len() - NORM_SUFFIX.len()];
        let std_form = format!("{}{}", base, STD_SUFFIX);
        if original_set.contains(base) || kept.contains(&std_form) {
            dropped.push(column);
        } else {
            kept.push(column);
        }
    }

    (kept, dropped)
}

/// Pearson correlation; 0 when either column has zero variance.
pub fn pearson_correlation(x: ArrayView1<'_, f64>, y: ArrayView1<'_, f64>) -> f64 {
    let n = x.len();
    if n < 2 || n != y.len() {
        return 0.0;
    }

    let x_mean = x.mean().unwrap_or(0.0);
    let y_mean = y.mean().unwrap_or(0.0);

    let mut sum_xy = 0.0;
    let mut sum_x2 = 0.0;
    let mut sum_y2 = 0.0;
    for (&xi, &yi) in x.iter().zip(y.iter()) {
        let dx = xi - x_mean;
        let dy = yi - y_mean;
        sum_xy += dx * dy;
        sum_x2 += dx * dx;
        sum_y2 += dy * dy;
    }

    let denom = (sum_x2 * sum_y2).sqrt();
    if denom == 0.0 || !denom.is_finite() {
        0.0
    } else {
        sum_xy / denom
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_targets;
    use ndarray::Array1;

    fn selector() -> FeatureSelector {
        let targets = default_targets().into_iter().map(|t| t.column).collect();
        FeatureSelector::new(SelectionConfig::default(), targets)
    }

    fn col(name: &str, values: &[f64]) -> (String, Vec<f64>) {
        (name.to_string(), values.to_vec())
    }

    fn table(columns: Vec<(String, Vec<f64>)>) -> FeatureTable {
        FeatureTable::from_columns(columns).unwrap()
    }

    #[test]
    fn test_targets_and_leaks_removed() {
        let t = table(vec![
            col("dx_buildTime", &[1.0, 2.0, 3.0, 4.0]),
            col("overallScore", &[5.0, 1.0, 4.0, 2.0]),
            col("bi_timeToMarket", &[3.0, 3.0, 1.0, 0.0]),
            col("bi_communityGrowth", &[1.0, 0.0, 1.0, 0.0]),
            col("bi_timeToMarket_log", &[0.0, 1.0, 1.0, 0.0]),
            col("overallScore_rank", &[2.0, 2.0, 1.0, 1.0]),
        ]);
        let report = selector().select(&t);

        assert_eq!(report.selected, vec!["dx_buildTime"]);
        assert_eq!(report.leaked, vec!["bi_timeToMarket_log", "overallScore_rank"]);
    }

    #[test]
    fn test_correlated_later_column_dropped() {
        let t = table(vec![
            col("a", &[1.0, 2.0, 3.0, 4.0, 5.0]),
            col("b", &[5.0, 3.0, 4.0, 1.0, 2.0]),
            col("a_times_two", &[2.0, 4.0, 6.0, 8.0, 10.0]),
            col("neg_a", &[-1.0, -2.0, -3.0, -4.0, -5.0]),
        ]);
        let report = selector().select(&t);

        assert_eq!(report.selected, vec!["a", "b"]);
        assert_eq!(report.correlated, vec!["a_times_two", "neg_a"]);
    }

    #[test]
    fn test_constant_columns_survive_correlation_pass() {
        let t = table(vec![
            col("zero", &[0.0, 0.0, 0.0]),
            col("also_zero", &[0.0, 0.0, 0.0]),
        ]);
        let report = selector().select(&t);
        assert_eq!(report.selected, vec!["zero", "also_zero"]);
    }

    #[test]
    fn test_scaled_duplicates() {
        let (kept, dropped) = drop_scaled_duplicates(vec![
            "x".to_string(),
            "x_std".to_string(),
            "x_norm".to_string(),
            "y_std".to_string(),
            "y_norm".to_string(),
            "z_norm".to_string(),
            "w".to_string(),
        ]);

        assert_eq!(kept, vec!["x", "w", "y_std", "z_norm"]);
        assert_eq!(dropped, vec!["x_std", "x_norm", "y_norm"]);
    }

    #[test]
    fn test_selection_is_stable() {
        let columns = vec![
            col("dx_buildTime", &[3.0, 1.0, 4.0, 1.0, 5.0, 9.0]),
            col("tp_testCoverage", &[2.0, 7.0, 1.0, 8.0, 2.0, 8.0]),
            col("tp_testCoverage_std", &[-1.0, 1.0, -1.2, 1.3, -1.0, 1.3]),
            col("avg_tp", &[6.0, 2.0, 6.0, 4.0, 3.0, 3.0]),
            col("overallScore", &[60.0, 70.0, 65.0, 80.0, 75.0, 90.0]),
        ];
        let first = selector().select(&table(columns.clone()));
        for _ in 0..5 {
            assert_eq!(selector().select(&table(columns.clone())), first);
        }
    }

    #[test]
    fn test_selected_features_respect_invariants() {
        let n = 30;
        let base: Vec<f64> = (0..n).map(|i| (i as f64 * 0.7).sin() * 10.0).collect();
        let other: Vec<f64> = (0..n).map(|i| ((i * i) % 11) as f64).collect();
        let noisy: Vec<f64> = base.iter().zip(&other).map(|(b, o)| b + 0.3 * o).collect();
        let base_std: Vec<f64> = base.iter().map(|v| v / 10.0).collect();
        let target: Vec<f64> = base.iter().map(|v| v * 2.0 + 50.0).collect();

        let t = table(vec![
            col("dx_base", &base),
            col("tp_other", &other),
            col("bi_noisy", &noisy),
            col("dx_base_std", &base_std),
            col("tp_other_norm", &other),
            col("overallScore", &target),
            col("overallScore_norm", &target),
        ]);
        let report = selector().select(&t);

        let patterns = ["timeToMarket", "communityGrowth", "overallScore"];
        for feature in &report.selected {
            assert!(patterns.iter().all(|p| !feature.contains(p)));
            assert!(!report.selected.contains(&format!("{}_std", feature)));
            assert!(!report.selected.contains(&format!("{}_norm", feature)));
        }
        for (i, a) in report.selected.iter().enumerate() {
            for b in &report.selected[i + 1..] {
                let r = pearson_correlation(t.column(a).unwrap(), t.column(b).unwrap());
                assert!(r.abs() <= 0.95, "{} vs {} correlate at {}", a, b, r);
            }
        }
    }

    #[test]
    fn test_pearson_correlation() {
        let x = Array1::from(vec![1.0, 2.0, 3.0, 4.0]);
        let y = Array1::from(vec![2.0, 4.0, 6.0, 8.0]);
        let z = Array1::from(vec![1.0, 1.0, 1.0, 1.0]);

        assert!((pearson_correlation(x.view(), y.view()) - 1.0).abs() < 1e-12);
        assert_eq!(pearson_correlation(x.view(), z.view()), 0.0);
    }
}
