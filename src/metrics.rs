//! Regression quality metrics for trained outcome models.

use ndarray::Array1;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Holdout metrics for one model
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegressionMetrics {
    /// Coefficient of determination
    pub r2: f64,
    /// Root mean squared error
    pub rmse: f64,
    /// Mean absolute error
    pub mae: f64,
}

impl RegressionMetrics {
    /// Score predictions against the true values.
    ///
    /// R² is 1.0 for a constant target predicted exactly and 0.0 for a
    /// constant target predicted with any error.
    pub fn evaluate(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Self {
        let n = y_true.len().min(y_pred.len());
        if n == 0 {
            return Self {
                r2: 0.0,
                rmse: 0.0,
                mae: 0.0,
            };
        }

        let mean = y_true.iter().take(n).sum::<f64>() / n as f64;
        let mut ss_res = 0.0;
        let mut ss_tot = 0.0;
        let mut abs_sum = 0.0;
        for (t, p) in y_true.iter().zip(y_pred.iter()) {
            let err = t - p;
            ss_res += err * err;
            abs_sum += err.abs();
            ss_tot += (t - mean) * (t - mean);
        }

        let r2 = if ss_tot > 0.0 {
            1.0 - ss_res / ss_tot
        } else if ss_res == 0.0 {
            1.0
        } else {
            0.0
        };

        Self {
            r2,
            rmse: (ss_res / n as f64).sqrt(),
            mae: abs_sum / n as f64,
        }
    }
}

/// Cross-validated R² over the training partition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CvSummary {
    pub fold_scores: Vec<f64>,
    pub mean: f64,
    pub std: f64,
}

impl CvSummary {
    pub fn from_scores(fold_scores: Vec<f64>) -> Self {
        if fold_scores.is_empty() {
            return Self {
                fold_scores,
                mean: 0.0,
                std: 0.0,
            };
        }
        let n = fold_scores.len() as f64;
        let mean = fold_scores.iter().sum::<f64>() / n;
        let variance = fold_scores.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n;
        Self {
            fold_scores,
            mean,
            std: variance.sqrt(),
        }
    }
}

/// Log one target's evaluation
pub fn log_evaluation(target: &str, metrics: &RegressionMetrics, cv: Option<&CvSummary>) {
    info!(
        target = %target,
        r2 = metrics.r2,
        rmse = metrics.rmse,
        mae = metrics.mae,
        "Holdout evaluation"
    );
    if let Some(cv) = cv {
        info!(
            target = %target,
            folds = cv.fold_scores.len(),
            "CV R²: {:.4} (+/- {:.4})",
            cv.mean,
            cv.std * 2.0
        );
    }
}
