//! Linear model families used for the outcome targets.
//!
//! Every family fits `y = w·x + b` on intercept-centered data and persists
//! only the fitted weights, so prediction is identical across families.

use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

fn default_max_iter() -> usize {
    1000
}

fn default_tol() -> f64 {
    1e-6
}

/// Model family and hyperparameters, as declared per target in configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ModelKind {
    /// Ordinary least squares
    LinearRegression,
    /// L2-regularized least squares
    Ridge { alpha: f64 },
    /// L1-regularized least squares (coordinate descent)
    Lasso {
        alpha: f64,
        #[serde(default = "default_max_iter")]
        max_iter: usize,
        #[serde(default = "default_tol")]
        tol: f64,
    },
    /// Mixed L1/L2 regularization (coordinate descent)
    ElasticNet {
        alpha: f64,
        l1_ratio: f64,
        #[serde(default = "default_max_iter")]
        max_iter: usize,
        #[serde(default = "default_tol")]
        tol: f64,
    },
}

impl ModelKind {
    pub fn lasso(alpha: f64) -> Self {
        ModelKind::Lasso {
            alpha,
            max_iter: default_max_iter(),
            tol: default_tol(),
        }
    }

    pub fn elastic_net(alpha: f64, l1_ratio: f64) -> Self {
        ModelKind::ElasticNet {
            alpha,
            l1_ratio,
            max_iter: default_max_iter(),
            tol: default_tol(),
        }
    }

    /// Family name recorded in the metadata file.
    pub fn name(&self) -> &'static str {
        match self {
            ModelKind::LinearRegression => "LinearRegression",
            ModelKind::Ridge { .. } => "Ridge",
            ModelKind::Lasso { .. } => "Lasso",
            ModelKind::ElasticNet { .. } => "ElasticNet",
        }
    }

    /// Fit a model of this family.
    pub fn fit(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<LinearModel> {
        let n_samples = x.nrows();
        if n_samples == 0 {
            return Err(PipelineError::Training("cannot fit on zero rows".to_string()));
        }
        if n_samples != y.len() {
            return Err(PipelineError::Training(format!(
                "expected {} target values, got {}",
                n_samples,
                y.len()
            )));
        }

        let x_mean = x
            .mean_axis(Axis(0))
            .ok_or_else(|| PipelineError::Training("empty feature matrix".to_string()))?;
        let y_mean = y.mean().unwrap_or(0.0);
        let x_c = x - &x_mean.view().insert_axis(Axis(0));
        let y_c = y - y_mean;

        let weights = match *self {
            ModelKind::LinearRegression => solve_normal_equations(&x_c, &y_c, 0.0)?,
            ModelKind::Ridge { alpha } => solve_normal_equations(&x_c, &y_c, alpha)?,
            ModelKind::Lasso {
                alpha,
                max_iter,
                tol,
            } => coordinate_descent(&x_c, &y_c, alpha, 0.0, max_iter, tol),
            ModelKind::ElasticNet {
                alpha,
                l1_ratio,
                max_iter,
                tol,
            } => {
                let l1 = alpha * l1_ratio;
                let l2 = alpha * (1.0 - l1_ratio);
                coordinate_descent(&x_c, &y_c, l1, l2, max_iter, tol)
            }
        };

        let intercept = y_mean - weights.dot(&x_mean);

        Ok(LinearModel {
            kind: self.clone(),
            n_features: weights.len(),
            coefficients: weights.to_vec(),
            intercept,
        })
    }
}

/// A fitted linear model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    pub kind: ModelKind,
    /// Feature vector width the model was fitted on
    pub n_features: usize,
    pub coefficients: Vec<f64>,
    pub intercept: f64,
}

impl LinearModel {
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Whether the declared width matches the stored weights.
    pub fn is_consistent(&self) -> bool {
        self.n_features == self.coefficients.len()
    }

    /// Predict a single feature vector.
    pub fn predict_one(&self, features: &[f64]) -> Result<f64> {
        if features.len() != self.coefficients.len() {
            return Err(PipelineError::Inference(format!(
                "{} model expects {} features, got {}",
                self.kind.name(),
                self.coefficients.len(),
                features.len()
            )));
        }
        Ok(self
            .coefficients
            .iter()
            .zip(features)
            .map(|(w, x)| w * x)
            .sum::<f64>()
            + self.intercept)
    }

    /// Predict every row of a matrix.
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if x.ncols() != self.coefficients.len() {
            return Err(PipelineError::Inference(format!(
                "{} model expects {} features, got {}",
                self.kind.name(),
                self.coefficients.len(),
                x.ncols()
            )));
        }
        let w = Array1::from(self.coefficients.clone());
        Ok(x.dot(&w) + self.intercept)
    }
}

/// Solve `(XᵀX + αI) w = Xᵀy`.
fn solve_normal_equations(x: &Array2<f64>, y: &Array1<f64>, alpha: f64) -> Result<Array1<f64>> {
    let mut xtx = x.t().dot(x);
    if alpha > 0.0 {
        for i in 0..xtx.nrows() {
            xtx[[i, i]] += alpha;
        }
    }
    let xty = x.t().dot(y);

    if let Some(w) = cholesky_solve(&xtx, &xty) {
        return Ok(w);
    }

    // Retry with a small jitter on the diagonal before giving up on Cholesky
    let n = xtx.nrows().max(1);
    let jitter = 1e-8 * xtx.diag().iter().map(|v| v.abs()).sum::<f64>() / n as f64;
    let mut jittered = xtx.clone();
    for i in 0..jittered.nrows() {
        jittered[[i, i]] += jitter.max(1e-12);
    }
    if let Some(w) = cholesky_solve(&jittered, &xty) {
        return Ok(w);
    }

    gauss_jordan_solve(&xtx, &xty).ok_or_else(|| {
        PipelineError::Training("normal equations are singular".to_string())
    })
}

/// Cholesky solve of a symmetric positive-definite system.
fn cholesky_solve(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    let n = a.nrows();
    if n != a.ncols() || n != b.len() {
        return None;
    }

    let mut l = Array2::<f64>::zeros((n, n));
    for i in 0..n {
        for j in 0..=i {
            let sum: f64 = (0..j).map(|k| l[[i, k]] * l[[j, k]]).sum();
            if i == j {
                let diag = a[[i, i]] - sum;
                if diag <= 0.0 {
                    return None;
                }
                l[[i, j]] = diag.sqrt();
            } else {
                l[[i, j]] = (a[[i, j]] - sum) / l[[j, j]];
            }
        }
    }

    // L z = b
    let mut z = Array1::<f64>::zeros(n);
    for i in 0..n {
        let sum: f64 = (0..i).map(|j| l[[i, j]] * z[j]).sum();
        z[i] = (b[i] - sum) / l[[i, i]];
    }

    // Lᵀ w = z
    let mut w = Array1::<f64>::zeros(n);
    for i in (0..n).rev() {
        let sum: f64 = ((i + 1)..n).map(|j| l[[j, i]] * w[j]).sum();
        w[i] = (z[i] - sum) / l[[i, i]];
    }

    Some(w)
}

/// Gauss-Jordan elimination with partial pivoting.
fn gauss_jordan_solve(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    let n = a.nrows();
    let mut aug = Array2::<f64>::zeros((n, n + 1));
    for i in 0..n {
        for j in 0..n {
            aug[[i, j]] = a[[i, j]];
        }
        aug[[i, n]] = b[i];
    }

    for col in 0..n {
        let pivot_row = (col..n).max_by(|&r1, &r2| {
            aug[[r1, col]]
                .abs()
                .partial_cmp(&aug[[r2, col]].abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        })?;
        if aug[[pivot_row, col]].abs() < 1e-12 {
            return None;
        }
        if pivot_row != col {
            for j in 0..=n {
                aug.swap([col, j], [pivot_row, j]);
            }
        }

        let pivot = aug[[col, col]];
        for j in 0..=n {
            aug[[col, j]] /= pivot;
        }
        for row in 0..n {
            if row != col {
                let factor = aug[[row, col]];
                if factor != 0.0 {
                    for j in 0..=n {
                        aug[[row, j]] -= factor * aug[[col, j]];
                    }
                }
            }
        }
    }

    Some(aug.column(n).to_owned())
}

fn soft_threshold(value: f64, threshold: f64) -> f64 {
    if value > threshold {
        value - threshold
    } else if value < -threshold {
        value + threshold
    } else {
        0.0
    }
}

/// Coordinate descent for
/// `(1/2n)‖y − Xw‖² + l1‖w‖₁ + (l2/2)‖w‖²` on centered data.
fn coordinate_descent(
    x: &Array2<f64>,
    y: &Array1<f64>,
    l1: f64,
    l2: f64,
    max_iter: usize,
    tol: f64,
) -> Array1<f64> {
    let n_samples = x.nrows() as f64;
    let n_features = x.ncols();

    let col_norms: Vec<f64> = (0..n_features)
        .map(|j| x.column(j).mapv(|v| v * v).sum())
        .collect();

    let l1_scaled = l1 * n_samples;
    let l2_scaled = l2 * n_samples;

    let mut w = Array1::<f64>::zeros(n_features);
    let mut residual = y.clone();

    for _ in 0..max_iter {
        let mut max_delta = 0.0_f64;

        for j in 0..n_features {
            if col_norms[j] < 1e-15 {
                w[j] = 0.0;
                continue;
            }
            let column = x.column(j);
            let old = w[j];
            let rho = column.dot(&residual) + col_norms[j] * old;
            let new = soft_threshold(rho, l1_scaled) / (col_norms[j] + l2_scaled);
            let delta = old - new;
            if delta != 0.0 {
                residual.scaled_add(delta, &column);
                w[j] = new;
                max_delta = max_delta.max(delta.abs());
            }
        }

        if max_delta < tol {
            break;
        }
    }

    w
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn linear_data() -> (Array2<f64>, Array1<f64>) {
        // y = 2*x1 + 3*x2 + 1
        let x = array![
            [1.0, 1.0],
            [2.0, 1.0],
            [1.0, 2.0],
            [2.0, 2.0],
            [3.0, 1.0],
            [4.0, 3.0],
        ];
        let y = x.map_axis(Axis(1), |row| 2.0 * row[0] + 3.0 * row[1] + 1.0);
        (x, y)
    }

    #[test]
    fn test_linear_regression_recovers_coefficients() {
        let (x, y) = linear_data();
        let model = ModelKind::LinearRegression.fit(&x, &y).unwrap();

        assert!((model.coefficients[0] - 2.0).abs() < 1e-8);
        assert!((model.coefficients[1] - 3.0).abs() < 1e-8);
        assert!((model.intercept - 1.0).abs() < 1e-8);
        assert!((model.predict_one(&[5.0, 5.0]).unwrap() - 26.0).abs() < 1e-8);
    }

    #[test]
    fn test_ridge_shrinks_coefficients() {
        let (x, y) = linear_data();
        let ols = ModelKind::LinearRegression.fit(&x, &y).unwrap();
        let ridge = ModelKind::Ridge { alpha: 10.0 }.fit(&x, &y).unwrap();

        let norm = |m: &LinearModel| m.coefficients.iter().map(|c| c * c).sum::<f64>();
        assert!(norm(&ridge) < norm(&ols));
    }

    #[test]
    fn test_lasso_zeroes_irrelevant_feature() {
        // Second column carries no signal
        let x = array![
            [1.0, 0.5],
            [2.0, -0.5],
            [3.0, 0.5],
            [4.0, -0.5],
            [5.0, 0.5],
            [6.0, -0.5],
        ];
        let y = array![2.0, 4.0, 6.0, 8.0, 10.0, 12.0];
        let model = ModelKind::lasso(0.1).fit(&x, &y).unwrap();

        assert_eq!(model.coefficients[1], 0.0);
        assert!((model.coefficients[0] - 2.0).abs() < 0.1);
    }

    #[test]
    fn test_elastic_net_predicts_reasonably() {
        let (x, y) = linear_data();
        let model = ModelKind::elastic_net(0.01, 0.5).fit(&x, &y).unwrap();
        let predictions = model.predict(&x).unwrap();

        for (p, t) in predictions.iter().zip(y.iter()) {
            assert!((p - t).abs() < 0.5, "prediction {} too far from {}", p, t);
        }
    }

    #[test]
    fn test_constant_column_is_tolerated() {
        let x = array![[1.0, 0.0], [2.0, 0.0], [3.0, 0.0], [4.0, 0.0]];
        let y = array![3.0, 5.0, 7.0, 9.0];
        let model = ModelKind::LinearRegression.fit(&x, &y).unwrap();

        assert!((model.coefficients[0] - 2.0).abs() < 1e-6);
        assert!(model.coefficients[1].abs() < 1e-6);
    }

    #[test]
    fn test_predict_rejects_wrong_width() {
        let (x, y) = linear_data();
        let model = ModelKind::LinearRegression.fit(&x, &y).unwrap();
        assert!(matches!(
            model.predict_one(&[1.0]),
            Err(PipelineError::Inference(_))
        ));
    }

    #[test]
    fn test_fit_rejects_mismatched_target() {
        let (x, _) = linear_data();
        let y = array![1.0, 2.0];
        assert!(matches!(
            ModelKind::LinearRegression.fit(&x, &y),
            Err(PipelineError::Training(_))
        ));
    }

    #[test]
    fn test_model_kind_serialization() {
        let json = serde_json::to_string(&ModelKind::lasso(0.1)).unwrap();
        assert!(json.contains(r#""type":"Lasso""#));

        let kind: ModelKind = serde_json::from_str(r#"{"type": "Ridge", "alpha": 1.0}"#).unwrap();
        assert_eq!(kind, ModelKind::Ridge { alpha: 1.0 });

        let kind: ModelKind = serde_json::from_str(r#"{"type": "Lasso", "alpha": 0.5}"#).unwrap();
        assert_eq!(kind, ModelKind::lasso(0.5));
        assert_eq!(kind.name(), "Lasso");
    }
}
