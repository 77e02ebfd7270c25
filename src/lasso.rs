//! L1-regularized least squares fitted by cyclic coordinate descent.
//!
//! Minimizes `(1 / (2 n)) ||y - X w - b||^2 + alpha ||w||_1`. The intercept `b` is
//! not penalized; it is recovered from the column means after fitting on centered
//! data. Convergence is judged by the duality gap, which is evaluated whenever the
//! largest coefficient update becomes small relative to the largest coefficient.

use anyhow::{bail, Result};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};

use crate::config::{DEFAULT_ALPHA, DEFAULT_MAX_ITER, DEFAULT_TOL};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LassoSettings {
    pub alpha: f64,
    pub max_iter: usize,
    pub tol: f64,
}

impl Default for LassoSettings {
    fn default() -> Self {
        LassoSettings {
            alpha: DEFAULT_ALPHA,
            max_iter: DEFAULT_MAX_ITER,
            tol: DEFAULT_TOL,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LassoModel {
    pub alpha: f64,
    pub coef: Array1<f64>,
    pub intercept: f64,
    pub n_iter: usize,
    pub dual_gap: f64,
    pub converged: bool,
}

impl LassoModel {
    pub fn fit(x: ArrayView2<f64>, y: ArrayView1<f64>, settings: &LassoSettings) -> Result<Self> {
        let (n_samples, n_features) = x.dim();
        if n_samples == 0 {
            bail!("Cannot fit a Lasso model without observations.");
        }
        if y.len() != n_samples {
            bail!(
                "X has {} rows but y has {} values.",
                n_samples,
                y.len()
            );
        }
        if !(settings.alpha >= 0.0) {
            bail!("Lasso alpha must be non-negative, got {}.", settings.alpha);
        }
        if let Some(row) = y.iter().position(|v| !v.is_finite()) {
            bail!("Target value at row {} is {}; Lasso input must be finite.", row, y[row]);
        }
        if let Some(((row, col), v)) = x.indexed_iter().find(|(_, v)| !v.is_finite()) {
            bail!("Feature {} at row {} is {}; Lasso input must be finite.", col, row, v);
        }

        // Center the target and every feature. Features are copied transposed so each
        // coordinate update walks one contiguous row.
        let x_offset = x.mean_axis(Axis(0)).unwrap_or_else(|| Array1::zeros(n_features));
        let y_offset = y.mean().unwrap_or(0.0);
        let mut xt: Array2<f64> = x.t().as_standard_layout().into_owned();
        for (mut column, &offset) in xt.outer_iter_mut().zip(x_offset.iter()) {
            column.mapv_inplace(|v| v - offset);
        }
        let yc: Array1<f64> = y.mapv(|v| v - y_offset);

        let l1_reg = settings.alpha * n_samples as f64;
        let (coef, n_iter, dual_gap, converged) =
            coordinate_descent(&xt, &yc, l1_reg, settings.max_iter, settings.tol);

        let intercept = y_offset - x_offset.dot(&coef);

        Ok(LassoModel {
            alpha: settings.alpha,
            coef,
            intercept,
            n_iter,
            dual_gap,
            converged,
        })
    }

    pub fn predict(&self, x: ArrayView2<f64>) -> Array1<f64> {
        x.dot(&self.coef) + self.intercept
    }

    /// Coefficient of determination of the predictions for `x` against `y`.
    pub fn score(&self, x: ArrayView2<f64>, y: ArrayView1<f64>) -> f64 {
        r2_score(y, self.predict(x).view())
    }

    /// Indices of the coefficients with magnitude greater than zero.
    pub fn selected(&self) -> Vec<usize> {
        self.coef
            .iter()
            .enumerate()
            .filter(|(_, c)| c.abs() > 0.0)
            .map(|(i, _)| i)
            .collect()
    }
}

// Objective here is 0.5 ||y - X w||^2 + l1_reg ||w||_1 on centered data; `xt` holds one feature per row.
fn coordinate_descent(
    xt: &Array2<f64>,
    y: &Array1<f64>,
    l1_reg: f64,
    max_iter: usize,
    tol: f64,
) -> (Array1<f64>, usize, f64, bool) {
    let n_features = xt.nrows();
    let mut w = Array1::<f64>::zeros(n_features);
    let mut residual = y.clone();

    let norm_cols: Vec<f64> = xt.outer_iter().map(|col| col.dot(&col)).collect();
    let tol_scaled = tol * y.dot(y);

    let mut gap = tol_scaled + 1.0;
    let mut n_iter = 0;

    for iter in 0..max_iter {
        n_iter = iter + 1;
        let mut w_max = 0.0_f64;
        let mut d_w_max = 0.0_f64;

        for (j, col) in xt.outer_iter().enumerate() {
            if norm_cols[j] == 0.0 {
                continue;
            }
            let w_j = w[j];

            if w_j != 0.0 {
                residual.scaled_add(w_j, &col);
            }

            let rho = col.dot(&residual);
            let updated = soft_threshold(rho, l1_reg) / norm_cols[j];
            w[j] = updated;

            if updated != 0.0 {
                residual.scaled_add(-updated, &col);
            }

            d_w_max = d_w_max.max((updated - w_j).abs());
            w_max = w_max.max(updated.abs());
        }

        if w_max == 0.0 || d_w_max / w_max < tol || iter == max_iter - 1 {
            gap = duality_gap(xt, y, &residual, &w, l1_reg);
            if gap < tol_scaled {
                return (w, n_iter, gap, true);
            }
        }
    }

    (w, n_iter, gap, false)
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

fn duality_gap(
    xt: &Array2<f64>,
    y: &Array1<f64>,
    residual: &Array1<f64>,
    w: &Array1<f64>,
    l1_reg: f64,
) -> f64 {
    let dual_norm = xt
        .outer_iter()
        .map(|col| col.dot(residual).abs())
        .fold(0.0_f64, f64::max);
    let r_norm2 = residual.dot(residual);

    let (scale, mut gap) = if dual_norm > l1_reg {
        let scale = l1_reg / dual_norm;
        (scale, 0.5 * (r_norm2 + r_norm2 * scale * scale))
    } else {
        (1.0, r_norm2)
    };

    let l1_norm: f64 = w.iter().map(|v| v.abs()).sum();
    gap += l1_reg * l1_norm - scale * residual.dot(y);
    gap
}

/// `1 - SS_res / SS_tot`. A constant target scores 1.0 when predicted exactly and 0.0 otherwise.
pub fn r2_score(y_true: ArrayView1<f64>, y_pred: ArrayView1<f64>) -> f64 {
    let mean = y_true.mean().unwrap_or(0.0);
    let ss_res: f64 = y_true
        .iter()
        .zip(y_pred.iter())
        .map(|(t, p)| (t - p).powi(2))
        .sum();
    let ss_tot: f64 = y_true.iter().map(|t| (t - mean).powi(2)).sum();

    if ss_tot == 0.0 {
        return if ss_res == 0.0 { 1.0 } else { 0.0 };
    }
    1.0 - ss_res / ss_tot
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    // y = 3 x0 - 2 x2 + 5, x1 is noise-free but irrelevant
    fn sparse_problem(n: usize) -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((n, 3), |(i, j)| {
            let t = i as f64;
            match j {
                0 => (t * 0.37).sin() * 4.0,
                1 => (t * 0.11).cos() * 2.0,
                _ => (t * 0.53).sin() * (t * 0.07).cos() * 3.0,
            }
        });
        let y = x.column(0).mapv(|v| 3.0 * v) - x.column(2).mapv(|v| 2.0 * v) + 5.0;
        (x, y)
    }

    #[test]
    fn tiny_alpha_recovers_least_squares() {
        let (x, y) = sparse_problem(400);
        let settings = LassoSettings {
            alpha: 1e-8,
            tol: 1e-10,
            ..LassoSettings::default()
        };
        let model = LassoModel::fit(x.view(), y.view(), &settings).unwrap();

        assert!(model.converged);
        assert_relative_eq!(model.coef[0], 3.0, epsilon = 1e-4);
        assert_relative_eq!(model.coef[1], 0.0, epsilon = 1e-4);
        assert_relative_eq!(model.coef[2], -2.0, epsilon = 1e-4);
        assert_relative_eq!(model.intercept, 5.0, epsilon = 1e-4);
        assert_relative_eq!(model.score(x.view(), y.view()), 1.0, epsilon = 1e-8);
    }

    #[test]
    fn large_alpha_zeroes_every_coefficient() {
        let (x, y) = sparse_problem(200);
        let settings = LassoSettings {
            alpha: 1e6,
            ..LassoSettings::default()
        };
        let model = LassoModel::fit(x.view(), y.view(), &settings).unwrap();

        assert!(model.selected().is_empty());
        assert_relative_eq!(model.intercept, y.mean().unwrap(), epsilon = 1e-12);
        let predictions = model.predict(x.view());
        assert!(predictions.iter().all(|&p| (p - model.intercept).abs() < 1e-12));
    }

    #[test]
    fn moderate_alpha_drops_the_irrelevant_feature() {
        let (x, y) = sparse_problem(400);
        let settings = LassoSettings {
            alpha: 0.1,
            ..LassoSettings::default()
        };
        let model = LassoModel::fit(x.view(), y.view(), &settings).unwrap();

        assert_eq!(model.selected(), vec![0, 2]);
        // Shrinkage pulls the kept coefficients towards zero.
        assert!(model.coef[0] > 0.0 && model.coef[0] < 3.0);
        assert!(model.coef[2] < 0.0 && model.coef[2] > -2.0);
    }

    #[test]
    fn single_feature_matches_closed_form() {
        // For one centered feature the solution is S(x'y, n alpha) / x'x.
        let x = Array2::from_shape_vec((4, 1), vec![-3.0, -1.0, 1.0, 3.0]).unwrap();
        let y = Array1::from(vec![-5.0, -1.0, 2.0, 4.0]);
        let alpha = 0.5;
        let settings = LassoSettings {
            alpha,
            ..LassoSettings::default()
        };
        let model = LassoModel::fit(x.view(), y.view(), &settings).unwrap();

        let xy = -3.0 * -5.0 + -1.0 * -1.0 + 1.0 * 2.0 + 3.0 * 4.0;
        let xx = 9.0 + 1.0 + 1.0 + 9.0;
        let y_mean = 0.0;
        assert_relative_eq!(model.coef[0], (xy - 4.0 * alpha) / xx, epsilon = 1e-12);
        assert_relative_eq!(model.intercept, y_mean, epsilon = 1e-12);
    }

    #[test]
    fn constant_feature_stays_at_zero() {
        let mut x = Array2::<f64>::zeros((50, 2));
        for i in 0..50 {
            x[[i, 0]] = i as f64;
            x[[i, 1]] = 7.0;
        }
        let y = x.column(0).mapv(|v| 2.0 * v + 1.0);
        let model = LassoModel::fit(x.view(), y.view(), &LassoSettings::default()).unwrap();
        assert_eq!(model.coef[1], 0.0);
        assert_eq!(model.selected(), vec![0]);
    }

    #[test]
    fn hitting_max_iter_is_reported() {
        let (x, y) = sparse_problem(200);
        let settings = LassoSettings {
            alpha: 1e-6,
            max_iter: 1,
            tol: 1e-14,
        };
        let model = LassoModel::fit(x.view(), y.view(), &settings).unwrap();
        assert!(!model.converged);
        assert_eq!(model.n_iter, 1);
    }

    #[test]
    fn rejects_length_mismatch_and_negative_alpha() {
        let (x, y) = sparse_problem(10);
        let short = y.slice(ndarray::s![..9]);
        assert!(LassoModel::fit(x.view(), short, &LassoSettings::default()).is_err());

        let negative = LassoSettings {
            alpha: -1.0,
            ..LassoSettings::default()
        };
        assert!(LassoModel::fit(x.view(), y.view(), &negative).is_err());
    }

    #[test]
    fn non_finite_input_is_rejected() {
        let (mut x, y) = sparse_problem(50);
        x[[7, 1]] = f64::NAN;
        let err = LassoModel::fit(x.view(), y.view(), &LassoSettings::default()).unwrap_err();
        assert!(err.to_string().contains("Feature 1 at row 7"));

        let (x, mut y) = sparse_problem(50);
        y[3] = f64::NEG_INFINITY;
        let err = LassoModel::fit(x.view(), y.view(), &LassoSettings::default()).unwrap_err();
        assert!(err.to_string().contains("row 3"));
    }

    #[test]
    fn r2_of_constant_target() {
        let y = Array1::from(vec![2.0, 2.0, 2.0]);
        assert_eq!(r2_score(y.view(), y.view()), 1.0);
        let off = Array1::from(vec![2.0, 2.5, 2.0]);
        assert_eq!(r2_score(y.view(), off.view()), 0.0);
    }

    #[test]
    fn r2_of_mean_prediction_is_zero() {
        let y = Array1::from(vec![1.0, 2.0, 3.0, 4.0]);
        let mean = Array1::from(vec![2.5; 4]);
        assert_relative_eq!(r2_score(y.view(), mean.view()), 0.0, epsilon = 1e-12);
    }
}
