//! Ordinary least squares refit with inference statistics.
//!
//! The refit runs on the columns the Lasso kept. Without a constant the R-squared
//! family is uncentered, i.e. measured against zero rather than the mean of `y`.

use anyhow::{bail, Context, Result};
use nalgebra::{DMatrix, DVector};
use ndarray::{ArrayView1, ArrayView2};
use statrs::distribution::{ChiSquared, ContinuousCDF, FisherSnedecor, StudentsT};
use std::f64::consts::PI;
use std::fmt;

pub const CONSTANT_NAME: &str = "const";

/// Per-coefficient results.
#[derive(Debug, Clone)]
pub struct Coefficient {
    pub name: String,
    pub estimate: f64,
    pub std_err: f64,
    pub t_value: f64,
    pub p_value: f64,
    pub ci_low: f64,
    pub ci_high: f64,
}

#[derive(Debug, Clone)]
pub struct OlsFit {
    pub dependent: String,
    pub coefficients: Vec<Coefficient>,
    pub has_constant: bool,
    pub n_obs: usize,
    pub df_model: f64,
    pub df_resid: f64,
    pub ssr: f64,
    pub r_squared: f64,
    pub adj_r_squared: f64,
    pub f_statistic: f64,
    pub f_p_value: f64,
    pub log_likelihood: f64,
    pub aic: f64,
    pub bic: f64,
    pub durbin_watson: f64,
    pub jarque_bera: f64,
    pub jb_p_value: f64,
    pub skew: f64,
    pub kurtosis: f64,
    pub condition_number: f64,
}

impl OlsFit {
    /// Fits `y` on the listed columns of `x`. With `add_constant` a column of ones is
    /// prepended and reported as `const`.
    pub fn fit(
        x: ArrayView2<f64>,
        y: ArrayView1<f64>,
        columns: &[usize],
        names: &[String],
        dependent: &str,
        add_constant: bool,
    ) -> Result<Self> {
        let n = x.nrows();
        if y.len() != n {
            bail!("X has {} rows but y has {} values.", n, y.len());
        }
        if columns.len() != names.len() {
            bail!("Got {} columns but {} names.", columns.len(), names.len());
        }
        if let Some(&bad) = columns.iter().find(|&&c| c >= x.ncols()) {
            bail!("Column {} is out of range for {} predictors.", bad, x.ncols());
        }

        let k = columns.len() + usize::from(add_constant);
        if k == 0 {
            bail!("The OLS refit needs at least one regressor.");
        }
        if n <= k {
            bail!("The OLS refit needs more observations ({}) than regressors ({}).", n, k);
        }

        // Accumulate X'X and X'y row by row; the full regressor matrix is never copied.
        let mut xtx = DMatrix::<f64>::zeros(k, k);
        let mut xty = DVector::<f64>::zeros(k);
        let mut row = vec![0.0; k];
        for i in 0..n {
            fill_row(&mut row, x, i, columns, add_constant);
            let yi = y[i];
            for a in 0..k {
                xty[a] += row[a] * yi;
                for b in a..k {
                    xtx[(a, b)] += row[a] * row[b];
                }
            }
        }
        for a in 0..k {
            for b in 0..a {
                xtx[(a, b)] = xtx[(b, a)];
            }
        }

        let eigenvalues = xtx.clone().symmetric_eigen().eigenvalues;
        let (eig_max, eig_min) = (eigenvalues.max(), eigenvalues.min());
        if eig_min <= eig_max * 16.0 * k as f64 * f64::EPSILON {
            bail!("The OLS normal equations are singular; the selected columns are collinear.");
        }

        let xtx_inv = match xtx.clone().cholesky() {
            Some(cholesky) => cholesky.inverse(),
            None => xtx
                .clone()
                .try_inverse()
                .context("The OLS normal equations are singular; the selected columns are collinear.")?,
        };
        let beta = &xtx_inv * &xty;

        // Residual diagnostics.
        let mut residuals = Vec::with_capacity(n);
        let mut y_sum = 0.0;
        for i in 0..n {
            fill_row(&mut row, x, i, columns, add_constant);
            let fitted: f64 = row.iter().zip(beta.iter()).map(|(r, b)| r * b).sum();
            residuals.push(y[i] - fitted);
            y_sum += y[i];
        }
        let y_mean = y_sum / n as f64;

        let ssr: f64 = residuals.iter().map(|e| e * e).sum();
        let tss: f64 = if add_constant {
            y.iter().map(|v| (v - y_mean).powi(2)).sum()
        } else {
            y.iter().map(|v| v * v).sum()
        };

        let n_f = n as f64;
        let df_resid = (n - k) as f64;
        let df_model = (k - usize::from(add_constant)) as f64;
        let sigma2 = ssr / df_resid;

        let r_squared = 1.0 - ssr / tss;
        let centered = if add_constant { 1.0 } else { 0.0 };
        let adj_r_squared = 1.0 - (n_f - centered) / df_resid * (1.0 - r_squared);

        let (f_statistic, f_p_value) = if df_model > 0.0 {
            let f = ((tss - ssr) / df_model) / sigma2;
            let p = FisherSnedecor::new(df_model, df_resid)
                .map(|d| d.sf(f))
                .unwrap_or(f64::NAN);
            (f, p)
        } else {
            (f64::NAN, f64::NAN)
        };

        let log_likelihood = -n_f / 2.0 * ((2.0 * PI).ln() + (ssr / n_f).ln() + 1.0);
        let aic = -2.0 * log_likelihood + 2.0 * k as f64;
        let bic = -2.0 * log_likelihood + n_f.ln() * k as f64;

        let t_dist = StudentsT::new(0.0, 1.0, df_resid).context("Invalid residual degrees of freedom")?;
        let t_crit = t_dist.inverse_cdf(0.975);

        let mut regressor_names = Vec::with_capacity(k);
        if add_constant {
            regressor_names.push(CONSTANT_NAME.to_string());
        }
        regressor_names.extend(names.iter().cloned());

        let coefficients = regressor_names
            .into_iter()
            .enumerate()
            .map(|(j, name)| {
                let estimate = beta[j];
                let std_err = (sigma2 * xtx_inv[(j, j)]).sqrt();
                let t_value = estimate / std_err;
                let p_value = 2.0 * t_dist.sf(t_value.abs());
                Coefficient {
                    name,
                    estimate,
                    std_err,
                    t_value,
                    p_value,
                    ci_low: estimate - t_crit * std_err,
                    ci_high: estimate + t_crit * std_err,
                }
            })
            .collect();

        let (skew, kurtosis) = moments(&residuals);
        let jarque_bera = n_f / 6.0 * (skew.powi(2) + (kurtosis - 3.0).powi(2) / 4.0);
        let jb_p_value = ChiSquared::new(2.0)
            .map(|d| d.sf(jarque_bera))
            .unwrap_or(f64::NAN);

        Ok(OlsFit {
            dependent: dependent.to_string(),
            coefficients,
            has_constant: add_constant,
            n_obs: n,
            df_model,
            df_resid,
            ssr,
            r_squared,
            adj_r_squared,
            f_statistic,
            f_p_value,
            log_likelihood,
            aic,
            bic,
            durbin_watson: durbin_watson(&residuals),
            jarque_bera,
            jb_p_value,
            skew,
            kurtosis,
            // singular value ratio of X
            condition_number: (eig_max / eig_min).sqrt(),
        })
    }

    pub fn params(&self) -> Vec<f64> {
        self.coefficients.iter().map(|c| c.estimate).collect()
    }

    pub fn summary(&self) -> OlsSummary<'_> {
        OlsSummary { fit: self }
    }
}

fn fill_row(row: &mut [f64], x: ArrayView2<f64>, i: usize, columns: &[usize], add_constant: bool) {
    let offset = usize::from(add_constant);
    if add_constant {
        row[0] = 1.0;
    }
    for (slot, &c) in row[offset..].iter_mut().zip(columns) {
        *slot = x[[i, c]];
    }
}

// Sample skewness and (non-excess) kurtosis, population moments.
fn moments(values: &[f64]) -> (f64, f64) {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let m2 = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    let m3 = values.iter().map(|v| (v - mean).powi(3)).sum::<f64>() / n;
    let m4 = values.iter().map(|v| (v - mean).powi(4)).sum::<f64>() / n;
    if m2 == 0.0 {
        return (0.0, f64::NAN);
    }
    (m3 / m2.powf(1.5), m4 / m2.powi(2))
}

pub fn durbin_watson(residuals: &[f64]) -> f64 {
    let ss: f64 = residuals.iter().map(|e| e * e).sum();
    let diff: f64 = residuals.windows(2).map(|w| (w[1] - w[0]).powi(2)).sum();
    diff / ss
}

/// Text rendering of an [`OlsFit`] in the familiar regression-table layout.
pub struct OlsSummary<'a> {
    fit: &'a OlsFit,
}

const TABLE_WIDTH: usize = 78;

fn pair(f: &mut fmt::Formatter<'_>, left: (&str, String), right: (&str, String)) -> fmt::Result {
    writeln!(
        f,
        "{:<21}{:>18}   {:<20}{:>16}",
        left.0, left.1, right.0, right.1
    )
}

fn fmt_num(v: f64) -> String {
    if !v.is_finite() {
        return "nan".to_string();
    }
    let magnitude = v.abs();
    if magnitude != 0.0 && (magnitude >= 1e6 || magnitude < 1e-3) {
        format!("{:.3e}", v)
    } else {
        format!("{:.3}", v)
    }
}

fn fmt_p(v: f64) -> String {
    if v.is_nan() {
        "nan".to_string()
    } else {
        format!("{:.3}", v)
    }
}

impl fmt::Display for OlsSummary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fit = self.fit;
        let dline = "=".repeat(TABLE_WIDTH);
        let line = "-".repeat(TABLE_WIDTH);
        let suffix = if fit.has_constant { "" } else { " (uncentered)" };
        let r2_label = format!("R-squared{}:", suffix);
        let adj_label = format!("Adj. R-squared{}:", suffix);

        writeln!(f, "{:^width$}", "OLS Regression Results", width = TABLE_WIDTH)?;
        writeln!(f, "{}", dline)?;
        pair(
            f,
            ("Dep. Variable:", truncate(&fit.dependent, 18)),
            (r2_label.as_str(), format!("{:.3}", fit.r_squared)),
        )?;
        pair(
            f,
            ("Model:", "OLS".to_string()),
            (adj_label.as_str(), format!("{:.3}", fit.adj_r_squared)),
        )?;
        pair(
            f,
            ("Method:", "Least Squares".to_string()),
            ("F-statistic:", fmt_num(fit.f_statistic)),
        )?;
        pair(
            f,
            ("No. Observations:", fit.n_obs.to_string()),
            ("Prob (F-statistic):", fmt_p(fit.f_p_value)),
        )?;
        pair(
            f,
            ("Df Residuals:", format!("{:.0}", fit.df_resid)),
            ("Log-Likelihood:", fmt_num(fit.log_likelihood)),
        )?;
        pair(
            f,
            ("Df Model:", format!("{:.0}", fit.df_model)),
            ("AIC:", fmt_num(fit.aic)),
        )?;
        pair(
            f,
            ("Covariance Type:", "nonrobust".to_string()),
            ("BIC:", fmt_num(fit.bic)),
        )?;
        writeln!(f, "{}", dline)?;

        writeln!(
            f,
            "{:<26}{:>9} {:>10} {:>9} {:>7} {:>10} {:>10}",
            "", "coef", "std err", "t", "P>|t|", "[0.025", "0.975]"
        )?;
        writeln!(f, "{}", line)?;
        for c in &fit.coefficients {
            writeln!(
                f,
                "{:<26}{:>9} {:>10} {:>9} {:>7} {:>10} {:>10}",
                truncate(&c.name, 25),
                fmt_num(c.estimate),
                fmt_num(c.std_err),
                format!("{:.3}", c.t_value),
                fmt_p(c.p_value),
                fmt_num(c.ci_low),
                fmt_num(c.ci_high)
            )?;
        }
        writeln!(f, "{}", dline)?;
        pair(
            f,
            ("Skew:", format!("{:.3}", fit.skew)),
            ("Durbin-Watson:", format!("{:.3}", fit.durbin_watson)),
        )?;
        pair(
            f,
            ("Kurtosis:", format!("{:.3}", fit.kurtosis)),
            ("Jarque-Bera (JB):", fmt_num(fit.jarque_bera)),
        )?;
        pair(
            f,
            ("SSR:", fmt_num(fit.ssr)),
            ("Prob(JB):", fmt_p(fit.jb_p_value)),
        )?;
        pair(f, ("", String::new()), ("Cond. No.", fmt_num(fit.condition_number)))?;
        writeln!(f, "{}", dline)?;
        writeln!(f, "Notes:")?;
        write!(
            f,
            "[1] Standard Errors assume that the covariance matrix of the errors is correctly specified."
        )?;
        if !fit.has_constant {
            write!(
                f,
                "\n[2] R² is computed without centering (uncentered) since the model does not contain a constant."
            )?;
        }
        Ok(())
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let mut short: String = text.chars().take(max.saturating_sub(1)).collect();
        short.push('…');
        short
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::{Array1, Array2};

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn exact_fit_through_the_origin() {
        // y = 2 x0 - 0.5 x2; x1 is left out of the refit
        let x = Array2::from_shape_fn((50, 3), |(i, j)| ((i + 1) as f64 * (j as f64 + 0.7)).sin() + j as f64);
        let y = x.column(0).mapv(|v| 2.0 * v) - x.column(2).mapv(|v| 0.5 * v);

        let fit = OlsFit::fit(x.view(), y.view(), &[0, 2], &names(&["a", "c"]), "y", false).unwrap();
        let params = fit.params();
        assert_relative_eq!(params[0], 2.0, epsilon = 1e-9);
        assert_relative_eq!(params[1], -0.5, epsilon = 1e-9);
        assert_relative_eq!(fit.r_squared, 1.0, epsilon = 1e-12);
        assert_eq!(fit.df_model, 2.0);
        assert_eq!(fit.df_resid, 48.0);
        assert_eq!(fit.coefficients[1].name, "c");
    }

    #[test]
    fn simple_regression_with_constant_matches_textbook_values() {
        // x = 1..5, y = 2, 4, 5, 4, 5: slope 0.6, intercept 2.2
        let x = Array2::from_shape_vec((5, 1), vec![1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
        let y = Array1::from(vec![2.0, 4.0, 5.0, 4.0, 5.0]);

        let fit = OlsFit::fit(x.view(), y.view(), &[0], &names(&["x"]), "y", true).unwrap();
        assert_eq!(fit.coefficients[0].name, CONSTANT_NAME);
        assert_relative_eq!(fit.coefficients[0].estimate, 2.2, epsilon = 1e-12);
        assert_relative_eq!(fit.coefficients[1].estimate, 0.6, epsilon = 1e-12);

        // SSR = 2.4, TSS = 6.0, sigma^2 = 0.8, Sxx = 10
        assert_relative_eq!(fit.ssr, 2.4, epsilon = 1e-12);
        assert_relative_eq!(fit.r_squared, 0.6, epsilon = 1e-12);
        assert_relative_eq!(fit.adj_r_squared, 1.0 - 4.0 / 3.0 * 0.4, epsilon = 1e-12);
        assert_relative_eq!(fit.coefficients[1].std_err, (0.8f64 / 10.0).sqrt(), epsilon = 1e-12);
        assert_relative_eq!(fit.f_statistic, 4.5, epsilon = 1e-10);
        // F(1, 3) = t^2 so both tests agree.
        assert_relative_eq!(fit.f_p_value, fit.coefficients[1].p_value, epsilon = 1e-8);
        assert!(fit.coefficients[1].ci_low < 0.6 && fit.coefficients[1].ci_high > 0.6);
    }

    #[test]
    fn uncentered_r_squared_without_constant() {
        let x = Array2::from_shape_vec((4, 1), vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        let y = Array1::from(vec![1.0, 3.0, 2.0, 4.0]);

        let fit = OlsFit::fit(x.view(), y.view(), &[0], &names(&["x"]), "y", false).unwrap();
        // beta = x'y / x'x = 29 / 30
        let beta = 29.0 / 30.0;
        assert_relative_eq!(fit.coefficients[0].estimate, beta, epsilon = 1e-12);
        let ssr: f64 = [1.0, 3.0, 2.0, 4.0]
            .iter()
            .zip([1.0, 2.0, 3.0, 4.0])
            .map(|(yv, xv)| (yv - beta * xv).powi(2))
            .sum();
        assert_relative_eq!(fit.r_squared, 1.0 - ssr / 30.0, epsilon = 1e-12);
    }

    #[test]
    fn collinear_columns_are_rejected() {
        let x = Array2::from_shape_fn((10, 2), |(i, _)| i as f64);
        let y = Array1::from_shape_fn(10, |i| i as f64 * 3.0 + 1.0);
        assert!(OlsFit::fit(x.view(), y.view(), &[0, 1], &names(&["a", "b"]), "y", false).is_err());
    }

    #[test]
    fn durbin_watson_of_alternating_residuals() {
        assert_relative_eq!(durbin_watson(&[1.0, -1.0, 1.0, -1.0]), 3.0, epsilon = 1e-12);
    }

    #[test]
    fn summary_lists_every_regressor() {
        let x = Array2::from_shape_fn((30, 2), |(i, j)| ((i * (j + 2)) % 7) as f64 + j as f64);
        let y = Array1::from_shape_fn(30, |i| (i % 5) as f64 + 1.0);
        let fit = OlsFit::fit(x.view(), y.view(), &[0, 1], &names(&["ndvi", "slope"]), "agb", true).unwrap();

        let table = fit.summary().to_string();
        assert!(table.contains("OLS Regression Results"));
        assert!(table.contains("Dep. Variable:"));
        assert!(table.contains("const"));
        assert!(table.contains("ndvi"));
        assert!(table.contains("slope"));
        assert!(table.contains("Durbin-Watson:"));
    }
}
