use anyhow::{bail, Result};
use ndarray::{ArrayView1, ArrayView2};

use crate::lasso::{LassoModel, LassoSettings};

/// `n` values spaced evenly on a log scale from `10^start` to `10^stop`, both included.
pub fn logspace(start: f64, stop: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![10f64.powf(start)],
        _ => {
            let step = (stop - start) / (n - 1) as f64;
            (0..n)
                .map(|i| {
                    // Pin the last exponent so the upper bound is hit exactly.
                    let exponent = if i == n - 1 { stop } else { start + step * i as f64 };
                    10f64.powf(exponent)
                })
                .collect()
        }
    }
}

/// One Lasso fit per alpha, each scored on held-out data.
#[derive(Debug, Clone)]
pub struct AlphaSweep {
    pub alphas: Vec<f64>,
    pub scores: Vec<f64>,
    /// Alphas whose fit stopped at the iteration limit.
    pub unconverged: Vec<f64>,
}

impl AlphaSweep {
    /// Fits and scores every alpha in order. `on_step` is called after each fit with
    /// the step index, alpha and score.
    pub fn run<F>(
        alphas: &[f64],
        train: (ArrayView2<f64>, ArrayView1<f64>),
        test: (ArrayView2<f64>, ArrayView1<f64>),
        base: &LassoSettings,
        mut on_step: F,
    ) -> Result<Self>
    where
        F: FnMut(usize, f64, f64),
    {
        if alphas.is_empty() {
            bail!("The alpha sweep needs at least one alpha.");
        }
        let (x_train, y_train) = train;
        let (x_test, y_test) = test;

        let mut scores = Vec::with_capacity(alphas.len());
        let mut unconverged = Vec::new();

        for (i, &alpha) in alphas.iter().enumerate() {
            let settings = LassoSettings { alpha, ..*base };
            let model = LassoModel::fit(x_train, y_train, &settings)?;
            if !model.converged {
                unconverged.push(alpha);
            }
            let score = model.score(x_test, y_test);
            on_step(i, alpha, score);
            scores.push(score);
        }

        Ok(AlphaSweep {
            alphas: alphas.to_vec(),
            scores,
            unconverged,
        })
    }

    /// Index of the maximal score. The first maximum wins ties and NaN never wins.
    pub fn best_index(&self) -> Option<usize> {
        best_index(&self.scores)
    }

    pub fn best_alpha(&self) -> Option<f64> {
        self.best_index().map(|i| self.alphas[i])
    }
}

pub fn best_index(scores: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &score) in scores.iter().enumerate() {
        if score.is_nan() {
            continue;
        }
        match best {
            Some((_, top)) if score <= top => {}
            _ => best = Some((i, score)),
        }
    }
    best.map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::{Array1, Array2};

    #[test]
    fn logspace_has_thirty_increasing_values_over_the_range() {
        let alphas = logspace(-1.0, 3.0, 30);
        assert_eq!(alphas.len(), 30);
        assert_relative_eq!(alphas[0], 0.1, epsilon = 1e-15);
        assert_relative_eq!(alphas[29], 1000.0, epsilon = 1e-9);
        assert!(alphas.windows(2).all(|w| w[0] < w[1]));

        // Constant ratio between neighbours.
        let ratio = alphas[1] / alphas[0];
        for w in alphas.windows(2) {
            assert_relative_eq!(w[1] / w[0], ratio, epsilon = 1e-12);
        }
    }

    #[test]
    fn best_index_picks_first_maximum_and_skips_nan() {
        assert_eq!(best_index(&[0.1, 0.5, 0.5, 0.2]), Some(1));
        assert_eq!(best_index(&[f64::NAN, -3.0, -1.0]), Some(2));
        assert_eq!(best_index(&[f64::NAN]), None);
        assert_eq!(best_index(&[]), None);
    }

    #[test]
    fn sweep_scores_every_alpha_and_reports_the_best() {
        let n = 300;
        let x = Array2::from_shape_fn((n, 2), |(i, j)| {
            let t = i as f64;
            if j == 0 { (t * 0.31).sin() } else { (t * 0.17).cos() }
        });
        // Deterministic "noise" so a little shrinkage helps on held-out rows.
        let noise = Array1::from_shape_fn(n, |i| ((i * 7919) % 13) as f64 / 13.0 - 0.5);
        let y = x.column(0).mapv(|v| 2.0 * v) + &noise;

        let train = (x.slice(ndarray::s![..200, ..]), y.slice(ndarray::s![..200]));
        let test = (x.slice(ndarray::s![200.., ..]), y.slice(ndarray::s![200..]));

        let alphas = logspace(-3.0, 1.0, 5);
        let mut seen = Vec::new();
        let sweep = AlphaSweep::run(&alphas, train, test, &LassoSettings::default(), |i, a, _| {
            seen.push((i, a))
        })
        .unwrap();

        assert_eq!(sweep.scores.len(), 5);
        assert_eq!(seen.len(), 5);
        assert_eq!(seen[4].0, 4);

        let best = sweep.best_index().unwrap();
        let top = sweep.scores.iter().cloned().fold(f64::MIN, f64::max);
        assert_eq!(sweep.scores[best], top);
        // alpha = 10 removes every coefficient, so its score is no better than the mean.
        assert!(sweep.scores[4] <= 0.0 + 1e-2);
        assert!(sweep.best_alpha().unwrap() < 10.0);
    }
}
