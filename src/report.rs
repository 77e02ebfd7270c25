use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::text;

pub const ALPHA_SCORES_CSV: &str = "alpha_scores.csv";
pub const COEFFICIENTS_CSV: &str = "coefficients.csv";
pub const PREDICTED_SURFACE_TIF: &str = "predicted_surface.tif";
pub const PREDICTED_SURFACE_HTML: &str = "predicted_surface.html";
pub const OBSERVED_SURFACE_HTML: &str = "observed_surface.html";
pub const ALPHA_CHART_HTML: &str = "alpha_scores.html";
pub const OLS_SUMMARY_TXT: &str = "ols_summary.txt";

/// Creates `path`, or the first free `path.1`, `path.2`, ... when it already exists.
pub fn prepare_output_dir(path: &Path) -> Result<PathBuf> {
    if !path.exists() {
        std::fs::create_dir_all(path)
            .with_context(|| format!("Failed to create directory: {:?}", path))?;
        return Ok(path.to_path_buf());
    }

    let base = path
        .file_name()
        .context("Failed to get output directory name")?
        .to_str()
        .context("Failed to convert output directory name to string")?
        .to_string();

    let mut index = 1;
    loop {
        let new_path = path.with_file_name(format!("{}.{}", base, index));
        if !new_path.exists() {
            std::fs::create_dir_all(&new_path)
                .with_context(|| format!("Failed to create directory: {:?}", new_path))?;
            text::warn(format!(
                "Output directory {:?} already exists. Using {:?} instead.",
                path, new_path
            ));
            return Ok(new_path);
        }
        index += 1;
    }
}

/// Writes one `alpha,score` row per sweep step.
pub fn save_alpha_scores(path: &Path, alphas: &[f64], scores: &[f64]) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    wtr.write_record(["alpha", "score"])?;
    for (alpha, score) in alphas.iter().zip(scores) {
        wtr.write_record([alpha.to_string(), score.to_string()])?;
    }
    wtr.flush()?;
    Ok(())
}

/// Writes `variable,coefficient,selected` for every predictor of the best-alpha fit.
pub fn save_coefficients(path: &Path, names: &[String], coef: &[f64], intercept: f64) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    wtr.write_record(["variable", "coefficient", "selected"])?;
    wtr.write_record(["intercept".to_string(), intercept.to_string(), String::new()])?;
    for (name, value) in names.iter().zip(coef) {
        let selected = value.abs() > 0.0;
        wtr.write_record([name.clone(), value.to_string(), selected.to_string()])?;
    }
    wtr.flush()?;
    Ok(())
}
