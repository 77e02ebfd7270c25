use anyhow::{bail, Result};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use crate::lasso::LassoSettings;

pub const CONFIG_FILE: &str = "app.config";

pub const DEFAULT_DATA_DIR: &str = "../../Data/assignment_06/soyo_tile";
pub const DEFAULT_DEPENDENT: &str = "agb_observed_baccini_2000_30m";
pub const DEFAULT_TRAIN_ROWS: usize = 1_000_000;
pub const DEFAULT_TEST_ROWS: usize = 200_000;
pub const DEFAULT_STRIDE: usize = 10;
pub const DEFAULT_ALPHA_MIN_EXP: f64 = -1.0;
pub const DEFAULT_ALPHA_MAX_EXP: f64 = 3.0;
pub const DEFAULT_N_ALPHAS: usize = 30;
pub const DEFAULT_ALPHA: f64 = 1.0;
pub const DEFAULT_MAX_ITER: usize = 10_000;
pub const DEFAULT_TOL: f64 = 1e-4;

/// Looks up `key` in a `key = value` file. Returns `None` when the file or key is missing.
pub fn load_config_value_from(config_path: &Path, key_to_find: &str) -> Option<String> {
    if !config_path.exists() {
        return None;
    }

    let file = File::open(config_path).ok()?;
    let reader = BufReader::new(file);

    for line in reader.lines() {
        let line = line.ok()?;
        let line = line.trim();
        if line.starts_with('#') {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            if key.trim() == key_to_find {
                return Some(value.trim().to_string());
            }
        }
    }
    None
}

// Loads a configuration value from `app.config` in the working directory.
pub fn load_config_value(key_to_find: &str) -> Option<String> {
    load_config_value_from(Path::new(CONFIG_FILE), key_to_find)
}

/// Everything the pipeline needs to run, resolved from flags, `app.config` and defaults.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub data_dir: PathBuf,
    pub dependent: String,
    pub output: PathBuf,
    pub train_rows: usize,
    pub test_rows: usize,
    pub stride: usize,
    pub alpha_min_exp: f64,
    pub alpha_max_exp: f64,
    pub n_alphas: usize,
    pub baseline_alpha: f64,
    pub max_iter: usize,
    pub tol: f64,
    pub add_constant: bool,
    pub plots: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            dependent: DEFAULT_DEPENDENT.to_string(),
            output: PathBuf::from("post_lasso_output"),
            train_rows: DEFAULT_TRAIN_ROWS,
            test_rows: DEFAULT_TEST_ROWS,
            stride: DEFAULT_STRIDE,
            alpha_min_exp: DEFAULT_ALPHA_MIN_EXP,
            alpha_max_exp: DEFAULT_ALPHA_MAX_EXP,
            n_alphas: DEFAULT_N_ALPHAS,
            baseline_alpha: DEFAULT_ALPHA,
            max_iter: DEFAULT_MAX_ITER,
            tol: DEFAULT_TOL,
            add_constant: false,
            plots: true,
        }
    }
}

impl PipelineConfig {
    /// Rejects settings no run could succeed with.
    pub fn validate(&self) -> Result<()> {
        if self.dependent.is_empty() {
            bail!("The dependent variable name must not be empty.");
        }
        if self.train_rows == 0 || self.test_rows == 0 {
            bail!("Both --train-rows and --test-rows must be greater than 0.");
        }
        if self.stride == 0 {
            bail!("--stride must be at least 1.");
        }
        if self.n_alphas < 2 {
            bail!("--n-alphas must be at least 2.");
        }
        if self.alpha_min_exp >= self.alpha_max_exp {
            bail!(
                "The alpha range is empty: 10^{} is not below 10^{}.",
                self.alpha_min_exp,
                self.alpha_max_exp
            );
        }
        if self.max_iter == 0 {
            bail!("--max-iter must be greater than 0.");
        }
        if !(self.tol > 0.0) {
            bail!("--tol must be a positive number.");
        }
        Ok(())
    }

    pub fn lasso_settings(&self, alpha: f64) -> LassoSettings {
        LassoSettings {
            alpha,
            max_iter: self.max_iter,
            tol: self.tol,
        }
    }
}
