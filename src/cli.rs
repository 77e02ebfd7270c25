use clap::Parser;
use std::path::PathBuf;

use crate::config::{self, PipelineConfig};

/// Command-line arguments for the post-lasso tool.
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about,
    long_about = "Selects raster predictors of a dependent layer with LASSO and refits them with OLS."
)]
pub struct Args {
    /// Directory containing the co-registered *.tif layers.
    /// Falls back to `data_dir` in app.config, then to the course data path.
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// File stem of the dependent-variable layer.
    /// Falls back to `dependent` in app.config.
    #[arg(long)]
    pub dependent: Option<String>,

    /// Directory for plots and reports. A numbered suffix is added if it exists.
    #[arg(long, default_value = "post_lasso_output")]
    pub output: PathBuf,

    /// Number of leading pixels used for training.
    #[arg(long, default_value_t = config::DEFAULT_TRAIN_ROWS)]
    pub train_rows: usize,

    /// Number of pixels following the training block used for testing.
    #[arg(long, default_value_t = config::DEFAULT_TEST_ROWS)]
    pub test_rows: usize,

    /// Keep every n-th training pixel (1 keeps all of them).
    #[arg(long, default_value_t = config::DEFAULT_STRIDE)]
    pub stride: usize,

    /// Exponent of the smallest alpha in the sweep (alpha = 10^exp).
    #[arg(long, default_value_t = config::DEFAULT_ALPHA_MIN_EXP, allow_hyphen_values = true)]
    pub alpha_min_exp: f64,

    /// Exponent of the largest alpha in the sweep.
    #[arg(long, default_value_t = config::DEFAULT_ALPHA_MAX_EXP, allow_hyphen_values = true)]
    pub alpha_max_exp: f64,

    /// Number of alphas in the sweep.
    #[arg(long, default_value_t = config::DEFAULT_N_ALPHAS)]
    pub n_alphas: usize,

    /// Maximum number of coordinate descent sweeps per fit.
    #[arg(long, default_value_t = config::DEFAULT_MAX_ITER)]
    pub max_iter: usize,

    /// Duality gap tolerance of the coordinate descent.
    #[arg(long, default_value_t = config::DEFAULT_TOL)]
    pub tol: f64,

    /// Add a constant column to the final OLS refit.
    #[arg(long)]
    pub add_constant: bool,

    /// Skip the HTML charts.
    #[arg(long)]
    pub no_plots: bool,
}

impl Args {
    /// Resolves the flags against `app.config` and the built-in defaults.
    pub fn into_config(self) -> PipelineConfig {
        let data_dir = self
            .data_dir
            .or_else(|| config::load_config_value("data_dir").map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(config::DEFAULT_DATA_DIR));
        let dependent = self
            .dependent
            .or_else(|| config::load_config_value("dependent"))
            .unwrap_or_else(|| config::DEFAULT_DEPENDENT.to_string());

        PipelineConfig {
            data_dir,
            dependent,
            output: self.output,
            train_rows: self.train_rows,
            test_rows: self.test_rows,
            stride: self.stride,
            alpha_min_exp: self.alpha_min_exp,
            alpha_max_exp: self.alpha_max_exp,
            n_alphas: self.n_alphas,
            baseline_alpha: config::DEFAULT_ALPHA,
            max_iter: self.max_iter,
            tol: self.tol,
            add_constant: self.add_constant,
            plots: !self.no_plots,
        }
    }
}
