//! The post-LASSO run, stage by stage, with console diagnostics.

use anyhow::Result;
use ndarray::s;
use std::path::PathBuf;
use std::time::Instant;

use crate::catalog::Catalog;
use crate::config::PipelineConfig;
use crate::design::{DesignMatrix, Partition};
use crate::lasso::{LassoModel, LassoSettings};
use crate::ols::OlsFit;
use crate::plotting;
use crate::raster::{self, Layer};
use crate::report;
use crate::sweep::{logspace, AlphaSweep};
use crate::text;

const PREVIEW_ROWS: usize = 10;

/// What a finished run produced.
#[derive(Debug)]
pub struct RunSummary {
    pub output_dir: PathBuf,
    pub n_obs: usize,
    pub n_vars: usize,
    pub baseline_score: f64,
    pub sweep: AlphaSweep,
    pub best_alpha: f64,
    pub best_model: LassoModel,
    pub selected_names: Vec<String>,
    pub ols: Option<OlsFit>,
}

pub fn run(config: &PipelineConfig) -> Result<RunSummary> {
    config.validate()?;
    let line = text::line();

    // Catalog and load
    let mut part_time = Instant::now();
    let catalog = Catalog::scan(&config.data_dir)?;
    let names = catalog.ordered_names(&config.dependent)?;
    println!(
        "Found {} rasters in {}; dependent variable: {}",
        catalog.len(),
        config.data_dir.display(),
        text::bold(&config.dependent)
    );

    let mut layers = Vec::with_capacity(names.len());
    for name in &names {
        // The names come from the catalog, so the path is always there.
        if let Some(path) = catalog.path(name) {
            println!("  {} Loading {}", text::light(text::ARROW.to_string()), name);
            layers.push(Layer::read(name, path)?);
        }
    }
    text::stage_done(format!("{} rasters read", layers.len()), part_time.elapsed().as_secs_f64());

    // Design matrix
    part_time = Instant::now();
    let design = DesignMatrix::assemble(&layers)?;
    let dependent_layer = layers.swap_remove(0);
    drop(layers);

    println!("The number of observations is {}", design.n_obs());
    println!("The number of variables is {}", design.n_vars());
    text::stage_done(
        format!("Design matrix ({} x {}) assembled", design.n_obs(), design.n_vars()),
        part_time.elapsed().as_secs_f64(),
    );

    let partition = Partition::new(design.n_obs(), config.train_rows, config.test_rows, config.stride)?;
    let train = partition.train(&design);
    let test = partition.test(&design);
    println!(
        "Training rows: {} (first {} pixels, stride {}); testing rows: {} ({}..{})",
        train.1.len(),
        partition.train_rows,
        partition.stride,
        test.1.len(),
        partition.test_range().start,
        partition.test_range().end
    );

    let output_dir = report::prepare_output_dir(&config.output)?;
    println!("{}", line);

    // Baseline Lasso
    part_time = Instant::now();
    let baseline_settings = config.lasso_settings(config.baseline_alpha);
    let baseline = fit_lasso(train.0, train.1, &baseline_settings)?;
    let preview_rows = PREVIEW_ROWS.min(train.0.nrows());
    let preview = baseline.predict(train.0.slice(s![..preview_rows, ..]));
    println!(
        "Predicted values for training rows 0..{} from the default alpha(={}) Lasso: {:?}",
        preview_rows,
        config.baseline_alpha,
        preview.to_vec()
    );
    let baseline_score = baseline.score(test.0, test.1);
    println!(
        "The score of the default alpha(={}) Lasso is {}",
        config.baseline_alpha, baseline_score
    );
    text::stage_done("Baseline Lasso fitted", part_time.elapsed().as_secs_f64());

    part_time = Instant::now();
    let full_prediction = baseline.predict(design.x()).to_vec();
    let surface_path = output_dir.join(report::PREDICTED_SURFACE_TIF);
    raster::write_geotiff(&surface_path, &dependent_layer, &full_prediction)?;
    if config.plots {
        let grid = design.grid();
        plotting::generate_and_save_surface_chart(
            &output_dir.join(report::PREDICTED_SURFACE_HTML),
            &format!("Predicted {}", design.dependent_name()),
            &full_prediction,
            grid.width,
            grid.height,
        )?;
        plotting::generate_and_save_surface_chart(
            &output_dir.join(report::OBSERVED_SURFACE_HTML),
            &format!("Observed {}", design.dependent_name()),
            dependent_layer.values(),
            grid.width,
            grid.height,
        )?;
    }
    text::stage_done(
        format!("Predicted surface written to {}", surface_path.display()),
        part_time.elapsed().as_secs_f64(),
    );
    println!("{}", line);

    // Alpha sweep
    part_time = Instant::now();
    let alphas = logspace(config.alpha_min_exp, config.alpha_max_exp, config.n_alphas);
    let mut step_lines = Vec::with_capacity(alphas.len());
    let sweep = AlphaSweep::run(&alphas, train, test, &baseline_settings, |i, alpha, score| {
        text::progress("Sweeping alphas", i + 1, alphas.len());
        step_lines.push(format!("  alpha = {:>12.6}  score = {:.6}", alpha, score));
    })?;
    text::stage_done(
        format!("{} Lasso fits scored", sweep.alphas.len()),
        part_time.elapsed().as_secs_f64(),
    );
    for step in &step_lines {
        println!("{}", step);
    }
    if !sweep.unconverged.is_empty() {
        text::warn(format!(
            "{} of {} fits hit the iteration limit ({}) before converging.",
            sweep.unconverged.len(),
            sweep.alphas.len(),
            config.max_iter
        ));
    }

    let best_index = match sweep.best_index() {
        Some(i) => i,
        None => anyhow::bail!("Every alpha produced an undefined test score."),
    };
    let best_alpha = sweep.alphas[best_index];
    println!("The best alpha is {}", text::bold(best_alpha.to_string()));

    report::save_alpha_scores(&output_dir.join(report::ALPHA_SCORES_CSV), &sweep.alphas, &sweep.scores)?;
    if config.plots {
        plotting::generate_and_save_alpha_chart(
            &output_dir.join(report::ALPHA_CHART_HTML),
            &sweep.alphas,
            &sweep.scores,
        )?;
    }
    println!("{}", line);

    // Best alpha on the full dataset
    part_time = Instant::now();
    let best_model = fit_lasso(design.x(), design.y(), &config.lasso_settings(best_alpha))?;
    let feature_names = design.feature_names();
    for (name, coef) in feature_names.iter().zip(best_model.coef.iter()) {
        println!("Coefficient {} was {}", name, coef);
    }
    let selected = best_model.selected();
    let selected_names: Vec<String> = selected.iter().map(|&i| feature_names[i].clone()).collect();
    println!("The selected variables are: {:?}", selected_names);
    report::save_coefficients(
        &output_dir.join(report::COEFFICIENTS_CSV),
        feature_names,
        &best_model.coef.to_vec(),
        best_model.intercept,
    )?;
    text::stage_done("Lasso refitted on the full dataset", part_time.elapsed().as_secs_f64());
    println!("{}", line);

    // Post-Lasso OLS
    let ols = if selected.is_empty() {
        text::warn("The Lasso kept no variables at the best alpha; the OLS refit is skipped.");
        None
    } else {
        part_time = Instant::now();
        let fit = OlsFit::fit(
            design.x(),
            design.y(),
            &selected,
            &selected_names,
            design.dependent_name(),
            config.add_constant,
        )?;
        let summary = fit.summary().to_string();
        println!("{}", summary);
        std::fs::write(output_dir.join(report::OLS_SUMMARY_TXT), format!("{}\n", summary))?;
        text::stage_done("OLS refitted on the selected variables", part_time.elapsed().as_secs_f64());
        println!(
            "This OLS improves on a plain OLS over every layer because it leaves out the variables whose\n\
             Lasso coefficients were shrunk to zero. Those variables carry little predictive power, and\n\
             dropping them reduces over-fitting."
        );
        Some(fit)
    };

    Ok(RunSummary {
        output_dir,
        n_obs: design.n_obs(),
        n_vars: design.n_vars(),
        baseline_score,
        sweep,
        best_alpha,
        best_model,
        selected_names,
        ols,
    })
}

fn fit_lasso(
    x: ndarray::ArrayView2<f64>,
    y: ndarray::ArrayView1<f64>,
    settings: &LassoSettings,
) -> Result<LassoModel> {
    let model = LassoModel::fit(x, y, settings)?;
    if !model.converged {
        text::warn(format!(
            "Lasso with alpha={} did not converge in {} iterations (duality gap {:.3e}).",
            settings.alpha, model.n_iter, model.dual_gap
        ));
    }
    Ok(model)
}
