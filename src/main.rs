use anyhow::Result;
use clap::Parser;
use std::time::Instant;

use post_lasso::cli::Args;
use post_lasso::{pipeline, text};

fn main() -> Result<()> {
    let start_time = Instant::now();
    let config = Args::parse().into_config();

    let line = text::line();
    let dline = text::dline();

    println!(
        "\n{}\n{}\nTool for selecting raster predictors with LASSO and refitting them with OLS.\n{}\n",
        format!(
            "{} {}",
            text::highlight("Post-LASSO Raster Regression"),
            env!("CARGO_PKG_VERSION")
        ),
        line,
        dline
    );

    println!("{} Configuration:", text::bold("Run"));
    println!("  {:<20} {}", "Data Directory:", config.data_dir.display());
    println!("  {:<20} {}", "Dependent Layer:", config.dependent);
    println!("  {:<20} {}", "Output Directory:", config.output.display());
    println!(
        "  {:<20} {} rows, stride {}",
        "Training Block:", config.train_rows, config.stride
    );
    println!("  {:<20} {} rows", "Testing Block:", config.test_rows);
    println!(
        "  {:<20} {} values in 10^[{}, {}]",
        "Alpha Sweep:", config.n_alphas, config.alpha_min_exp, config.alpha_max_exp
    );
    println!(
        "  {:<20} max_iter {}, tol {:e}",
        "Coordinate Descent:", config.max_iter, config.tol
    );
    println!(
        "  {:<20} {}",
        "OLS Constant:",
        if config.add_constant { "yes" } else { "no" }
    );
    println!("{}\n", dline);

    let summary = match pipeline::run(&config) {
        Ok(summary) => summary,
        Err(err) => {
            let output = format!("{}: {:#}", text::error("Error"), err);
            eprintln!("{}\n", text::bold(output));
            std::process::exit(1);
        }
    };

    let elapsed_time = start_time.elapsed();
    println!("{}", line);
    println!("{}", text::success("Analysis completed successfully."));
    println!("Outputs written to {}", summary.output_dir.display());
    println!("Total elapsed time: {:.2} seconds.", elapsed_time.as_secs_f64());
    println!();

    Ok(())
}
