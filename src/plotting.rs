use anyhow::{bail, Context, Result};
use charming::{
    component::{Axis, Legend, Title, VisualMap},
    element::{
        AxisType, Color, ItemStyle, LineStyle, LineStyleType, Orient, Tooltip, Trigger, TriggerOn,
    },
    series::{Heatmap, Line},
    datatype::DataPoint,
    Chart, HtmlRenderer,
};
use std::path::Path;

/// Largest grid edge drawn in a heatmap; bigger rasters are block-averaged down.
pub const MAX_HEATMAP_CELLS: usize = 200;

/// A raster reduced to at most `max_cells` per side by NaN-aware block averaging.
#[derive(Debug, Clone, PartialEq)]
pub struct Downsampled {
    pub width: usize,
    pub height: usize,
    pub values: Vec<f64>,
}

pub fn downsample(values: &[f64], width: usize, height: usize, max_cells: usize) -> Result<Downsampled> {
    if values.len() != width * height {
        bail!(
            "Surface has {} values but the grid is {} x {}.",
            values.len(),
            width,
            height
        );
    }
    if max_cells == 0 {
        bail!("The heatmap needs at least one cell per side.");
    }

    let block = width.max(height).div_ceil(max_cells).max(1);
    let out_w = width.div_ceil(block);
    let out_h = height.div_ceil(block);
    let mut out = Vec::with_capacity(out_w * out_h);

    for by in 0..out_h {
        for bx in 0..out_w {
            let mut sum = 0.0;
            let mut count = 0usize;
            for row in by * block..((by + 1) * block).min(height) {
                for col in bx * block..((bx + 1) * block).min(width) {
                    let v = values[row * width + col];
                    if v.is_finite() {
                        sum += v;
                        count += 1;
                    }
                }
            }
            out.push(if count > 0 { sum / count as f64 } else { f64::NAN });
        }
    }

    Ok(Downsampled {
        width: out_w,
        height: out_h,
        values: out,
    })
}

/// Saves a row-major surface as an HTML heatmap, north up.
pub fn generate_and_save_surface_chart(
    path: &Path,
    title_text: &str,
    values: &[f64],
    width: usize,
    height: usize,
) -> Result<()> {
    let grid = downsample(values, width, height, MAX_HEATMAP_CELLS)?;

    let finite = grid.values.iter().filter(|v| v.is_finite());
    let min = finite.clone().cloned().fold(f64::INFINITY, f64::min);
    let max = finite.cloned().fold(f64::NEG_INFINITY, f64::max);
    let (min, max) = if min.is_finite() { (min, max) } else { (0.0, 1.0) };

    // Category y axes grow upwards, so the first raster row goes to the last index.
    let mut data: Vec<Vec<f64>> = Vec::with_capacity(grid.values.len());
    for row in 0..grid.height {
        for col in 0..grid.width {
            let v = grid.values[row * grid.width + col];
            if v.is_finite() {
                data.push(vec![col as f64, (grid.height - 1 - row) as f64, v]);
            }
        }
    }

    let x_labels: Vec<String> = (0..grid.width).map(|c| c.to_string()).collect();
    let y_labels: Vec<String> = (0..grid.height).rev().map(|r| r.to_string()).collect();

    let chart = Chart::new()
        .title(
            Title::new()
                .text(title_text)
                .subtext(format!("{} x {} raster, shown as {} x {} blocks", width, height, grid.width, grid.height))
                .left("center"),
        )
        .legend(Legend::new().show(false))
        .tooltip(Tooltip::new().trigger(Trigger::Item))
        .x_axis(Axis::new().type_(AxisType::Category).data(x_labels))
        .y_axis(Axis::new().type_(AxisType::Category).data(y_labels))
        .visual_map(
            VisualMap::new()
                .min(min)
                .max(max)
                .calculable(true)
                .orient(Orient::Horizontal)
                .left("center")
                .bottom("0%"),
        )
        .series(
            Heatmap::new().name(title_text).data(
                data.into_iter()
                    .map(|p| p.into_iter().map(DataPoint::from).collect::<Vec<_>>())
                    .collect(),
            ),
        );

    let mut renderer = HtmlRenderer::new(title_text, 1024, 900);
    renderer
        .save(&chart, path)
        .context("Failed to save surface chart to file")?;

    Ok(())
}

/// Saves the alpha sweep as a line chart with a dashed line at the best score.
/// charming has no numeric log axis for line series, so alphas are categories.
pub fn generate_and_save_alpha_chart(path: &Path, alphas: &[f64], scores: &[f64]) -> Result<()> {
    if alphas.len() != scores.len() {
        bail!(
            "Got {} alphas but {} scores for the alpha chart.",
            alphas.len(),
            scores.len()
        );
    }

    let labels: Vec<String> = alphas.iter().map(|a| format!("{:.3}", a)).collect();
    let best = scores
        .iter()
        .cloned()
        .filter(|s| s.is_finite())
        .fold(f64::NEG_INFINITY, f64::max);
    let plotted: Vec<f64> = scores.iter().map(|s| if s.is_finite() { *s } else { 0.0 }).collect();

    let mut chart = Chart::new()
        .title(Title::new().text("Lasso test score by alpha").left("center"))
        .legend(Legend::new().show(false))
        .x_axis(
            Axis::new()
                .type_(AxisType::Category)
                .name("alpha")
                .data(labels),
        )
        .y_axis(Axis::new().type_(AxisType::Value).name("Score").scale(true))
        .series(
            Line::new()
                .name("score")
                .data(plotted)
                .item_style(ItemStyle::new().color(Color::from("#2b6cb0"))),
        )
        .tooltip(
            Tooltip::new()
                .trigger(Trigger::Axis)
                .trigger_on(TriggerOn::Mousemove),
        );

    if best.is_finite() {
        chart = chart.series(
            Line::new()
                .name("best score")
                .show_symbol(false)
                .data(vec![best; scores.len()])
                .line_style(
                    LineStyle::new()
                        .type_(LineStyleType::Dashed)
                        .color(Color::from("#808080")),
                ),
        );
    }

    let mut renderer = HtmlRenderer::new("Lasso alpha sweep", 1024, 768);
    renderer
        .save(&chart, path)
        .context("Failed to save alpha chart to file")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_grids_are_kept_as_is() {
        let values: Vec<f64> = (0..12).map(f64::from).collect();
        let grid = downsample(&values, 4, 3, 200).unwrap();
        assert_eq!(grid.width, 4);
        assert_eq!(grid.height, 3);
        assert_eq!(grid.values, values);
    }

    #[test]
    fn blocks_are_averaged_ignoring_nan() {
        // 4 x 4 grid into 2 x 2 blocks
        let mut values: Vec<f64> = (0..16).map(f64::from).collect();
        values[0] = f64::NAN;
        let grid = downsample(&values, 4, 4, 2).unwrap();
        assert_eq!((grid.width, grid.height), (2, 2));
        assert_eq!(grid.values[0], (1.0 + 4.0 + 5.0) / 3.0);
        assert_eq!(grid.values[3], (10.0 + 11.0 + 14.0 + 15.0) / 4.0);
    }

    #[test]
    fn edge_blocks_may_be_partial() {
        let values = vec![1.0; 5 * 3];
        let grid = downsample(&values, 5, 3, 2).unwrap();
        assert_eq!((grid.width, grid.height), (2, 1));
        assert!(grid.values.iter().all(|&v| v == 1.0));
    }

    #[test]
    fn alpha_chart_is_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alphas.html");
        generate_and_save_alpha_chart(&path, &[0.1, 1.0, 10.0], &[0.4, 0.6, f64::NAN]).unwrap();
        let html = std::fs::read_to_string(&path).unwrap();
        assert!(html.contains("Lasso test score by alpha"));
    }
}
