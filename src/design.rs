//! Design matrix assembly and the train/test partition.
//!
//! Every layer is flattened row-major into one column of an `n_obs x n_vars`
//! table, so each row holds the same pixel for all variables. Column 0 is the
//! dependent variable.

use anyhow::{bail, Result};
use ndarray::{s, Array2, ArrayView1, ArrayView2};

use crate::raster::{Layer, RasterParams};

#[derive(Debug, Clone)]
pub struct DesignMatrix {
    data: Array2<f64>,
    names: Vec<String>,
    grid: RasterParams,
}

impl DesignMatrix {
    /// Stacks the layers as columns in the given order; the first layer is the dependent variable.
    pub fn assemble(layers: &[Layer]) -> Result<Self> {
        let first = match layers.first() {
            Some(layer) => layer,
            None => bail!("Cannot build a design matrix without layers."),
        };
        if layers.len() < 2 {
            bail!(
                "Only the dependent layer '{}' was found; at least one predictor is required.",
                first.name
            );
        }

        let grid = first.params;
        let n_obs = first.len();
        let n_vars = layers.len();

        let mut data = Array2::<f64>::zeros((n_obs, n_vars));
        let mut names = Vec::with_capacity(n_vars);

        for (col_index, layer) in layers.iter().enumerate() {
            if !layer.params.same_grid(&grid) {
                bail!(
                    "Layer '{}' is {} x {} but '{}' is {} x {}; all layers must share one grid.",
                    layer.name,
                    layer.params.width,
                    layer.params.height,
                    first.name,
                    grid.width,
                    grid.height
                );
            }
            check_finite(layer)?;
            data.column_mut(col_index)
                .assign(&ArrayView1::from(layer.values()));
            names.push(layer.name.clone());
        }

        Ok(DesignMatrix { data, names, grid })
    }

    pub fn n_obs(&self) -> usize {
        self.data.nrows()
    }

    pub fn n_vars(&self) -> usize {
        self.data.ncols()
    }

    pub fn grid(&self) -> &RasterParams {
        &self.grid
    }

    pub fn dependent_name(&self) -> &str {
        &self.names[0]
    }

    /// Names of the predictor columns, aligned with the columns of [`DesignMatrix::x`].
    pub fn feature_names(&self) -> &[String] {
        &self.names[1..]
    }

    pub fn y(&self) -> ArrayView1<'_, f64> {
        self.data.column(0)
    }

    pub fn x(&self) -> ArrayView2<'_, f64> {
        self.data.slice(s![.., 1..])
    }
}

// Nodata pixels are not masked, so a NaN or infinite pixel would poison every fit.
fn check_finite(layer: &Layer) -> Result<()> {
    let bad = match layer.values().iter().position(|v| !v.is_finite()) {
        Some(index) => index,
        None => return Ok(()),
    };
    let width = layer.params.width;
    let nodata = match layer.params.nodata {
        Some(value) => format!(" (declared nodata value: {})", value),
        None => String::new(),
    };
    bail!(
        "Layer '{}' holds a non-finite value ({}) at row {}, column {}{}; remove or fill nodata pixels first.",
        layer.name,
        layer.values()[bad],
        bad / width,
        bad % width,
        nodata
    )
}

/// Contiguous train/test row blocks at the start of the design matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Partition {
    pub train_rows: usize,
    pub test_rows: usize,
    pub stride: usize,
}

impl Partition {
    pub fn new(n_obs: usize, train_rows: usize, test_rows: usize, stride: usize) -> Result<Self> {
        if stride == 0 {
            bail!("The training stride must be at least 1.");
        }
        if train_rows == 0 || test_rows == 0 {
            bail!("Training and testing blocks must not be empty.");
        }
        let needed = match train_rows.checked_add(test_rows) {
            Some(needed) => needed,
            None => bail!(
                "{} training + {} testing rows were requested, which overflows the row count.",
                train_rows,
                test_rows
            ),
        };
        if needed > n_obs {
            bail!(
                "The design matrix has {} rows but {} training + {} testing rows were requested.",
                n_obs,
                train_rows,
                test_rows
            );
        }
        Ok(Partition {
            train_rows,
            test_rows,
            stride,
        })
    }

    /// Rows `train_rows..train_rows + test_rows`.
    pub fn test_range(&self) -> std::ops::Range<usize> {
        self.train_rows..self.train_rows + self.test_rows
    }

    /// Number of training rows kept after subsampling, ceil(train_rows / stride).
    pub fn subsampled_len(&self) -> usize {
        self.train_rows.div_ceil(self.stride)
    }

    pub fn train<'a>(&self, design: &'a DesignMatrix) -> (ArrayView2<'a, f64>, ArrayView1<'a, f64>) {
        let step = self.stride as isize;
        let x = design.x().slice_move(s![..self.train_rows;step, ..]);
        let y = design.y().slice_move(s![..self.train_rows;step]);
        (x, y)
    }

    pub fn test<'a>(&self, design: &'a DesignMatrix) -> (ArrayView2<'a, f64>, ArrayView1<'a, f64>) {
        let range = self.test_range();
        let x = design.x().slice_move(s![range.clone(), ..]);
        let y = design.y().slice_move(s![range]);
        (x, y)
    }
}
