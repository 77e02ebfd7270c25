//! # Post-LASSO variable selection for raster stacks
//!
//! Loads a directory of co-registered single-band rasters, flattens them into a
//! design matrix (one row per pixel, the dependent layer in column 0), picks the
//! Lasso penalty with the best held-out score and refits the surviving
//! predictors with ordinary least squares.
//!
//! The main components are:
//! - `catalog` / `raster`: finding and reading the GeoTIFF layers.
//! - `design`: the pixel-by-variable matrix and its train/test partition.
//! - `lasso` / `sweep`: coordinate descent Lasso and the alpha search.
//! - `ols`: the unpenalized refit and its summary table.
//! - `pipeline`: the full run as used by the `post-lasso` binary.

pub mod catalog;
pub mod cli;
pub mod config;
pub mod design;
pub mod lasso;
pub mod ols;
pub mod pipeline;
pub mod plotting;
pub mod raster;
pub mod report;
pub mod sweep;
pub mod text;
