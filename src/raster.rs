use anyhow::{bail, Context, Result};
use gdal::cpl::CslStringList;
use gdal::raster::Buffer;
use gdal::{Dataset, DriverManager};
use std::path::Path;

// Raster parameters with width, height and nodata value
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RasterParams {
    pub width: usize,
    pub height: usize,
    pub nodata: Option<f64>,
}

impl RasterParams {
    // Number of pixels once the grid is flattened
    pub fn len(&self) -> usize {
        self.width * self.height
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn same_grid(&self, other: &RasterParams) -> bool {
        self.width == other.width && self.height == other.height
    }
}

/// A named raster band held fully in memory, row-major.
#[derive(Debug, Clone)]
pub struct Layer {
    pub name: String,
    pub params: RasterParams,
    pub geo_transform: Option<[f64; 6]>,
    pub projection: String,
    data: Vec<f64>,
}

impl Layer {
    // Build a layer from values already in memory, `data` must be row-major.
    pub fn from_values(name: &str, params: RasterParams, data: Vec<f64>) -> Result<Self> {
        if data.len() != params.len() {
            bail!(
                "Layer '{}' has {} values but a {} x {} grid needs {}",
                name,
                data.len(),
                params.width,
                params.height,
                params.len()
            );
        }
        Ok(Layer {
            name: name.to_string(),
            params,
            geo_transform: None,
            projection: String::new(),
            data,
        })
    }

    // Load band 1 of a GDAL dataset at native resolution
    pub fn read(name: &str, path: &Path) -> Result<Self> {
        let dataset = Dataset::open(path)
            .with_context(|| format!("Failed to open raster {}", path.display()))?;
        let band = dataset
            .rasterband(1)
            .with_context(|| format!("Raster {} has no band 1", path.display()))?;

        let (width, height) = dataset.raster_size();
        let geo_transform = dataset.geo_transform().ok();

        let params = RasterParams {
            width,
            height,
            nodata: band.no_data_value(),
        };

        let buffer = band
            .read_as::<f64>((0, 0), (width, height), (width, height), None)
            .with_context(|| format!("Failed to read data from {}", path.display()))?;
        let data = buffer.data().to_vec();

        let mut layer = Layer::from_values(name, params, data)?;
        layer.geo_transform = geo_transform;
        layer.projection = dataset.projection();
        Ok(layer)
    }

    /// Flattened row count, width x height.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The grid flattened in row-major order.
    pub fn values(&self) -> &[f64] {
        &self.data
    }
}

/// Writes `values` (row-major, width x height of `template`) as a single-band f32 GeoTIFF
/// carrying the template's georeferencing.
pub fn write_geotiff(path: &Path, template: &Layer, values: &[f64]) -> Result<()> {
    let params = template.params;
    if values.len() != params.len() {
        bail!(
            "Cannot write {} values to a {} x {} raster",
            values.len(),
            params.width,
            params.height
        );
    }

    let driver = DriverManager::get_driver_by_name("GTiff")?;
    let options = CslStringList::from_iter(["TILED=YES", "COMPRESS=DEFLATE"]);
    let mut ds = driver
        .create_with_band_type_with_options::<f32, _>(
            path,
            params.width,
            params.height,
            1,
            &options,
        )
        .with_context(|| format!("Failed to create GeoTIFF {}", path.display()))?;

    if !template.projection.is_empty() {
        ds.set_projection(&template.projection)?;
    }
    if let Some(gt) = template.geo_transform {
        ds.set_geo_transform(&gt)?;
    }

    let mut band = ds.rasterband(1)?;
    let data: Vec<f32> = values.iter().map(|&v| v as f32).collect();
    let mut buffer = Buffer::new((params.width, params.height), data);
    band.write((0, 0), (params.width, params.height), &mut buffer)
        .with_context(|| format!("Failed to write data to {}", path.display()))?;
    band.compute_raster_min_max(true)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(width: usize, height: usize) -> RasterParams {
        RasterParams {
            width,
            height,
            nodata: None,
        }
    }

    #[test]
    fn flattened_length_is_width_times_height() {
        let layer = Layer::from_values("dem", params(4, 3), (0..12).map(f64::from).collect()).unwrap();
        assert_eq!(layer.len(), 12);
        assert_eq!(layer.params.len(), 12);
        assert_eq!(layer.values()[5], 5.0);
    }

    #[test]
    fn rejects_value_count_mismatch() {
        assert!(Layer::from_values("dem", params(4, 3), vec![0.0; 11]).is_err());
    }
}
