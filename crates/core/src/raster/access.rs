//! Accessor traits through which the segmentation engine reads imagery
//!
//! - [`PixelGrid`]: per-band, per-pixel read/write over a rectangular image
//! - [`StatisticsProvider`]: global per-band mean/variance over a pixel grid
//!
//! Failed reads are "no data", never errors.

use super::{Raster, RasterElement};

/// Per-band, per-pixel access to a rectangular image.
pub trait PixelGrid {
    /// Dimensions as (rows, cols)
    fn dimensions(&self) -> (usize, usize);

    /// Number of bands
    fn band_count(&self) -> usize;

    /// Read a sample. `None` when out of range or no-data.
    fn get(&self, row: usize, col: usize, band: usize) -> Option<f64>;

    /// Write a sample. Returns `false` when the cell cannot be written.
    fn set(&mut self, row: usize, col: usize, band: usize, value: f64) -> bool;
}

impl PixelGrid for Raster<f64> {
    fn dimensions(&self) -> (usize, usize) {
        self.shape()
    }

    fn band_count(&self) -> usize {
        1
    }

    fn get(&self, row: usize, col: usize, band: usize) -> Option<f64> {
        if band != 0 {
            return None;
        }
        self.try_get(row, col).filter(|v| !v.is_nodata(self.nodata()))
    }

    fn set(&mut self, row: usize, col: usize, band: usize, value: f64) -> bool {
        band == 0 && Raster::set(self, row, col, value).is_ok()
    }
}

/// Global per-band statistics, indexed like the band list they were computed for
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BandStatistics {
    pub mean: Vec<f64>,
    pub variance: Vec<f64>,
    /// Number of readable pixels per band
    pub count: Vec<usize>,
}

/// Computes global mean/variance of selected bands
pub trait StatisticsProvider {
    fn mean_and_variance(&self, grid: &dyn PixelGrid, bands: &[usize]) -> BandStatistics;
}

/// Population mean and variance over every readable pixel.
///
/// Bands without readable pixels report mean and variance 0.
#[derive(Debug, Clone, Copy, Default)]
pub struct GlobalStatistics;

impl StatisticsProvider for GlobalStatistics {
    fn mean_and_variance(&self, grid: &dyn PixelGrid, bands: &[usize]) -> BandStatistics {
        let (rows, cols) = grid.dimensions();
        let mut stats = BandStatistics::default();

        for &band in bands {
            // Welford's online update
            let mut n = 0usize;
            let mut mean = 0.0;
            let mut m2 = 0.0;
            for row in 0..rows {
                for col in 0..cols {
                    if let Some(v) = grid.get(row, col, band) {
                        n += 1;
                        let delta = v - mean;
                        mean += delta / n as f64;
                        m2 += delta * (v - mean);
                    }
                }
            }
            stats.mean.push(mean);
            stats.variance.push(if n > 0 { m2 / n as f64 } else { 0.0 });
            stats.count.push(n);
        }

        stats
    }
}
