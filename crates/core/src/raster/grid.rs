//! Main Raster type

use crate::error::{Error, Result};
use crate::raster::RasterElement;
use ndarray::Array2;

/// A single-band 2D raster grid.
///
/// `Raster<T>` stores values of type `T` in a row-major grid with an
/// optional no-data value. It backs both image bands and label grids.
///
/// # Example
///
/// ```
/// use mseg_core::Raster;
///
/// let mut raster: Raster<f64> = Raster::new(4, 4);
/// raster.set(1, 2, 42.0).unwrap();
/// assert_eq!(raster.get(1, 2).unwrap(), 42.0);
/// ```
#[derive(Debug, Clone)]
pub struct Raster<T: RasterElement> {
    /// Raster data stored in row-major order (row, col)
    data: Array2<T>,
    /// No-data value
    nodata: Option<T>,
}

impl<T: RasterElement> Raster<T> {
    /// Create a new raster filled with zeros
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            data: Array2::zeros((rows, cols)),
            nodata: None,
        }
    }

    /// Create a new raster filled with a specific value
    pub fn filled(rows: usize, cols: usize, value: T) -> Self {
        Self {
            data: Array2::from_elem((rows, cols), value),
            nodata: None,
        }
    }

    /// Create a raster from row-major data
    pub fn from_vec(data: Vec<T>, rows: usize, cols: usize) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(Error::InvalidDimensions {
                width: cols,
                height: rows,
            });
        }

        let array = Array2::from_shape_vec((rows, cols), data)
            .map_err(|e| Error::Other(e.to_string()))?;

        Ok(Self::from_array(array))
    }

    /// Create a raster from an ndarray
    pub fn from_array(data: Array2<T>) -> Self {
        Self { data, nodata: None }
    }

    /// Number of rows
    pub fn rows(&self) -> usize {
        self.data.nrows()
    }

    /// Number of columns
    pub fn cols(&self) -> usize {
        self.data.ncols()
    }

    /// Dimensions as (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    /// Total number of cells
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the raster is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Get value at (row, col)
    pub fn get(&self, row: usize, col: usize) -> Result<T> {
        self.data
            .get((row, col))
            .copied()
            .ok_or(Error::IndexOutOfBounds {
                row,
                col,
                rows: self.rows(),
                cols: self.cols(),
            })
    }

    /// Get value at (row, col), `None` outside the grid
    #[inline]
    pub fn try_get(&self, row: usize, col: usize) -> Option<T> {
        self.data.get((row, col)).copied()
    }

    /// Set value at (row, col)
    pub fn set(&mut self, row: usize, col: usize, value: T) -> Result<()> {
        if row >= self.rows() || col >= self.cols() {
            return Err(Error::IndexOutOfBounds {
                row,
                col,
                rows: self.rows(),
                cols: self.cols(),
            });
        }
        self.data[(row, col)] = value;
        Ok(())
    }

    /// Get a reference to the underlying array
    pub fn data(&self) -> &Array2<T> {
        &self.data
    }

    /// Get a mutable reference to the underlying array
    pub fn data_mut(&mut self) -> &mut Array2<T> {
        &mut self.data
    }

    /// Get the no-data value
    pub fn nodata(&self) -> Option<T> {
        self.nodata
    }

    /// Set the no-data value
    pub fn set_nodata(&mut self, nodata: Option<T>) {
        self.nodata = nodata;
    }

    /// Check if a value is no-data
    pub fn is_nodata(&self, value: T) -> bool {
        value.is_nodata(self.nodata)
    }

    /// Nearest-neighbour resample to `(rows, cols)` where each target cell
    /// reads source cell `(row / 2, col / 2)`, clamped to the source extent.
    ///
    /// This is the inverse of one 2×2 pyramid reduction.
    pub fn upsample_2x(&self, rows: usize, cols: usize) -> Result<Self> {
        if self.is_empty() {
            return Err(Error::InvalidDimensions {
                width: self.cols(),
                height: self.rows(),
            });
        }
        let (src_rows, src_cols) = self.shape();
        let data = Array2::from_shape_fn((rows, cols), |(r, c)| {
            self.data[((r / 2).min(src_rows - 1), (c / 2).min(src_cols - 1))]
        });
        Ok(Self {
            data,
            nodata: self.nodata,
        })
    }

    /// Min, max, mean and valid count, skipping no-data cells
    pub fn statistics(&self) -> RasterStatistics<T> {
        let mut min: Option<T> = None;
        let mut max: Option<T> = None;
        let mut sum: f64 = 0.0;
        let mut count: usize = 0;

        for &value in self.data.iter() {
            if self.is_nodata(value) {
                continue;
            }

            if min.map_or(true, |m| value < m) {
                min = Some(value);
            }
            if max.map_or(true, |m| value > m) {
                max = Some(value);
            }

            if let Some(v) = value.to_f64() {
                sum += v;
                count += 1;
            }
        }

        let mean = if count > 0 {
            Some(sum / count as f64)
        } else {
            None
        };

        RasterStatistics {
            min,
            max,
            mean,
            valid_count: count,
            nodata_count: self.len() - count,
        }
    }
}

/// Basic statistics for a raster
#[derive(Debug, Clone)]
pub struct RasterStatistics<T> {
    pub min: Option<T>,
    pub max: Option<T>,
    pub mean: Option<f64>,
    pub valid_count: usize,
    pub nodata_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raster_creation() {
        let raster: Raster<f32> = Raster::new(100, 200);
        assert_eq!(raster.rows(), 100);
        assert_eq!(raster.cols(), 200);
        assert_eq!(raster.shape(), (100, 200));
    }

    #[test]
    fn test_raster_access() {
        let mut raster: Raster<f64> = Raster::new(10, 10);
        raster.set(5, 5, 42.0).unwrap();
        assert_eq!(raster.get(5, 5).unwrap(), 42.0);
        assert!(raster.get(10, 0).is_err());
        assert_eq!(raster.try_get(0, 10), None);
    }

    #[test]
    fn test_raster_statistics_skips_nodata() {
        let mut raster = Raster::from_vec(vec![1.0, 2.0, f64::NAN, 5.0], 2, 2).unwrap();
        raster.set_nodata(Some(5.0));
        let stats = raster.statistics();
        assert_eq!(stats.min, Some(1.0));
        assert_eq!(stats.max, Some(2.0));
        assert_eq!(stats.valid_count, 2);
        assert_eq!(stats.nodata_count, 2);
    }

    #[test]
    fn test_upsample_2x_odd_target() {
        let raster = Raster::from_vec(vec![1u64, 2, 3, 4], 2, 2).unwrap();
        let up = raster.upsample_2x(3, 4).unwrap();
        assert_eq!(up.shape(), (3, 4));
        assert_eq!(up.get(0, 0).unwrap(), 1);
        assert_eq!(up.get(1, 3).unwrap(), 2);
        assert_eq!(up.get(2, 0).unwrap(), 3);
        assert_eq!(up.get(2, 3).unwrap(), 4);
    }

    #[test]
    fn test_from_vec_wrong_len() {
        assert!(Raster::<f64>::from_vec(vec![0.0; 5], 2, 2).is_err());
    }
}
