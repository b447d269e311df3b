//! Multi-band image built from equally-sized `Raster<f64>` bands

use crate::error::{Error, Result};
use crate::raster::{PixelGrid, Raster, RasterElement};

/// A stack of same-shaped `f64` bands.
///
/// Non-finite samples are treated as no-data by the [`PixelGrid`] impl.
#[derive(Debug, Clone)]
pub struct Image {
    bands: Vec<Raster<f64>>,
    rows: usize,
    cols: usize,
}

impl Image {
    /// Create an image with `n_bands` bands filled with `value`
    pub fn filled(rows: usize, cols: usize, n_bands: usize, value: f64) -> Self {
        Self {
            bands: (0..n_bands).map(|_| Raster::filled(rows, cols, value)).collect(),
            rows,
            cols,
        }
    }

    /// Create an image from its bands. All bands must share a shape.
    pub fn from_bands(bands: Vec<Raster<f64>>) -> Result<Self> {
        let first = bands.first().ok_or_else(|| Error::InvalidParameter {
            name: "bands",
            value: "0".into(),
            reason: "an image needs at least one band".into(),
        })?;
        let (rows, cols) = first.shape();
        if rows == 0 || cols == 0 {
            return Err(Error::InvalidDimensions {
                width: cols,
                height: rows,
            });
        }
        for band in &bands[1..] {
            let (ar, ac) = band.shape();
            if (ar, ac) != (rows, cols) {
                return Err(Error::SizeMismatch { er: rows, ec: cols, ar, ac });
            }
        }
        Ok(Self { bands, rows, cols })
    }

    /// Single-band image from row-major data
    pub fn from_vec(data: Vec<f64>, rows: usize, cols: usize) -> Result<Self> {
        Self::from_bands(vec![Raster::from_vec(data, rows, cols)?])
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn n_bands(&self) -> usize {
        self.bands.len()
    }

    /// Borrow one band
    pub fn band(&self, band: usize) -> Result<&Raster<f64>> {
        self.bands.get(band).ok_or(Error::BandOutOfRange {
            band,
            band_count: self.bands.len(),
        })
    }

    /// Mutably borrow one band
    pub fn band_mut(&mut self, band: usize) -> Result<&mut Raster<f64>> {
        let band_count = self.bands.len();
        self.bands
            .get_mut(band)
            .ok_or(Error::BandOutOfRange { band, band_count })
    }

    pub fn bands(&self) -> &[Raster<f64>] {
        &self.bands
    }

    pub fn into_bands(self) -> Vec<Raster<f64>> {
        self.bands
    }

    /// New image holding copies of the listed bands, in list order
    pub fn select_bands(&self, bands: &[usize]) -> Result<Self> {
        let selected = bands
            .iter()
            .map(|&b| self.band(b).cloned())
            .collect::<Result<Vec<_>>>()?;
        Self::from_bands(selected)
    }

    /// Rectangular window `[row0, row0 + rows) x [col0, col0 + cols)` of every band
    pub fn window(&self, row0: usize, col0: usize, rows: usize, cols: usize) -> Result<Self> {
        if row0 + rows > self.rows || col0 + cols > self.cols {
            return Err(Error::IndexOutOfBounds {
                row: row0 + rows,
                col: col0 + cols,
                rows: self.rows,
                cols: self.cols,
            });
        }
        let bands = self
            .bands
            .iter()
            .map(|b| {
                let view = b.data().slice(ndarray::s![row0..row0 + rows, col0..col0 + cols]);
                let mut r = Raster::from_array(view.to_owned());
                r.set_nodata(b.nodata());
                r
            })
            .collect();
        Self::from_bands(bands)
    }

    /// Apply `f` to every sample of every band
    pub fn map_in_place<F: Fn(f64) -> f64>(&mut self, f: F) {
        for band in &mut self.bands {
            band.data_mut().mapv_inplace(&f);
        }
    }
}

impl PixelGrid for Image {
    fn dimensions(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    fn band_count(&self) -> usize {
        self.bands.len()
    }

    #[inline]
    fn get(&self, row: usize, col: usize, band: usize) -> Option<f64> {
        let raster = self.bands.get(band)?;
        raster
            .try_get(row, col)
            .filter(|v| !v.is_nodata(raster.nodata()))
    }

    fn set(&mut self, row: usize, col: usize, band: usize, value: f64) -> bool {
        match self.bands.get_mut(band) {
            Some(raster) => raster.set(row, col, value).is_ok(),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_bands_shape_mismatch() {
        let a = Raster::<f64>::new(2, 2);
        let b = Raster::<f64>::new(2, 3);
        assert!(matches!(
            Image::from_bands(vec![a, b]),
            Err(Error::SizeMismatch { .. })
        ));
        assert!(Image::from_bands(vec![]).is_err());
    }

    #[test]
    fn test_select_and_window() {
        let a = Raster::from_vec((0..6).map(|v| v as f64).collect(), 2, 3).unwrap();
        let b = Raster::filled(2, 3, 7.0);
        let img = Image::from_bands(vec![a, b]).unwrap();

        let sel = img.select_bands(&[1]).unwrap();
        assert_eq!(sel.n_bands(), 1);
        assert_eq!(sel.get(0, 0, 0), Some(7.0));
        assert!(img.select_bands(&[2]).is_err());

        let win = img.window(1, 1, 1, 2).unwrap();
        assert_eq!(win.shape(), (1, 2));
        assert_eq!(win.get(0, 0, 0), Some(4.0));
        assert_eq!(win.get(0, 1, 0), Some(5.0));
        assert!(img.window(1, 1, 2, 2).is_err());
    }

    #[test]
    fn test_map_in_place_and_nodata() {
        let mut img = Image::from_vec(vec![2.0, f64::NAN, 3.0, 4.0], 2, 2).unwrap();
        img.map_in_place(|v| v * v);
        assert_eq!(img.get(0, 0, 0), Some(4.0));
        assert_eq!(img.get(0, 1, 0), None);
        assert_eq!(img.get(1, 1, 0), Some(16.0));
    }
}
