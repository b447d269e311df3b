//! Multi-resolution image pyramid
//!
//! Level 0 is the input at full resolution (restricted to the selected
//! bands). Level `i + 1` halves level `i` by averaging each non-overlapping
//! 2×2 block. Dimensions round up, so blocks on an odd edge average fewer
//! cells; a block without any readable cell becomes NaN (no data).

use mseg_core::{BandStatistics, GlobalStatistics, Image, PixelGrid, Raster, StatisticsProvider};
use mseg_core::{Error, Result};
use tracing::debug;

use crate::maybe_rayon::*;

/// Ordered list of progressively halved images.
#[derive(Debug, Clone)]
pub struct Pyramid {
    levels: Vec<Option<Image>>,
}

impl Pyramid {
    /// Build `n_levels` reduced levels on top of `image`, keeping only `bands`.
    ///
    /// # Arguments
    /// * `image` - Full resolution input
    /// * `n_levels` - Number of levels above the base
    /// * `bands` - Source band indices; level band `k` holds source band `bands[k]`
    pub fn new(image: &Image, n_levels: usize, bands: &[usize]) -> Result<Self> {
        let base = image.select_bands(bands)?;
        let mut levels = Vec::with_capacity(n_levels + 1);
        levels.push(Some(base));

        for i in 1..=n_levels {
            let previous = levels[i - 1].as_ref().ok_or(Error::LevelReleased(i - 1))?;
            let next = downsample(previous)?;
            debug!("Pyramid level {}: {}x{}", i, next.rows(), next.cols());
            levels.push(Some(next));
        }

        Ok(Self { levels })
    }

    /// Total number of levels, base included
    pub fn n_levels(&self) -> usize {
        self.levels.len()
    }

    /// Index of the coarsest level
    pub fn coarsest(&self) -> usize {
        self.levels.len().saturating_sub(1)
    }

    /// Borrow level `i`
    pub fn level(&self, i: usize) -> Result<&Image> {
        self.levels
            .get(i)
            .ok_or(Error::LevelOutOfRange {
                level: i,
                n_levels: self.levels.len(),
            })?
            .as_ref()
            .ok_or(Error::LevelReleased(i))
    }

    /// Free level `i`. Requesting it afterwards fails with [`Error::LevelReleased`].
    pub fn release_level(&mut self, i: usize) -> Result<()> {
        let n_levels = self.levels.len();
        let slot = self
            .levels
            .get_mut(i)
            .ok_or(Error::LevelOutOfRange { level: i, n_levels })?;
        *slot = None;
        Ok(())
    }

    /// Global per-band mean/variance of level `i`
    pub fn build_stats(&self, i: usize) -> Result<BandStatistics> {
        self.build_stats_with(i, &GlobalStatistics)
    }

    /// Global per-band mean/variance of level `i` using a custom provider
    pub fn build_stats_with(
        &self,
        i: usize,
        provider: &dyn StatisticsProvider,
    ) -> Result<BandStatistics> {
        let level = self.level(i)?;
        let bands: Vec<usize> = (0..level.n_bands()).collect();
        Ok(provider.mean_and_variance(level, &bands))
    }
}

/// Halve an image with 2×2 block means
pub fn downsample(image: &Image) -> Result<Image> {
    let (rows, cols) = image.shape();
    let new_rows = rows.div_ceil(2);
    let new_cols = cols.div_ceil(2);

    let bands = (0..image.n_bands())
        .map(|b| {
            let rows_out: Vec<Vec<f64>> = (0..new_rows)
                .into_par_iter()
                .map(|r| {
                    (0..new_cols)
                        .map(|c| block_mean(image, 2 * r, 2 * c, b))
                        .collect()
                })
                .collect();
            Raster::from_vec(rows_out.concat(), new_rows, new_cols)
        })
        .collect::<Result<Vec<_>>>()?;

    Image::from_bands(bands)
}

#[inline]
fn block_mean(image: &Image, row: usize, col: usize, band: usize) -> f64 {
    let mut sum = 0.0;
    let mut n = 0usize;
    for (dr, dc) in [(0, 0), (0, 1), (1, 0), (1, 1)] {
        if let Some(v) = image.get(row + dr, col + dc, band) {
            sum += v;
            n += 1;
        }
    }
    if n == 0 {
        f64::NAN
    } else {
        sum / n as f64
    }
}

/// Largest level count such that the smaller side of the coarsest level
/// is still at least `minimum_size` pixels.
pub fn compute_max_levels(rows: usize, cols: usize, minimum_size: usize) -> usize {
    let minimum_size = minimum_size.max(1);
    let mut levels = 0;
    let mut size = rows.min(cols) / 2;
    while size >= minimum_size {
        levels += 1;
        size /= 2;
    }
    levels
}
