//! Per-region statistics recompute

use mseg_core::{Image, Result};
use tracing::debug;

use super::state::{read_pixel, SegmentationState};
use crate::label_grid::LabelGrid;
use crate::maybe_rayon::*;
use crate::region::{BoundingBox, RegionId};

/// Fresh statistics of one region, gathered from the label grid
#[derive(Debug)]
struct Recomputed {
    id: RegionId,
    size: usize,
    mean: Vec<f64>,
    variance: Vec<f64>,
    cv: Vec<f64>,
    bbox: Option<BoundingBox>,
    /// Labelled cells without readable data
    unreadable: Vec<(usize, usize)>,
}

impl SegmentationState {
    /// Recompute size, mean, variance and CV of every region from `image`.
    ///
    /// The mean uses every readable pixel; the variance only the first
    /// `sample_cap` of them in row-major order (exactly `sample_cap`, and at
    /// least one). Bounding boxes are tightened
    /// to the pixels found. Labelled cells without data are unassigned and
    /// regions left empty are removed, their neighbours linked together.
    ///
    /// Returns the number of removed regions.
    pub fn update_statistics(&mut self, image: &Image, sample_cap: Option<usize>) -> Result<usize> {
        let ids = self.regions.ids();
        let labels = &self.labels;
        let regions = &self.regions;
        let cap = sample_cap.unwrap_or(usize::MAX);

        let fresh = ids
            .into_par_iter()
            .map(|id| -> Result<Recomputed> {
                let region = regions.get(id)?;
                Ok(recompute(image, labels, id, &region.bbox, region.n_bands(), cap))
            })
            .collect::<Result<Vec<Recomputed>>>()?;

        let mut purged = 0;
        for stats in fresh {
            for &(r, c) in &stats.unreadable {
                self.labels.set(r, c, LabelGrid::DUMMY)?;
            }
            match stats.bbox {
                Some(bbox) => {
                    let region = self.regions.get_mut(stats.id)?;
                    region.size = stats.size;
                    region.mean = stats.mean;
                    region.variance = stats.variance;
                    region.cv = stats.cv;
                    region.bbox = bbox;
                }
                None => {
                    self.regions.remove_region(stats.id, true)?;
                    purged += 1;
                }
            }
        }

        if purged > 0 {
            debug!("Removed {} empty regions", purged);
        }
        Ok(purged)
    }
}

fn recompute(
    image: &Image,
    labels: &LabelGrid,
    id: RegionId,
    bbox: &BoundingBox,
    n_bands: usize,
    cap: usize,
) -> Recomputed {
    let mut pixels = Vec::new();
    let mut unreadable = Vec::new();
    let mut tight: Option<BoundingBox> = None;

    for (r, c) in labels.cells_of(bbox, id) {
        match read_pixel(image, r, c) {
            Some(p) => {
                match tight.as_mut() {
                    Some(b) => b.include(r, c),
                    None => tight = Some(BoundingBox::pixel(r, c)),
                }
                pixels.push(p);
            }
            None => unreadable.push((r, c)),
        }
    }

    let size = pixels.len();
    let mut mean = vec![0.0; n_bands];
    let mut variance = vec![0.0; n_bands];
    let mut cv = vec![0.0; n_bands];

    if size > 0 {
        for p in &pixels {
            for (m, v) in mean.iter_mut().zip(p) {
                *m += v;
            }
        }
        mean.iter_mut().for_each(|m| *m /= size as f64);

        // at most `cap` samples, never zero
        let samples = size.min(cap).max(1);
        for p in pixels.iter().take(samples) {
            for (b, v) in p.iter().enumerate() {
                variance[b] += (v - mean[b]).powi(2);
            }
        }
        for b in 0..n_bands {
            variance[b] /= samples as f64;
            cv[b] = if mean[b] == 0.0 { 0.0 } else { variance[b].sqrt() / mean[b] };
        }
    }

    Recomputed {
        id,
        size,
        mean,
        variance,
        cv,
        bbox: tight,
        unreadable,
    }
}
