//! Per-band dispatch to heterogeneous mergers

use mseg_core::{Error, Result};

use super::params::MergeParams;
use super::BandMerger;
use crate::region::Region;

/// One sub-merger per band.
///
/// Each entry carries a flag telling whether its `merge` updates the shared
/// region statistics; only flagged entries run on merge so a region is not
/// blended twice.
#[derive(Debug, Default)]
pub struct CompositeMerger {
    mergers: Vec<(Box<dyn BandMerger>, bool)>,
}

impl CompositeMerger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the merger for the next band
    pub fn add(&mut self, merger: Box<dyn BandMerger>, updates_statistics: bool) {
        self.mergers.push((merger, updates_statistics));
    }

    pub fn with(mut self, merger: Box<dyn BandMerger>, updates_statistics: bool) -> Self {
        self.add(merger, updates_statistics);
        self
    }

    pub fn len(&self) -> usize {
        self.mergers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mergers.is_empty()
    }

    fn band_merger(&self, band: usize) -> Result<&dyn BandMerger> {
        self.mergers
            .get(band)
            .map(|(m, _)| m.as_ref())
            .ok_or(Error::BandOutOfRange {
                band,
                band_count: self.mergers.len(),
            })
    }
}

impl BandMerger for CompositeMerger {
    fn name(&self) -> &'static str {
        "composite"
    }

    fn predicate(&self, r1: &Region, r2: &Region, band: usize, params: &MergeParams) -> Result<bool> {
        self.band_merger(band)?.predicate(r1, r2, band, params)
    }

    fn dissimilarity(&self, pixel: &[f64], region: &Region, band: usize, params: &MergeParams) -> Result<f64> {
        self.band_merger(band)?.dissimilarity(pixel, region, band, params)
    }

    fn is_homogeneous(&self, region: &Region, band: usize, params: &MergeParams) -> Result<bool> {
        self.band_merger(band)?.is_homogeneous(region, band, params)
    }

    fn merge(&self, r1: &mut Region, r2: &Region) {
        for (merger, updates) in &self.mergers {
            if *updates {
                merger.merge(r1, r2);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merger::params::{image_variance_key, CONFIDENCE_LEVEL, EUCLIDEAN_DISTANCE_THRESHOLD};
    use crate::merger::{EuclideanMerger, OpticalCartoonMerger};

    fn two_band(a: f64, b: f64, size: usize) -> Region {
        let mut r = Region::from_pixel(0, 0, 0, vec![a, b]);
        r.size = size;
        r
    }

    #[test]
    fn test_dispatch_by_band() {
        let c = CompositeMerger::new()
            .with(Box::new(EuclideanMerger), true)
            .with(Box::new(OpticalCartoonMerger), false);
        let mut p = MergeParams::new();
        p.set(EUCLIDEAN_DISTANCE_THRESHOLD, 1.0);
        p.set(CONFIDENCE_LEVEL, 0.95);
        p.set(image_variance_key(1), 4.0);

        let r = two_band(10.0, 10.0, 5);
        assert!(c.predicate(&r, &two_band(10.5, 30.0, 5), 0, &p).unwrap());
        assert!(!c.predicate(&r, &two_band(10.5, 30.0, 5), 1, &p).unwrap());
        assert_eq!(c.dissimilarity(&[12.0, 12.0], &r, 1, &p).unwrap(), 0.5);
        assert!(matches!(c.predicate(&r, &r, 2, &p), Err(Error::BandOutOfRange { .. })));
    }

    #[test]
    fn test_merge_runs_flagged_only() {
        let c = CompositeMerger::new()
            .with(Box::new(EuclideanMerger), true)
            .with(Box::new(EuclideanMerger), false);
        let mut a = two_band(0.0, 0.0, 1);
        c.merge(&mut a, &two_band(2.0, 4.0, 1));
        assert_eq!(a.size, 2);
        assert_eq!(a.mean, vec![1.0, 2.0]);
    }
}
