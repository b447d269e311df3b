//! Merger for speckled radar intensity under the cartoon model
//!
//! - pixel vs pixel: plain Euclidean threshold
//! - region vs pixel: the pixel must not exceed `vcritic_factor * region mean`
//! - region vs region: two-sample Student-t test on speckle variances `mean² / ENL`

use mseg_core::Result;

use super::euclidean::EuclideanMerger;
use super::params::{MergeParams, CONFIDENCE_LEVEL, CV_THRESHOLD, ENL, VCRITIC_FACTOR};
use super::{ratio_or_infinity, student_t_upper_tail, BandMerger};
use crate::region::Region;

#[derive(Debug, Clone, Copy, Default)]
pub struct RadarCartoonMerger;

impl BandMerger for RadarCartoonMerger {
    fn name(&self) -> &'static str {
        "radar-cartoon"
    }

    fn predicate(&self, r1: &Region, r2: &Region, band: usize, params: &MergeParams) -> Result<bool> {
        if r1.size == 1 {
            return EuclideanMerger::euclidean_predicate(r1, r2, band, params);
        }

        let mean_a = r1.mean[band];
        let mean_b = r2.mean[band];

        if r2.size == 1 {
            let vcritic = params.get(VCRITIC_FACTOR)? * mean_a;
            return Ok(mean_b <= vcritic);
        }

        let enl = params.get(ENL)?;
        let probability = 1.0 - params.get(CONFIDENCE_LEVEL)?;
        let (n1, n2) = (r1.size as f64, r2.size as f64);
        let var_a = mean_a * mean_a / enl;
        let var_b = mean_b * mean_b / enl;
        let dof = n1 + n2 - 2.0;

        let pooled = ((n1 - 1.0) * var_a + (n2 - 1.0) * var_b) / dof;
        let root = (pooled * (1.0 / n1 + 1.0 / n2)).sqrt();
        let diff = (mean_a - mean_b).abs();
        if root == 0.0 || !root.is_finite() {
            return Ok(diff == 0.0);
        }

        let p = student_t_upper_tail(diff / root, dof)?;
        Ok(p >= probability)
    }

    /// Euclidean distance scaled by the speckle standard deviation `mean / √ENL`
    fn dissimilarity(&self, pixel: &[f64], region: &Region, band: usize, params: &MergeParams) -> Result<f64> {
        let distance = EuclideanMerger::euclidean_dissimilarity(pixel, region, band);
        let noise = region.mean[band] / params.get(ENL)?.sqrt();
        Ok(ratio_or_infinity(distance, noise.abs()))
    }

    fn is_homogeneous(&self, region: &Region, band: usize, params: &MergeParams) -> Result<bool> {
        Ok(region.cv[band] <= params.get(CV_THRESHOLD)?)
    }

    fn merge(&self, r1: &mut Region, r2: &Region) {
        EuclideanMerger::blend(r1, r2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merger::params::EUCLIDEAN_DISTANCE_THRESHOLD;

    fn params() -> MergeParams {
        let mut p = MergeParams::new();
        p.set(EUCLIDEAN_DISTANCE_THRESHOLD, 1.0);
        p.set(VCRITIC_FACTOR, 2.0);
        p.set(ENL, 4.0);
        p.set(CONFIDENCE_LEVEL, 0.95);
        p
    }

    fn region(id: u64, mean: f64, size: usize) -> Region {
        let mut r = Region::from_pixel(id, 0, 0, vec![mean]);
        r.size = size;
        r
    }

    #[test]
    fn test_pixel_vs_pixel_is_euclidean() {
        let m = RadarCartoonMerger;
        assert!(m.predicate(&region(0, 10.0, 1), &region(1, 11.0, 1), 0, &params()).unwrap());
        assert!(!m.predicate(&region(0, 10.0, 1), &region(1, 11.5, 1), 0, &params()).unwrap());
    }

    #[test]
    fn test_region_vs_pixel_critical_bound() {
        let m = RadarCartoonMerger;
        let r = region(0, 10.0, 20);
        assert!(m.predicate(&r, &region(1, 20.0, 1), 0, &params()).unwrap());
        assert!(!m.predicate(&r, &region(1, 20.5, 1), 0, &params()).unwrap());
    }

    #[test]
    fn test_region_vs_region_t_test() {
        let m = RadarCartoonMerger;
        // equal means always pass
        assert!(m.predicate(&region(0, 10.0, 30), &region(1, 10.0, 30), 0, &params()).unwrap());
        // far apart means with many samples fail
        assert!(!m.predicate(&region(0, 10.0, 500), &region(1, 30.0, 500), 0, &params()).unwrap());
        // zero means have zero variance: only identical means pass
        assert!(m.predicate(&region(0, 0.0, 5), &region(1, 0.0, 5), 0, &params()).unwrap());
    }

    #[test]
    fn test_dissimilarity_normalized() {
        let m = RadarCartoonMerger;
        let r = region(0, 10.0, 4);
        // |14 - 10| / (10 / 2)
        assert_eq!(m.dissimilarity(&[14.0], &r, 0, &params()).unwrap(), 0.8);
        let zero = region(1, 0.0, 4);
        assert_eq!(m.dissimilarity(&[0.0], &zero, 0, &params()).unwrap(), 0.0);
        assert!(m.dissimilarity(&[1.0], &zero, 0, &params()).unwrap().is_infinite());
    }
}
