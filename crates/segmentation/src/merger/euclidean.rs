//! Plain intensity-distance merger

use mseg_core::Result;

use super::params::{MergeParams, CV_THRESHOLD, EUCLIDEAN_DISTANCE_THRESHOLD};
use super::BandMerger;
use crate::region::Region;

/// Merges regions whose band means differ by at most
/// `euclidean_distance_threshold`; homogeneous when CV ≤ `cv_threshold`.
#[derive(Debug, Clone, Copy, Default)]
pub struct EuclideanMerger;

impl EuclideanMerger {
    pub(crate) fn euclidean_predicate(
        r1: &Region,
        r2: &Region,
        band: usize,
        params: &MergeParams,
    ) -> Result<bool> {
        let t = params.get(EUCLIDEAN_DISTANCE_THRESHOLD)?;
        Ok((r1.mean[band] - r2.mean[band]).abs() <= t)
    }

    pub(crate) fn euclidean_dissimilarity(pixel: &[f64], region: &Region, band: usize) -> f64 {
        (pixel[band] - region.mean[band]).abs()
    }

    /// Size-weighted mean blend and bounds union
    pub(crate) fn blend(r1: &mut Region, r2: &Region) {
        r1.bbox = r1.bbox.union(&r2.bbox);
        let n1 = r1.size as f64;
        let n2 = r2.size as f64;
        for (m1, m2) in r1.mean.iter_mut().zip(&r2.mean) {
            *m1 = (*m1 * n1 + m2 * n2) / (n1 + n2);
        }
        r1.size += r2.size;
    }
}

impl BandMerger for EuclideanMerger {
    fn name(&self) -> &'static str {
        "euclidean"
    }

    fn predicate(&self, r1: &Region, r2: &Region, band: usize, params: &MergeParams) -> Result<bool> {
        Self::euclidean_predicate(r1, r2, band, params)
    }

    fn dissimilarity(&self, pixel: &[f64], region: &Region, band: usize, _params: &MergeParams) -> Result<f64> {
        Ok(Self::euclidean_dissimilarity(pixel, region, band))
    }

    fn is_homogeneous(&self, region: &Region, band: usize, params: &MergeParams) -> Result<bool> {
        Ok(region.cv[band] <= params.get(CV_THRESHOLD)?)
    }

    fn merge(&self, r1: &mut Region, r2: &Region) {
        Self::blend(r1, r2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn params(t: f64, cv: f64) -> MergeParams {
        let mut p = MergeParams::new();
        p.set(EUCLIDEAN_DISTANCE_THRESHOLD, t);
        p.set(CV_THRESHOLD, cv);
        p
    }

    #[test]
    fn test_predicate_threshold_inclusive() {
        let a = Region::from_pixel(0, 0, 0, vec![10.0]);
        let b = Region::from_pixel(1, 0, 1, vec![15.0]);
        let m = EuclideanMerger;
        assert!(m.predicate(&a, &b, 0, &params(5.0, 0.0)).unwrap());
        assert!(!m.predicate(&a, &b, 0, &params(4.9, 0.0)).unwrap());
    }

    #[test]
    fn test_merge_weighted_mean_and_bounds() {
        let mut a = Region::from_pixel(0, 0, 0, vec![10.0]);
        a.size = 3;
        let b = Region::from_pixel(1, 2, 4, vec![20.0]);
        EuclideanMerger.merge(&mut a, &b);
        assert_eq!(a.size, 4);
        assert_relative_eq!(a.mean[0], 12.5);
        assert_eq!((a.bbox.bound_row, a.bbox.bound_col), (3, 5));
    }

    #[test]
    fn test_homogeneous_and_dissimilarity() {
        let mut a = Region::from_pixel(0, 0, 0, vec![10.0]);
        a.cv = vec![0.2];
        let m = EuclideanMerger;
        assert!(m.is_homogeneous(&a, 0, &params(0.0, 0.2)).unwrap());
        assert!(!m.is_homogeneous(&a, 0, &params(0.0, 0.1)).unwrap());
        assert_eq!(m.dissimilarity(&[7.0], &a, 0, &params(0.0, 0.0)).unwrap(), 3.0);
        assert!(m.predicate(&a, &a, 0, &MergeParams::new()).is_err());
    }
}
