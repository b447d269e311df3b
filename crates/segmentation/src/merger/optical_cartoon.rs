//! Merger for optical imagery under the cartoon model
//!
//! Tests run against the global per-band image variance stored under
//! `image_variance_<band>`: a z-test for region vs pixel and a Student-t test
//! for region vs region.

use mseg_core::Result;

use super::euclidean::EuclideanMerger;
use super::params::{image_variance_key, MergeParams, CONFIDENCE_LEVEL, CV_THRESHOLD};
use super::{normal_upper_tail, ratio_or_infinity, student_t_upper_tail, BandMerger};
use crate::region::Region;

#[derive(Debug, Clone, Copy, Default)]
pub struct OpticalCartoonMerger;

impl BandMerger for OpticalCartoonMerger {
    fn name(&self) -> &'static str {
        "optical-cartoon"
    }

    fn predicate(&self, r1: &Region, r2: &Region, band: usize, params: &MergeParams) -> Result<bool> {
        if r1.size == 1 {
            return EuclideanMerger::euclidean_predicate(r1, r2, band, params);
        }

        let variance = params.get(&image_variance_key(band))?;
        let probability = 1.0 - params.get(CONFIDENCE_LEVEL)?;
        let diff = (r1.mean[band] - r2.mean[band]).abs();

        let p = if r2.size == 1 {
            let root = variance.sqrt();
            if root == 0.0 || !root.is_finite() {
                return Ok(diff == 0.0);
            }
            normal_upper_tail(diff / root)?
        } else {
            let (n1, n2) = (r1.size as f64, r2.size as f64);
            let root = (variance * (1.0 / n1 + 1.0 / n2)).sqrt();
            if root == 0.0 || !root.is_finite() {
                return Ok(diff == 0.0);
            }
            student_t_upper_tail(diff / root, n1 + n2 - 2.0)?
        };

        Ok(p >= probability)
    }

    fn dissimilarity(&self, pixel: &[f64], region: &Region, band: usize, params: &MergeParams) -> Result<f64> {
        let variance = params.get(&image_variance_key(band))?;
        let distance = EuclideanMerger::euclidean_dissimilarity(pixel, region, band);
        Ok(ratio_or_infinity(distance, variance))
    }

    fn is_homogeneous(&self, region: &Region, band: usize, params: &MergeParams) -> Result<bool> {
        Ok(region.cv[band] <= params.get(CV_THRESHOLD)?)
    }

    fn merge(&self, r1: &mut Region, r2: &Region) {
        EuclideanMerger::blend(r1, r2);
    }
}
