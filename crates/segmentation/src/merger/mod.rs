//! Merge strategies
//!
//! A [`BandMerger`] answers band-wise questions about two regions (may they
//! merge, how far is a pixel from a region, is a region homogeneous) and
//! blends statistics on merge. [`Merger`] aggregates those answers across
//! bands:
//!
//! - strict mode: every band must agree
//! - non-strict mode: one agreeing band is enough
//! - dissimilarity: sum over bands

mod composite;
mod euclidean;
mod optical_cartoon;
pub mod params;
mod radar_cartoon;

pub use composite::CompositeMerger;
pub use euclidean::EuclideanMerger;
pub use optical_cartoon::OpticalCartoonMerger;
pub use params::MergeParams;
pub use radar_cartoon::RadarCartoonMerger;

use std::fmt::Debug;

use mseg_core::{Error, Result};
use statrs::distribution::{ContinuousCDF, Normal, StudentsT};

use crate::region::Region;

/// Band-wise homogeneity, dissimilarity and merge operators.
pub trait BandMerger: Debug + Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether `r1` and `r2` may merge judging by `band` alone
    fn predicate(&self, r1: &Region, r2: &Region, band: usize, params: &MergeParams) -> Result<bool>;

    /// Non-negative cost of assigning `pixel` to `region` on `band`
    fn dissimilarity(&self, pixel: &[f64], region: &Region, band: usize, params: &MergeParams) -> Result<f64>;

    /// Whether the internal variability of `region` on `band` is acceptable
    fn is_homogeneous(&self, region: &Region, band: usize, params: &MergeParams) -> Result<bool>;

    /// Absorb the statistics and bounds of `r2` into `r1`
    fn merge(&self, r1: &mut Region, r2: &Region);
}

/// The fixed family of strategies
#[derive(Debug)]
pub enum MergeStrategy {
    Euclidean(EuclideanMerger),
    RadarCartoon(RadarCartoonMerger),
    OpticalCartoon(OpticalCartoonMerger),
    Composite(CompositeMerger),
}

impl MergeStrategy {
    fn inner(&self) -> &dyn BandMerger {
        match self {
            MergeStrategy::Euclidean(m) => m,
            MergeStrategy::RadarCartoon(m) => m,
            MergeStrategy::OpticalCartoon(m) => m,
            MergeStrategy::Composite(m) => m,
        }
    }

    pub fn name(&self) -> &'static str {
        self.inner().name()
    }
}

/// A strategy together with its parameters and band aggregation mode.
#[derive(Debug)]
pub struct Merger {
    strategy: MergeStrategy,
    params: MergeParams,
    strict: bool,
}

impl Merger {
    /// Strict mode is on by default
    pub fn new(strategy: MergeStrategy) -> Self {
        Self {
            strategy,
            params: MergeParams::new(),
            strict: true,
        }
    }

    pub fn with_strict_mode(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn strict_mode(&self) -> bool {
        self.strict
    }

    pub fn strategy(&self) -> &MergeStrategy {
        &self.strategy
    }

    /// Swap the strategy, keeping parameters and strict mode
    pub fn set_strategy(&mut self, strategy: MergeStrategy) {
        self.strategy = strategy;
    }

    pub fn params(&self) -> &MergeParams {
        &self.params
    }

    pub fn set_param(&mut self, name: impl Into<String>, value: f64) {
        self.params.set(name, value);
    }

    pub fn param(&self, name: &str) -> Result<f64> {
        self.params.get(name)
    }

    fn aggregate<F>(&self, n_bands: usize, mut band_ok: F) -> Result<bool>
    where
        F: FnMut(usize) -> Result<bool>,
    {
        let mut passed = 0;
        for band in 0..n_bands {
            let ok = band_ok(band)?;
            if !ok && self.strict {
                return Ok(false);
            }
            if ok && !self.strict {
                return Ok(true);
            }
            if ok {
                passed += 1;
            }
        }
        Ok(passed > 0)
    }

    /// Band-aggregated merge predicate
    pub fn predicate(&self, r1: &Region, r2: &Region) -> Result<bool> {
        let m = self.strategy.inner();
        self.aggregate(r1.n_bands(), |b| m.predicate(r1, r2, b, &self.params))
    }

    /// Band-aggregated homogeneity test
    pub fn is_homogeneous(&self, region: &Region) -> Result<bool> {
        let m = self.strategy.inner();
        self.aggregate(region.n_bands(), |b| m.is_homogeneous(region, b, &self.params))
    }

    /// Sum of the band dissimilarities of `pixel` to `region`
    pub fn dissimilarity(&self, pixel: &[f64], region: &Region) -> Result<f64> {
        let m = self.strategy.inner();
        (0..pixel.len()).try_fold(0.0, |acc, b| {
            Ok(acc + m.dissimilarity(pixel, region, b, &self.params)?)
        })
    }

    pub fn merge(&self, r1: &mut Region, r2: &Region) {
        self.strategy.inner().merge(r1, r2);
    }
}

/// `1 - cdf(t)` of a Student-t with `dof` degrees of freedom
pub(crate) fn student_t_upper_tail(t: f64, dof: f64) -> Result<f64> {
    let dist = StudentsT::new(0.0, 1.0, dof).map_err(|e| Error::Algorithm(e.to_string()))?;
    Ok(1.0 - dist.cdf(t))
}

/// `1 - Φ(z)` of the standard normal
pub(crate) fn normal_upper_tail(z: f64) -> Result<f64> {
    let dist = Normal::new(0.0, 1.0).map_err(|e| Error::Algorithm(e.to_string()))?;
    Ok(1.0 - dist.cdf(z))
}

/// `num / den`, with a zero denominator mapping to 0 or +inf
pub(crate) fn ratio_or_infinity(num: f64, den: f64) -> f64 {
    if den == 0.0 {
        if num == 0.0 {
            0.0
        } else {
            f64::INFINITY
        }
    } else {
        num / den
    }
}
