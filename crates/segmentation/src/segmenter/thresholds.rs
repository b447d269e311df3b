//! Per-level threshold schedule
//!
//! Thresholds shrink by 4 per level (pixel count ratio), corrected by a
//! factor for the spatial correlation introduced by block averaging.

use mseg_core::{Error, Result};
use statrs::distribution::{ContinuousCDF, Gamma};

use crate::cv_table::MAX_LOOKS;

/// Correlation correction for `level`.
///
/// All three lag terms use the same `(2^L - 1) / 2^L * 0.5` estimate.
pub fn lag_factor(level: usize) -> f64 {
    let size = 2f64.powi(level as i32);
    let lag = (size - 1.0) / size * 0.5;
    1.0 + 2.0 * (lag + lag + lag)
}

/// Thresholds in effect while processing one pyramid level
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelThresholds {
    pub level: usize,
    pub similarity: f64,
    /// Effective looks, integral in `[1, MAX_LOOKS]`
    pub enl: usize,
    pub cv: f64,
}

impl LevelThresholds {
    /// Scale the full-resolution thresholds to `level`
    pub fn at_level(level: usize, similarity: f64, enl: f64, cv: f64) -> Self {
        let scale = 4f64.powi(level as i32);
        let factor = lag_factor(level);
        let looks = (enl * scale / factor).floor();
        Self {
            level,
            similarity: similarity / scale * factor,
            enl: if looks.is_finite() && looks >= 1.0 {
                (looks as usize).min(MAX_LOOKS)
            } else {
                1
            },
            cv: cv / scale * factor,
        }
    }
}

/// Radar region-vs-pixel factor: the `confidence` quantile of a unit-rate
/// Gamma with shape `enl`, divided by `enl`.
pub fn critical_value_factor(enl: usize, confidence: f64) -> Result<f64> {
    let shape = enl.max(1) as f64;
    let gamma = Gamma::new(shape, 1.0).map_err(|e| Error::Algorithm(e.to_string()))?;
    Ok(gamma.inverse_cdf(confidence) / shape)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_lag_factor() {
        assert_relative_eq!(lag_factor(0), 1.0);
        assert_relative_eq!(lag_factor(1), 2.5);
        assert_relative_eq!(lag_factor(2), 1.0 + 6.0 * 0.375);
    }

    #[test]
    fn test_level_zero_is_identity() {
        let t = LevelThresholds::at_level(0, 12.0, 4.5, 0.3);
        assert_relative_eq!(t.similarity, 12.0);
        assert_eq!(t.enl, 4);
        assert_relative_eq!(t.cv, 0.3);
    }

    #[test]
    fn test_coarser_levels() {
        let t = LevelThresholds::at_level(1, 10.0, 3.0, 1.0);
        assert_relative_eq!(t.similarity, 10.0 / 4.0 * 2.5);
        // floor(3 * 4 / 2.5) = 4
        assert_eq!(t.enl, 4);
        assert_relative_eq!(t.cv, 2.5 / 4.0);
    }

    #[test]
    fn test_enl_clamped() {
        assert_eq!(LevelThresholds::at_level(0, 1.0, 0.4, 1.0).enl, 1);
        assert_eq!(LevelThresholds::at_level(6, 1.0, 100.0, 1.0).enl, MAX_LOOKS);
        // the default CV never overflows
        assert!(LevelThresholds::at_level(3, 1.0, 1.0, f64::MAX).cv.is_finite());
    }

    #[test]
    fn test_critical_value_factor() {
        // Gamma(1, 1) is Exp(1): quantile -ln(1 - p)
        assert_relative_eq!(
            critical_value_factor(1, 0.95).unwrap(),
            -(0.05f64).ln(),
            epsilon = 1e-6
        );
        let many_looks = critical_value_factor(200, 0.95).unwrap();
        assert!(many_looks > 1.0 && many_looks < 1.2);
    }
}
