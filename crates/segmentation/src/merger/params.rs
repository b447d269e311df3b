//! Named numeric parameters shared by every band-wise merger

use std::collections::BTreeMap;

use mseg_core::{Error, Result};

pub const EUCLIDEAN_DISTANCE_THRESHOLD: &str = "euclidean_distance_threshold";
pub const CV_THRESHOLD: &str = "cv_threshold";
pub const CONFIDENCE_LEVEL: &str = "confidence_level";
pub const VCRITIC_FACTOR: &str = "vcritic_factor";
pub const ENL: &str = "enl";

/// Key of the global image variance of `band`
pub fn image_variance_key(band: usize) -> String {
    format!("image_variance_{}", band)
}

/// Flat name → value map.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeParams {
    values: BTreeMap<String, f64>,
}

impl MergeParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: impl Into<String>, value: f64) {
        self.values.insert(name.into(), value);
    }

    /// Value of `name`, or [`Error::MissingParameter`]
    pub fn get(&self, name: &str) -> Result<f64> {
        self.values
            .get(name)
            .copied()
            .ok_or_else(|| Error::MissingParameter(name.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(k, &v)| (k.as_str(), v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_missing() {
        let mut p = MergeParams::new();
        p.set(CV_THRESHOLD, 0.3);
        p.set(image_variance_key(2), 9.0);
        assert_eq!(p.get(CV_THRESHOLD).unwrap(), 0.3);
        assert_eq!(p.get("image_variance_2").unwrap(), 9.0);
        assert!(matches!(p.get(ENL), Err(Error::MissingParameter(_))));
        p.set(CV_THRESHOLD, 0.5);
        assert_eq!(p.iter().count(), 2);
    }
}
