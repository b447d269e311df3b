//! Segmentation configuration and its eager validation

use std::fmt;
use std::path::PathBuf;

use mseg_core::{Error, Result};

use crate::cv_table;

/// Imaging modality
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageType {
    Radar,
    Optical,
}

/// Image model representation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageModel {
    Cartoon,
    Texture,
}

/// Radiometric format of radar input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadarFormat {
    Amplitude,
    Intensity,
    Db,
}

impl fmt::Display for ImageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ImageType::Radar => "radar",
            ImageType::Optical => "optical",
        })
    }
}

impl fmt::Display for ImageModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ImageModel::Cartoon => "cartoon",
            ImageModel::Texture => "texture",
        })
    }
}

impl fmt::Display for RadarFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RadarFormat::Amplitude => "amplitude",
            RadarFormat::Intensity => "intensity",
            RadarFormat::Db => "dB",
        })
    }
}

/// Parameters of one segmentation run.
///
/// Which of `enl`, `confidence_level` and `cv` are required depends on the
/// image type and model:
///
/// - radar + cartoon: `enl` (> 0) and `confidence_level`
/// - radar + texture: `cv`
/// - optical: `cv` and `confidence_level`
///
/// The default is an optical cartoon configuration with a CV threshold
/// that never triggers a split.
#[derive(Debug, Clone)]
pub struct SegmentationParams {
    /// Input bands to segment on
    pub bands: Vec<usize>,
    pub image_type: ImageType,
    pub image_model: ImageModel,
    /// Only read for radar input
    pub radar_format: RadarFormat,
    /// Requested pyramid levels above full resolution (clamped to what the image allows)
    pub levels: usize,
    /// Merge distance threshold. In dB for radar input.
    pub similarity: f64,
    /// Regions smaller than this are merged away after the finest level
    pub min_area: usize,
    /// Equivalent number of looks
    pub enl: Option<f64>,
    pub confidence_level: Option<f64>,
    /// Coefficient-of-variation homogeneity threshold
    pub cv: Option<f64>,
    /// Threshold annealing steps (default: 0)
    pub annealing_steps: usize,
    /// Growth scan cap per call (default: 100)
    pub max_iterations: usize,
    pub mutual_best_fit: bool,
    /// Keep merging the same region before moving on
    pub grow_until_stop: bool,
    /// Visit regions in shuffled order
    pub use_random_seeds: bool,
    pub seed: u64,
    /// Require every band to agree (otherwise one band suffices)
    pub strict_mode: bool,
    /// Also split heterogeneous regions at full resolution
    pub split_last_level: bool,
    /// Base number of pixels per region used for variance estimation.
    /// The cap is multiplied by 4 each time a level's thresholds are set,
    /// the coarsest level included, so the first recompute (one level below
    /// the coarsest) reads up to 16 times this value. `None` means every pixel.
    pub variance_sample_cap: Option<usize>,
    /// Directory holding the CV tables
    pub tables_dir: PathBuf,
    pub output_pyramid: bool,
    pub notify_intermediate_results: bool,
}

impl Default for SegmentationParams {
    fn default() -> Self {
        Self {
            bands: vec![0],
            image_type: ImageType::Optical,
            image_model: ImageModel::Cartoon,
            radar_format: RadarFormat::Intensity,
            levels: 0,
            similarity: 0.0,
            min_area: 1,
            enl: None,
            confidence_level: Some(0.95),
            cv: Some(f64::MAX),
            annealing_steps: 0,
            max_iterations: 100,
            mutual_best_fit: true,
            grow_until_stop: true,
            use_random_seeds: true,
            seed: 0,
            strict_mode: true,
            split_last_level: false,
            variance_sample_cap: None,
            tables_dir: PathBuf::from("./tables"),
            output_pyramid: false,
            notify_intermediate_results: false,
        }
    }
}

impl SegmentationParams {
    /// Radar cartoon configuration
    pub fn radar(format: RadarFormat, similarity_db: f64, enl: f64, confidence_level: f64) -> Self {
        Self {
            image_type: ImageType::Radar,
            radar_format: format,
            similarity: similarity_db,
            enl: Some(enl),
            confidence_level: Some(confidence_level),
            cv: None,
            ..Self::default()
        }
    }

    /// Optical cartoon configuration
    pub fn optical(similarity: f64, cv: f64, confidence_level: f64) -> Self {
        Self {
            similarity,
            cv: Some(cv),
            confidence_level: Some(confidence_level),
            ..Self::default()
        }
    }

    pub fn is_radar_cartoon(&self) -> bool {
        self.image_type == ImageType::Radar && self.image_model == ImageModel::Cartoon
    }

    pub fn is_optical_cartoon(&self) -> bool {
        self.image_type == ImageType::Optical && self.image_model == ImageModel::Cartoon
    }

    /// Check every option for the selected image type and model.
    pub fn validate(&self) -> Result<()> {
        if self.bands.is_empty() {
            return Err(invalid("bands", "[]", "at least one band is required"));
        }
        if !self.similarity.is_finite() || self.similarity < 0.0 {
            return Err(invalid("similarity", self.similarity, "must be finite and >= 0"));
        }
        if self.max_iterations == 0 {
            return Err(invalid("max_iterations", 0, "must be > 0"));
        }

        let radar = self.image_type == ImageType::Radar;

        if radar && self.image_model == ImageModel::Cartoon {
            let enl = self
                .enl
                .ok_or_else(|| Error::MissingParameter("enl".into()))?;
            if !(enl > 0.0 && enl.is_finite()) {
                return Err(invalid("enl", enl, "must be greater than 0"));
            }
            let confidence = self.required_confidence()?;
            // only tabulated levels have a CV table
            cv_table::table_file_name(confidence)?;
        }

        if (radar && self.image_model == ImageModel::Texture) || !radar {
            let cv = self.cv.ok_or_else(|| Error::MissingParameter("cv".into()))?;
            if cv.is_nan() || cv < 0.0 {
                return Err(invalid("cv", cv, "must be >= 0"));
            }
            if !radar {
                self.required_confidence()?;
            }
        }

        if self.image_model == ImageModel::Texture {
            return Err(Error::Unsupported(format!(
                "the texture model has no {} segmentation strategy",
                self.image_type
            )));
        }
        if radar && self.radar_format == RadarFormat::Db {
            return Err(Error::Unsupported(
                "dB radar input must be converted to intensity or amplitude first".into(),
            ));
        }

        Ok(())
    }

    fn required_confidence(&self) -> Result<f64> {
        let c = self
            .confidence_level
            .ok_or_else(|| Error::MissingParameter("confidence_level".into()))?;
        if !(c > 0.0 && c <= 1.0) {
            return Err(invalid("confidence_level", c, "must be in (0, 1]"));
        }
        Ok(c)
    }
}

fn invalid(name: &'static str, value: impl ToString, reason: &str) -> Error {
    Error::InvalidParameter {
        name,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        SegmentationParams::default().validate().unwrap();
        SegmentationParams::optical(10.0, 0.5, 0.99).validate().unwrap();
        SegmentationParams::radar(RadarFormat::Amplitude, 1.0, 4.0, 0.95)
            .validate()
            .unwrap();
    }

    #[test]
    fn test_radar_requires_enl_and_tabulated_confidence() {
        let mut p = SegmentationParams::radar(RadarFormat::Intensity, 1.0, 4.0, 0.95);
        p.enl = None;
        assert!(matches!(p.validate(), Err(Error::MissingParameter(_))));
        p.enl = Some(0.0);
        assert!(matches!(p.validate(), Err(Error::InvalidParameter { name: "enl", .. })));
        p.enl = Some(3.0);
        p.confidence_level = Some(0.97);
        assert!(matches!(
            p.validate(),
            Err(Error::InvalidParameter { name: "confidence_level", .. })
        ));
        p.confidence_level = Some(1.0);
        p.validate().unwrap();
    }

    #[test]
    fn test_optical_requires_cv_and_confidence() {
        let mut p = SegmentationParams::optical(1.0, 0.2, 0.9);
        p.cv = None;
        assert!(matches!(p.validate(), Err(Error::MissingParameter(_))));
        p.cv = Some(0.2);
        p.confidence_level = Some(1.5);
        assert!(p.validate().is_err());
    }

    #[test]
    fn test_unsupported_paths() {
        let mut p = SegmentationParams::radar(RadarFormat::Db, 1.0, 4.0, 0.95);
        assert!(matches!(p.validate(), Err(Error::Unsupported(_))));

        p = SegmentationParams::default();
        p.image_model = ImageModel::Texture;
        assert!(matches!(p.validate(), Err(Error::Unsupported(_))));
    }

    #[test]
    fn test_bands_and_similarity() {
        let mut p = SegmentationParams::default();
        p.bands.clear();
        assert!(p.validate().is_err());
        p.bands = vec![0];
        p.similarity = f64::NAN;
        assert!(p.validate().is_err());
    }
}
