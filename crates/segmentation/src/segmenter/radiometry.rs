//! Radar radiometry helpers

use mseg_core::Image;

/// Square every sample, turning amplitude into intensity
pub fn amplitude_to_intensity(image: &mut Image) {
    image.map_in_place(|v| v * v);
}

/// Intensity distance equivalent to a ratio of `similarity_db` decibels
/// around `reference_mean`
pub fn db_to_intensity_similarity(similarity_db: f64, reference_mean: f64) -> f64 {
    reference_mean * (10f64.powf(similarity_db / 10.0) - 1.0)
}
