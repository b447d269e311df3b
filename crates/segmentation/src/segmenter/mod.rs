//! Multi-resolution segmentation engine
//!
//! [`MultiSeg`] drives a run: it builds the pyramid, grows regions at the
//! coarsest level, then walks down to full resolution. At every finer level
//! regions are carried over, their borders refined, heterogeneous ones split
//! and the growth repeated. A minimum-area cleanup closes the run.

mod borders;
pub mod config;
mod growing;
pub mod outputter;
pub mod progress;
pub mod radiometry;
pub mod result;
mod split;
mod state;
mod statistics;
pub mod thresholds;

pub use config::{ImageModel, ImageType, RadarFormat, SegmentationParams};
pub use growing::GrowthOptions;
pub use outputter::{LevelSummary, Outputter};
pub use progress::{NoProgress, Progress, ProgressCounter};
pub use result::Segmentation;
pub use state::{NeighborScope, SegmentationState};
pub use thresholds::LevelThresholds;

use std::collections::BTreeSet;
use std::sync::Arc;

use mseg_core::{Error, GlobalStatistics, Image, PixelGrid, Result, StatisticsProvider};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info, warn};

use crate::cv_table::CvTable;
use crate::merger::params::{
    image_variance_key, CONFIDENCE_LEVEL, CV_THRESHOLD, ENL, EUCLIDEAN_DISTANCE_THRESHOLD,
    VCRITIC_FACTOR,
};
use crate::merger::{
    EuclideanMerger, MergeStrategy, Merger, OpticalCartoonMerger, RadarCartoonMerger,
};
use crate::pyramid::{compute_max_levels, Pyramid};

/// Smallest side, in pixels, the coarsest pyramid level may have
const MIN_LEVEL_SIZE: usize = 2;

/// Confidence used in place of 1.0, which has no finite critical value
const MAX_CONFIDENCE: f64 = 0.99999;

/// Builds the strategy a run starts with
pub type StrategyFactory = Box<dyn Fn() -> MergeStrategy + Send + Sync>;

/// Segmentation engine configured once and reusable across images.
pub struct MultiSeg {
    params: SegmentationParams,
    progress: Arc<dyn Progress>,
    strategy: Option<StrategyFactory>,
}

impl std::fmt::Debug for MultiSeg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MultiSeg")
            .field("params", &self.params)
            .field("custom_strategy", &self.strategy.is_some())
            .finish()
    }
}

/// Everything a run derives from the parameters and the input image
struct RunSetup {
    similarity: f64,
    enl: f64,
    cv: f64,
    confidence: Option<f64>,
    levels: usize,
    cv_table: CvTable,
}

impl MultiSeg {
    /// Validate `params` and build an engine
    pub fn new(params: SegmentationParams) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            params,
            progress: Arc::new(NoProgress),
            strategy: None,
        })
    }

    pub fn params(&self) -> &SegmentationParams {
        &self.params
    }

    pub fn with_progress(mut self, progress: Arc<dyn Progress>) -> Self {
        self.progress = progress;
        self
    }

    /// Grow with a custom strategy instead of the one implied by the image
    /// type and model. Cleanup still uses the Euclidean strategy.
    pub fn with_strategy<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> MergeStrategy + Send + Sync + 'static,
    {
        self.strategy = Some(Box::new(factory));
        self
    }

    /// Segment `image` without intermediate output
    pub fn run(&self, image: &Image) -> Result<Segmentation> {
        self.run_with_outputter(image, &mut LevelSummary::default())
    }

    /// Segment `image`, reporting the pyramid and level results to `outputter`
    pub fn run_with_outputter(
        &self,
        image: &Image,
        outputter: &mut dyn Outputter,
    ) -> Result<Segmentation> {
        let (work, setup) = self.prepare(image)?;
        let params = &self.params;

        let mut merger = Merger::new(self.initial_strategy()).with_strict_mode(params.strict_mode);
        if let Some(confidence) = setup.confidence {
            merger.set_param(CONFIDENCE_LEVEL, confidence);
        }
        merger.set_param(EUCLIDEAN_DISTANCE_THRESHOLD, setup.similarity);
        merger.set_param(CV_THRESHOLD, setup.cv);

        let bands: Vec<usize> = (0..work.n_bands()).collect();
        let mut pyramid = Pyramid::new(&work, setup.levels, &bands)?;
        drop(work);
        if params.output_pyramid {
            outputter.on_pyramid_built(&pyramid)?;
        }

        let coarsest = pyramid.coarsest();
        self.progress.set_steps(coarsest as u64 + 2);
        let mut rng = params
            .use_random_seeds
            .then(|| StdRng::seed_from_u64(params.seed));
        let mut sample_cap = params.variance_sample_cap;

        info!(
            "Segmenting {} levels with the {} strategy",
            coarsest + 1,
            merger.strategy().name()
        );

        let mut state = SegmentationState::initialize(pyramid.level(coarsest)?)?;
        let thresholds =
            self.update_thresholds(&mut merger, &pyramid, coarsest, &setup, &mut sample_cap)?;
        let options = GrowthOptions::from_params(params, thresholds.similarity);
        state.grow(&mut merger, &options, None, rng.as_mut(), self.progress.as_ref())?;
        if coarsest > 0 && params.notify_intermediate_results {
            outputter.on_level_result(&state.labels, &state.regions, coarsest)?;
        }
        info!("Level {}: {} regions", coarsest, state.n_regions());
        self.progress.advance(1);

        for level in (0..coarsest).rev() {
            if self.progress.cancelled() {
                return Err(Error::Cancelled);
            }
            pyramid.release_level(level + 1)?;
            let level_image = pyramid.level(level)?;
            state.resize(level_image.rows(), level_image.cols())?;

            let thresholds =
                self.update_thresholds(&mut merger, &pyramid, level, &setup, &mut sample_cap)?;
            let options = GrowthOptions::from_params(params, thresholds.similarity);

            state.update_statistics(level_image, sample_cap)?;
            state.adjust_borders(level_image, &merger)?;
            state.update_statistics(level_image, sample_cap)?;

            if level != 0 || params.split_last_level {
                let looks = thresholds.enl;
                let lookup = params.is_radar_cartoon().then_some((&setup.cv_table, looks));
                let mut seeds: BTreeSet<_> = state.split_regions(level_image, &mut merger, lookup)?;
                let seed_options = options.with_region_vs_region(false);
                state.grow(
                    &mut merger,
                    &seed_options,
                    Some(&mut seeds),
                    rng.as_mut(),
                    self.progress.as_ref(),
                )?;
            }
            state.grow(&mut merger, &options, None, rng.as_mut(), self.progress.as_ref())?;
            state.update_statistics(level_image, sample_cap)?;

            if level != 0 && params.notify_intermediate_results {
                outputter.on_level_result(&state.labels, &state.regions, level)?;
            }
            info!("Level {}: {} regions", level, state.n_regions());
            self.progress.advance(1);
        }

        // cleanup ignores predicates, so any strategy gives the same result
        merger.set_strategy(MergeStrategy::Euclidean(EuclideanMerger));
        let cleaned = state.process_small_regions(&merger, params.min_area)?;
        let base = pyramid.level(0)?;
        state.update_statistics(base, sample_cap)?;
        debug!("Cleanup removed {} regions below {} pixels", cleaned, params.min_area);

        outputter.on_level_result(&state.labels, &state.regions, 0)?;
        self.progress.advance(1);
        info!("Segmentation finished with {} regions", state.n_regions());

        let (labels, regions) = state.into_parts();
        Ok(Segmentation::new(labels, regions))
    }

    /// Select bands, convert radar input and resolve the run-wide settings.
    ///
    /// Returns the working image (selected bands, intensity for radar).
    fn prepare(&self, image: &Image) -> Result<(Image, RunSetup)> {
        let params = &self.params;
        let work = self.working_image(image)?;

        let mut similarity = params.similarity;
        if params.image_type == ImageType::Radar {
            let bands: Vec<usize> = (0..work.n_bands()).collect();
            let stats = GlobalStatistics.mean_and_variance(&work, &bands);
            let reference = stats.mean.iter().copied().fold(f64::INFINITY, f64::min);
            similarity = radiometry::db_to_intensity_similarity(params.similarity, reference);
            debug!("Similarity {} dB is {} in intensity", params.similarity, similarity);
        }

        let (rows, cols) = work.dimensions();
        let max_levels = compute_max_levels(rows, cols, MIN_LEVEL_SIZE);
        let levels = if params.levels > max_levels {
            warn!(
                "Requested {} levels but a {}x{} image allows {}",
                params.levels, rows, cols, max_levels
            );
            max_levels
        } else {
            params.levels
        };

        let mut confidence = params.confidence_level;
        let mut cv_table = CvTable::empty();
        if params.is_radar_cartoon() {
            if confidence == Some(1.0) {
                warn!("Confidence level 1.0 replaced by {}", MAX_CONFIDENCE);
                confidence = Some(MAX_CONFIDENCE);
            }
            if let Some(c) = confidence {
                cv_table = CvTable::load(c, &params.tables_dir)?;
            }
            let enl = params.enl.unwrap_or(1.0);
            let needed = LevelThresholds::at_level(levels, similarity, enl, f64::MAX).enl;
            if !cv_table.is_empty() && cv_table.max_looks() < needed {
                warn!(
                    "CV table has {} rows but up to {} looks may be looked up",
                    cv_table.max_looks(),
                    needed
                );
            }
        }

        let setup = RunSetup {
            similarity,
            enl: params.enl.unwrap_or(1.0),
            cv: params.cv.unwrap_or(f64::MAX),
            confidence,
            levels,
            cv_table,
        };
        Ok((work, setup))
    }

    /// The selected bands of `image`, converted to intensity for amplitude
    /// radar input. Region statistics of a run refer to this image.
    pub fn working_image(&self, image: &Image) -> Result<Image> {
        let params = &self.params;
        if let Some(&band) = params.bands.iter().find(|&&b| b >= image.n_bands()) {
            return Err(Error::BandOutOfRange {
                band,
                band_count: image.n_bands(),
            });
        }
        let mut work = image.select_bands(&params.bands)?;
        if params.image_type == ImageType::Radar && params.radar_format == RadarFormat::Amplitude {
            radiometry::amplitude_to_intensity(&mut work);
        }
        Ok(work)
    }

    fn initial_strategy(&self) -> MergeStrategy {
        if let Some(factory) = &self.strategy {
            return factory();
        }
        if self.params.is_radar_cartoon() {
            MergeStrategy::RadarCartoon(RadarCartoonMerger)
        } else if self.params.is_optical_cartoon() {
            MergeStrategy::OpticalCartoon(OpticalCartoonMerger)
        } else {
            MergeStrategy::Euclidean(EuclideanMerger)
        }
    }

    /// Scale thresholds to `level` and push them into the merger
    fn update_thresholds(
        &self,
        merger: &mut Merger,
        pyramid: &Pyramid,
        level: usize,
        setup: &RunSetup,
        sample_cap: &mut Option<usize>,
    ) -> Result<LevelThresholds> {
        let t = LevelThresholds::at_level(level, setup.similarity, setup.enl, setup.cv);
        merger.set_param(EUCLIDEAN_DISTANCE_THRESHOLD, t.similarity);
        merger.set_param(CV_THRESHOLD, t.cv);
        merger.set_param(ENL, t.enl as f64);
        *sample_cap = sample_cap.map(|cap| cap.saturating_mul(4));

        if self.params.is_radar_cartoon() {
            if let Some(confidence) = setup.confidence {
                let factor = thresholds::critical_value_factor(t.enl, confidence)?;
                merger.set_param(VCRITIC_FACTOR, factor);
            }
        }
        if matches!(
            merger.strategy(),
            MergeStrategy::OpticalCartoon(_) | MergeStrategy::Composite(_)
        ) {
            let stats = pyramid.build_stats(level)?;
            for (band, variance) in stats.variance.iter().enumerate() {
                merger.set_param(image_variance_key(band), *variance);
            }
        }

        debug!(
            "Level {} thresholds: similarity {:.4}, enl {}, cv {:.4}, sample cap {:?}",
            level, t.similarity, t.enl, t.cv, sample_cap
        );
        for (name, value) in merger.params().iter() {
            debug!("  {} = {}", name, value);
        }
        Ok(t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mseg_core::Raster;

    fn halves(rows: usize, cols: usize) -> Image {
        let values = (0..rows * cols)
            .map(|i| if i % cols < cols / 2 { 10.0 } else { 200.0 })
            .collect();
        Image::from_vec(values, rows, cols).unwrap()
    }

    fn euclidean_engine(params: SegmentationParams) -> MultiSeg {
        MultiSeg::new(params)
            .unwrap()
            .with_strategy(|| MergeStrategy::Euclidean(EuclideanMerger))
    }

    #[test]
    fn test_invalid_params_rejected_before_run() {
        let mut p = SegmentationParams::default();
        p.bands.clear();
        assert!(MultiSeg::new(p).is_err());
    }

    #[test]
    fn test_band_out_of_range() {
        let p = SegmentationParams {
            bands: vec![2],
            ..SegmentationParams::default()
        };
        let err = MultiSeg::new(p).unwrap().run(&halves(4, 4)).unwrap_err();
        assert!(matches!(err, Error::BandOutOfRange { band: 2, .. }));
    }

    #[test]
    fn test_multilevel_halves() {
        let p = SegmentationParams {
            similarity: 5.0,
            levels: 2,
            ..SegmentationParams::default()
        };
        let mut summary = LevelSummary::default();
        let engine = MultiSeg::new(SegmentationParams {
            notify_intermediate_results: true,
            output_pyramid: true,
            ..p
        })
        .unwrap()
        .with_strategy(|| MergeStrategy::Euclidean(EuclideanMerger));
        let seg = engine.run_with_outputter(&halves(8, 8), &mut summary).unwrap();

        assert_eq!(seg.n_regions(), 2);
        assert_eq!(summary.pyramid_levels, Some(3));
        let levels: Vec<usize> = summary.levels.iter().map(|&(l, _)| l).collect();
        assert_eq!(levels, vec![2, 1, 0]);
        assert_eq!(seg.regions().total_pixels(), 64);
    }

    #[test]
    fn test_level_count_clamped() {
        let p = SegmentationParams {
            similarity: 5.0,
            levels: 9,
            output_pyramid: true,
            ..SegmentationParams::default()
        };
        let mut summary = LevelSummary::default();
        euclidean_engine(p)
            .run_with_outputter(&halves(4, 4), &mut summary)
            .unwrap();
        assert_eq!(summary.pyramid_levels, Some(2));
    }

    #[test]
    fn test_cancelled_run() {
        let progress = Arc::new(ProgressCounter::new());
        progress.cancel();
        let engine = euclidean_engine(SegmentationParams::default()).with_progress(progress);
        assert!(matches!(engine.run(&halves(4, 4)), Err(Error::Cancelled)));
    }

    #[test]
    fn test_radar_amplitude_run() {
        let dir = tempfile::tempdir().unwrap();
        let mut p = SegmentationParams::radar(RadarFormat::Amplitude, 1.0, 4.0, 0.99999);
        p.tables_dir = dir.path().to_path_buf();
        p.levels = 1;
        let mut values = vec![3.0; 32];
        values.extend(vec![10.0; 32]);
        let img = Image::from_bands(vec![Raster::from_vec(values, 8, 8).unwrap()]).unwrap();

        let seg = MultiSeg::new(p).unwrap().run(&img).unwrap();
        assert_eq!(seg.regions().total_pixels(), 64);
        assert!(seg.n_regions() < 64);
        // region means are intensities: 32 * 9 + 32 * 100 over 64 pixels
        let weighted: f64 = seg
            .regions()
            .values()
            .map(|r| r.mean[0] * r.size as f64)
            .sum();
        assert!((weighted / 64.0 - 54.5).abs() < 1e-9);
    }
}
