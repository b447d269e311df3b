//! Region growing passes and minimum-area cleanup

use std::collections::BTreeSet;

use mseg_core::{Error, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use tracing::debug;

use super::config::SegmentationParams;
use super::progress::Progress;
use super::state::{NeighborScope, SegmentationState};
use crate::merger::params::EUCLIDEAN_DISTANCE_THRESHOLD;
use crate::merger::Merger;
use crate::region::RegionId;

/// Knobs of one growth call
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GrowthOptions {
    /// Final Euclidean distance threshold
    pub similarity: f64,
    /// Extra threshold increments before the full value is reached
    pub annealing_steps: usize,
    pub max_iterations: usize,
    pub mutual_best_fit: bool,
    pub grow_until_stop: bool,
    /// Let two multi-pixel regions merge
    pub consider_region_vs_region: bool,
}

impl GrowthOptions {
    pub fn from_params(params: &SegmentationParams, similarity: f64) -> Self {
        Self {
            similarity,
            annealing_steps: params.annealing_steps,
            max_iterations: params.max_iterations,
            mutual_best_fit: params.mutual_best_fit,
            grow_until_stop: params.grow_until_stop,
            consider_region_vs_region: true,
        }
    }

    pub fn with_region_vs_region(mut self, enabled: bool) -> Self {
        self.consider_region_vs_region = enabled;
        self
    }
}

impl Default for GrowthOptions {
    fn default() -> Self {
        Self::from_params(&SegmentationParams::default(), 0.0)
    }
}

impl SegmentationState {
    /// Merge neighbouring regions until no pair qualifies.
    ///
    /// The distance threshold starts at `similarity / (annealing_steps + 1)`
    /// and is raised by the same amount after every pass without merges.
    /// Growth ends once a pass at the full threshold merges nothing, or
    /// after `max_iterations` passes. The merger's threshold is set back to
    /// `similarity` on return.
    ///
    /// With `candidates`, only those regions seed merges; they may absorb
    /// any neighbour, and absorbed candidates leave the set. With `rng`,
    /// each pass visits the seeds in shuffled order.
    ///
    /// Returns the number of merges.
    pub fn grow(
        &mut self,
        merger: &mut Merger,
        options: &GrowthOptions,
        candidates: Option<&mut BTreeSet<RegionId>>,
        rng: Option<&mut StdRng>,
        progress: &dyn Progress,
    ) -> Result<usize> {
        let outcome = self.grow_annealed(merger, options, candidates, rng, progress);
        merger.set_param(EUCLIDEAN_DISTANCE_THRESHOLD, options.similarity);
        outcome
    }

    fn grow_annealed(
        &mut self,
        merger: &mut Merger,
        options: &GrowthOptions,
        mut candidates: Option<&mut BTreeSet<RegionId>>,
        mut rng: Option<&mut StdRng>,
        progress: &dyn Progress,
    ) -> Result<usize> {
        let step = options.similarity / (options.annealing_steps + 1) as f64;
        let mut threshold = step;
        merger.set_param(EUCLIDEAN_DISTANCE_THRESHOLD, threshold);

        let mut total = 0;
        let mut iteration = 0;
        let mut idle_passes = 0;

        loop {
            if progress.cancelled() {
                return Err(Error::Cancelled);
            }

            let merged = self.merge_pass(merger, options, candidates.as_deref_mut(), rng.as_deref_mut())?;
            total += merged;
            iteration += 1;
            debug!(
                "Growth pass {}: {} merges, threshold {:.4}, {} regions",
                iteration,
                merged,
                threshold,
                self.regions.len()
            );

            if iteration >= options.max_iterations {
                break;
            }
            if merged == 0 {
                idle_passes += 1;
                if idle_passes > options.annealing_steps {
                    break;
                }
                threshold += step;
                merger.set_param(EUCLIDEAN_DISTANCE_THRESHOLD, threshold);
            }
        }

        Ok(total)
    }

    /// One scan over the seeds
    fn merge_pass(
        &mut self,
        merger: &Merger,
        options: &GrowthOptions,
        mut candidates: Option<&mut BTreeSet<RegionId>>,
        rng: Option<&mut StdRng>,
    ) -> Result<usize> {
        let mut order: Vec<RegionId> = match candidates.as_deref() {
            Some(set) => set.iter().copied().collect(),
            None => self.regions.ids(),
        };
        if let Some(rng) = rng {
            order.shuffle(rng);
        }

        let mut merged = 0;
        for id in order {
            while self.regions.contains(id) {
                let Some(partner) = self.best_partner(merger, id, options)? else {
                    break;
                };
                self.merge_regions(merger, id, partner)?;
                if let Some(set) = candidates.as_deref_mut() {
                    set.remove(&partner);
                }
                merged += 1;
                if !options.grow_until_stop {
                    break;
                }
            }
        }
        Ok(merged)
    }

    /// Closest compatible neighbour, subject to mutual best fit
    fn best_partner(
        &self,
        merger: &Merger,
        id: RegionId,
        options: &GrowthOptions,
    ) -> Result<Option<RegionId>> {
        let scope = NeighborScope::Compatible {
            region_vs_region: options.consider_region_vs_region,
        };
        let Some(closest) = self.closest_region(merger, id, scope)? else {
            return Ok(None);
        };
        if options.mutual_best_fit && self.closest_region(merger, closest, scope)? != Some(id) {
            return Ok(None);
        }
        Ok(Some(closest))
    }

    /// One sweep merging every region smaller than `min_area` into its
    /// closest neighbour, compatible or not. Returns the number of merges.
    pub fn merge_small_regions(&mut self, merger: &Merger, min_area: usize) -> Result<usize> {
        let mut merged = 0;
        for id in self.regions.ids() {
            if !self.regions.contains(id) || self.regions.get(id)?.size >= min_area {
                continue;
            }
            if let Some(target) = self.closest_region(merger, id, NeighborScope::All)? {
                self.merge_regions(merger, target, id)?;
                merged += 1;
            }
        }
        Ok(merged)
    }

    /// Repeat [`SegmentationState::merge_small_regions`] until a sweep merges
    /// nothing. No-op when `min_area <= 1`.
    pub fn process_small_regions(&mut self, merger: &Merger, min_area: usize) -> Result<usize> {
        if min_area <= 1 {
            return Ok(0);
        }
        let mut total = 0;
        loop {
            let merged = self.merge_small_regions(merger, min_area)?;
            if merged == 0 {
                break;
            }
            total += merged;
        }
        debug!("Minimum area cleanup merged {} regions", total);
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merger::{EuclideanMerger, MergeStrategy};
    use crate::segmenter::progress::{NoProgress, ProgressCounter};
    use mseg_core::Image;
    use rand::SeedableRng;

    fn euclidean() -> Merger {
        Merger::new(MergeStrategy::Euclidean(EuclideanMerger))
    }

    fn options(similarity: f64) -> GrowthOptions {
        GrowthOptions {
            similarity,
            ..GrowthOptions::default()
        }
    }

    fn halves() -> Image {
        let values = (0..16).map(|i| if i % 4 < 2 { 10.0 } else { 200.0 }).collect();
        Image::from_vec(values, 4, 4).unwrap()
    }

    #[test]
    fn test_grow_two_halves() {
        let img = halves();
        let mut state = SegmentationState::initialize(&img).unwrap();
        let mut m = euclidean();
        let merges = state.grow(&mut m, &options(5.0), None, None, &NoProgress).unwrap();
        assert_eq!(merges, 14);
        assert_eq!(state.n_regions(), 2);
        state.check_consistency().unwrap();
        assert_eq!(m.param(EUCLIDEAN_DISTANCE_THRESHOLD).unwrap(), 5.0);
    }

    #[test]
    fn test_random_growth_is_reproducible() {
        let img = halves();
        let run = |seed| {
            let mut state = SegmentationState::initialize(&img).unwrap();
            let mut rng = StdRng::seed_from_u64(seed);
            state
                .grow(&mut euclidean(), &options(5.0), None, Some(&mut rng), &NoProgress)
                .unwrap();
            state
        };
        let a = run(7);
        let b = run(7);
        assert_eq!(a.n_regions(), 2);
        assert_eq!(a.labels().raster().data(), b.labels().raster().data());
    }

    #[test]
    fn test_annealing_restores_threshold() {
        let img = Image::from_vec(vec![0.0, 4.0, 8.0], 1, 3).unwrap();
        let mut state = SegmentationState::initialize(&img).unwrap();
        let mut m = euclidean();
        let opts = GrowthOptions {
            annealing_steps: 3,
            ..options(4.0)
        };
        state.grow(&mut m, &opts, None, None, &NoProgress).unwrap();
        // 0 and 4 merge at threshold 4, then the mean 2 is 6 away from 8
        assert_eq!(state.n_regions(), 2);
        assert_eq!(m.param(EUCLIDEAN_DISTANCE_THRESHOLD).unwrap(), 4.0);
    }

    #[test]
    fn test_region_vs_region_gate() {
        let img = Image::from_vec(vec![1.0, 1.0, 1.0, 1.0], 1, 4).unwrap();
        let mut state = SegmentationState::initialize(&img).unwrap();
        let m = euclidean();
        state.merge_regions(&m, 0, 1).unwrap();
        state.merge_regions(&m, 2, 3).unwrap();

        let mut m = euclidean();
        let gated = options(1.0).with_region_vs_region(false);
        assert_eq!(state.grow(&mut m, &gated, None, None, &NoProgress).unwrap(), 0);
        assert_eq!(state.grow(&mut m, &options(1.0), None, None, &NoProgress).unwrap(), 1);
    }

    #[test]
    fn test_candidates_seed_growth() {
        let img = Image::from_vec(vec![1.0, 1.0, 1.0, 1.0], 1, 4).unwrap();
        let mut state = SegmentationState::initialize(&img).unwrap();
        let mut seeds: BTreeSet<RegionId> = [3].into_iter().collect();
        let opts = GrowthOptions {
            mutual_best_fit: false,
            ..options(1.0)
        };
        state
            .grow(&mut euclidean(), &opts, Some(&mut seeds), None, &NoProgress)
            .unwrap();
        // seed 3 absorbs its way left through every non-seed
        assert_eq!(state.n_regions(), 1);
        assert!(state.regions().contains(3));
        assert_eq!(seeds.into_iter().collect::<Vec<_>>(), vec![3]);
    }

    #[test]
    fn test_cancelled_growth() {
        let img = halves();
        let mut state = SegmentationState::initialize(&img).unwrap();
        let progress = ProgressCounter::new();
        progress.cancel();
        let mut m = euclidean();
        let err = state.grow(&mut m, &options(5.0), None, None, &progress).unwrap_err();
        assert!(matches!(err, Error::Cancelled));
        assert_eq!(m.param(EUCLIDEAN_DISTANCE_THRESHOLD).unwrap(), 5.0);
    }

    #[test]
    fn test_small_region_cleanup() {
        // 3 pixels of 12 next to 50 pixels of 10
        let values = (0..53).map(|i| if i < 3 { 12.0 } else { 10.0 }).collect();
        let img = Image::from_vec(values, 1, 53).unwrap();
        let mut state = SegmentationState::initialize(&img).unwrap();
        let mut m = euclidean();
        state.grow(&mut m, &options(1.0), None, None, &NoProgress).unwrap();
        assert_eq!(state.n_regions(), 2);

        let merged = state.process_small_regions(&m, 10).unwrap();
        assert_eq!(merged, 1);
        assert_eq!(state.n_regions(), 1);
        let r = state.regions().values().next().unwrap();
        assert_eq!(r.size, 53);
        assert!(r.id >= 3);

        // idempotent
        assert_eq!(state.process_small_regions(&m, 10).unwrap(), 0);
        state.check_consistency().unwrap();
    }

    #[test]
    fn test_cleanup_disabled_for_unit_area() {
        let img = halves();
        let mut state = SegmentationState::initialize(&img).unwrap();
        assert_eq!(state.process_small_regions(&euclidean(), 1).unwrap(), 0);
        assert_eq!(state.n_regions(), 16);
    }
}
