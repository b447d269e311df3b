//! Region table and label grid bundled as one unit of engine state

use mseg_core::{Error, Image, PixelGrid, Result, Side};

use crate::label_grid::LabelGrid;
use crate::merger::Merger;
use crate::region::{Region, RegionId};
use crate::region_table::RegionTable;

/// Which neighbours compete when looking for the closest region
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NeighborScope {
    /// Every neighbour, no predicate
    All,
    /// Neighbours passing the merge predicate. With `region_vs_region`
    /// unset, pairs of two multi-pixel regions are skipped.
    Compatible { region_vs_region: bool },
}

/// Labels and regions of one segmentation in progress.
///
/// Every labelled cell belongs to a live region, and every live region's
/// cells lie inside its bounding box. Cells without readable data stay
/// [`LabelGrid::DUMMY`].
#[derive(Debug, Clone)]
pub struct SegmentationState {
    pub(crate) regions: RegionTable,
    pub(crate) labels: LabelGrid,
}

impl SegmentationState {
    /// One region per readable pixel, linked to its top and left neighbours.
    ///
    /// The region of pixel `(row, col)` gets id `row * cols + col`, so ids of
    /// no-data pixels are simply never issued.
    pub fn initialize(image: &Image) -> Result<Self> {
        let (rows, cols) = image.shape();
        let mut labels = LabelGrid::new(rows, cols);
        let mut regions = RegionTable::new();

        for row in 0..rows {
            for col in 0..cols {
                let Some(pixel) = read_pixel(image, row, col) else {
                    continue;
                };
                let id = (row * cols + col) as RegionId;
                regions.insert(Region::from_pixel(id, row, col, pixel))?;
                labels.set(row, col, id)?;

                for side in [Side::Top, Side::Left] {
                    let neighbor = side
                        .step(row, col, rows, cols)
                        .and_then(|(r, c)| labels.get(r, c))
                        .filter(|&n| n != LabelGrid::DUMMY);
                    if let Some(n) = neighbor {
                        regions.link(id, n)?;
                    }
                }
            }
        }

        Ok(Self { regions, labels })
    }

    pub fn from_parts(labels: LabelGrid, regions: RegionTable) -> Self {
        Self { regions, labels }
    }

    pub fn into_parts(self) -> (LabelGrid, RegionTable) {
        (self.labels, self.regions)
    }

    pub fn regions(&self) -> &RegionTable {
        &self.regions
    }

    pub fn labels(&self) -> &LabelGrid {
        &self.labels
    }

    pub fn n_regions(&self) -> usize {
        self.regions.len()
    }

    /// Carry labels and bounding boxes over to the next finer level
    pub fn resize(&mut self, rows: usize, cols: usize) -> Result<()> {
        self.labels.upsample(rows, cols)?;
        for region in self.regions.values_mut() {
            region.bbox = region.bbox.upscale(rows, cols);
        }
        Ok(())
    }

    /// Fold `absorbed` into `survivor`: statistics, links and pixels.
    pub fn merge_regions(
        &mut self,
        merger: &Merger,
        survivor: RegionId,
        absorbed: RegionId,
    ) -> Result<()> {
        if survivor == absorbed {
            return Err(Error::Algorithm(format!("region {} cannot absorb itself", survivor)));
        }
        if !self.regions.contains(survivor) {
            return Err(Error::RegionNotFound(survivor));
        }

        let partner = self.regions.take(absorbed)?;
        merger.merge(self.regions.get_mut(survivor)?, &partner);
        self.regions.transfer_links(&partner, survivor)?;
        self.labels.relabel(&partner.bbox, absorbed, survivor);
        Ok(())
    }

    /// Neighbour of `id` with the smallest squared mean distance.
    ///
    /// Neighbours are scanned in ascending id order and the first one wins
    /// ties.
    pub fn closest_region(
        &self,
        merger: &Merger,
        id: RegionId,
        scope: NeighborScope,
    ) -> Result<Option<RegionId>> {
        let region = self.regions.get(id)?;
        let mut best: Option<(RegionId, f64)> = None;

        for &n in &region.neighbors {
            let other = self.regions.get(n)?;
            if let NeighborScope::Compatible { region_vs_region } = scope {
                if !region_vs_region && region.size > 1 && other.size > 1 {
                    continue;
                }
                if !merger.predicate(region, other)? {
                    continue;
                }
            }
            let d = region.squared_distance(other);
            if best.map_or(true, |(_, bd)| d < bd) {
                best = Some((n, d));
            }
        }

        Ok(best.map(|(n, _)| n))
    }

    /// Check that labels, boxes, sizes and links agree with each other.
    ///
    /// Sizes are only exact right after merges or a statistics recompute,
    /// not between border adjustment and the following recompute.
    pub fn check_consistency(&self) -> Result<()> {
        if !self.regions.is_symmetric() {
            return Err(Error::Algorithm("adjacency is not symmetric".into()));
        }

        for region in self.regions.values() {
            let b = region.bbox;
            if !b.is_valid() || b.bound_row > self.labels.rows() || b.bound_col > self.labels.cols() {
                return Err(Error::InvalidBounds {
                    id: region.id,
                    start_row: b.start_row,
                    start_col: b.start_col,
                    bound_row: b.bound_row,
                    bound_col: b.bound_col,
                });
            }
            let found = self.labels.cells_of(&b, region.id).len();
            if found != region.size {
                return Err(Error::Algorithm(format!(
                    "region {} has size {} but {} labelled cells in its box",
                    region.id, region.size, found
                )));
            }
        }

        let mut labelled = 0;
        for &id in self.labels.raster().data().iter() {
            if id == LabelGrid::DUMMY {
                continue;
            }
            if !self.regions.contains(id) {
                return Err(Error::RegionNotFound(id));
            }
            labelled += 1;
        }
        if labelled != self.regions.total_pixels() {
            return Err(Error::Algorithm(format!(
                "{} labelled cells but regions account for {}",
                labelled,
                self.regions.total_pixels()
            )));
        }
        Ok(())
    }
}

/// All bands of one pixel, `None` if any band has no data
pub(crate) fn read_pixel(image: &Image, row: usize, col: usize) -> Option<Vec<f64>> {
    (0..image.n_bands())
        .map(|b| image.get(row, col, b))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merger::params::EUCLIDEAN_DISTANCE_THRESHOLD;
    use crate::merger::{EuclideanMerger, MergeStrategy};

    fn euclidean(t: f64) -> Merger {
        let mut m = Merger::new(MergeStrategy::Euclidean(EuclideanMerger));
        m.set_param(EUCLIDEAN_DISTANCE_THRESHOLD, t);
        m
    }

    #[test]
    fn test_initialize_links_grid() {
        let img = Image::from_vec((0..6).map(f64::from).collect(), 2, 3).unwrap();
        let state = SegmentationState::initialize(&img).unwrap();
        assert_eq!(state.n_regions(), 6);
        // row-major ids
        assert_eq!(state.labels().get(1, 2), Some(5));
        // 2x3 grid has 7 rook edges
        assert_eq!(state.regions().adjacency().len(), 7);
        state.check_consistency().unwrap();
    }

    #[test]
    fn test_initialize_skips_nodata() {
        let img = Image::from_vec(vec![1.0, f64::NAN, 3.0, 4.0], 2, 2).unwrap();
        let state = SegmentationState::initialize(&img).unwrap();
        assert_eq!(state.n_regions(), 3);
        assert_eq!(state.labels().get(0, 1), Some(LabelGrid::DUMMY));
        // ids stay tied to the pixel position across the gap
        assert_eq!(state.labels().get(1, 0), Some(2));
        assert_eq!(state.labels().get(1, 1), Some(3));
        assert!(!state.regions().contains(1));
        assert_eq!(state.regions().next_id(), 4);
        state.check_consistency().unwrap();
    }

    #[test]
    fn test_merge_regions_relabels_and_relinks() {
        let img = Image::from_vec(vec![1.0, 3.0, 5.0], 1, 3).unwrap();
        let mut state = SegmentationState::initialize(&img).unwrap();
        let m = euclidean(10.0);
        state.merge_regions(&m, 0, 1).unwrap();

        let r = state.regions().get(0).unwrap();
        assert_eq!(r.size, 2);
        assert_eq!(r.mean, vec![2.0]);
        assert!(r.is_neighbor(2));
        assert_eq!(state.labels().get(0, 1), Some(0));
        assert!(state.merge_regions(&m, 0, 0).is_err());
        state.check_consistency().unwrap();
    }

    #[test]
    fn test_closest_region_scopes() {
        let img = Image::from_vec(vec![10.0, 1.0, 4.0], 1, 3).unwrap();
        let state = SegmentationState::initialize(&img).unwrap();
        let m = euclidean(5.0);

        // region 1 (value 1) sees 0 (d=81) and 2 (d=9)
        assert_eq!(state.closest_region(&m, 1, NeighborScope::All).unwrap(), Some(2));
        let scope = NeighborScope::Compatible { region_vs_region: true };
        assert_eq!(state.closest_region(&m, 1, scope).unwrap(), Some(2));
        // 10 vs 1 fails the predicate
        assert_eq!(state.closest_region(&m, 0, scope).unwrap(), None);
    }

    #[test]
    fn test_closest_region_ties_pick_lowest_id() {
        let img = Image::from_vec(vec![2.0, 0.0, 2.0], 1, 3).unwrap();
        let state = SegmentationState::initialize(&img).unwrap();
        assert_eq!(
            state.closest_region(&euclidean(5.0), 1, NeighborScope::All).unwrap(),
            Some(0)
        );
    }

    #[test]
    fn test_resize_keeps_cells_in_boxes() {
        let img = Image::from_vec(vec![1.0, 2.0, 3.0, 4.0], 2, 2).unwrap();
        let mut state = SegmentationState::initialize(&img).unwrap();
        state.resize(3, 4).unwrap();
        assert_eq!(state.labels().shape(), (3, 4));
        for region in state.regions().values() {
            let cells = state.labels().cells_of(&region.bbox, region.id);
            assert!(!cells.is_empty());
        }
        let total: usize = state
            .regions()
            .values()
            .map(|r| state.labels().cells_of(&r.bbox, r.id).len())
            .sum();
        assert_eq!(total, 12);
    }
}
