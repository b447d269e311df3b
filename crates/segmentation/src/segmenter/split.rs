//! Splitting heterogeneous regions back into pixels

use std::collections::BTreeSet;

use mseg_core::{rook_neighbors, Image, Result};
use tracing::debug;

use super::state::{read_pixel, SegmentationState};
use crate::cv_table::CvTable;
use crate::label_grid::LabelGrid;
use crate::merger::params::CV_THRESHOLD;
use crate::merger::Merger;
use crate::region::{Region, RegionId};

impl SegmentationState {
    /// Split every region the merger does not consider homogeneous.
    ///
    /// With `cv_lookup`, the CV threshold is read per region from the table
    /// for the given number of looks and the region's size before testing.
    ///
    /// Returns the ids of the single-pixel regions created.
    pub fn split_regions(
        &mut self,
        image: &Image,
        merger: &mut Merger,
        cv_lookup: Option<(&CvTable, usize)>,
    ) -> Result<BTreeSet<RegionId>> {
        let mut created = BTreeSet::new();
        let mut split = 0;

        for id in self.regions.ids() {
            let region = self.regions.get(id)?;
            if let Some((table, looks)) = cv_lookup {
                merger.set_param(CV_THRESHOLD, table.get_cv(looks, region.size)?);
            }
            if merger.is_homogeneous(region)? {
                continue;
            }
            created.extend(self.split_region(image, id)?);
            split += 1;
        }

        debug!("Split {} regions into {} pixels", split, created.len());
        Ok(created)
    }

    /// Replace region `id` by one fresh region per readable pixel.
    ///
    /// Each new region links to its rook neighbours. The old id is retired
    /// and its former neighbours keep at least one link.
    pub fn split_region(&mut self, image: &Image, id: RegionId) -> Result<Vec<RegionId>> {
        let bbox = self.regions.get(id)?.bbox;
        let cells = self.labels.cells_of(&bbox, id);
        for &(r, c) in &cells {
            self.labels.set(r, c, LabelGrid::DUMMY)?;
        }

        let (rows, cols) = self.labels.shape();
        let mut created = Vec::with_capacity(cells.len());
        for (r, c) in cells {
            let Some(pixel) = read_pixel(image, r, c) else {
                continue;
            };
            let new_id = self.regions.allocate_id();
            self.regions.insert(Region::from_pixel(new_id, r, c, pixel))?;
            self.labels.set(r, c, new_id)?;

            for (_, (nr, nc)) in rook_neighbors(r, c, rows, cols) {
                if let Some(n) = self.labels.get(nr, nc).filter(|&n| n != LabelGrid::DUMMY) {
                    self.regions.link(new_id, n)?;
                }
            }
            created.push(new_id);
        }

        self.regions.remove_region(id, false)?;
        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merger::params::EUCLIDEAN_DISTANCE_THRESHOLD;
    use crate::merger::{EuclideanMerger, MergeStrategy};

    fn one_region(values: Vec<f64>, rows: usize, cols: usize) -> (Image, SegmentationState) {
        let img = Image::from_vec(values, rows, cols).unwrap();
        let mut state = SegmentationState::initialize(&img).unwrap();
        let mut m = Merger::new(MergeStrategy::Euclidean(EuclideanMerger));
        m.set_param(EUCLIDEAN_DISTANCE_THRESHOLD, f64::MAX);
        for id in 1..(rows * cols) as u64 {
            state.merge_regions(&m, 0, id).unwrap();
        }
        state.update_statistics(&img, None).unwrap();
        (img, state)
    }

    #[test]
    fn test_heterogeneous_region_splits_into_pixels() {
        let (img, mut state) = one_region(vec![1.0, 5.0, 1.0, 5.0, 1.0, 5.0], 2, 3);
        let mut m = Merger::new(MergeStrategy::Euclidean(EuclideanMerger));
        m.set_param(CV_THRESHOLD, 0.1);

        let created = state.split_regions(&img, &mut m, None).unwrap();
        assert_eq!(created.len(), 6);
        assert!(created.iter().all(|&id| id >= 6));
        assert!(!state.regions().contains(0));
        assert_eq!(state.n_regions(), 6);
        assert_eq!(state.regions().adjacency().len(), 7);
        state.check_consistency().unwrap();
    }

    #[test]
    fn test_homogeneous_region_kept() {
        let (img, mut state) = one_region(vec![4.0; 4], 2, 2);
        let mut m = Merger::new(MergeStrategy::Euclidean(EuclideanMerger));
        m.set_param(CV_THRESHOLD, 0.1);
        assert!(state.split_regions(&img, &mut m, None).unwrap().is_empty());
        assert_eq!(state.n_regions(), 1);
    }

    #[test]
    fn test_split_keeps_outside_neighbors_linked() {
        // region 0 covers the first two cells, 2 stays alone
        let img = Image::from_vec(vec![1.0, 7.0, 3.0], 1, 3).unwrap();
        let mut state = SegmentationState::initialize(&img).unwrap();
        let m = Merger::new(MergeStrategy::Euclidean(EuclideanMerger));
        state.merge_regions(&m, 0, 1).unwrap();

        let created = state.split_region(&img, 0).unwrap();
        assert_eq!(created, vec![3, 4]);
        assert!(state.regions().get(4).unwrap().is_neighbor(2));
        assert!(state.regions().get(3).unwrap().is_neighbor(4));
        state.check_consistency().unwrap();
    }
}
