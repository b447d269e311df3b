//! Pixel-level border refinement after a resolution change

use mseg_core::{rook_neighbors, Image, Result, Side};
use ndarray::Array2;
use tracing::debug;

use super::state::{read_pixel, SegmentationState};
use crate::label_grid::LabelGrid;
use crate::merger::Merger;
use crate::region::{BoundingBox, RegionId};

/// Which region a pair of border pixels should belong to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Destiny {
    /// Pixel B moves to region A
    ToA,
    /// Pixel A would move to region B; left for B's own scan
    ToB,
    Stay,
}

/// Decide a border pair from the four pixel/region dissimilarities.
///
/// `vaa` is pixel A against region A, `vba` pixel A against region B,
/// `vbb` pixel B against region B and `vab` pixel B against region A.
fn destiny(vaa: f64, vba: f64, vbb: f64, vab: f64) -> Destiny {
    if vaa < vba && vbb >= vab {
        Destiny::ToA
    } else if vaa > vba && vbb <= vab {
        Destiny::ToB
    } else {
        Destiny::Stay
    }
}

impl SegmentationState {
    /// Move border pixels to the adjacent region that fits them better.
    ///
    /// Regions are visited in ascending id order, each over the bounding
    /// box it had when its turn came. A pixel decided once (moved or kept)
    /// is not reconsidered. Sizes and means are stale afterwards until the
    /// next statistics recompute.
    ///
    /// Returns the number of moved pixels.
    pub fn adjust_borders(&mut self, image: &Image, merger: &Merger) -> Result<usize> {
        let (rows, cols) = self.labels.shape();
        let mut settled = Array2::from_elem((rows, cols), false);
        let mut moved = 0;

        for id in self.regions.ids() {
            let b = self.regions.get(id)?.bbox;
            let bbox = BoundingBox {
                bound_row: b.bound_row.min(rows),
                bound_col: b.bound_col.min(cols),
                ..b
            };

            for (row, col) in bbox.cells() {
                if settled[(row, col)] || self.labels.get(row, col) != Some(id) {
                    continue;
                }
                let Some((side, (nr, nc), other)) = self.border_neighbor(row, col, id) else {
                    continue;
                };
                if settled[(nr, nc)] {
                    continue;
                }
                if !self.regions.get(id)?.is_neighbor(other) {
                    self.regions.link(id, other)?;
                }

                let (Some(pa), Some(pb)) = (read_pixel(image, row, col), read_pixel(image, nr, nc)) else {
                    settled[(row, col)] = true;
                    settled[(nr, nc)] = true;
                    continue;
                };
                let a = self.regions.get(id)?;
                let b = self.regions.get(other)?;
                let decision = destiny(
                    merger.dissimilarity(&pa, a)?,
                    merger.dissimilarity(&pa, b)?,
                    merger.dissimilarity(&pb, b)?,
                    merger.dissimilarity(&pb, a)?,
                );

                match decision {
                    Destiny::ToB => {}
                    Destiny::Stay => {
                        settled[(row, col)] = true;
                        settled[(nr, nc)] = true;
                    }
                    Destiny::ToA => {
                        self.labels.set(nr, nc, id)?;
                        settled[(row, col)] = true;
                        settled[(nr, nc)] = true;
                        self.regions.get_mut(id)?.bbox.extend_toward(side, nr, nc);
                        self.link_around(id, nr, nc)?;
                        moved += 1;
                    }
                }
            }
        }

        debug!("Border adjustment moved {} pixels", moved);
        Ok(moved)
    }

    /// First rook neighbour (left, right, top, bottom) held by another region
    fn border_neighbor(
        &self,
        row: usize,
        col: usize,
        id: RegionId,
    ) -> Option<(Side, (usize, usize), RegionId)> {
        let (rows, cols) = self.labels.shape();
        rook_neighbors(row, col, rows, cols).find_map(|(side, (r, c))| {
            self.labels
                .get(r, c)
                .filter(|&n| n != id && n != LabelGrid::DUMMY)
                .map(|n| (side, (r, c), n))
        })
    }

    /// Link `id` to every region touching the cell it just took over
    fn link_around(&mut self, id: RegionId, row: usize, col: usize) -> Result<()> {
        let (rows, cols) = self.labels.shape();
        for (_, (r, c)) in rook_neighbors(row, col, rows, cols) {
            if let Some(n) = self.labels.get(r, c).filter(|&n| n != id && n != LabelGrid::DUMMY) {
                self.regions.link(id, n)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merger::params::EUCLIDEAN_DISTANCE_THRESHOLD;
    use crate::merger::{EuclideanMerger, MergeStrategy};

    #[test]
    fn test_destiny_rules() {
        assert_eq!(destiny(1.0, 5.0, 5.0, 1.0), Destiny::ToA);
        assert_eq!(destiny(1.0, 5.0, 1.0, 1.0), Destiny::ToA);
        assert_eq!(destiny(5.0, 1.0, 1.0, 5.0), Destiny::ToB);
        assert_eq!(destiny(1.0, 5.0, 1.0, 5.0), Destiny::Stay);
        assert_eq!(destiny(2.0, 2.0, 1.0, 1.0), Destiny::Stay);
    }

    /// Row `[1, 1, 1 | 1, 9, 9]` with the fourth pixel on the wrong side
    fn misplaced() -> (Image, SegmentationState, Merger) {
        let img = Image::from_vec(vec![1.0, 1.0, 1.0, 1.0, 9.0, 9.0], 1, 6).unwrap();
        let mut state = SegmentationState::initialize(&img).unwrap();
        let mut m = Merger::new(MergeStrategy::Euclidean(EuclideanMerger));
        m.set_param(EUCLIDEAN_DISTANCE_THRESHOLD, f64::MAX);
        for id in [1, 2] {
            state.merge_regions(&m, 0, id).unwrap();
        }
        for id in [4, 5] {
            state.merge_regions(&m, 3, id).unwrap();
        }
        state.regions.get_mut(3).unwrap().mean = vec![9.0];
        (img, state, m)
    }

    #[test]
    fn test_border_pixel_moves_to_better_region() {
        let (img, mut state, m) = misplaced();
        let moved = state.adjust_borders(&img, &m).unwrap();
        assert_eq!(moved, 1);
        assert_eq!(state.labels().get(0, 3), Some(0));
        assert_eq!(state.labels().get(0, 4), Some(3));
        assert_eq!(state.regions().get(0).unwrap().bbox.bound_col, 4);

        state.update_statistics(&img, None).unwrap();
        assert_eq!(state.regions().get(0).unwrap().size, 4);
        assert_eq!(state.regions().get(3).unwrap().size, 2);
        state.check_consistency().unwrap();
    }

    #[test]
    fn test_swapped_pixels_stay() {
        // each border pixel fits the other region: no side wins
        let img = Image::from_vec(vec![1.0, 9.0, 1.0, 9.0], 1, 4).unwrap();
        let mut state = SegmentationState::initialize(&img).unwrap();
        let mut m = Merger::new(MergeStrategy::Euclidean(EuclideanMerger));
        m.set_param(EUCLIDEAN_DISTANCE_THRESHOLD, f64::MAX);
        state.merge_regions(&m, 0, 1).unwrap();
        state.merge_regions(&m, 2, 3).unwrap();
        state.regions.get_mut(0).unwrap().mean = vec![1.0];
        state.regions.get_mut(2).unwrap().mean = vec![9.0];
        assert_eq!(state.adjust_borders(&img, &m).unwrap(), 0);
    }

    #[test]
    fn test_interior_pixels_untouched() {
        let img = Image::from_vec(vec![1.0, 1.0, 9.0, 9.0], 1, 4).unwrap();
        let mut state = SegmentationState::initialize(&img).unwrap();
        let mut m = Merger::new(MergeStrategy::Euclidean(EuclideanMerger));
        m.set_param(EUCLIDEAN_DISTANCE_THRESHOLD, 1.0);
        state.merge_regions(&m, 0, 1).unwrap();
        state.merge_regions(&m, 2, 3).unwrap();
        assert_eq!(state.adjust_borders(&img, &m).unwrap(), 0);
        assert_eq!(state.labels().get(0, 1), Some(0));
        assert_eq!(state.labels().get(0, 2), Some(2));
    }
}
