//! Region record: identity, extent, per-band statistics and adjacency

use std::collections::BTreeSet;

use mseg_core::Side;

/// Region identifier. Never reused within one run.
pub type RegionId = u64;

/// Row/column extent with exclusive upper bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BoundingBox {
    pub start_row: usize,
    pub start_col: usize,
    pub bound_row: usize,
    pub bound_col: usize,
}

impl BoundingBox {
    /// Box covering a single cell
    pub fn pixel(row: usize, col: usize) -> Self {
        Self {
            start_row: row,
            start_col: col,
            bound_row: row + 1,
            bound_col: col + 1,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.start_row < self.bound_row && self.start_col < self.bound_col
    }

    pub fn contains(&self, row: usize, col: usize) -> bool {
        (self.start_row..self.bound_row).contains(&row)
            && (self.start_col..self.bound_col).contains(&col)
    }

    /// Smallest box covering both
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            start_row: self.start_row.min(other.start_row),
            start_col: self.start_col.min(other.start_col),
            bound_row: self.bound_row.max(other.bound_row),
            bound_col: self.bound_col.max(other.bound_col),
        }
    }

    /// Grow the box so it includes `(row, col)`
    pub fn include(&mut self, row: usize, col: usize) {
        self.start_row = self.start_row.min(row);
        self.start_col = self.start_col.min(col);
        self.bound_row = self.bound_row.max(row + 1);
        self.bound_col = self.bound_col.max(col + 1);
    }

    /// Extend only the edge facing `side` so it reaches `(row, col)`
    pub fn extend_toward(&mut self, side: Side, row: usize, col: usize) {
        match side {
            Side::Left => self.start_col = self.start_col.min(col),
            Side::Right => self.bound_col = self.bound_col.max(col + 1),
            Side::Top => self.start_row = self.start_row.min(row),
            Side::Bottom => self.bound_row = self.bound_row.max(row + 1),
        }
    }

    /// Map the box onto a grid twice as fine, clamped to `rows x cols`.
    ///
    /// Non-zero starts move to `2 * start - 1` so the fringe left by
    /// nearest-neighbour upsampling of the label grid stays inside.
    pub fn upscale(&self, rows: usize, cols: usize) -> BoundingBox {
        let up = |start: usize| if start > 0 { start * 2 - 1 } else { 0 };
        BoundingBox {
            start_row: up(self.start_row),
            start_col: up(self.start_col),
            bound_row: (self.bound_row * 2).min(rows),
            bound_col: (self.bound_col * 2).min(cols),
        }
    }

    /// Iterate every `(row, col)` inside the box
    pub fn cells(&self) -> impl Iterator<Item = (usize, usize)> {
        let (r0, r1, c0, c1) = (self.start_row, self.bound_row, self.start_col, self.bound_col);
        (r0..r1).flat_map(move |r| (c0..c1).map(move |c| (r, c)))
    }
}

/// A connected set of pixels sharing one identity.
///
/// `variance` and `cv` are only meaningful after a statistics recompute.
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    pub id: RegionId,
    pub bbox: BoundingBox,
    pub size: usize,
    pub mean: Vec<f64>,
    pub variance: Vec<f64>,
    pub cv: Vec<f64>,
    pub neighbors: BTreeSet<RegionId>,
}

impl Region {
    /// Single-pixel region whose mean is the pixel itself
    pub fn from_pixel(id: RegionId, row: usize, col: usize, pixel: Vec<f64>) -> Self {
        let n = pixel.len();
        Self {
            id,
            bbox: BoundingBox::pixel(row, col),
            size: 1,
            mean: pixel,
            variance: vec![0.0; n],
            cv: vec![0.0; n],
            neighbors: BTreeSet::new(),
        }
    }

    pub fn n_bands(&self) -> usize {
        self.mean.len()
    }

    pub fn is_neighbor(&self, other: RegionId) -> bool {
        self.neighbors.contains(&other)
    }

    /// Squared Euclidean distance between the two mean vectors
    pub fn squared_distance(&self, other: &Region) -> f64 {
        self.mean
            .iter()
            .zip(&other.mean)
            .map(|(a, b)| (a - b) * (a - b))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upscale_fringe() {
        let b = BoundingBox {
            start_row: 1,
            start_col: 0,
            bound_row: 3,
            bound_col: 2,
        };
        let up = b.upscale(5, 3);
        assert_eq!(up.start_row, 1);
        assert_eq!(up.start_col, 0);
        assert_eq!(up.bound_row, 5);
        assert_eq!(up.bound_col, 3);
    }

    #[test]
    fn test_union_and_include() {
        let mut a = BoundingBox::pixel(2, 2);
        let b = BoundingBox::pixel(0, 5);
        let u = a.union(&b);
        assert_eq!((u.start_row, u.start_col, u.bound_row, u.bound_col), (0, 2, 3, 6));

        a.include(4, 1);
        assert!(a.contains(4, 1));
        assert!(a.contains(2, 2));
        assert!(!a.contains(5, 1));
        assert_eq!(a.cells().count(), 3 * 2);
    }

    #[test]
    fn test_extend_toward() {
        let mut b = BoundingBox::pixel(3, 3);
        b.extend_toward(Side::Left, 3, 2);
        b.extend_toward(Side::Bottom, 4, 3);
        assert_eq!((b.start_row, b.start_col, b.bound_row, b.bound_col), (3, 2, 5, 4));
    }

    #[test]
    fn test_squared_distance() {
        let a = Region::from_pixel(0, 0, 0, vec![1.0, 2.0]);
        let b = Region::from_pixel(1, 0, 1, vec![4.0, 6.0]);
        assert_eq!(a.squared_distance(&b), 25.0);
        assert_eq!(a.size, 1);
        assert_eq!(a.variance, vec![0.0, 0.0]);
    }
}
