//! Per-pixel region ids at the current pyramid resolution

use mseg_core::{Raster, Result};

use crate::region::{BoundingBox, RegionId};

/// Grid of region ids. [`LabelGrid::DUMMY`] marks unassigned cells.
#[derive(Debug, Clone)]
pub struct LabelGrid {
    raster: Raster<RegionId>,
}

impl LabelGrid {
    /// Reserved "no region" value
    pub const DUMMY: RegionId = RegionId::MAX;

    /// Grid with every cell unassigned
    pub fn new(rows: usize, cols: usize) -> Self {
        let mut raster = Raster::filled(rows, cols, Self::DUMMY);
        raster.set_nodata(Some(Self::DUMMY));
        Self { raster }
    }

    pub fn rows(&self) -> usize {
        self.raster.rows()
    }

    pub fn cols(&self) -> usize {
        self.raster.cols()
    }

    pub fn shape(&self) -> (usize, usize) {
        self.raster.shape()
    }

    /// Id at a cell, `None` outside the grid
    #[inline]
    pub fn get(&self, row: usize, col: usize) -> Option<RegionId> {
        self.raster.try_get(row, col)
    }

    pub fn set(&mut self, row: usize, col: usize, id: RegionId) -> Result<()> {
        self.raster.set(row, col, id)
    }

    pub fn raster(&self) -> &Raster<RegionId> {
        &self.raster
    }

    /// Rewrite every `from` cell inside `bbox` to `to`. Returns the count.
    pub fn relabel(&mut self, bbox: &BoundingBox, from: RegionId, to: RegionId) -> usize {
        let data = self.raster.data_mut();
        let (rows, cols) = data.dim();
        let mut changed = 0;
        for r in bbox.start_row..bbox.bound_row.min(rows) {
            for c in bbox.start_col..bbox.bound_col.min(cols) {
                let cell = &mut data[(r, c)];
                if *cell == from {
                    *cell = to;
                    changed += 1;
                }
            }
        }
        changed
    }

    /// Cells inside `bbox` carrying `id`, in row-major order
    pub fn cells_of(&self, bbox: &BoundingBox, id: RegionId) -> Vec<(usize, usize)> {
        let (rows, cols) = self.shape();
        let clipped = BoundingBox {
            start_row: bbox.start_row,
            start_col: bbox.start_col,
            bound_row: bbox.bound_row.min(rows),
            bound_col: bbox.bound_col.min(cols),
        };
        clipped
            .cells()
            .filter(|&(r, c)| self.get(r, c) == Some(id))
            .collect()
    }

    /// Nearest-neighbour resize onto the next finer pyramid level
    pub fn upsample(&mut self, rows: usize, cols: usize) -> Result<()> {
        self.raster = self.raster.upsample_2x(rows, cols)?;
        Ok(())
    }
}
