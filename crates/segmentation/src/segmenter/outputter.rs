//! Hooks for intermediate and final results

use mseg_core::Result;

use crate::label_grid::LabelGrid;
use crate::pyramid::Pyramid;
use crate::region_table::RegionTable;

/// Receives the pyramid and per-level results while a run progresses.
///
/// Level 0 is always reported once, after cleanup. Coarser levels are
/// reported only when intermediate results are requested.
pub trait Outputter {
    fn on_pyramid_built(&mut self, _pyramid: &Pyramid) -> Result<()> {
        Ok(())
    }

    fn on_level_result(&mut self, labels: &LabelGrid, regions: &RegionTable, level: usize) -> Result<()>;
}

/// Keeps the region count reported for every level
#[derive(Debug, Clone, Default)]
pub struct LevelSummary {
    pub pyramid_levels: Option<usize>,
    /// `(level, region count)` in reporting order
    pub levels: Vec<(usize, usize)>,
}

impl Outputter for LevelSummary {
    fn on_pyramid_built(&mut self, pyramid: &Pyramid) -> Result<()> {
        self.pyramid_levels = Some(pyramid.n_levels());
        Ok(())
    }

    fn on_level_result(&mut self, _labels: &LabelGrid, regions: &RegionTable, level: usize) -> Result<()> {
        self.levels.push((level, regions.len()));
        Ok(())
    }
}
