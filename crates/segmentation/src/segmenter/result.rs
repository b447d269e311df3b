//! Finished segmentation and its exported forms

use std::collections::HashMap;

use mseg_core::{Image, Raster, Result};

use crate::label_grid::LabelGrid;
use crate::region::RegionId;
use crate::region_table::RegionTable;

/// Final labels and regions of a run, at full resolution
#[derive(Debug, Clone)]
pub struct Segmentation {
    labels: LabelGrid,
    regions: RegionTable,
}

impl Segmentation {
    pub fn new(labels: LabelGrid, regions: RegionTable) -> Self {
        Self { labels, regions }
    }

    pub fn labels(&self) -> &LabelGrid {
        &self.labels
    }

    pub fn regions(&self) -> &RegionTable {
        &self.regions
    }

    pub fn n_regions(&self) -> usize {
        self.regions.len()
    }

    pub fn shape(&self) -> (usize, usize) {
        self.labels.shape()
    }

    /// Region ids shifted up by one, `0` where no region
    pub fn label_raster(&self) -> Raster<u64> {
        label_raster(&self.labels)
    }

    /// Regions renumbered `1..=n` in id order, `0` where no region
    pub fn compact_labels(&self) -> Raster<u32> {
        compact_labels(&self.labels, &self.regions)
    }

    /// Per band mean, variance and CV planes, `-1` where no region
    pub fn cartoon_image(&self) -> Result<Image> {
        cartoon_image(&self.labels, &self.regions)
    }

    /// Undirected region adjacency, `(a, b)` with `a < b`
    pub fn adjacency(&self) -> Vec<(RegionId, RegionId)> {
        self.regions.adjacency()
    }

    pub fn into_parts(self) -> (LabelGrid, RegionTable) {
        (self.labels, self.regions)
    }
}

pub fn label_raster(labels: &LabelGrid) -> Raster<u64> {
    let data = labels
        .raster()
        .data()
        .mapv(|id| if id == LabelGrid::DUMMY { 0 } else { id + 1 });
    let mut raster = Raster::from_array(data);
    raster.set_nodata(Some(0));
    raster
}

pub fn compact_labels(labels: &LabelGrid, regions: &RegionTable) -> Raster<u32> {
    let dense: HashMap<RegionId, u32> = regions
        .ids()
        .into_iter()
        .zip(1u32..)
        .collect();
    let data = labels
        .raster()
        .data()
        .mapv(|id| dense.get(&id).copied().unwrap_or(0));
    let mut raster = Raster::from_array(data);
    raster.set_nodata(Some(0));
    raster
}

/// Cartoon rendering: `3 * n_bands` planes ordered mean, variance, CV for
/// each band in turn.
pub fn cartoon_image(labels: &LabelGrid, regions: &RegionTable) -> Result<Image> {
    let (rows, cols) = labels.shape();
    let n_bands = regions.values().next().map_or(0, |r| r.n_bands());
    let mut planes = Vec::with_capacity(3 * n_bands);

    for band in 0..n_bands {
        for field in 0..3 {
            let data = labels.raster().data().mapv(|id| {
                regions.get(id).map_or(-1.0, |r| match field {
                    0 => r.mean[band],
                    1 => r.variance[band],
                    _ => r.cv[band],
                })
            });
            let mut plane = Raster::from_array(data);
            plane.set_nodata(Some(-1.0));
            planes.push(plane);
        }
    }

    if planes.is_empty() {
        return Ok(Image::filled(rows, cols, 1, -1.0));
    }
    Image::from_bands(planes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::Region;
    use approx::assert_relative_eq;
    use mseg_core::PixelGrid;

    fn two_regions() -> Segmentation {
        let mut labels = LabelGrid::new(1, 3);
        let mut regions = RegionTable::new();
        let mut a = Region::from_pixel(4, 0, 0, vec![2.0]);
        a.variance = vec![1.0];
        a.cv = vec![0.5];
        regions.insert(a).unwrap();
        regions.insert(Region::from_pixel(9, 0, 2, vec![6.0])).unwrap();
        labels.set(0, 0, 4).unwrap();
        labels.set(0, 2, 9).unwrap();
        Segmentation::new(labels, regions)
    }

    #[test]
    fn test_label_exports() {
        let s = two_regions();
        let raw = s.label_raster();
        assert_eq!(raw.get(0, 0).unwrap(), 5);
        assert_eq!(raw.get(0, 1).unwrap(), 0);
        let dense = s.compact_labels();
        assert_eq!(dense.get(0, 0).unwrap(), 1);
        assert_eq!(dense.get(0, 1).unwrap(), 0);
        assert_eq!(dense.get(0, 2).unwrap(), 2);
    }

    #[test]
    fn test_cartoon_planes() {
        let s = two_regions();
        let img = s.cartoon_image().unwrap();
        assert_eq!(img.n_bands(), 3);
        assert_relative_eq!(img.get(0, 0, 0).unwrap(), 2.0);
        assert_relative_eq!(img.get(0, 0, 1).unwrap(), 1.0);
        assert_relative_eq!(img.get(0, 0, 2).unwrap(), 0.5);
        assert_relative_eq!(img.get(0, 2, 0).unwrap(), 6.0);
        assert_relative_eq!(img.get(0, 1, 0).unwrap(), -1.0);
    }
}
