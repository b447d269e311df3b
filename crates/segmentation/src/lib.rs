//! # mseg segmentation
//!
//! Multi-resolution region-growing segmentation of multi-band images.
//!
//! ## Building blocks
//!
//! - **pyramid**: 2×2 mean image pyramid
//! - **region / region_table / label_grid**: region records, adjacency graph, per-pixel ids
//! - **merger**: merge predicates, dissimilarities and homogeneity tests for
//!   Euclidean, radar cartoon, optical cartoon and per-band composite strategies
//! - **cv_table**: critical coefficient-of-variation tables for radar speckle
//! - **segmenter**: the [`MultiSeg`] engine and its configuration
//!
//! ```no_run
//! use mseg_segmentation::{MultiSeg, SegmentationParams};
//!
//! # fn main() -> mseg_core::Result<()> {
//! let image = mseg_core::io::read_image("scene.tif")?;
//! let params = SegmentationParams::optical(12.0, 0.4, 0.95);
//! let segmentation = MultiSeg::new(params)?.run(&image)?;
//! println!("{} regions", segmentation.n_regions());
//! # Ok(())
//! # }
//! ```

mod maybe_rayon;

pub mod cv_table;
pub mod label_grid;
pub mod merger;
pub mod pyramid;
pub mod region;
pub mod region_table;
pub mod segmenter;

pub use cv_table::CvTable;
pub use label_grid::LabelGrid;
pub use merger::{BandMerger, MergeStrategy, Merger};
pub use pyramid::Pyramid;
pub use region::{BoundingBox, Region, RegionId};
pub use region_table::RegionTable;
pub use segmenter::{
    GrowthOptions, ImageModel, ImageType, LevelSummary, MultiSeg, NoProgress, Outputter,
    Progress, ProgressCounter, RadarFormat, Segmentation, SegmentationParams, SegmentationState,
};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::merger::{
        CompositeMerger, EuclideanMerger, MergeStrategy, Merger, OpticalCartoonMerger,
        RadarCartoonMerger,
    };
    pub use crate::segmenter::{
        ImageModel, ImageType, MultiSeg, Outputter, Progress, RadarFormat, Segmentation,
        SegmentationParams,
    };
    pub use crate::{CvTable, LabelGrid, Pyramid, Region, RegionId, RegionTable};
    pub use mseg_core::prelude::*;
}
