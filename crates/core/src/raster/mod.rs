//! Raster data structures and accessors

mod access;
mod element;
mod grid;
mod image;
mod neighborhood;

pub use access::{BandStatistics, GlobalStatistics, PixelGrid, StatisticsProvider};
pub use element::RasterElement;
pub use grid::{Raster, RasterStatistics};
pub use image::Image;
pub use neighborhood::{rook_neighbors, Side};
