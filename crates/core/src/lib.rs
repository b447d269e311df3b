//! # mseg core
//!
//! Core types and I/O for the mseg segmentation engine.
//!
//! This crate provides:
//! - `Raster<T>`: generic single-band grid, used for image bands and label grids
//! - `Image`: multi-band stack of `Raster<f64>`
//! - `PixelGrid` / `StatisticsProvider`: accessor traits the engine reads through
//! - TIFF I/O for images and label grids

pub mod error;
pub mod io;
pub mod raster;

pub use error::{Error, Result};
pub use raster::{
    rook_neighbors, BandStatistics, GlobalStatistics, Image, PixelGrid, Raster, RasterElement,
    Side, StatisticsProvider,
};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::raster::{
        BandStatistics, GlobalStatistics, Image, PixelGrid, Raster, RasterElement,
        StatisticsProvider,
    };
}
