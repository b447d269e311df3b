//! # mseg parallel
//!
//! Tiled execution of the mseg segmentation engine.
//!
//! This crate provides:
//! - `ProcessingMode`: sequential, rayon, or rayon with a fixed thread count
//! - `TiledSegmenter`: per-tile segmentation with seam reconciliation
//! - `UnionFind`: disjoint sets used to join regions across tile seams

pub mod reconcile;
pub mod strategy;
pub mod tiled;

pub use reconcile::UnionFind;
pub use strategy::{num_cpus, ParallelStrategy, ProcessingMode};
pub use tiled::{Tile, TileIterator, TiledSegmenter};
