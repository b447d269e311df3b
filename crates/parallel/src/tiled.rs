//! Tiled segmentation of large images
//!
//! The image is cut into non-overlapping tiles, each segmented by its own
//! engine run. Tile results are stitched into one id space and regions
//! touching across a seam are joined when their means are close enough.

use std::sync::Arc;

use mseg_core::{Error, Image, Result};
use mseg_segmentation::merger::{EuclideanMerger, MergeStrategy, Merger};
use mseg_segmentation::{
    BoundingBox, LabelGrid, MultiSeg, NoProgress, Progress, RegionId, RegionTable, Segmentation,
    SegmentationParams, SegmentationState,
};
use tracing::{debug, info};

use crate::reconcile::UnionFind;
use crate::strategy::{ParallelStrategy, ProcessingMode};

/// A tile representing a subset of a raster
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tile {
    /// Row offset in the source raster
    pub row_offset: usize,
    /// Column offset in the source raster
    pub col_offset: usize,
    /// Number of rows in this tile
    pub rows: usize,
    /// Number of columns in this tile
    pub cols: usize,
}

impl Tile {
    pub fn new(row_offset: usize, col_offset: usize, rows: usize, cols: usize) -> Self {
        Self {
            row_offset,
            col_offset,
            rows,
            cols,
        }
    }

    /// Convert tile-local coordinates to source raster coordinates
    pub fn to_source_coords(&self, local_row: usize, local_col: usize) -> (usize, usize) {
        (self.row_offset + local_row, self.col_offset + local_col)
    }
}

/// Row-major iterator over non-overlapping tiles covering a raster
#[derive(Debug, Clone)]
pub struct TileIterator {
    total_rows: usize,
    total_cols: usize,
    tile_size: usize,
    current_row: usize,
    current_col: usize,
}

impl TileIterator {
    pub fn new(total_rows: usize, total_cols: usize, tile_size: usize) -> Self {
        Self {
            total_rows,
            total_cols,
            tile_size: tile_size.max(1),
            current_row: 0,
            current_col: 0,
        }
    }
}

impl Iterator for TileIterator {
    type Item = Tile;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current_row >= self.total_rows || self.total_cols == 0 {
            return None;
        }

        let rows = self.tile_size.min(self.total_rows - self.current_row);
        let cols = self.tile_size.min(self.total_cols - self.current_col);
        let tile = Tile::new(self.current_row, self.current_col, rows, cols);

        self.current_col += self.tile_size;
        if self.current_col >= self.total_cols {
            self.current_col = 0;
            self.current_row += self.tile_size;
        }

        Some(tile)
    }
}

/// Segments an image tile by tile and reconciles the seams.
pub struct TiledSegmenter {
    engine: MultiSeg,
    tile_size: usize,
    mode: ProcessingMode,
    reconcile_threshold: f64,
    progress: Arc<dyn Progress>,
}

impl TiledSegmenter {
    /// Tiles of `tile_size × tile_size`; seams are joined within the
    /// configured similarity
    pub fn new(params: SegmentationParams, tile_size: usize) -> Result<Self> {
        if tile_size == 0 {
            return Err(Error::InvalidParameter {
                name: "tile_size",
                value: "0".into(),
                reason: "must be > 0".into(),
            });
        }
        let reconcile_threshold = params.similarity;
        Ok(Self {
            engine: MultiSeg::new(params)?,
            tile_size,
            mode: ProcessingMode::default(),
            reconcile_threshold,
            progress: Arc::new(NoProgress),
        })
    }

    pub fn with_mode(mut self, mode: ProcessingMode) -> Self {
        self.mode = mode;
        self
    }

    /// Largest Euclidean distance between the means of two seam regions
    /// that still joins them, in working-image units
    pub fn with_reconcile_threshold(mut self, threshold: f64) -> Self {
        self.reconcile_threshold = threshold;
        self
    }

    /// Reports one step per finished tile
    pub fn with_progress(mut self, progress: Arc<dyn Progress>) -> Self {
        self.progress = progress;
        self
    }

    pub fn tiles(&self, image: &Image) -> Vec<Tile> {
        TileIterator::new(image.rows(), image.cols(), self.tile_size).collect()
    }

    pub fn run(&self, image: &Image) -> Result<Segmentation> {
        let tiles = self.tiles(image);
        self.progress.set_steps(tiles.len() as u64);
        info!(
            "Segmenting {}x{} image in {} tiles ({:?})",
            image.rows(),
            image.cols(),
            tiles.len(),
            self.mode
        );

        let results = self.mode.try_map(0..tiles.len(), |i| {
            if self.progress.cancelled() {
                return Err(Error::Cancelled);
            }
            let tile = tiles[i];
            let window = image.window(tile.row_offset, tile.col_offset, tile.rows, tile.cols)?;
            let segmentation = self.engine.run(&window)?;
            self.progress.advance(1);
            debug!(
                "Tile at ({}, {}): {} regions",
                tile.row_offset,
                tile.col_offset,
                segmentation.n_regions()
            );
            Ok(segmentation)
        })?;

        let state = stitch(image.rows(), image.cols(), &tiles, results)?;
        let (mut state, joined) = self.reconcile(state)?;

        let work = self.engine.working_image(image)?;
        state.update_statistics(&work, None)?;
        info!(
            "Joined {} regions across seams, {} regions in total",
            joined,
            state.n_regions()
        );

        let (labels, regions) = state.into_parts();
        Ok(Segmentation::new(labels, regions))
    }

    /// Link every region pair touching across a seam and join the close ones
    fn reconcile(&self, state: SegmentationState) -> Result<(SegmentationState, usize)> {
        let pairs = seam_pairs(state.labels(), self.tile_size);
        let (labels, mut regions) = state.into_parts();
        let mut sets = UnionFind::new(regions.next_id() as usize);

        for &(a, b) in &pairs {
            regions.link(a, b)?;
            let distance = regions.get(a)?.squared_distance(regions.get(b)?).sqrt();
            if distance <= self.reconcile_threshold {
                sets.union(a, b);
            }
        }

        let mut state = SegmentationState::from_parts(labels, regions);
        let merger = Merger::new(MergeStrategy::Euclidean(EuclideanMerger));
        let mut joined = 0;
        for id in state.regions().ids() {
            let root = sets.find(id);
            if root != id {
                state.merge_regions(&merger, root, id)?;
                joined += 1;
            }
        }
        Ok((state, joined))
    }
}

/// Place every tile's labels and regions into one grid, shifting ids so
/// tiles never collide
fn stitch(
    rows: usize,
    cols: usize,
    tiles: &[Tile],
    results: Vec<Segmentation>,
) -> Result<SegmentationState> {
    let mut labels = LabelGrid::new(rows, cols);
    let mut regions = RegionTable::new();
    let mut offset: RegionId = 0;

    for (tile, segmentation) in tiles.iter().zip(results) {
        let (tile_labels, tile_regions) = segmentation.into_parts();

        for row in 0..tile.rows {
            for col in 0..tile.cols {
                let Some(id) = tile_labels.get(row, col).filter(|&id| id != LabelGrid::DUMMY) else {
                    continue;
                };
                let (r, c) = tile.to_source_coords(row, col);
                labels.set(r, c, id + offset)?;
            }
        }

        for region in tile_regions.values() {
            let mut moved = region.clone();
            moved.id += offset;
            moved.bbox = BoundingBox {
                start_row: region.bbox.start_row + tile.row_offset,
                start_col: region.bbox.start_col + tile.col_offset,
                bound_row: region.bbox.bound_row + tile.row_offset,
                bound_col: region.bbox.bound_col + tile.col_offset,
            };
            moved.neighbors = region.neighbors.iter().map(|n| n + offset).collect();
            regions.insert(moved)?;
        }

        offset += tile_regions.next_id();
    }

    Ok(SegmentationState::from_parts(labels, regions))
}

/// Distinct `(a, b)` label pairs, `a < b`, facing each other across a
/// tile boundary
fn seam_pairs(labels: &LabelGrid, tile_size: usize) -> Vec<(RegionId, RegionId)> {
    let (rows, cols) = labels.shape();
    let mut pairs = std::collections::BTreeSet::new();
    let mut push = |a: Option<RegionId>, b: Option<RegionId>| {
        if let (Some(a), Some(b)) = (a, b) {
            if a != b && a != LabelGrid::DUMMY && b != LabelGrid::DUMMY {
                pairs.insert((a.min(b), a.max(b)));
            }
        }
    };

    for col in (tile_size..cols).step_by(tile_size) {
        for row in 0..rows {
            push(labels.get(row, col - 1), labels.get(row, col));
        }
    }
    for row in (tile_size..rows).step_by(tile_size) {
        for col in 0..cols {
            push(labels.get(row - 1, col), labels.get(row, col));
        }
    }

    pairs.into_iter().collect()
}
