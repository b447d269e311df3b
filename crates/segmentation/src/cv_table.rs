//! Coefficient-of-variation critical values
//!
//! A table maps (number of looks, sample count) to the largest CV a
//! speckled region may show and still be considered homogeneous at a given
//! confidence level. Each confidence level has its own file:
//!
//! - one row per number of looks, starting at 1
//! - 39 `;`-separated values per row, one per entry of [`SAMPLE_BREAKPOINTS`]

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use mseg_core::{Error, Result};
use tracing::{debug, info};

/// Sample counts heading the 39 table columns
pub const SAMPLE_BREAKPOINTS: [usize; 39] = [
    10, 20, 30, 40, 50, 60, 70, 80, 90, 100, //
    150, 200, 250, 300, 350, 400, 450, 500, 550, 600, 650, 700, 750, 800, 850, 900, 950, 1000, //
    1500, 2000, 2500, 3000, 3500, 4000, //
    5000, 6000, 7000, 8000, 9000,
];

/// Number of looks is clamped to this before lookup
pub const MAX_LOOKS: usize = 250;

/// Confidence levels with a tabulated file, and the file name for each.
/// Levels above 0.999 never reject and need no file.
const TABLE_FILES: [(f64, Option<&str>); 8] = [
    (0.99999, None),
    (0.999, Some("tab_01.csv")),
    (0.995, Some("tab_05.csv")),
    (0.99, Some("tab_1.csv")),
    (0.95, Some("tab_5.csv")),
    (0.90, Some("tab_10.csv")),
    (0.85, Some("tab_15.csv")),
    (0.80, Some("tab_20.csv")),
];

/// Immutable (looks, samples) → CV lookup table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CvTable {
    /// `rows[looks - 1][column]`
    rows: Vec<[f64; 39]>,
}

impl CvTable {
    /// Table that accepts every region (`get_cv` returns `f64::MAX`)
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load the table for `confidence` from `tables_dir`.
    ///
    /// Fails for confidence levels outside the supported set. A confidence
    /// of 0.99999 or 1.0 yields an empty table.
    pub fn load<P: AsRef<Path>>(confidence: f64, tables_dir: P) -> Result<Self> {
        let Some(file_name) = table_file_name(confidence)? else {
            info!("Confidence level {} never rejects, using an empty CV table", confidence);
            return Ok(Self::empty());
        };

        let path = tables_dir.as_ref().join(file_name);
        info!("Loading CV table {}", path.display());
        let file = File::open(&path)?;
        Self::from_reader(BufReader::new(file))
    }

    /// Parse a table from any buffered reader. Blank lines are skipped.
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut rows = Vec::new();

        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let values = line
                .split(';')
                .map(str::trim)
                .filter(|tok| !tok.is_empty())
                .map(|tok| {
                    tok.parse::<f64>().map_err(|e| Error::CvTable {
                        line: idx + 1,
                        reason: format!("'{}': {}", tok, e),
                    })
                })
                .collect::<Result<Vec<f64>>>()?;

            let row: [f64; 39] = values.try_into().map_err(|v: Vec<f64>| Error::CvTable {
                line: idx + 1,
                reason: format!("expected 39 values, found {}", v.len()),
            })?;
            rows.push(row);
        }

        debug!("CV table parsed with {} rows", rows.len());
        Ok(Self { rows })
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of tabulated looks (rows)
    pub fn max_looks(&self) -> usize {
        self.rows.len()
    }

    /// Critical CV for a region observed with `looks` looks and `samples` pixels.
    ///
    /// `looks` is clamped to [`MAX_LOOKS`] and `samples` rounded to the nearest
    /// breakpoint; on equal distance the smaller breakpoint wins. An empty
    /// table returns `f64::MAX`.
    pub fn get_cv(&self, looks: usize, samples: usize) -> Result<f64> {
        if self.rows.is_empty() {
            return Ok(f64::MAX);
        }

        let looks = looks.min(MAX_LOOKS);
        let column = nearest_breakpoint(samples);

        looks
            .checked_sub(1)
            .and_then(|row| self.rows.get(row))
            .map(|row| row[column])
            .ok_or(Error::CvTableLookup {
                looks,
                samples: SAMPLE_BREAKPOINTS[column],
            })
    }
}

/// File name for a supported confidence level, `None` when no file is needed
pub fn table_file_name(confidence: f64) -> Result<Option<&'static str>> {
    if (confidence - 1.0).abs() < 1e-12 {
        return Ok(None);
    }
    TABLE_FILES
        .iter()
        .find(|(level, _)| (level - confidence).abs() < 1e-9)
        .map(|&(_, file)| file)
        .ok_or_else(|| Error::InvalidParameter {
            name: "confidence_level",
            value: confidence.to_string(),
            reason: "allowed values are 0.99999, 0.999, 0.995, 0.99, 0.95, 0.90, 0.85, 0.80".into(),
        })
}

/// Column index of the breakpoint closest to `samples`
fn nearest_breakpoint(samples: usize) -> usize {
    let mut best = 0;
    let mut best_diff = usize::MAX;
    for (i, &bp) in SAMPLE_BREAKPOINTS.iter().enumerate() {
        let diff = samples.abs_diff(bp);
        if diff < best_diff {
            best_diff = diff;
            best = i;
        }
    }
    best
}
