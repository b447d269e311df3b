//! Execution modes for independent work items

use mseg_core::{Error, Result};
use rayon::prelude::*;

/// How independent work items are scheduled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProcessingMode {
    /// Single-threaded processing
    Sequential,
    /// Parallel processing using all available cores
    #[default]
    Parallel,
    /// Parallel with specified number of threads
    ParallelWith(usize),
}

/// Fallible map over an index range
pub trait ParallelStrategy {
    /// Map `f` over `range`, keeping index order. Stops at the first error.
    fn try_map<T, F>(&self, range: std::ops::Range<usize>, f: F) -> Result<Vec<T>>
    where
        T: Send,
        F: Fn(usize) -> Result<T> + Sync + Send;
}

impl ParallelStrategy for ProcessingMode {
    fn try_map<T, F>(&self, range: std::ops::Range<usize>, f: F) -> Result<Vec<T>>
    where
        T: Send,
        F: Fn(usize) -> Result<T> + Sync + Send,
    {
        match self {
            ProcessingMode::Sequential => range.map(f).collect(),
            ProcessingMode::Parallel => range.into_par_iter().map(f).collect(),
            ProcessingMode::ParallelWith(threads) => {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(*threads)
                    .build()
                    .map_err(|e| Error::Other(format!("failed to build thread pool: {}", e)))?;
                pool.install(|| range.into_par_iter().map(f).collect())
            }
        }
    }
}

/// Get the number of available CPU cores
pub fn num_cpus() -> usize {
    rayon::current_num_threads()
}
