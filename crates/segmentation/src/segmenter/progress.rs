//! Progress reporting and cooperative cancellation

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Receives progress from a running segmentation.
///
/// `cancelled` is polled between growth iterations and between levels; a
/// run that sees `true` stops with [`mseg_core::Error::Cancelled`].
pub trait Progress: Send + Sync {
    fn set_steps(&self, steps: u64);
    fn advance(&self, steps: u64);
    fn cancelled(&self) -> bool {
        false
    }
}

/// Ignores everything and never cancels
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl Progress for NoProgress {
    fn set_steps(&self, _steps: u64) {}
    fn advance(&self, _steps: u64) {}
}

/// Counts steps and can be cancelled from another thread
#[derive(Debug, Default)]
pub struct ProgressCounter {
    total: AtomicU64,
    done: AtomicU64,
    cancel: AtomicBool,
}

impl ProgressCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    pub fn done(&self) -> u64 {
        self.done.load(Ordering::Relaxed)
    }

    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }
}

impl Progress for ProgressCounter {
    fn set_steps(&self, steps: u64) {
        self.total.store(steps, Ordering::Relaxed);
    }

    fn advance(&self, steps: u64) {
        self.done.fetch_add(steps, Ordering::Relaxed);
    }

    fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter() {
        let p = ProgressCounter::new();
        p.set_steps(3);
        p.advance(1);
        p.advance(1);
        assert_eq!((p.done(), p.total()), (2, 3));
        assert!(!p.cancelled());
        p.cancel();
        assert!(p.cancelled());
        assert!(!NoProgress.cancelled());
    }
}
