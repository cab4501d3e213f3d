//! Run progress: the shared counter and the status-line reporter.

pub mod reporter;

pub use reporter::{ProgressReporter, ReporterHandle};

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Counter of completed renders and comparisons for one run.
///
/// Clones share the same count.
#[derive(Debug, Clone)]
pub struct ProgressCounter {
    completed: Arc<AtomicU64>,
    max: u64,
}

impl ProgressCounter {
    pub fn new(max: u64) -> Self {
        Self {
            completed: Arc::new(AtomicU64::new(0)),
            max,
        }
    }

    pub fn increment(&self) {
        self.advance(1);
    }

    /// Count several units at once, used when a case is abandoned part way.
    pub fn advance(&self, units: u64) {
        self.completed.fetch_add(units, Ordering::AcqRel);
    }

    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Acquire)
    }

    pub fn max(&self) -> u64 {
        self.max
    }

    /// Percentage in `0.0..=100.0`; an empty run is complete.
    pub fn percentage(&self) -> f64 {
        if self.max == 0 {
            return 100.0;
        }
        let completed = self.completed().min(self.max);
        completed as f64 * 100.0 / self.max as f64
    }
}
