//! Shared completion and byte counters.
//!
//! Every worker holds an `Arc<ProgressState>` and reports into it; a display
//! layer polls [`ProgressState::report`] on a timer. All counters sit behind
//! one mutex, so a snapshot is always internally consistent.
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct Counters {
    total_bytes: u64,
    total_segments: usize,
    completed_segments: usize,
    downloaded_bytes: u64,
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub completed_segments: usize,
    pub total_segments: usize,
    pub downloaded_bytes: u64,
    pub total_bytes: u64,
}

impl ProgressSnapshot {
    /// True once every planned segment has returned, successful or not.
    pub fn all_returned(&self) -> bool {
        self.total_segments > 0 && self.completed_segments == self.total_segments
    }
}

#[derive(Debug, Default)]
pub struct ProgressState {
    inner: Mutex<Counters>,
}

impl ProgressState {
    pub fn new() -> Self {
        Self::default()
    }

    // A panicking worker cannot leave the counters half-updated, so a
    // poisoned lock still guards valid data.
    fn lock(&self) -> MutexGuard<'_, Counters> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Resets the counters for a new plan. Called once before workers start.
    pub fn begin(&self, total_bytes: u64, total_segments: usize) {
        *self.lock() = Counters {
            total_bytes,
            total_segments,
            ..Counters::default()
        };
    }

    pub fn add_bytes(&self, n: u64) {
        let mut counters = self.lock();
        counters.downloaded_bytes = counters.downloaded_bytes.saturating_add(n);
    }

    /// Records that one worker has returned.
    pub fn segment_finished(&self) {
        let mut counters = self.lock();
        if counters.completed_segments < counters.total_segments {
            counters.completed_segments += 1;
        } else {
            tracing::warn!(
                total = counters.total_segments,
                "segment finished after all segments were accounted for"
            );
        }
    }

    pub fn report(&self) -> ProgressSnapshot {
        let counters = self.lock();
        ProgressSnapshot {
            completed_segments: counters.completed_segments,
            total_segments: counters.total_segments,
            downloaded_bytes: counters.downloaded_bytes,
            total_bytes: counters.total_bytes,
        }
    }
}
