use std::time::{Duration, Instant};

use tokio::sync::mpsc;

use crate::PAGE_SIZE;

/// Sending half of the progress channel handed to the page tasks.
///
/// Tasks only post increments; whoever owns the receiver accumulates them on
/// its own schedule.
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    tx: mpsc::UnboundedSender<usize>,
}

impl ProgressReporter {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<usize>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// A dropped receiver only means nobody is watching.
    pub fn report(&self, lots: usize) {
        let _ = self.tx.send(lots);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub loaded: usize,
    pub elapsed: Duration,
    pub eta: Duration,
}

impl ProgressSnapshot {
    /// Splits the ETA into whole minutes and remaining seconds.
    pub fn eta_min_sec(&self) -> (u64, u64) {
        let secs = self.eta.as_secs();
        (secs / 60, secs % 60)
    }
}

/// Running total of the increments received so far.
#[derive(Debug)]
pub struct ProgressTracker {
    total_pages: u32,
    loaded: usize,
    started: Instant,
}

impl ProgressTracker {
    pub fn new(total_pages: u32) -> Self {
        Self::started_at(total_pages, Instant::now())
    }

    pub fn started_at(total_pages: u32, started: Instant) -> Self {
        Self {
            total_pages,
            loaded: 0,
            started,
        }
    }

    pub fn total_lots(&self) -> usize {
        self.total_pages as usize * PAGE_SIZE
    }

    pub fn record(&mut self, lots: usize) -> ProgressSnapshot {
        self.record_at(lots, Instant::now())
    }

    pub fn record_at(&mut self, lots: usize, now: Instant) -> ProgressSnapshot {
        self.loaded += lots;
        self.snapshot_at(now)
    }

    /// `eta = elapsed / completed_pages * remaining_pages`, with at least one completed page.
    pub fn snapshot_at(&self, now: Instant) -> ProgressSnapshot {
        let elapsed = now.saturating_duration_since(self.started);
        let completed_pages = self.loaded / PAGE_SIZE;
        let remaining_pages = (self.total_pages as usize).saturating_sub(completed_pages);
        let eta = elapsed.mul_f64(remaining_pages as f64 / completed_pages.max(1) as f64);

        ProgressSnapshot {
            loaded: self.loaded,
            elapsed,
            eta,
        }
    }
}
