//! Wait outcome counters.

use crate::core::error::{BridgeResult, ErrorKind};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Outcomes of blocking waits, shared by facades via `Arc`.
#[derive(Debug, Default)]
pub struct WaitStats {
    resolved: AtomicU64,
    failed: AtomicU64,
    timed_out: AtomicU64,
    cancelled: AtomicU64,
}

/// Point-in-time copy of [`WaitStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitStatsSnapshot {
    pub resolved: u64,
    pub failed: u64,
    pub timed_out: u64,
    pub cancelled: u64,
}

impl WaitStatsSnapshot {
    /// Total waits recorded.
    pub fn total(&self) -> u64 {
        self.resolved + self.failed + self.timed_out + self.cancelled
    }
}

impl WaitStats {
    /// Create zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one finished wait.
    pub fn record<T>(&self, outcome: &BridgeResult<T>) {
        let counter = match outcome {
            Ok(_) => &self.resolved,
            Err(e) => match e.kind() {
                ErrorKind::Timeout => &self.timed_out,
                ErrorKind::Cancelled => &self.cancelled,
                ErrorKind::Remote | ErrorKind::Usage => &self.failed,
            },
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Read all counters.
    pub fn snapshot(&self) -> WaitStatsSnapshot {
        WaitStatsSnapshot {
            resolved: self.resolved.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            timed_out: self.timed_out.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
        }
    }
}
