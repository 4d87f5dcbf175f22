//! Command pipelining support.
//!
//! Replies arrive in the order commands were written, so the connection
//! keeps one FIFO of completers and hands each reply to the oldest.

use crate::core::error::BridgeError;
use crate::pending::ReplyCompleter;
use crate::protocol::RedisValue;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Maximum commands written in one flush.
    pub max_batch: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self { max_batch: 64 }
    }
}

/// Completers for commands written and not yet answered.
#[derive(Debug, Default)]
pub struct InFlight {
    completers: VecDeque<ReplyCompleter>,
}

impl InFlight {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of outstanding replies.
    pub fn len(&self) -> usize {
        self.completers.len()
    }

    /// Check if no reply is outstanding.
    pub fn is_empty(&self) -> bool {
        self.completers.is_empty()
    }

    /// Track a written command.
    pub fn push(&mut self, completer: ReplyCompleter) {
        self.completers.push_back(completer);
    }

    /// Hand a reply to the oldest outstanding command.
    ///
    /// Returns `Err(reply)` if nothing is outstanding. A reply whose caller
    /// stopped waiting is consumed and discarded.
    pub fn complete_next(&mut self, reply: RedisValue) -> Result<(), RedisValue> {
        match self.completers.pop_front() {
            Some(completer) => {
                completer.resolve(reply);
                Ok(())
            }
            None => Err(reply),
        }
    }

    /// Fail every outstanding command.
    pub fn fail_all(&mut self, error: &BridgeError) -> usize {
        let count = self.completers.len();
        for completer in self.completers.drain(..) {
            completer.fail(error.clone());
        }
        count
    }
}

/// Pipeline metrics.
#[derive(Debug, Default)]
pub struct PipelineMetrics {
    /// Total flushes.
    pub batches_total: AtomicUsize,

    /// Total commands written.
    pub commands_total: AtomicUsize,

    /// Commands skipped because their caller stopped waiting.
    pub skipped_total: AtomicUsize,

    /// Largest observed batch.
    pub max_batch_observed: AtomicUsize,
}

impl PipelineMetrics {
    /// Record a flush of `depth` commands.
    pub fn record_batch(&self, depth: usize) {
        self.batches_total.fetch_add(1, Ordering::Relaxed);
        self.commands_total.fetch_add(depth, Ordering::Relaxed);

        let mut current_max = self.max_batch_observed.load(Ordering::Relaxed);
        while depth > current_max {
            match self.max_batch_observed.compare_exchange_weak(
                current_max,
                depth,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(x) => current_max = x,
            }
        }
    }

    /// Record a command that was dropped before writing.
    pub fn record_skipped(&self) {
        self.skipped_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Get average batch size.
    pub fn average_batch(&self) -> f64 {
        let total = self.batches_total.load(Ordering::Relaxed);
        if total == 0 {
            return 0.0;
        }
        self.commands_total.load(Ordering::Relaxed) as f64 / total as f64
    }
}
