//! Per-node results of a fan-out call.
//!
//! An [`Executions`] is returned as soon as the command has been dispatched
//! to every selected node. Nothing blocks until a result is asked for, and
//! each node is waited on at most once: its outcome is cached for later
//! calls.

use super::topology::NodeId;
use crate::core::error::{BridgeError, BridgeResult};
use crate::ops::stats::WaitStats;
use crate::pending::{CancelHandle, CompletionSignal, PendingReply};
use crate::sync::wait_recorded;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

struct NodeCell<T> {
    pending: Option<PendingReply<T>>,
    outcome: Option<BridgeResult<T>>,
}

struct NodeEntry<T> {
    node: NodeId,
    timeout: Duration,
    /// Reads the reply state without taking `cell`.
    handle: CancelHandle,
    cell: Mutex<NodeCell<T>>,
}

/// The outstanding results of one command sent to several nodes.
pub struct Executions<T> {
    entries: Vec<NodeEntry<T>>,
    finished: Arc<CompletionSignal>,
    stats: Arc<WaitStats>,
}

impl<T> Executions<T> {
    /// Wrap dispatched replies, one per node, with their wait budgets.
    pub fn new(replies: Vec<(NodeId, PendingReply<T>, Duration)>, stats: Arc<WaitStats>) -> Self {
        let finished = Arc::new(CompletionSignal::default());
        let entries = replies
            .into_iter()
            .map(|(node, pending, timeout)| {
                pending.watch(Arc::clone(&finished));
                NodeEntry {
                    node,
                    timeout,
                    handle: pending.cancel_handle(),
                    cell: Mutex::new(NodeCell {
                        pending: Some(pending),
                        outcome: None,
                    }),
                }
            })
            .collect();
        Self {
            entries,
            finished,
            stats,
        }
    }

    /// Number of selected nodes. Does not block.
    pub fn size(&self) -> usize {
        self.entries.len()
    }

    /// Check if no node was selected.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Selected nodes, in selection order. Does not block.
    pub fn nodes(&self) -> Vec<NodeId> {
        self.entries.iter().map(|e| e.node.clone()).collect()
    }

    /// Check if `node`'s outcome is available without blocking, even while
    /// another thread waits on it.
    pub fn is_ready(&self, node: &NodeId) -> bool {
        self.entry(node).is_some_and(|entry| entry.handle.is_done())
    }

    /// Wait on every node and return every outcome, consuming the
    /// executions. Never clones values.
    pub fn into_results(self) -> HashMap<NodeId, BridgeResult<T>> {
        let stats = self.stats;
        self.entries
            .into_iter()
            .map(|entry| {
                let cell = entry.cell.into_inner();
                let outcome = match (cell.outcome, cell.pending) {
                    (Some(outcome), _) => outcome,
                    (None, Some(pending)) => wait_node(pending, entry.timeout, entry.timeout, &stats),
                    (None, None) => Err(BridgeError::cancelled("result already taken")),
                };
                (entry.node, outcome)
            })
            .collect()
    }

    fn entry(&self, node: &NodeId) -> Option<&NodeEntry<T>> {
        self.entries.iter().find(|e| &e.node == node)
    }

    /// Fill the entry's cached outcome, waiting at most `budget` when the
    /// reply is still pending.
    fn settle_entry(&self, entry: &NodeEntry<T>, cell: &mut NodeCell<T>, budget: Duration) {
        if cell.outcome.is_some() {
            return;
        }
        if let Some(pending) = cell.pending.take() {
            let budget = if pending.is_done() { Duration::ZERO } else { budget };
            cell.outcome = Some(wait_node(pending, budget, entry.timeout, &self.stats));
        }
    }
}

impl<T: Clone> Executions<T> {
    /// Result for one node, blocking on that node only.
    ///
    /// Repeated calls return the cached outcome without waiting again.
    pub fn result_for(&self, node: &NodeId) -> BridgeResult<T> {
        let entry = self.entry(node).ok_or_else(|| BridgeError::UnknownNode {
            node: node.clone(),
        })?;
        let mut cell = entry.cell.lock();
        self.settle_entry(entry, &mut cell, entry.timeout);
        cached(&cell)
    }

    /// Every node's value, or the first failure to arrive.
    ///
    /// Nodes are watched together rather than in selection order, so a
    /// failure is reported as soon as it lands even while other nodes are
    /// still pending. Each node keeps its own budget, counted from this
    /// call. The failure is attributed with [`BridgeError::Node`].
    pub fn all_results(&self) -> BridgeResult<HashMap<NodeId, T>> {
        let start = Instant::now();
        loop {
            let seen = self.finished.generation();
            let now = Instant::now();
            let mut next_deadline: Option<Instant> = None;
            let mut outstanding = false;

            for entry in &self.entries {
                let deadline = start.checked_add(entry.timeout);
                let expired = deadline.is_some_and(|d| now >= d);
                if !entry.handle.is_done() && !expired {
                    outstanding = true;
                    if let Some(d) = deadline {
                        next_deadline = Some(next_deadline.map_or(d, |n| n.min(d)));
                    }
                    continue;
                }

                let mut cell = entry.cell.lock();
                self.settle_entry(entry, &mut cell, Duration::ZERO);
                if let Some(Err(e)) = &cell.outcome {
                    return Err(e.clone().for_node(entry.node.clone()));
                }
            }

            if !outstanding {
                break;
            }
            self.finished.wait_past(seen, next_deadline);
        }

        let mut results = HashMap::with_capacity(self.entries.len());
        for entry in &self.entries {
            let value = cached(&entry.cell.lock()).map_err(|e| e.for_node(entry.node.clone()))?;
            results.insert(entry.node.clone(), value);
        }
        Ok(results)
    }

    /// Every node's outcome, one entry per node.
    pub fn settle(&self) -> HashMap<NodeId, BridgeResult<T>> {
        self.entries
            .iter()
            .map(|entry| {
                let mut cell = entry.cell.lock();
                self.settle_entry(entry, &mut cell, entry.timeout);
                (entry.node.clone(), cached(&cell))
            })
            .collect()
    }
}

/// Wait on one node. A timeout reports the node's full budget even when
/// the final check was made with less.
fn wait_node<T>(
    pending: PendingReply<T>,
    budget: Duration,
    timeout: Duration,
    stats: &WaitStats,
) -> BridgeResult<T> {
    match wait_recorded(pending, budget, stats) {
        Err(BridgeError::Timeout { .. }) => Err(BridgeError::Timeout { timeout }),
        outcome => outcome,
    }
}

fn cached<T: Clone>(cell: &NodeCell<T>) -> BridgeResult<T> {
    match &cell.outcome {
        Some(outcome) => outcome.clone(),
        None => Err(BridgeError::cancelled("result already taken")),
    }
}

impl<T> fmt::Debug for Executions<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Executions")
            .field("nodes", &self.nodes())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pending::{reply_pair, ReplyCompleter};
    use crate::protocol::{Command, RedisError, RedisValue};
    use std::thread;
    use std::time::Instant;

    fn fan_out(
        nodes: &[&str],
        timeout: Duration,
    ) -> (Vec<ReplyCompleter>, Executions<RedisValue>, Arc<WaitStats>) {
        let stats = Arc::new(WaitStats::new());
        let mut completers = Vec::new();
        let mut replies = Vec::new();
        for node in nodes {
            let (completer, pending) = reply_pair(&Command::new("DBSIZE"));
            completers.push(completer);
            replies.push((NodeId::new(*node), pending, timeout));
        }
        (completers, Executions::new(replies, Arc::clone(&stats)), stats)
    }

    #[test]
    fn test_size_and_nodes_never_block() {
        let (_completers, executions, stats) = fan_out(&["a", "b", "c"], Duration::from_secs(60));
        let start = Instant::now();
        assert_eq!(executions.size(), 3);
        assert_eq!(executions.nodes(), executions.nodes());
        assert_eq!(executions.nodes()[1], NodeId::new("b"));
        assert!(!executions.is_ready(&NodeId::new("a")));
        assert!(start.elapsed() < Duration::from_millis(50));
        assert_eq!(stats.snapshot().total(), 0);
    }

    #[test]
    fn test_result_for_waits_on_one_node_and_caches() {
        let (mut completers, executions, stats) = fan_out(&["a", "b"], Duration::from_secs(5));
        let b = completers.pop().unwrap();
        b.resolve(RedisValue::integer(7));

        let node_b = NodeId::new("b");
        assert_eq!(executions.result_for(&node_b).unwrap(), RedisValue::integer(7));
        assert_eq!(executions.result_for(&node_b).unwrap(), RedisValue::integer(7));
        assert_eq!(stats.snapshot().resolved, 1);
    }

    #[test]
    fn test_unknown_node() {
        let (_completers, executions, _) = fan_out(&["a"], Duration::from_secs(1));
        let err = executions.result_for(&NodeId::new("zz")).unwrap_err();
        assert!(matches!(err, BridgeError::UnknownNode { ref node } if node.as_str() == "zz"));
    }

    #[test]
    fn test_all_results_fails_fast_on_ready_failure() {
        let (mut completers, executions, _) = fan_out(&["slow", "bad"], Duration::from_secs(10));
        let bad = completers.pop().unwrap();
        bad.resolve(RedisValue::Error(RedisError::new("CLUSTERDOWN", "down")));

        let start = Instant::now();
        let err = executions.all_results().unwrap_err();
        assert!(start.elapsed() < Duration::from_secs(1));
        assert_eq!(err.node(), Some(&NodeId::new("bad")));
        assert_eq!(err.remote_error().map(|e| e.kind.as_str()), Some("CLUSTERDOWN"));
    }

    #[test]
    fn test_all_results_reports_late_failure_before_slow_node() {
        // Selection order puts the hanging node ahead of the failing one.
        let (completers, executions, stats) = fan_out(&["a", "c", "b"], Duration::from_secs(3));
        let mut completers = completers.into_iter();
        let (a, _c, b) = (
            completers.next().unwrap(),
            completers.next().unwrap(),
            completers.next().unwrap(),
        );
        a.resolve(RedisValue::integer(1));
        let worker = thread::spawn(move || {
            thread::sleep(Duration::from_millis(100));
            b.resolve(RedisValue::Error(RedisError::new("LOADING", "dataset in memory")));
        });

        assert_eq!(executions.result_for(&NodeId::new("a")).unwrap(), RedisValue::integer(1));

        let start = Instant::now();
        let err = executions.all_results().unwrap_err();
        worker.join().unwrap();

        assert!(start.elapsed() < Duration::from_secs(1));
        assert_eq!(err.node(), Some(&NodeId::new("b")));
        assert!(!err.is_timeout());
        assert_eq!(err.remote_error().map(|e| e.kind.as_str()), Some("LOADING"));
        assert!(!executions.is_ready(&NodeId::new("c")));
        assert_eq!(stats.snapshot().timed_out, 0);
    }

    #[test]
    fn test_all_results_times_out_with_full_budget() {
        let (mut completers, executions, _) = fan_out(&["slow", "ok"], Duration::from_millis(50));
        completers.pop().unwrap().resolve(RedisValue::ok());

        let start = Instant::now();
        let err = executions.all_results().unwrap_err();
        assert!(start.elapsed() >= Duration::from_millis(50));
        assert_eq!(err.node(), Some(&NodeId::new("slow")));
        assert!(matches!(
            err,
            BridgeError::Node { ref source, .. }
                if matches!(**source, BridgeError::Timeout { timeout } if timeout == Duration::from_millis(50))
        ));
    }

    #[test]
    fn test_is_ready_does_not_wait_behind_result_for() {
        let (mut completers, executions, _) = fan_out(&["a"], Duration::from_secs(5));
        let executions = Arc::new(executions);
        let node = NodeId::new("a");

        let waiter = {
            let executions = Arc::clone(&executions);
            let node = node.clone();
            thread::spawn(move || executions.result_for(&node))
        };
        thread::sleep(Duration::from_millis(50));

        let start = Instant::now();
        assert!(!executions.is_ready(&node));
        assert!(start.elapsed() < Duration::from_millis(50));

        completers.pop().unwrap().resolve(RedisValue::ok());
        assert_eq!(waiter.join().unwrap().unwrap(), RedisValue::ok());
        assert!(executions.is_ready(&node));
    }

    #[test]
    fn test_all_results_collects_every_node() {
        let (completers, executions, _) = fan_out(&["a", "b", "c"], Duration::from_secs(5));
        let worker = thread::spawn(move || {
            for (i, completer) in completers.into_iter().enumerate() {
                thread::sleep(Duration::from_millis(10));
                completer.resolve(RedisValue::integer(i as i64));
            }
        });

        let results = executions.all_results().unwrap();
        worker.join().unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[&NodeId::new("c")], RedisValue::integer(2));
    }

    #[test]
    fn test_settle_keeps_every_node() {
        let (mut completers, executions, stats) = fan_out(&["a", "b"], Duration::from_millis(20));
        let _a = completers.remove(0);
        completers.remove(0).resolve(RedisValue::ok());

        let settled = executions.settle();
        assert_eq!(settled.len(), 2);
        assert!(settled[&NodeId::new("a")].as_ref().unwrap_err().is_timeout());
        assert!(settled[&NodeId::new("b")].is_ok());

        let snapshot = stats.snapshot();
        assert_eq!((snapshot.resolved, snapshot.timed_out), (1, 1));
    }

    #[test]
    fn test_into_results_without_clone() {
        let (completers, executions, _) = fan_out(&["a"], Duration::from_secs(1));
        for completer in completers {
            completer.resolve(RedisValue::bulk_string("x"));
        }
        let results = executions.into_results();
        assert_eq!(results[&NodeId::new("a")].as_ref().unwrap(), &RedisValue::bulk_string("x"));
    }
}
