//! Pending replies.
//!
//! An async client hands out a [`PendingReply`] for every dispatched
//! command and keeps the matching [`ReplyCompleter`]. The client's I/O task
//! fills the completer; a caller thread blocks on the reply with
//! [`PendingReply::wait`].
//!
//! ```text
//!            resolve / fail
//!   Pending ───────────────► Resolved | Failed
//!      │
//!      ├── deadline ───────► TimedOut
//!      └── cancel / drop ──► Cancelled
//! ```
//!
//! Every terminal state is final. Completing a reply that already timed
//! out or was cancelled is a no-op, so late replies are discarded.

mod wait;

pub use wait::await_or_cancel;

use crate::core::error::{BridgeError, BridgeResult};
use crate::protocol::{Command, FromRedisValue, RedisValue};
use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Lifecycle state of a pending reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyState {
    /// No outcome yet.
    Pending,
    /// The server replied.
    Resolved,
    /// The command failed.
    Failed,
    /// The wait was cancelled.
    Cancelled,
    /// The wait budget elapsed first.
    TimedOut,
}

impl ReplyState {
    /// Check if this state is terminal.
    pub fn is_terminal(self) -> bool {
        self != Self::Pending
    }
}

type CancelHook = Box<dyn FnOnce() + Send>;

struct Slot {
    state: ReplyState,
    outcome: Option<BridgeResult<RedisValue>>,
    on_cancel: Option<CancelHook>,
    watcher: Option<Arc<CompletionSignal>>,
}

impl Slot {
    /// Leave `Pending` without an outcome, returning what must run unlocked.
    fn time_out(&mut self) -> (Option<CancelHook>, Option<Arc<CompletionSignal>>) {
        self.state = ReplyState::TimedOut;
        (self.on_cancel.take(), self.watcher.clone())
    }
}

pub(crate) struct Shared {
    slot: Mutex<Slot>,
    ready: Condvar,
}

impl Shared {
    fn new() -> Self {
        Self {
            slot: Mutex::new(Slot {
                state: ReplyState::Pending,
                outcome: None,
                on_cancel: None,
                watcher: None,
            }),
            ready: Condvar::new(),
        }
    }

    fn state(&self) -> ReplyState {
        self.slot.lock().state
    }

    /// Move out of `Pending`. Returns the cancel hook when the move stops
    /// the command before it completed, so the caller can run it unlocked.
    fn finish(
        &self,
        state: ReplyState,
        outcome: BridgeResult<RedisValue>,
    ) -> Option<Option<CancelHook>> {
        let mut slot = self.slot.lock();
        if slot.state.is_terminal() {
            return None;
        }
        slot.state = state;
        slot.outcome = Some(outcome);
        let hook = slot.on_cancel.take();
        let watcher = slot.watcher.clone();
        drop(slot);
        self.ready.notify_all();
        if let Some(watcher) = watcher {
            watcher.signal();
        }
        Some(hook)
    }

    fn watch(&self, signal: Arc<CompletionSignal>) {
        let mut slot = self.slot.lock();
        let done = slot.state.is_terminal();
        slot.watcher = Some(Arc::clone(&signal));
        drop(slot);
        if done {
            signal.signal();
        }
    }

    fn on_cancel(&self, hook: CancelHook) {
        let mut slot = self.slot.lock();
        match slot.state {
            ReplyState::Pending => slot.on_cancel = Some(hook),
            ReplyState::Cancelled | ReplyState::TimedOut => {
                drop(slot);
                hook();
            }
            ReplyState::Resolved | ReplyState::Failed => {}
        }
    }

    fn cancel(&self, reason: String) -> bool {
        match self.finish(ReplyState::Cancelled, Err(BridgeError::Cancelled { reason })) {
            Some(hook) => {
                if let Some(hook) = hook {
                    hook();
                }
                true
            }
            None => false,
        }
    }
}

/// Wakes a thread watching several replies when any one of them finishes.
///
/// Each finish bumps a generation counter, so a watcher that read the
/// generation before checking its replies cannot miss a wakeup.
#[derive(Debug, Default)]
pub(crate) struct CompletionSignal {
    generation: Mutex<u64>,
    changed: Condvar,
}

impl CompletionSignal {
    pub(crate) fn generation(&self) -> u64 {
        *self.generation.lock()
    }

    fn signal(&self) {
        *self.generation.lock() += 1;
        self.changed.notify_all();
    }

    /// Park until the generation moves past `seen` or `deadline` passes.
    /// With no deadline, parks until the next signal.
    pub(crate) fn wait_past(&self, seen: u64, deadline: Option<Instant>) {
        let mut generation = self.generation.lock();
        while *generation == seen {
            match deadline {
                Some(deadline) => {
                    if self.changed.wait_until(&mut generation, deadline).timed_out() {
                        return;
                    }
                }
                None => self.changed.wait(&mut generation),
            }
        }
    }
}

type Convert<T> = Box<dyn FnOnce(RedisValue) -> BridgeResult<T> + Send>;

fn identity(value: RedisValue) -> BridgeResult<RedisValue> {
    Ok(value)
}

/// The read side of a dispatched command.
///
/// Consumed by [`wait`](Self::wait), so a reply can be waited on at most
/// once.
pub struct PendingReply<T> {
    shared: Arc<Shared>,
    command: String,
    timeout: Option<Duration>,
    convert: Convert<T>,
}

/// The write side of a dispatched command, held by the async client.
///
/// Dropping a completer without completing it cancels the reply.
pub struct ReplyCompleter {
    shared: Arc<Shared>,
    done: bool,
}

/// Cancels a pending reply from another thread.
#[derive(Clone)]
pub struct CancelHandle {
    shared: Arc<Shared>,
}

/// Create a linked completer and pending reply for a command.
pub fn reply_pair(command: &Command) -> (ReplyCompleter, PendingReply<RedisValue>) {
    let shared = Arc::new(Shared::new());
    let completer = ReplyCompleter {
        shared: Arc::clone(&shared),
        done: false,
    };
    let pending = PendingReply {
        shared,
        command: command.name.clone(),
        timeout: command.timeout,
        convert: Box::new(identity),
    };
    (completer, pending)
}

impl PendingReply<RedisValue> {
    /// A reply that is already complete.
    pub fn ready(command: &Command, outcome: BridgeResult<RedisValue>) -> Self {
        let (completer, pending) = reply_pair(command);
        completer.complete(outcome);
        pending
    }

    /// Convert the reply to `T` when it is waited on.
    pub fn typed<T: FromRedisValue + 'static>(self) -> PendingReply<T> {
        self.map(T::from_redis_value)
    }
}

impl<T: 'static> PendingReply<T> {
    /// Chain a further conversion onto the reply.
    pub fn map<U: 'static, F>(self, f: F) -> PendingReply<U>
    where
        F: FnOnce(T) -> BridgeResult<U> + Send + 'static,
    {
        let convert = self.convert;
        PendingReply {
            shared: self.shared,
            command: self.command,
            timeout: self.timeout,
            convert: Box::new(move |value| convert(value).and_then(f)),
        }
    }
}

impl<T> PendingReply<T> {
    /// Name of the command this reply belongs to.
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Wait override carried from the command.
    pub fn timeout_override(&self) -> Option<Duration> {
        self.timeout
    }

    /// Current state, without blocking.
    pub fn state(&self) -> ReplyState {
        self.shared.state()
    }

    /// Check if an outcome is available, without blocking.
    pub fn is_done(&self) -> bool {
        self.state().is_terminal()
    }

    /// Register a hook that runs if this reply times out or is cancelled
    /// before completion. Replaces any earlier hook.
    pub fn on_cancel(&self, hook: impl FnOnce() + Send + 'static) {
        self.shared.on_cancel(Box::new(hook));
    }

    /// Signal `signal` when this reply leaves `Pending`.
    pub(crate) fn watch(&self, signal: Arc<CompletionSignal>) {
        self.shared.watch(signal);
    }

    /// A handle that can cancel this reply from elsewhere.
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Block for at most `timeout` and return the outcome.
    ///
    /// Must not be called from the async client's own I/O task.
    pub fn wait(self, timeout: Duration) -> BridgeResult<T> {
        await_or_cancel(self, timeout)
    }
}

impl<T> fmt::Debug for PendingReply<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingReply")
            .field("command", &self.command)
            .field("timeout", &self.timeout)
            .field("state", &self.state())
            .finish()
    }
}

impl ReplyCompleter {
    /// Complete with a reply. Error replies fail the command.
    pub fn resolve(self, value: RedisValue) -> bool {
        match value.into_result() {
            Ok(value) => self.finish(ReplyState::Resolved, Ok(value)),
            Err(e) => self.fail(BridgeError::Remote(e)),
        }
    }

    /// Complete with a failure.
    pub fn fail(self, error: BridgeError) -> bool {
        self.finish(ReplyState::Failed, Err(error))
    }

    /// Complete with either outcome.
    pub fn complete(self, outcome: BridgeResult<RedisValue>) -> bool {
        match outcome {
            Ok(value) => self.resolve(value),
            Err(e) => self.fail(e),
        }
    }

    /// Check if the reply stopped waiting (timed out or cancelled).
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self.shared.state(),
            ReplyState::Cancelled | ReplyState::TimedOut
        )
    }

    /// Register a hook that runs if the reply times out or is cancelled
    /// before completion. Runs immediately if that already happened.
    pub fn on_cancel(&self, hook: impl FnOnce() + Send + 'static) {
        self.shared.on_cancel(Box::new(hook));
    }

    fn finish(mut self, state: ReplyState, outcome: BridgeResult<RedisValue>) -> bool {
        self.done = true;
        // The hook only matters while the command is outstanding.
        self.shared.finish(state, outcome).is_some()
    }
}

impl Drop for ReplyCompleter {
    fn drop(&mut self) {
        if !self.done {
            let outcome = Err(BridgeError::cancelled("reply abandoned"));
            if let Some(Some(hook)) = self.shared.finish(ReplyState::Cancelled, outcome) {
                hook();
            }
        }
    }
}

impl fmt::Debug for ReplyCompleter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplyCompleter")
            .field("state", &self.shared.state())
            .finish()
    }
}

impl CancelHandle {
    /// Cancel the reply. Returns false if it already finished.
    pub fn cancel(&self, reason: impl Into<String>) -> bool {
        self.shared.cancel(reason.into())
    }

    /// Check if the reply reached a terminal state.
    pub fn is_done(&self) -> bool {
        self.shared.state().is_terminal()
    }
}

impl fmt::Debug for CancelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelHandle")
            .field("state", &self.shared.state())
            .finish()
    }
}
