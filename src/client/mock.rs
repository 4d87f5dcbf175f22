//! Scripted in-process client.
//!
//! Answers commands from a per-command-name script instead of a server.
//! Replies can be delayed (completed later on the runtime), fail, or never
//! arrive. A delayed reply whose caller stops waiting is aborted.

use super::AsyncCommands;
use crate::core::error::BridgeError;
use crate::core::timeout::TimeoutPolicy;
use crate::pending::{reply_pair, PendingReply, ReplyCompleter};
use crate::protocol::{Command, RedisError, RedisValue};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;

#[derive(Debug, Clone)]
enum Outcome {
    Value(RedisValue),
    Error(BridgeError),
    Never,
}

/// A scripted reply.
#[derive(Debug, Clone)]
pub struct MockReply {
    outcome: Outcome,
    delay: Duration,
}

impl MockReply {
    /// Reply with a value.
    pub fn value(value: RedisValue) -> Self {
        Self {
            outcome: Outcome::Value(value),
            delay: Duration::ZERO,
        }
    }

    /// Reply `+OK`.
    pub fn ok() -> Self {
        Self::value(RedisValue::ok())
    }

    /// Fail with an error.
    pub fn error(error: BridgeError) -> Self {
        Self {
            outcome: Outcome::Error(error),
            delay: Duration::ZERO,
        }
    }

    /// Fail with a server error reply.
    pub fn remote(error: RedisError) -> Self {
        Self::error(BridgeError::Remote(error))
    }

    /// Never reply.
    pub fn never() -> Self {
        Self {
            outcome: Outcome::Never,
            delay: Duration::ZERO,
        }
    }

    /// Complete after `delay` instead of immediately.
    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[derive(Default)]
struct Script {
    replies: HashMap<String, MockReply>,
    fallback: Option<MockReply>,
    received: Vec<Command>,
    // Completers for replies that never arrive, kept so they stay pending.
    parked: Vec<ReplyCompleter>,
}

/// Scripted [`AsyncCommands`] implementation.
pub struct MockClient {
    handle: Handle,
    script: Mutex<Script>,
    timeouts: TimeoutPolicy,
    open: AtomicBool,
    aborted: Arc<AtomicUsize>,
}

impl MockClient {
    /// Create a client whose delayed replies run on `handle`.
    pub fn new(handle: Handle) -> Self {
        Self {
            handle,
            script: Mutex::new(Script::default()),
            timeouts: TimeoutPolicy::new(),
            open: AtomicBool::new(true),
            aborted: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Use `timeouts` as this client's policy.
    pub fn with_timeouts(mut self, timeouts: TimeoutPolicy) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Script the reply for a command name.
    pub fn on(self, command: &str, reply: MockReply) -> Self {
        self.respond(command, reply);
        self
    }

    /// Script the reply for any command without its own entry.
    pub fn otherwise(self, reply: MockReply) -> Self {
        self.script.lock().fallback = Some(reply);
        self
    }

    /// Replace the reply for a command name.
    pub fn respond(&self, command: &str, reply: MockReply) {
        self.script
            .lock()
            .replies
            .insert(command.to_uppercase(), reply);
    }

    /// Mark the client closed; later commands fail with a connection error.
    pub fn close(&self) {
        self.open.store(false, Ordering::Release);
    }

    /// Commands received so far, in order.
    pub fn received(&self) -> Vec<Command> {
        self.script.lock().received.clone()
    }

    /// Number of delayed replies aborted because their caller stopped
    /// waiting.
    pub fn aborted(&self) -> usize {
        self.aborted.load(Ordering::SeqCst)
    }
}

impl AsyncCommands for MockClient {
    fn dispatch(&self, command: Command) -> PendingReply<RedisValue> {
        let (completer, pending) = reply_pair(&command);

        if !self.is_open() {
            completer.fail(BridgeError::connection("mock client is closed"));
            return pending;
        }

        let reply = {
            let mut script = self.script.lock();
            script.received.push(command.clone());
            script
                .replies
                .get(&command.name)
                .or(script.fallback.as_ref())
                .cloned()
        };

        let reply = match reply {
            Some(reply) => reply,
            None => {
                let message = format!("unknown command '{}'", command.name);
                completer.resolve(RedisValue::Error(RedisError::generic(message)));
                return pending;
            }
        };

        match reply.outcome {
            Outcome::Never => self.script.lock().parked.push(completer),
            outcome if reply.delay.is_zero() => complete(completer, outcome),
            outcome => {
                let delay = reply.delay;
                let task = self.handle.spawn(async move {
                    tokio::time::sleep(delay).await;
                    complete(completer, outcome);
                });
                let abort = task.abort_handle();
                let aborted = Arc::clone(&self.aborted);
                pending.on_cancel(move || {
                    abort.abort();
                    aborted.fetch_add(1, Ordering::SeqCst);
                });
            }
        }

        pending
    }

    fn timeout_policy(&self) -> &TimeoutPolicy {
        &self.timeouts
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }
}

fn complete(completer: ReplyCompleter, outcome: Outcome) {
    match outcome {
        Outcome::Value(value) => {
            completer.resolve(value);
        }
        Outcome::Error(error) => {
            completer.fail(error);
        }
        Outcome::Never => {}
    }
}
