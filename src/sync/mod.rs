//! Blocking command facade.
//!
//! [`SyncCommands`] wraps any [`AsyncCommands`] client and turns each
//! command into a blocking call: dispatch, pick the wait budget, park until
//! the reply resolves or the budget runs out.
//!
//! ```ignore
//! let redis = SyncCommands::new(RespConnection::connect(&handle, options)?);
//! redis.set("greeting", "hello")?;
//! let value: Option<Bytes> = redis.get("greeting")?;
//! ```
//!
//! Nothing here retries, and nothing may be called from the client's own
//! I/O task.

use crate::client::AsyncCommands;
use crate::commands::CommandSet;
use crate::core::error::{BridgeError, BridgeResult};
use crate::core::timeout::resolve_timeout;
use crate::ops::stats::WaitStats;
use crate::pending::PendingReply;
use crate::protocol::{Command, FromRedisValue, RedisValue};
use sha1::{Digest, Sha1};
use std::sync::Arc;
use std::time::Duration;

/// Blocking view of an async client.
pub struct SyncCommands<C> {
    client: C,
    stats: Arc<WaitStats>,
}

impl<C: AsyncCommands> SyncCommands<C> {
    /// Wrap `client` with private wait statistics.
    pub fn new(client: C) -> Self {
        Self::with_stats(client, Arc::new(WaitStats::new()))
    }

    /// Wrap `client`, recording outcomes into shared statistics.
    pub fn with_stats(client: C, stats: Arc<WaitStats>) -> Self {
        Self { client, stats }
    }

    /// The wrapped async client.
    pub fn client(&self) -> &C {
        &self.client
    }

    /// Unwrap the async client.
    pub fn into_inner(self) -> C {
        self.client
    }

    /// Wait statistics.
    pub fn stats(&self) -> &Arc<WaitStats> {
        &self.stats
    }

    /// Run any command and return its raw reply.
    pub fn execute(&self, command: Command) -> BridgeResult<RedisValue> {
        self.invoke(command)
    }

    /// The budget a blocking call for `command` would wait.
    pub fn timeout_for(&self, command: &Command) -> Duration {
        resolve_timeout(&command.name, command.timeout, self.client.timeout_policy())
    }

    /// SHA1 digest of a script, as EVALSHA expects. Computed locally.
    pub fn digest(&self, script: &str) -> String {
        script_digest(script)
    }

    /// Check if the underlying connection is usable. Does not block.
    pub fn is_open(&self) -> bool {
        self.client.is_open()
    }
}

impl<C: AsyncCommands> CommandSet for SyncCommands<C> {
    type Output<T: FromRedisValue + Send + 'static> = BridgeResult<T>;

    fn invoke<T: FromRedisValue + Send + 'static>(&self, command: Command) -> BridgeResult<T> {
        let timeout = self.timeout_for(&command);
        let pending = self.client.dispatch(command).typed::<T>();
        wait_recorded(pending, timeout, &self.stats)
    }
}

impl<C: AsyncCommands> std::fmt::Debug for SyncCommands<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncCommands")
            .field("open", &self.client.is_open())
            .field("stats", &self.stats.snapshot())
            .finish()
    }
}

/// Wait on `pending`, then record and log the outcome.
pub(crate) fn wait_recorded<T>(
    pending: PendingReply<T>,
    timeout: Duration,
    stats: &WaitStats,
) -> BridgeResult<T> {
    let command = pending.command().to_string();
    let outcome = pending.wait(timeout);
    stats.record(&outcome);

    match &outcome {
        Err(BridgeError::Timeout { timeout }) => {
            tracing::debug!(command = %command, timeout_ms = timeout.as_millis() as u64, "wait timed out");
        }
        Err(BridgeError::Cancelled { reason }) => {
            tracing::debug!(command = %command, reason = %reason, "wait cancelled");
        }
        _ => {}
    }
    outcome
}

/// Lowercase hex SHA1 of a script body.
pub fn script_digest(script: &str) -> String {
    hex::encode(Sha1::digest(script.as_bytes()))
}
