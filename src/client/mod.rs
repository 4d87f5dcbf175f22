//! Asynchronous command clients.
//!
//! [`AsyncCommands`] is the seam between the blocking layers and the
//! transport. A client dispatches a [`Command`] and immediately returns a
//! [`PendingReply`]; its own I/O task completes the reply later.
//!
//! - [`connection`] - Pipelined RESP connection over tokio TCP
//! - [`mock`] - Scripted in-process client
//! - [`pipeline`] - In-flight reply tracking

pub mod connection;
pub mod mock;
pub mod pipeline;

pub use connection::{ConnectionOptions, ConnectionStats, RespConnection};
pub use mock::{MockClient, MockReply};

use crate::commands::CommandSet;
use crate::core::timeout::TimeoutPolicy;
use crate::pending::PendingReply;
use crate::protocol::{Command, FromRedisValue, RedisValue};
use std::sync::Arc;

/// A client that answers commands with pending replies.
pub trait AsyncCommands: Send + Sync {
    /// Send a command. Never blocks.
    fn dispatch(&self, command: Command) -> PendingReply<RedisValue>;

    /// Timeouts configured for this connection.
    fn timeout_policy(&self) -> &TimeoutPolicy;

    /// Check if the connection can still carry commands.
    fn is_open(&self) -> bool;
}

impl<C: AsyncCommands + ?Sized> AsyncCommands for Arc<C> {
    fn dispatch(&self, command: Command) -> PendingReply<RedisValue> {
        (**self).dispatch(command)
    }

    fn timeout_policy(&self) -> &TimeoutPolicy {
        (**self).timeout_policy()
    }

    fn is_open(&self) -> bool {
        (**self).is_open()
    }
}

impl<C: AsyncCommands + ?Sized> AsyncCommands for Box<C> {
    fn dispatch(&self, command: Command) -> PendingReply<RedisValue> {
        (**self).dispatch(command)
    }

    fn timeout_policy(&self) -> &TimeoutPolicy {
        (**self).timeout_policy()
    }

    fn is_open(&self) -> bool {
        (**self).is_open()
    }
}

impl<C: AsyncCommands + ?Sized> AsyncCommands for &C {
    fn dispatch(&self, command: Command) -> PendingReply<RedisValue> {
        (**self).dispatch(command)
    }

    fn timeout_policy(&self) -> &TimeoutPolicy {
        (**self).timeout_policy()
    }

    fn is_open(&self) -> bool {
        (**self).is_open()
    }
}

// Command methods on an async client hand back the pending reply itself.

impl CommandSet for RespConnection {
    type Output<T: FromRedisValue + Send + 'static> = PendingReply<T>;

    fn invoke<T: FromRedisValue + Send + 'static>(&self, command: Command) -> PendingReply<T> {
        self.dispatch(command).typed()
    }
}

impl CommandSet for MockClient {
    type Output<T: FromRedisValue + Send + 'static> = PendingReply<T>;

    fn invoke<T: FromRedisValue + Send + 'static>(&self, command: Command) -> PendingReply<T> {
        self.dispatch(command).typed()
    }
}

impl CommandSet for dyn AsyncCommands {
    type Output<T: FromRedisValue + Send + 'static> = PendingReply<T>;

    fn invoke<T: FromRedisValue + Send + 'static>(&self, command: Command) -> PendingReply<T> {
        self.dispatch(command).typed()
    }
}
