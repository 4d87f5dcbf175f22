//! Error types.
//!
//! Every blocking call returns either a value or a [`BridgeError`]. The
//! error's [`ErrorKind`] tells a caller which of the outcomes it is facing:
//! the operation failed, the wait gave up, or the wait was cancelled. A wait
//! that timed out says nothing about the command's fate on the server.

use crate::cluster::NodeId;
use crate::protocol::RedisError;
use std::time::Duration;
use thiserror::Error;

/// Failure of a bridged command.
#[derive(Debug, Clone, Error)]
pub enum BridgeError {
    /// The server rejected the command.
    #[error("{0}")]
    Remote(#[from] RedisError),

    /// The connection failed or closed before a reply arrived.
    #[error("connection failure: {message}")]
    Connection { message: String },

    /// The server sent bytes that are not valid RESP.
    #[error("protocol error: {message}")]
    Protocol { message: String },

    /// The reply does not have the shape the command method returns.
    #[error("unexpected reply: expected {expected}, found {found}")]
    Conversion {
        expected: &'static str,
        found: String,
    },

    /// No reply within the wait budget.
    #[error("command timed out after {timeout:?}")]
    Timeout { timeout: Duration },

    /// The wait was cancelled before a reply arrived.
    #[error("command cancelled: {reason}")]
    Cancelled { reason: String },

    /// The node is not part of the selection the call was made on.
    #[error("node {node} is not part of this selection")]
    UnknownNode { node: NodeId },

    /// A per-node failure surfaced by an aggregate call.
    #[error("node {node}: {source}")]
    Node {
        node: NodeId,
        #[source]
        source: Box<BridgeError>,
    },
}

/// Coarse classification of a [`BridgeError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The operation itself failed (server, transport, or reply shape).
    Remote,
    /// The wait budget elapsed; the outcome is unknown.
    Timeout,
    /// The wait was cancelled.
    Cancelled,
    /// The caller asked for something outside the call's scope.
    Usage,
}

impl BridgeError {
    /// Create a Connection error.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Create a Protocol error.
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Create a Cancelled error.
    pub fn cancelled(reason: impl Into<String>) -> Self {
        Self::Cancelled {
            reason: reason.into(),
        }
    }

    /// Attribute this error to a cluster node.
    pub fn for_node(self, node: NodeId) -> Self {
        Self::Node {
            node,
            source: Box::new(self),
        }
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Remote(_)
            | Self::Connection { .. }
            | Self::Protocol { .. }
            | Self::Conversion { .. } => ErrorKind::Remote,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Cancelled { .. } => ErrorKind::Cancelled,
            Self::UnknownNode { .. } => ErrorKind::Usage,
            Self::Node { source, .. } => source.kind(),
        }
    }

    /// Check if the wait timed out.
    pub fn is_timeout(&self) -> bool {
        self.kind() == ErrorKind::Timeout
    }

    /// Check if the wait was cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.kind() == ErrorKind::Cancelled
    }

    /// The server's error reply, if this is (or wraps) one.
    pub fn remote_error(&self) -> Option<&RedisError> {
        match self {
            Self::Remote(e) => Some(e),
            Self::Node { source, .. } => source.remote_error(),
            _ => None,
        }
    }

    /// The node a failure was attributed to, if any.
    pub fn node(&self) -> Option<&NodeId> {
        match self {
            Self::Node { node, .. } | Self::UnknownNode { node } => Some(node),
            _ => None,
        }
    }
}

/// Result type using BridgeError.
pub type BridgeResult<T> = Result<T, BridgeError>;
