//! Tether - blocking Redis commands over a pipelined async client.
//!
//! An async client answers every command with a pending reply and lets its
//! own I/O task fill it in. Tether puts a blocking facade on top: each call
//! dispatches, picks a wait budget and parks the calling thread until the
//! reply resolves or the budget runs out. The same commands can be fanned
//! out over the nodes of a cluster, with results gathered lazily per node.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────┐   ┌──────────────────────────────┐
//! │   SyncCommands (blocking)    │   │  SelectedNodes (fan-out)     │
//! │   T / BridgeError            │   │  Executions<T>               │
//! └──────────────────────────────┘   └──────────────────────────────┘
//!                │                                  │
//! ┌─────────────────────────────────────────────────────────────────┐
//! │          PendingReply: completion cell + timed wait             │
//! └─────────────────────────────────────────────────────────────────┘
//!                                  │
//! ┌─────────────────────────────────────────────────────────────────┐
//! │      AsyncCommands: RespConnection (tokio TCP) │ MockClient      │
//! └─────────────────────────────────────────────────────────────────┘
//!                                  │
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                  RESP2 / RESP3 wire codec                       │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Module Organization
//!
//! ## Core
//! - [`core::config`] - Configuration parsing and validation
//! - [`core::error`] - Error types shared by every blocking call
//! - [`core::timeout`] - Wait budget resolution
//!
//! ## Wire
//! - [`protocol`] - RESP values, codecs, commands and reply conversion
//!
//! ## Replies and clients
//! - [`pending`] - Pending replies and the cancellable timed wait
//! - [`client`] - Async clients: pipelined TCP connection and mock
//! - [`commands`] - The command table shared by every facade
//!
//! ## Facades
//! - [`sync`] - Blocking single-node facade
//! - [`cluster`] - Topology, node selection and fan-out executions
//!
//! ## Operations
//! - [`ops::stats`] - Wait outcome counters
//!
//! ## CLI
//! - [`cli::commands`] - CLI command implementations
//!
//! # Key Invariants
//!
//! - A blocking call returns the reply, a typed failure, or a timeout
//!   failure no later than its budget plus scheduling slack
//! - A reply that timed out or was cancelled is never completed afterwards
//! - Fan-out dispatches to every selected node before any result is awaited

// Core infrastructure
pub mod core;

// Wire format
pub mod protocol;

// Replies, clients and the command table
pub mod client;
pub mod commands;
pub mod pending;

// Facades
pub mod cluster;
pub mod sync;

// Operations
pub mod ops;

// CLI
pub mod cli;

// Re-exports for convenience
pub use self::core::error::{BridgeError, BridgeResult, ErrorKind};
pub use self::core::{config, error, timeout};
pub use client::{AsyncCommands, ConnectionOptions, MockClient, MockReply, RespConnection};
pub use cluster::{ClusterClient, ClusterNode, Executions, NodeId, NodeSelection, SelectedNodes};
pub use commands::{CommandSet, RedisCommands};
pub use pending::{PendingReply, ReplyCompleter, ReplyState};
pub use protocol::{Command, FromRedisValue, ProtocolVersion, RedisValue};
pub use sync::SyncCommands;
