//! Core infrastructure.
//!
//! - [`config`] - Configuration parsing and validation
//! - [`error`] - Error types shared by every blocking call
//! - [`timeout`] - Wait budget resolution

pub mod config;
pub mod error;
pub mod timeout;
