//! Operations and observability.
//!
//! - [`stats`] - Wait outcome counters

pub mod stats;
