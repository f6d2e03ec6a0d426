//! Lightweight in-process statistics (dependency-free).
//!
//! Counters are atomics bumped on the send, dispatch and tick paths and
//! rendered in Prometheus text format on demand.

pub mod stats;

pub use stats::{Counter, ServiceStats};
