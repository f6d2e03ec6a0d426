//! cloudlink core: wire envelope, bounded writer, and error types.
//!
//! This crate defines the request/response envelope shared with the cloud
//! broker and the error surface used by the service runtime. It carries no
//! transport or runtime dependencies so it can be reused by simulators and
//! cloud-side tooling.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here. Malformed inbound
//! JSON is reported as `CloudError` instead of crashing the device loop.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod protocol;

/// Shared result type.
pub use error::{CloudError, ErrorCode, Result};
