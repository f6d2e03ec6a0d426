//! Wire protocol modules.
//!
//! - `envelope`: inbound JSON envelope (`cmd`, `time`, `req_id`, `src_cmd`,
//!   payload fields) and the wire constants.
//! - `writer`: bounded builder for outbound envelopes.
//!
//! Parsing is panic-free: malformed input surfaces as `CloudError::Parse` or
//! `CloudError::InvalidArg`.

pub mod envelope;
pub mod writer;

pub use envelope::{event_name, validate_cmd, Envelope};
pub use writer::EnvelopeWriter;
