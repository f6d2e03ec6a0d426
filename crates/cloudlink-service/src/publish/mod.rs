//! Publisher contract (device -> cloud).
//!
//! The service hands every outbound envelope to a `Publisher` as a
//! `PublishJob` and returns as soon as the job is accepted. The publisher
//! runs the job's completion exactly once with the transport result, from
//! its own context and never from inside `submit`.

pub mod background;

use std::fmt;
use std::ops::BitOr;

use thiserror::Error;

use cloudlink_core::error::Result;

pub use background::{BackgroundPublisher, Transport};

/// Transport-level publish failure (distinct from application acks).
#[derive(Debug, Clone, Error)]
#[error("transport failure: {0}")]
pub struct TransportError(pub String);

/// Flags passed through to the transport untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishFlags(u8);

impl PublishFlags {
    pub const PUBLIC: Self = Self(0x00);
    pub const PRIVATE: Self = Self(0x01);
    pub const NO_ACK: Self = Self(0x02);
    pub const WITH_ACK: Self = Self(0x08);

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl Default for PublishFlags {
    fn default() -> Self {
        PublishFlags::PRIVATE
    }
}

impl BitOr for PublishFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Event name and payload handed back to the completion.
#[derive(Debug, Clone)]
pub struct PublishedEvent {
    pub event_name: String,
    pub payload: String,
}

pub type Completion =
    Box<dyn FnOnce(std::result::Result<(), TransportError>, PublishedEvent) + Send>;

pub struct PublishJob {
    pub event_name: String,
    pub payload: String,
    pub flags: PublishFlags,
    /// Queue level; 0 is drained first.
    pub priority: usize,
    pub completion: Completion,
}

impl PublishJob {
    /// Consume the job and run its completion.
    pub fn complete(self, status: std::result::Result<(), TransportError>) {
        let PublishJob {
            event_name,
            payload,
            completion,
            ..
        } = self;
        completion(status, PublishedEvent { event_name, payload });
    }
}

impl fmt::Debug for PublishJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublishJob")
            .field("event_name", &self.event_name)
            .field("payload_len", &self.payload.len())
            .field("flags", &self.flags)
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}

pub trait Publisher: Send + Sync {
    /// Queue a job. `CloudError::Busy` when the queue cannot take it; the
    /// job (and its completion) is dropped without running in that case.
    fn submit(&self, job: PublishJob) -> Result<()>;
}
