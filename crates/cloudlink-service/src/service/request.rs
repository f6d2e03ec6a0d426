//! Normalized send request.
//!
//! Every way of sending reduces to one `SendRequest`: a payload plus the
//! transport flags, cloud flags, callback, timeout, event name, `req_id`
//! override and priority.

use std::fmt;

use cloudlink_core::protocol::{Envelope, EnvelopeWriter};

use super::ack::{AckCallback, AckStatus};
use super::CloudService;
use crate::publish::PublishFlags;

/// Cloud-side flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CloudFlags(u8);

impl CloudFlags {
    pub const NONE: Self = Self(0x00);
    /// Wait for an end-to-end ack from the remote application.
    pub const FULL_ACK: Self = Self(0x01);

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

pub enum Payload {
    /// Envelope opened by `begin_command` / `begin_response`.
    Envelope(EnvelopeWriter),
    /// Externally prepared JSON, sent verbatim.
    Raw(String),
}

pub struct SendRequest {
    pub(crate) payload: Payload,
    pub(crate) publish_flags: PublishFlags,
    pub(crate) cloud_flags: CloudFlags,
    pub(crate) callback: Option<AckCallback>,
    pub(crate) timeout_ms: Option<u64>,
    pub(crate) event_name: Option<String>,
    pub(crate) req_id: Option<u32>,
    pub(crate) priority: usize,
}

impl SendRequest {
    pub fn envelope(writer: EnvelopeWriter) -> Self {
        Self::with_payload(Payload::Envelope(writer))
    }

    pub fn raw(json: impl Into<String>) -> Self {
        Self::with_payload(Payload::Raw(json.into()))
    }

    fn with_payload(payload: Payload) -> Self {
        Self {
            payload,
            publish_flags: PublishFlags::default(),
            cloud_flags: CloudFlags::NONE,
            callback: None,
            timeout_ms: None,
            event_name: None,
            req_id: None,
            priority: 0,
        }
    }

    pub fn publish_flags(mut self, flags: PublishFlags) -> Self {
        self.publish_flags = flags;
        self
    }

    pub fn cloud_flags(mut self, flags: CloudFlags) -> Self {
        self.cloud_flags = flags;
        self
    }

    pub fn full_ack(self) -> Self {
        self.cloud_flags(CloudFlags::FULL_ACK)
    }

    pub fn on_ack<F>(mut self, f: F) -> Self
    where
        F: FnOnce(&CloudService, AckStatus, Option<&Envelope>, String) -> i32 + Send + 'static,
    {
        self.callback = Some(Box::new(f));
        self
    }

    /// Absolute deadline is `now + ms` at send time; 0 expires on the next
    /// expiry pass. `u64::MAX` is the same as no timeout.
    pub fn timeout_ms(mut self, ms: u64) -> Self {
        self.timeout_ms = Some(ms);
        self
    }

    pub fn event_name(mut self, name: impl Into<String>) -> Self {
        self.event_name = Some(name.into());
        self
    }

    pub fn req_id(mut self, req_id: u32) -> Self {
        self.req_id = Some(req_id);
        self
    }

    pub fn priority(mut self, priority: usize) -> Self {
        self.priority = priority;
        self
    }
}

impl fmt::Debug for SendRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let payload = match &self.payload {
            Payload::Envelope(w) => format!("envelope({})", w.cmd()),
            Payload::Raw(s) => format!("raw({} bytes)", s.len()),
        };
        f.debug_struct("SendRequest")
            .field("payload", &payload)
            .field("publish_flags", &self.publish_flags)
            .field("cloud_flags", &self.cloud_flags)
            .field("has_callback", &self.callback.is_some())
            .field("timeout_ms", &self.timeout_ms)
            .field("event_name", &self.event_name)
            .field("req_id", &self.req_id)
            .field("priority", &self.priority)
            .finish()
    }
}
