//! Pending-ack records and their registry.

use std::fmt;
use std::mem;

use cloudlink_core::protocol::Envelope;

use super::CloudService;

/// Outcome delivered to an ack callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckStatus {
    /// Ack received, or transport done when no ack was required.
    Success,
    /// Transport reported a permanent failure.
    Failure,
    /// Deadline passed before a matching ack arrived.
    Timeout,
}

impl AckStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AckStatus::Success => "SUCCESS",
            AckStatus::Failure => "FAILURE",
            AckStatus::Timeout => "TIMEOUT",
        }
    }
}

/// Called once with the outcome, the parsed ack (only on `Success` from an
/// inbound ack) and the original outgoing payload.
pub type AckCallback =
    Box<dyn FnOnce(&CloudService, AckStatus, Option<&Envelope>, String) -> i32 + Send>;

pub struct AckRecord {
    pub req_id: u32,
    /// Absolute `Clock::now_ms` deadline; `u64::MAX` never expires.
    pub deadline: u64,
    pub callback: Option<AckCallback>,
    pub payload: String,
}

impl AckRecord {
    /// Consume the record, running its callback if there is one.
    pub fn fire(self, svc: &CloudService, status: AckStatus, ack: Option<&Envelope>) -> i32 {
        match self.callback {
            Some(cb) => cb(svc, status, ack, self.payload),
            None => 0,
        }
    }
}

impl fmt::Debug for AckRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AckRecord")
            .field("req_id", &self.req_id)
            .field("deadline", &self.deadline)
            .field("has_callback", &self.callback.is_some())
            .field("payload_len", &self.payload.len())
            .finish()
    }
}

/// Insertion-ordered pending records, unique by `req_id`.
#[derive(Debug, Default)]
pub struct AckRegistry {
    records: Vec<AckRecord>,
}

impl AckRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hands the record back if its `req_id` is already pending.
    pub fn insert(&mut self, record: AckRecord) -> Result<(), AckRecord> {
        if self.contains(record.req_id) {
            return Err(record);
        }
        self.records.push(record);
        Ok(())
    }

    pub fn contains(&self, req_id: u32) -> bool {
        self.records.iter().any(|r| r.req_id == req_id)
    }

    pub fn take(&mut self, req_id: u32) -> Option<AckRecord> {
        let pos = self.records.iter().position(|r| r.req_id == req_id)?;
        Some(self.records.remove(pos))
    }

    /// Remove every record with `deadline <= now`, oldest first.
    pub fn take_expired(&mut self, now: u64) -> Vec<AckRecord> {
        let (expired, keep): (Vec<_>, Vec<_>) = mem::take(&mut self.records)
            .into_iter()
            .partition(|r| r.deadline <= now);
        self.records = keep;
        expired
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
