//! Bounded envelope writer.
//!
//! A writer starts with the reserved keys already in place and stays open for
//! payload fields until `finish`, which closes the object and enforces the
//! capacity. An over-capacity envelope is rejected whole, never truncated.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{CloudError, Result};
use crate::protocol::envelope::{
    validate_cmd, Envelope, KEY_CMD, KEY_REQ_ID, KEY_SRC_CMD, KEY_TIME,
};

const RESERVED: [&str; 4] = [KEY_CMD, KEY_TIME, KEY_REQ_ID, KEY_SRC_CMD];

/// Outbound envelope under construction.
#[derive(Debug, Clone)]
pub struct EnvelopeWriter {
    capacity: usize,
    cmd: String,
    req_id: u32,
    body: Map<String, Value>,
}

impl EnvelopeWriter {
    /// Fresh command: `{ cmd, time, req_id, ... }`.
    pub fn command(cmd: &str, req_id: u32, time: u64, capacity: usize) -> Result<Self> {
        validate_cmd(cmd)?;
        if req_id == 0 {
            return Err(CloudError::InvalidArg("req_id must be nonzero".into()));
        }

        let mut body = Map::new();
        body.insert(KEY_CMD.into(), Value::from(cmd));
        body.insert(KEY_TIME.into(), Value::from(time));
        body.insert(KEY_REQ_ID.into(), Value::from(req_id));

        Ok(Self {
            capacity,
            cmd: cmd.to_string(),
            req_id,
            body,
        })
    }

    /// Response mirroring `inbound`: its `req_id`, and `src_cmd` set to its `cmd`.
    pub fn response(cmd: &str, inbound: &Envelope, time: u64, capacity: usize) -> Result<Self> {
        let req_id = inbound.req_id.ok_or_else(|| {
            CloudError::InvalidArg(format!("cannot respond to {} without req_id", inbound.cmd))
        })?;
        let mut w = Self::command(cmd, req_id, time, capacity)?;
        w.body
            .insert(KEY_SRC_CMD.into(), Value::from(inbound.cmd.as_str()));
        Ok(w)
    }

    pub fn cmd(&self) -> &str {
        &self.cmd
    }

    pub fn req_id(&self) -> u32 {
        self.req_id
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Replace the `req_id` in place (key order is kept).
    pub fn set_req_id(&mut self, req_id: u32) -> Result<()> {
        if req_id == 0 {
            return Err(CloudError::InvalidArg("req_id must be nonzero".into()));
        }
        self.req_id = req_id;
        self.body.insert(KEY_REQ_ID.into(), Value::from(req_id));
        Ok(())
    }

    /// Append a payload field. Reserved envelope keys are refused.
    pub fn insert<T: Serialize>(&mut self, key: &str, value: T) -> Result<&mut Self> {
        if RESERVED.contains(&key) {
            return Err(CloudError::InvalidArg(format!("reserved envelope key: {key}")));
        }
        let v = serde_json::to_value(value)
            .map_err(|e| CloudError::InvalidArg(format!("field {key} not serializable: {e}")))?;
        self.body.insert(key.to_string(), v);
        Ok(self)
    }

    /// Close the object and return the wire text.
    pub fn finish(&self) -> Result<String> {
        let s = serde_json::to_string(&self.body)
            .map_err(|e| CloudError::Internal(format!("json encode failed: {e}")))?;
        if s.len() > self.capacity {
            return Err(CloudError::TooLarge {
                size: s.len(),
                capacity: self.capacity,
            });
        }
        Ok(s)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn keeps_reserved_keys_first() {
        let mut w = EnvelopeWriter::command("status", 7, 1_600_000_000, 256).unwrap();
        w.insert("batt", 87).unwrap();
        assert_eq!(
            w.finish().unwrap(),
            r#"{"cmd":"status","time":1600000000,"req_id":7,"batt":87}"#
        );
    }

    #[test]
    fn refuses_reserved_key() {
        let mut w = EnvelopeWriter::command("status", 7, 0, 256).unwrap();
        let err = w.insert("req_id", 9).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidArg);
    }

    #[test]
    fn overflow_is_an_error() {
        let mut w = EnvelopeWriter::command("blob", 1, 0, 64).unwrap();
        w.insert("data", "z".repeat(100)).unwrap();
        let err = w.finish().unwrap_err();
        assert_eq!(err.code(), ErrorCode::TooLarge);
    }

    #[test]
    fn response_echoes_request() {
        let inbound = Envelope::parse(r#"{"cmd":"cfg","req_id":42,"time":5}"#).unwrap();
        let w = EnvelopeWriter::response("ack", &inbound, 6, 256).unwrap();
        assert_eq!(w.req_id(), 42);
        assert_eq!(
            w.finish().unwrap(),
            r#"{"cmd":"ack","time":6,"req_id":42,"src_cmd":"cfg"}"#
        );
    }
}
