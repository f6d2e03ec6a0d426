//! Inbound envelope (JSON) and wire constants.

use serde::de::{DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{CloudError, Result};

pub const KEY_CMD: &str = "cmd";
pub const KEY_TIME: &str = "time";
pub const KEY_REQ_ID: &str = "req_id";
pub const KEY_SRC_CMD: &str = "src_cmd";

pub const CMD_ACK: &str = "ack";
pub const CMD_SYNC: &str = "sync";
pub const CMD_CFG: &str = "cfg";

/// Upper bound on `cmd`, in bytes.
pub const MAX_CMD_LEN: usize = 32;

/// Default ack timeout used by `request`-style sends.
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

/// Parsed envelope. Payload fields other than the four reserved keys are kept
/// in `fields`, in wire order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Missing `cmd` decodes as empty and is rejected by `validate`.
    #[serde(default)]
    pub cmd: String,
    #[serde(
        default,
        deserialize_with = "lenient_time",
        skip_serializing_if = "Option::is_none"
    )]
    pub time: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub req_id: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src_cmd: Option<String>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Envelope {
    /// Parse and validate one inbound event.
    pub fn parse(raw: &str) -> Result<Self> {
        let env: Envelope = serde_json::from_str(raw)
            .map_err(|e| CloudError::Parse(format!("invalid envelope json: {e}")))?;
        env.validate()?;
        Ok(env)
    }

    pub fn validate(&self) -> Result<()> {
        validate_cmd(&self.cmd)?;
        if self.req_id == Some(0) {
            return Err(CloudError::Parse("req_id must be nonzero".into()));
        }
        Ok(())
    }

    pub fn is_ack(&self) -> bool {
        self.cmd == CMD_ACK
    }

    /// Payload field lookup (reserved keys are not in `fields`).
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Decode the payload fields into a typed request.
    pub fn payload<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(Value::Object(self.fields.clone()))
            .map_err(|e| CloudError::Parse(format!("{} payload: {e}", self.cmd)))
    }
}

/// Inbound `time` is informational only; a float or string never rejects the
/// envelope.
fn lenient_time<'de, D>(de: D) -> std::result::Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Option::<Value>::deserialize(de)?;
    Ok(match v {
        Some(Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
        _ => None,
    })
}

/// Reject empty or over-long command names.
pub fn validate_cmd(cmd: &str) -> Result<()> {
    if cmd.is_empty() {
        return Err(CloudError::InvalidArg("cmd must not be empty".into()));
    }
    if cmd.len() > MAX_CMD_LEN {
        return Err(CloudError::InvalidArg(format!(
            "cmd longer than {MAX_CMD_LEN} bytes: {cmd}"
        )));
    }
    Ok(())
}

/// Published event name: `<prefix><cmd>` with `cmd` cut at `MAX_CMD_LEN` bytes.
pub fn event_name(prefix: &str, cmd: &str) -> String {
    let mut end = cmd.len().min(MAX_CMD_LEN);
    while !cmd.is_char_boundary(end) {
        end -= 1;
    }
    let mut name = String::with_capacity(prefix.len() + end);
    name.push_str(prefix);
    name.push_str(&cmd[..end]);
    name
}
