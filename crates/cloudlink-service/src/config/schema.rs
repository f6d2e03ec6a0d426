use serde::Deserialize;

use cloudlink_core::error::{CloudError, Result};
use cloudlink_core::protocol::envelope::{DEFAULT_TIMEOUT_MS, MAX_CMD_LEN};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    pub version: u32,

    #[serde(default)]
    pub service: ServiceSection,

    #[serde(default)]
    pub publisher: PublisherSection,
}

impl ServiceConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(CloudError::InvalidArg(format!(
                "unsupported config version: {}",
                self.version
            )));
        }
        self.service.validate()?;
        self.publisher.validate()?;
        Ok(())
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            version: 1,
            service: ServiceSection::default(),
            publisher: PublisherSection::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceSection {
    #[serde(default)]
    pub event_prefix: String,

    #[serde(default = "default_timeout_ms")]
    pub default_timeout_ms: u64,

    #[serde(default = "default_max_payload_bytes")]
    pub max_payload_bytes: usize,

    #[serde(default)]
    pub req_id_seed: Option<u32>,
}

impl Default for ServiceSection {
    fn default() -> Self {
        Self {
            event_prefix: String::new(),
            default_timeout_ms: default_timeout_ms(),
            max_payload_bytes: default_max_payload_bytes(),
            req_id_seed: None,
        }
    }
}

impl ServiceSection {
    pub fn validate(&self) -> Result<()> {
        if self.event_prefix.len() > MAX_CMD_LEN {
            return Err(CloudError::InvalidArg(format!(
                "service.event_prefix must be at most {MAX_CMD_LEN} bytes"
            )));
        }
        if !(1..=86_400_000).contains(&self.default_timeout_ms) {
            return Err(CloudError::InvalidArg(
                "service.default_timeout_ms must be between 1 and 86400000".into(),
            ));
        }
        if !(64..=16384).contains(&self.max_payload_bytes) {
            return Err(CloudError::InvalidArg(
                "service.max_payload_bytes must be between 64 and 16384".into(),
            ));
        }
        if self.req_id_seed == Some(0) {
            return Err(CloudError::InvalidArg(
                "service.req_id_seed must be nonzero".into(),
            ));
        }
        Ok(())
    }
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}
fn default_max_payload_bytes() -> usize {
    1024
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PublisherSection {
    #[serde(default = "default_queue_depth")]
    pub queue_depth: usize,

    #[serde(default = "default_priority_levels")]
    pub priority_levels: usize,
}

impl Default for PublisherSection {
    fn default() -> Self {
        Self {
            queue_depth: default_queue_depth(),
            priority_levels: default_priority_levels(),
        }
    }
}

impl PublisherSection {
    pub fn validate(&self) -> Result<()> {
        if !(1..=1024).contains(&self.queue_depth) {
            return Err(CloudError::InvalidArg(
                "publisher.queue_depth must be between 1 and 1024".into(),
            ));
        }
        if !(1..=8).contains(&self.priority_levels) {
            return Err(CloudError::InvalidArg(
                "publisher.priority_levels must be between 1 and 8".into(),
            ));
        }
        Ok(())
    }
}

fn default_queue_depth() -> usize {
    8
}
fn default_priority_levels() -> usize {
    2
}
