//! Inbound command handlers.

use std::sync::Arc;

use cloudlink_core::error::Result;
use cloudlink_core::protocol::{validate_cmd, Envelope};

use super::CloudService;

/// Handler for one inbound `cmd`. The returned status is handed back to the
/// dispatch caller; handlers ack through `CloudService::send_ack` or `defer`.
pub trait CommandHandler: Send + Sync {
    fn handle(&self, svc: &CloudService, env: &Envelope) -> Result<i32>;
}

impl<F> CommandHandler for F
where
    F: Fn(&CloudService, &Envelope) -> Result<i32> + Send + Sync,
{
    fn handle(&self, svc: &CloudService, env: &Envelope) -> Result<i32> {
        self(svc, env)
    }
}

/// Append-only `(name, handler)` list; lookup is first match.
#[derive(Default)]
pub struct CommandRegistry {
    handlers: Vec<(String, Arc<dyn CommandHandler>)>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: &str, handler: Arc<dyn CommandHandler>) -> Result<()> {
        validate_cmd(name)?;
        if self.lookup(name).is_some() {
            tracing::warn!(cmd=%name, "command already registered; earlier handler keeps winning");
        }
        self.handlers.push((name.to_string(), handler));
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Option<Arc<dyn CommandHandler>> {
        self.handlers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, h)| Arc::clone(h))
    }

    pub fn names(&self) -> Vec<String> {
        self.handlers.iter().map(|(n, _)| n.clone()).collect()
    }
}
