//! Request/response service over the publisher.
//!
//! One `CloudService` value owns the ack registry, the command registry, the
//! deferred-ack queue and the req_id generator behind a single mutex. The
//! mutex is never held while user code runs (ack callbacks, command handlers,
//! deferred continuations) or while a job is submitted, so any of those may
//! call back into the service, including `send`.
//!
//! Ordering: per `req_id` the ack callback fires exactly once, with exactly
//! one of SUCCESS (inbound ack or plain transport success), FAILURE
//! (transport) or TIMEOUT (tick expiry).

pub mod ack;
pub mod commands;
pub mod req_id;
pub mod request;

use std::mem;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use serde_json::Value;

use cloudlink_core::error::{CloudError, Result};
use cloudlink_core::protocol::envelope::{CMD_ACK, KEY_CMD, KEY_REQ_ID};
use cloudlink_core::protocol::{event_name, validate_cmd, Envelope, EnvelopeWriter};

use crate::clock::Clock;
use crate::config::ServiceSection;
use crate::obs::ServiceStats;
use crate::publish::{Completion, PublishJob, PublishedEvent, Publisher, TransportError};

pub use ack::{AckCallback, AckRecord, AckRegistry, AckStatus};
pub use commands::{CommandHandler, CommandRegistry};
pub use req_id::ReqIdGenerator;
pub use request::{CloudFlags, Payload, SendRequest};

type Deferred = Box<dyn FnOnce(&CloudService) -> Result<()> + Send>;

/// Result of routing one inbound event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatched {
    /// Matched a pending request; `status` is the ack callback's return.
    Acked { req_id: u32, status: i32 },
    /// Routed to a command handler; `status` is the handler's return.
    Handled { status: i32 },
    /// `ack` for nothing pending (already timed out, failed, or unknown).
    UnmatchedAck { req_id: Option<u32> },
}

#[derive(Clone)]
pub struct CloudService {
    inner: Arc<Inner>,
}

struct Inner {
    cfg: ServiceSection,
    publisher: Arc<dyn Publisher>,
    clock: Arc<dyn Clock>,
    state: Mutex<State>,
    stats: ServiceStats,
}

struct State {
    req_ids: ReqIdGenerator,
    last_tick_sec: u64,
    /// Event name of the most recent `begin_command`.
    last_event: Option<String>,
    acks: AckRegistry,
    commands: CommandRegistry,
    deferred: Vec<Deferred>,
}

/// Ack record prototype carried by the publish completion.
struct PendingAck {
    req_id: u32,
    deadline: u64,
    callback: Option<AckCallback>,
    install: bool,
}

impl CloudService {
    pub fn new(
        cfg: ServiceSection,
        publisher: Arc<dyn Publisher>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        cfg.validate()?;

        // Wall-clock seed keeps ids from repeating right after a restart.
        let seed = cfg
            .req_id_seed
            .unwrap_or_else(|| (clock.now_secs() & u64::from(u32::MAX)) as u32);
        let state = State {
            req_ids: ReqIdGenerator::new(seed),
            last_tick_sec: clock.now_ms() / 1000,
            last_event: None,
            acks: AckRegistry::new(),
            commands: CommandRegistry::new(),
            deferred: Vec::new(),
        };

        Ok(Self {
            inner: Arc::new(Inner {
                cfg,
                publisher,
                clock,
                state: Mutex::new(state),
                stats: ServiceStats::default(),
            }),
        })
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn config(&self) -> &ServiceSection {
        &self.inner.cfg
    }

    pub fn stats(&self) -> &ServiceStats {
        &self.inner.stats
    }

    pub fn render_stats(&self) -> String {
        self.inner.stats.render(self.pending_acks())
    }

    pub fn pending_acks(&self) -> usize {
        self.lock().acks.len()
    }

    pub fn is_pending(&self, req_id: u32) -> bool {
        self.lock().acks.contains(req_id)
    }

    pub fn registered_commands(&self) -> Vec<String> {
        self.lock().commands.names()
    }

    fn last_event(&self) -> Option<String> {
        self.lock().last_event.clone()
    }

    fn next_req_id(&self) -> u32 {
        let mut st = self.lock();
        let State { req_ids, acks, .. } = &mut *st;
        req_ids.next_free(|id| acks.contains(id))
    }

    // --------------------
    // Envelope builders
    // --------------------

    /// Open a new command envelope with a fresh `req_id` and the current time.
    pub fn begin_command(&self, cmd: &str) -> Result<EnvelopeWriter> {
        validate_cmd(cmd)?;
        let req_id = self.next_req_id();
        self.lock().last_event = Some(event_name(&self.inner.cfg.event_prefix, cmd));
        EnvelopeWriter::command(
            cmd,
            req_id,
            self.inner.clock.now_secs(),
            self.inner.cfg.max_payload_bytes,
        )
    }

    /// Open a response to `inbound`, reusing its `req_id`.
    pub fn begin_response(&self, cmd: &str, inbound: &Envelope) -> Result<EnvelopeWriter> {
        EnvelopeWriter::response(
            cmd,
            inbound,
            self.inner.clock.now_secs(),
            self.inner.cfg.max_payload_bytes,
        )
    }

    // --------------------
    // Send path
    // --------------------

    /// Hand the request to the publisher. Returns the `req_id` once the job is
    /// accepted; the outcome arrives later through the ack callback. Errors
    /// returned here never fire the callback.
    pub fn send(&self, req: SendRequest) -> Result<u32> {
        let result = self.submit(req);
        match &result {
            Ok(req_id) => {
                self.inner.stats.sent.inc();
                tracing::debug!(req_id, "send accepted");
            }
            Err(e) => {
                self.inner.stats.rejected.inc();
                tracing::warn!(code = e.code().as_str(), error=%e, "send rejected");
            }
        }
        result
    }

    fn submit(&self, req: SendRequest) -> Result<u32> {
        let SendRequest {
            payload,
            publish_flags,
            cloud_flags,
            callback,
            timeout_ms,
            event_name: explicit_event,
            req_id,
            priority,
        } = req;

        let (payload, cmd, req_id) = match payload {
            Payload::Envelope(mut w) => {
                if let Some(id) = req_id {
                    w.set_req_id(id)?;
                }
                (w.finish()?, w.cmd().to_string(), w.req_id())
            }
            Payload::Raw(raw) => {
                let capacity = self.inner.cfg.max_payload_bytes;
                if raw.len() > capacity {
                    return Err(CloudError::TooLarge {
                        size: raw.len(),
                        capacity,
                    });
                }
                let (cmd, embedded_id) = peek_raw(&raw);
                let req_id = match req_id.or(embedded_id) {
                    Some(0) => {
                        return Err(CloudError::InvalidArg("req_id must be nonzero".into()))
                    }
                    Some(id) => id,
                    None => self.next_req_id(),
                };
                (raw, cmd, req_id)
            }
        };

        let event = match explicit_event {
            Some(name) => name,
            None if !cmd.is_empty() => event_name(&self.inner.cfg.event_prefix, &cmd),
            // Raw payload without a `cmd`: publish under the last command's name.
            None => match self.last_event() {
                Some(name) => name,
                None => {
                    tracing::warn!(
                        req_id,
                        prefix=%self.inner.cfg.event_prefix,
                        "no cmd for event name; using bare prefix"
                    );
                    self.inner.cfg.event_prefix.clone()
                }
            },
        };
        // `u64::MAX` (given or saturated) means no deadline.
        let deadline = match timeout_ms {
            Some(ms) => self.inner.clock.now_ms().saturating_add(ms),
            None => u64::MAX,
        };
        let install = cloud_flags.contains(CloudFlags::FULL_ACK)
            || (callback.is_some() && deadline != u64::MAX);

        let pending = PendingAck {
            req_id,
            deadline,
            callback,
            install,
        };
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        let completion: Completion = Box::new(move |status, published| {
            // A completion outliving the service has nobody left to tell.
            if let Some(inner) = weak.upgrade() {
                CloudService { inner }.on_published(status, published, pending);
            }
        });

        tracing::trace!(req_id, event=%event, payload=%payload, "submitting");
        self.inner.publisher.submit(PublishJob {
            event_name: event,
            payload,
            flags: publish_flags,
            priority,
            completion,
        })?;

        Ok(req_id)
    }

    /// FULL_ACK send with the configured default timeout.
    pub fn request<F>(&self, writer: EnvelopeWriter, cb: F) -> Result<u32>
    where
        F: FnOnce(&CloudService, AckStatus, Option<&Envelope>, String) -> i32 + Send + 'static,
    {
        let timeout = self.inner.cfg.default_timeout_ms;
        self.send(
            SendRequest::envelope(writer)
                .full_ack()
                .on_ack(cb)
                .timeout_ms(timeout),
        )
    }

    /// Fire-and-forget `ack` for `inbound` carrying `status`.
    pub fn send_ack(&self, inbound: &Envelope, status: i32) -> Result<u32> {
        let mut w = self.begin_response(CMD_ACK, inbound)?;
        w.insert("status", status)?;
        self.send(SendRequest::envelope(w))
    }

    /// Publisher completion bridge.
    fn on_published(
        &self,
        status: std::result::Result<(), TransportError>,
        published: PublishedEvent,
        pending: PendingAck,
    ) {
        let PendingAck {
            req_id,
            deadline,
            callback,
            install,
        } = pending;
        let record = AckRecord {
            req_id,
            deadline,
            callback,
            payload: published.payload,
        };

        match status {
            Err(e) => {
                self.inner.stats.failed.inc();
                tracing::warn!(req_id, event=%published.event_name, error=%e, "publish failed");
                record.fire(self, AckStatus::Failure, None);
            }
            Ok(()) if install => {
                let refused = self.lock().acks.insert(record).err();
                match refused {
                    None => tracing::debug!(req_id, deadline, "awaiting ack"),
                    Some(record) => {
                        self.inner.stats.failed.inc();
                        tracing::warn!(req_id, "req_id already pending; refusing second record");
                        record.fire(self, AckStatus::Failure, None);
                    }
                }
            }
            Ok(()) => {
                record.fire(self, AckStatus::Success, None);
            }
        }
    }

    // --------------------
    // Inbound path
    // --------------------

    /// Register a handler for `name`. The first registration for a name wins.
    pub fn register_command<H>(&self, name: &str, handler: H) -> Result<()>
    where
        H: CommandHandler + 'static,
    {
        self.lock().commands.register(name, Arc::new(handler))
    }

    /// Route one inbound event to a pending ack or a command handler.
    pub fn dispatch(&self, raw: &str) -> Result<Dispatched> {
        let env = match Envelope::parse(raw) {
            Ok(env) => env,
            Err(e) => {
                self.inner.stats.dropped.inc();
                tracing::error!(code = e.code().as_str(), error=%e, "dropping inbound event");
                return Err(e);
            }
        };

        if env.is_ack() {
            if let Some(req_id) = env.req_id {
                let record = self.lock().acks.take(req_id);
                if let Some(record) = record {
                    self.inner.stats.acked.inc();
                    tracing::debug!(req_id, src_cmd=?env.src_cmd, "ack matched");
                    let status = record.fire(self, AckStatus::Success, Some(&env));
                    return Ok(Dispatched::Acked { req_id, status });
                }
            }
        }

        let handler = self.lock().commands.lookup(&env.cmd);
        match handler {
            Some(h) => {
                self.inner.stats.dispatched.inc();
                tracing::debug!(cmd=%env.cmd, req_id=?env.req_id, "dispatching command");
                let status = h.handle(self, &env)?;
                Ok(Dispatched::Handled { status })
            }
            None if env.is_ack() => {
                tracing::debug!(req_id=?env.req_id, "ack for nothing pending");
                Ok(Dispatched::UnmatchedAck { req_id: env.req_id })
            }
            None => {
                self.inner.stats.dropped.inc();
                tracing::error!(cmd=%env.cmd, "no handler for command");
                Err(CloudError::NotFound(env.cmd))
            }
        }
    }

    // --------------------
    // Tick
    // --------------------

    /// Queue a continuation for the next tick (e.g. an ack sent after the
    /// handler returned).
    pub fn defer<F>(&self, f: F)
    where
        F: FnOnce(&CloudService) -> Result<()> + Send + 'static,
    {
        self.lock().deferred.push(Box::new(f));
    }

    /// Main-loop entry point: run deferred continuations, then, at most once
    /// per second, time out expired records.
    pub fn tick(&self) {
        // Continuations queued while draining wait for the next tick.
        let deferred = mem::take(&mut self.lock().deferred);
        for job in deferred {
            if let Err(e) = job(self) {
                tracing::warn!(code = e.code().as_str(), error=%e, "deferred continuation failed");
            }
        }

        let now = self.inner.clock.now_ms();
        let sec = now / 1000;
        let expired = {
            let mut st = self.lock();
            if st.last_tick_sec == sec {
                return;
            }
            st.last_tick_sec = sec;
            st.acks.take_expired(now)
        };

        for record in expired {
            self.inner.stats.timed_out.inc();
            tracing::info!(req_id = record.req_id, "ack timed out");
            record.fire(self, AckStatus::Timeout, None);
        }
    }
}

/// `cmd` and `req_id` of an externally prepared payload, when it has them.
fn peek_raw(raw: &str) -> (String, Option<u32>) {
    let Ok(Value::Object(obj)) = serde_json::from_str::<Value>(raw) else {
        return (String::new(), None);
    };
    let cmd = obj
        .get(KEY_CMD)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let req_id = obj
        .get(KEY_REQ_ID)
        .and_then(Value::as_u64)
        .and_then(|id| u32::try_from(id).ok());
    (cmd, req_id)
}
