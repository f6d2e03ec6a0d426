//! Test doubles shared by service tests.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use cloudlink_core::error::{CloudError, Result};
use cloudlink_core::protocol::Envelope;
use cloudlink_service::config::ServiceSection;
use cloudlink_service::publish::TransportError;
use cloudlink_service::{AckStatus, CloudService, ManualClock, PublishJob, Publisher};

/// Publisher that holds jobs until the test completes them.
#[derive(Default)]
pub struct ManualPublisher {
    jobs: Mutex<VecDeque<PublishJob>>,
    pub busy: AtomicBool,
    pub submitted: AtomicUsize,
}

impl Publisher for ManualPublisher {
    fn submit(&self, job: PublishJob) -> Result<()> {
        if self.busy.load(Ordering::Relaxed) {
            return Err(CloudError::Busy);
        }
        self.submitted.fetch_add(1, Ordering::Relaxed);
        self.jobs.lock().unwrap().push_back(job);
        Ok(())
    }
}

impl ManualPublisher {
    pub fn queued(&self) -> usize {
        self.jobs.lock().unwrap().len()
    }

    /// Complete the oldest job; returns its event name and payload.
    pub fn complete_next(&self, status: std::result::Result<(), TransportError>) -> (String, String) {
        let job = self.jobs.lock().unwrap().pop_front().expect("no queued job");
        let seen = (job.event_name.clone(), job.payload.clone());
        job.complete(status);
        seen
    }

    pub fn succeed_next(&self) -> (String, String) {
        self.complete_next(Ok(()))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub status: AckStatus,
    pub ack_status: Option<serde_json::Value>,
    pub payload: String,
}

pub type OutcomeLog = Arc<Mutex<Vec<Outcome>>>;

/// Ack callback that records what it was called with and returns `ret`.
pub fn recorder(
    log: &OutcomeLog,
    ret: i32,
) -> impl FnOnce(&CloudService, AckStatus, Option<&Envelope>, String) -> i32 + Send + 'static {
    let log = Arc::clone(log);
    move |_svc, status, ack, payload| {
        log.lock().unwrap().push(Outcome {
            status,
            ack_status: ack.and_then(|a| a.get("status").cloned()),
            payload,
        });
        ret
    }
}

pub struct Harness {
    pub svc: CloudService,
    pub publisher: Arc<ManualPublisher>,
    pub clock: Arc<ManualClock>,
}

pub fn harness() -> Harness {
    harness_with(ServiceSection {
        event_prefix: "dev/".into(),
        req_id_seed: Some(100),
        ..ServiceSection::default()
    })
}

pub fn harness_with(cfg: ServiceSection) -> Harness {
    let publisher = Arc::new(ManualPublisher::default());
    let clock = Arc::new(ManualClock::new(1_700_000_000));
    let svc = CloudService::new(cfg, publisher.clone(), clock.clone()).unwrap();
    Harness {
        svc,
        publisher,
        clock,
    }
}
