//! Background publisher: bounded per-priority queues drained by one tokio task.
//!
//! - `submit` never blocks and never awaits; a full level is `Busy`.
//! - Level 0 is always drained before level 1, FIFO within a level.
//! - After `shutdown`, intake stops and whatever is still queued completes
//!   with a transport failure.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use cloudlink_core::error::{CloudError, Result};

use super::{PublishFlags, PublishJob, Publisher, TransportError};
use crate::config::PublisherSection;

/// The actual link to the cloud broker.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn publish(
        &self,
        event_name: &str,
        payload: &str,
        flags: PublishFlags,
    ) -> std::result::Result<(), TransportError>;
}

struct Queues {
    levels: Vec<VecDeque<PublishJob>>,
    closed: bool,
}

struct Shared {
    queues: Mutex<Queues>,
    depth: usize,
    notify: Notify,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Queues> {
        self.queues.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn pop(&self) -> Next {
        let mut q = self.lock();
        if q.closed {
            return Next::Closed;
        }
        match q.levels.iter_mut().find_map(VecDeque::pop_front) {
            Some(job) => Next::Job(job),
            None => Next::Idle,
        }
    }
}

enum Next {
    Job(PublishJob),
    Idle,
    Closed,
}

#[derive(Clone)]
pub struct BackgroundPublisher {
    shared: Arc<Shared>,
}

impl BackgroundPublisher {
    /// Start the worker on the current tokio runtime.
    pub fn spawn(transport: Arc<dyn Transport>, cfg: &PublisherSection) -> (Self, JoinHandle<()>) {
        let levels = (0..cfg.priority_levels)
            .map(|_| VecDeque::with_capacity(cfg.queue_depth))
            .collect();
        let shared = Arc::new(Shared {
            queues: Mutex::new(Queues {
                levels,
                closed: false,
            }),
            depth: cfg.queue_depth,
            notify: Notify::new(),
        });

        let handle = tokio::spawn(run(Arc::clone(&shared), transport));
        (Self { shared }, handle)
    }

    /// Stop intake; the worker fails the backlog and exits.
    pub fn shutdown(&self) {
        self.shared.lock().closed = true;
        self.shared.notify.notify_one();
    }

    pub fn queued(&self) -> usize {
        self.shared.lock().levels.iter().map(VecDeque::len).sum()
    }

    /// Wait for the worker after `shutdown`. Returns false (and logs) when the
    /// worker panicked or was cancelled.
    pub async fn join(worker: JoinHandle<()>) -> bool {
        match worker.await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(
                    error=%e,
                    panicked = e.is_panic(),
                    "publisher worker did not exit cleanly"
                );
                false
            }
        }
    }
}

impl Publisher for BackgroundPublisher {
    fn submit(&self, job: PublishJob) -> Result<()> {
        {
            let mut q = self.shared.lock();
            if q.closed {
                return Err(CloudError::Busy);
            }
            let levels = q.levels.len();
            let level = q.levels.get_mut(job.priority).ok_or_else(|| {
                CloudError::InvalidArg(format!(
                    "priority {} out of range (levels={levels})",
                    job.priority
                ))
            })?;
            if level.len() >= self.shared.depth {
                tracing::debug!(event=%job.event_name, priority=job.priority, "publish queue full");
                return Err(CloudError::Busy);
            }
            level.push_back(job);
        }
        self.shared.notify.notify_one();
        Ok(())
    }
}

async fn run(shared: Arc<Shared>, transport: Arc<dyn Transport>) {
    loop {
        match shared.pop() {
            Next::Job(job) => {
                let status = transport
                    .publish(&job.event_name, &job.payload, job.flags)
                    .await;
                if let Err(e) = &status {
                    tracing::warn!(event=%job.event_name, error=%e, "publish failed");
                }
                job.complete(status);
            }
            Next::Idle => shared.notify.notified().await,
            Next::Closed => break,
        }
    }

    let backlog: Vec<PublishJob> = {
        let mut q = shared.lock();
        q.levels.iter_mut().flat_map(|l| l.drain(..)).collect()
    };
    if !backlog.is_empty() {
        tracing::info!(count = backlog.len(), "failing queued publishes on shutdown");
    }
    for job in backlog {
        job.complete(Err(TransportError("publisher shut down".into())));
    }
}
