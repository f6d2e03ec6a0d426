//! Time sources.
//!
//! `now_ms` is monotonic and drives ack deadlines; `now_secs` is wall clock
//! and only stamps the `time` key of outbound envelopes.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

pub trait Clock: Send + Sync {
    /// Milliseconds since an arbitrary fixed origin.
    fn now_ms(&self) -> u64;
    /// Seconds since the Unix epoch.
    fn now_secs(&self) -> u64;
}

#[derive(Debug)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }

    fn now_secs(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs()
    }
}

/// Clock that only moves when told to. Wall time is `epoch_secs + ms / 1000`.
#[derive(Debug, Default)]
pub struct ManualClock {
    ms: AtomicU64,
    epoch_secs: u64,
}

impl ManualClock {
    pub fn new(epoch_secs: u64) -> Self {
        Self {
            ms: AtomicU64::new(0),
            epoch_secs,
        }
    }

    pub fn advance(&self, ms: u64) {
        self.ms.fetch_add(ms, Ordering::Relaxed);
    }

    pub fn set(&self, ms: u64) {
        self.ms.store(ms, Ordering::Relaxed);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.ms.load(Ordering::Relaxed)
    }

    fn now_secs(&self) -> u64 {
        self.epoch_secs + self.now_ms() / 1000
    }
}
