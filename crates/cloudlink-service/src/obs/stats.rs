use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Default)]
pub struct ServiceStats {
    /// Jobs accepted by the publisher.
    pub sent: Counter,
    /// Sends refused synchronously (too large, busy, bad argument).
    pub rejected: Counter,
    pub acked: Counter,
    pub failed: Counter,
    pub timed_out: Counter,
    pub dispatched: Counter,
    pub dropped: Counter,
}

impl ServiceStats {
    /// Render all counters plus the pending-ack gauge.
    pub fn render(&self, pending_acks: usize) -> String {
        let counters = [
            ("cloudlink_sent_total", &self.sent),
            ("cloudlink_rejected_total", &self.rejected),
            ("cloudlink_acked_total", &self.acked),
            ("cloudlink_failed_total", &self.failed),
            ("cloudlink_timed_out_total", &self.timed_out),
            ("cloudlink_dispatched_total", &self.dispatched),
            ("cloudlink_dropped_total", &self.dropped),
        ];

        let mut out = String::new();
        for (name, c) in counters {
            let _ = writeln!(out, "# TYPE {name} counter\n{name} {}", c.get());
        }
        let _ = writeln!(
            out,
            "# TYPE cloudlink_pending_acks gauge\ncloudlink_pending_acks {pending_acks}"
        );
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_includes_counts() {
        let stats = ServiceStats::default();
        stats.sent.inc();
        stats.sent.inc();
        stats.timed_out.inc();

        let out = stats.render(3);
        assert!(out.contains("cloudlink_sent_total 2\n"));
        assert!(out.contains("cloudlink_timed_out_total 1\n"));
        assert!(out.contains("cloudlink_acked_total 0\n"));
        assert!(out.contains("cloudlink_pending_acks 3\n"));
    }
}
