use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time view of the mutation pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub submitted: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub replayed: u64,
    pub queued: usize,
    pub in_flight: usize,
    pub retry_backlog: usize,
}

impl PipelineStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn success_rate(&self) -> f64 {
        let total = self.succeeded + self.failed;
        if total == 0 {
            0.0
        } else {
            self.succeeded as f64 / total as f64
        }
    }

    pub fn report(&self) -> String {
        format!(
            "=== Mutation Pipeline ===\n\
             Submitted:      {}\n\
             Succeeded:      {}\n\
             Failed:         {}\n\
             Replayed:       {}\n\
             Success Rate:   {:.2}%\n\
             Queued:         {}\n\
             In Flight:      {}\n\
             Retry Backlog:  {}",
            self.submitted,
            self.succeeded,
            self.failed,
            self.replayed,
            self.success_rate() * 100.0,
            self.queued,
            self.in_flight,
            self.retry_backlog,
        )
    }
}

#[derive(Debug, Default)]
pub(crate) struct PipelineCounters {
    submitted: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    replayed: AtomicU64,
}

impl PipelineCounters {
    pub(crate) fn submitted(&self) {
        self.submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn succeeded(&self) {
        self.succeeded.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn replayed(&self, n: u64) {
        self.replayed.fetch_add(n, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self, queued: usize, in_flight: usize, retry_backlog: usize) -> PipelineStats {
        PipelineStats {
            submitted: self.submitted.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            replayed: self.replayed.load(Ordering::Relaxed),
            queued,
            in_flight,
            retry_backlog,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_rate_handles_zero() {
        assert_eq!(PipelineStats::new().success_rate(), 0.0);
        let counters = PipelineCounters::default();
        counters.submitted();
        counters.succeeded();
        counters.submitted();
        counters.failed();
        let stats = counters.snapshot(0, 0, 1);
        assert_eq!(stats.submitted, 2);
        assert!((stats.success_rate() - 0.5).abs() < f64::EPSILON);
        assert!(stats.report().contains("Retry Backlog:  1"));
    }
}
