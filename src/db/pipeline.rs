//! Buffered (fire-and-forget) mutation execution.
//!
//! A fixed pool of worker threads drains a shared queue. Each statement runs
//! in its own self-committing transaction; failures land in a retry list that
//! callers can inspect, drain, or replay.
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, info, warn};

use super::config::PipelineConfig;
use super::metrics::{PipelineCounters, PipelineStats};
use super::transaction::Txn;
use super::transport::{CancelToken, Transport, TxnMode};
use crate::error::{DqlError, Result};
use crate::query::Statement;

/// A compiled mutation waiting for (or undergoing) execution.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingMutation {
    /// Pipeline-unique id returned by [`MutationPipeline::submit`].
    pub id: u64,
    /// The compiled statement, untouched by execution.
    pub statement: Statement,
    /// Executions so far.
    pub attempts: u32,
}

/// A mutation whose last execution failed.
#[derive(Clone, Debug)]
pub struct FailedMutation {
    /// The mutation as it was executed.
    pub mutation: PendingMutation,
    /// Rendered error of the last attempt.
    pub error: String,
    /// When the last attempt failed.
    pub failed_at: Instant,
}

#[derive(Default)]
struct QueueState {
    pending: VecDeque<PendingMutation>,
    in_flight: usize,
    closed: bool,
}

impl QueueState {
    fn is_idle(&self) -> bool {
        self.pending.is_empty() && self.in_flight == 0
    }
}

struct Shared {
    transport: Arc<dyn Transport>,
    queue: Mutex<QueueState>,
    ready: Condvar,
    space: Condvar,
    idle: Condvar,
    capacity: usize,
    max_attempts: u32,
    retries: Mutex<Vec<FailedMutation>>,
    counters: PipelineCounters,
    next_id: AtomicU64,
}

/// Fixed-size worker pool for buffered mutations.
///
/// `submit` blocks while the queue is full, which bounds outstanding writes.
/// There is no ordering between buffered mutations. Dropping the pipeline
/// drains the queue and joins the workers.
pub struct MutationPipeline {
    shared: Arc<Shared>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    worker_count: usize,
}

impl std::fmt::Debug for MutationPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MutationPipeline")
            .field("workers", &self.worker_count)
            .field("capacity", &self.shared.capacity)
            .finish()
    }
}

impl MutationPipeline {
    /// Starts `config.workers` persistent workers.
    pub fn spawn(transport: Arc<dyn Transport>, config: &PipelineConfig) -> Result<Self> {
        if config.workers == 0 {
            return Err(DqlError::invalid("pipeline needs at least one worker"));
        }
        let shared = Arc::new(Shared {
            transport,
            queue: Mutex::new(QueueState::default()),
            ready: Condvar::new(),
            space: Condvar::new(),
            idle: Condvar::new(),
            capacity: config.effective_capacity(),
            max_attempts: config.max_attempts.max(1),
            retries: Mutex::new(Vec::new()),
            counters: PipelineCounters::default(),
            next_id: AtomicU64::new(1),
        });
        let pipeline = Self {
            shared,
            workers: Mutex::new(Vec::with_capacity(config.workers)),
            worker_count: config.workers,
        };
        for idx in 0..config.workers {
            let shared = Arc::clone(&pipeline.shared);
            let handle = thread::Builder::new()
                .name(format!("dql-mutation-{idx}"))
                .spawn(move || worker_loop(shared, idx))?;
            pipeline.workers.lock().push(handle);
        }
        info!(
            workers = config.workers,
            capacity = pipeline.shared.capacity,
            "dql.pipeline.started"
        );
        Ok(pipeline)
    }

    /// Number of workers.
    pub fn workers(&self) -> usize {
        self.worker_count
    }

    /// Queues a compiled mutation, blocking while the queue is full.
    pub fn submit(&self, statement: Statement) -> Result<u64> {
        if !statement.is_mutation() {
            return Err(DqlError::invalid("only mutations can be buffered"));
        }
        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
        self.enqueue(PendingMutation {
            id,
            statement,
            attempts: 0,
        })
        .map_err(|_| DqlError::PipelineClosed)?;
        self.shared.counters.submitted();
        Ok(id)
    }

    fn enqueue(&self, mutation: PendingMutation) -> std::result::Result<(), PendingMutation> {
        let mut guard = self.shared.queue.lock();
        while !guard.closed && guard.pending.len() >= self.shared.capacity {
            self.shared.space.wait(&mut guard);
        }
        if guard.closed {
            return Err(mutation);
        }
        debug!(
            id = mutation.id,
            attempts = mutation.attempts,
            pending = guard.pending.len(),
            "dql.pipeline.enqueue"
        );
        guard.pending.push_back(mutation);
        self.shared.ready.notify_one();
        Ok(())
    }

    /// Blocks until the queue is empty and nothing is in flight.
    pub fn flush(&self) {
        let mut guard = self.shared.queue.lock();
        while !guard.is_idle() {
            self.shared.idle.wait(&mut guard);
        }
    }

    /// Like [`MutationPipeline::flush`] with a timeout; returns whether the
    /// pipeline went idle.
    pub fn flush_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut guard = self.shared.queue.lock();
        while !guard.is_idle() {
            if self.shared.idle.wait_until(&mut guard, deadline).timed_out() {
                return guard.is_idle();
            }
        }
        true
    }

    /// Snapshot of the retry list.
    pub fn retries(&self) -> Vec<FailedMutation> {
        self.shared.retries.lock().clone()
    }

    /// Removes and returns the retry list.
    pub fn take_retries(&self) -> Vec<FailedMutation> {
        std::mem::take(&mut *self.shared.retries.lock())
    }

    /// Resubmits failed mutations that still have attempts left.
    ///
    /// Entries that used up `max_attempts` stay in the retry list. Returns
    /// how many mutations were requeued.
    pub fn replay_retries(&self) -> Result<usize> {
        let failed = self.take_retries();
        let (replay, exhausted): (Vec<_>, Vec<_>) = failed
            .into_iter()
            .partition(|f| f.mutation.attempts < self.shared.max_attempts);
        if !exhausted.is_empty() {
            self.shared.retries.lock().extend(exhausted);
        }

        let mut replayed = 0;
        let mut remaining = replay.into_iter();
        while let Some(entry) = remaining.next() {
            let error = entry.error;
            let failed_at = entry.failed_at;
            if let Err(mutation) = self.enqueue(entry.mutation) {
                let mut retries = self.shared.retries.lock();
                retries.push(FailedMutation {
                    mutation,
                    error,
                    failed_at,
                });
                retries.extend(remaining);
                self.shared.counters.replayed(replayed as u64);
                return Err(DqlError::PipelineClosed);
            }
            replayed += 1;
        }
        self.shared.counters.replayed(replayed as u64);
        if replayed > 0 {
            info!(replayed, "dql.pipeline.replay");
        }
        Ok(replayed)
    }

    /// Counters and gauges.
    pub fn stats(&self) -> PipelineStats {
        let (queued, in_flight) = {
            let guard = self.shared.queue.lock();
            (guard.pending.len(), guard.in_flight)
        };
        let backlog = self.shared.retries.lock().len();
        self.shared.counters.snapshot(queued, in_flight, backlog)
    }

    /// Stops accepting work, lets workers drain the queue, and joins them.
    pub fn shutdown(&self) {
        {
            let mut guard = self.shared.queue.lock();
            guard.closed = true;
        }
        self.shared.ready.notify_all();
        self.shared.space.notify_all();
        let handles = std::mem::take(&mut *self.workers.lock());
        if handles.is_empty() {
            return;
        }
        for handle in handles {
            if handle.join().is_err() {
                warn!("dql.pipeline.worker_panicked");
            }
        }
        info!("dql.pipeline.shutdown");
    }
}

impl Drop for MutationPipeline {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(shared: Arc<Shared>, idx: usize) {
    loop {
        let mut mutation = {
            let mut guard = shared.queue.lock();
            loop {
                if let Some(next) = guard.pending.pop_front() {
                    guard.in_flight += 1;
                    shared.space.notify_one();
                    break next;
                }
                if guard.closed {
                    debug!(worker = idx, "dql.pipeline.worker_exit");
                    return;
                }
                shared.ready.wait(&mut guard);
            }
        };

        mutation.attempts += 1;
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            execute(shared.transport.as_ref(), &mutation.statement)
        }))
        .unwrap_or_else(|_| Err(DqlError::transport("transport panicked")));

        match result {
            Ok(()) => {
                shared.counters.succeeded();
                debug!(worker = idx, id = mutation.id, "dql.pipeline.executed");
            }
            Err(err) => {
                shared.counters.failed();
                warn!(
                    worker = idx,
                    id = mutation.id,
                    attempts = mutation.attempts,
                    error = %err,
                    "dql.pipeline.failed"
                );
                shared.retries.lock().push(FailedMutation {
                    mutation,
                    error: err.to_string(),
                    failed_at: Instant::now(),
                });
            }
        }

        let mut guard = shared.queue.lock();
        guard.in_flight -= 1;
        if guard.is_idle() {
            shared.idle.notify_all();
        }
    }
}

fn execute(transport: &dyn Transport, statement: &Statement) -> Result<()> {
    let mut txn = Txn::begin(transport, TxnMode::ReadWrite, CancelToken::new())?;
    txn.execute(statement, true)?;
    Ok(())
}
