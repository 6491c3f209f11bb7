use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use super::config::ClientConfig;
use super::metrics::PipelineStats;
use super::pipeline::{FailedMutation, MutationPipeline};
use super::transaction::Txn;
use super::transport::{CancelToken, Response, Transport, TxnMode};
use crate::error::{DqlError, Result};
use crate::query::{Query, QueryBatch, Statement};

/// Entry point for running compiled statements against a database.
///
/// Owns the transport handle and the buffered mutation pipeline. Synchronous
/// calls open a transaction per call; buffered mutations go through the
/// worker pool and report failures through the retry list.
pub struct Client {
    transport: Arc<dyn Transport>,
    pipeline: MutationPipeline,
    config: ClientConfig,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("endpoint", &self.config.endpoint.address())
            .field("pipeline", &self.pipeline)
            .finish()
    }
}

impl Client {
    pub fn new(transport: Arc<dyn Transport>) -> Result<Self> {
        Self::with_config(transport, ClientConfig::default())
    }

    pub fn with_config(transport: Arc<dyn Transport>, config: ClientConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|err| DqlError::invalid(err.to_string()))?;
        let pipeline = MutationPipeline::spawn(Arc::clone(&transport), &config.pipeline)?;
        info!(
            endpoint = %config.endpoint.address(),
            workers = config.pipeline.workers,
            "dql.client.open"
        );
        Ok(Self {
            transport,
            pipeline,
            config,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Token carrying the configured default deadline, if any.
    pub fn default_token(&self) -> CancelToken {
        match self.config.default_timeout_ms {
            Some(ms) => CancelToken::with_timeout(Duration::from_millis(ms)),
            None => CancelToken::new(),
        }
    }

    /// Opens a read-write transaction.
    pub fn txn(&self) -> Result<Txn> {
        self.txn_with(TxnMode::ReadWrite, self.default_token())
    }

    /// Opens a read-only transaction.
    pub fn read_only_txn(&self) -> Result<Txn> {
        self.txn_with(TxnMode::ReadOnly, self.default_token())
    }

    pub fn txn_with(&self, mode: TxnMode, cancel: CancelToken) -> Result<Txn> {
        Txn::begin(self.transport.as_ref(), mode, cancel)
    }

    /// Runs a read query in its own read-only transaction.
    pub fn query(&self, query: &Query) -> Result<Response> {
        self.query_with(query, self.default_token())
    }

    pub fn query_with(&self, query: &Query, cancel: CancelToken) -> Result<Response> {
        let statement = query.compile()?;
        if statement.is_mutation() {
            return Err(DqlError::invalid("use mutate() for mutation statements"));
        }
        self.read(&statement, cancel)
    }

    /// Runs several queries as one merged request.
    pub fn query_batch(&self, batch: &QueryBatch) -> Result<Response> {
        let statement = batch.compile()?;
        self.read(&statement, self.default_token())
    }

    fn read(&self, statement: &Statement, cancel: CancelToken) -> Result<Response> {
        let mut txn = self.txn_with(TxnMode::ReadOnly, cancel)?;
        let response = txn.execute(statement, false)?;
        let txn_id = txn.id();
        if let Err(err) = txn.discard() {
            warn!(txn_id, error = %err, "dql.client.discard_failed");
        }
        Ok(response)
    }

    /// Runs a mutation synchronously, committing in the same call.
    pub fn mutate(&self, mutation: &Query) -> Result<Response> {
        self.mutate_with(mutation, self.default_token())
    }

    pub fn mutate_with(&self, mutation: &Query, cancel: CancelToken) -> Result<Response> {
        let statement = mutation.compile()?;
        if !statement.is_mutation() {
            return Err(DqlError::invalid("use query() for read statements"));
        }
        let mut txn = self.txn_with(TxnMode::ReadWrite, cancel)?;
        txn.execute(&statement, true)
    }

    /// Compiles a mutation and hands it to the worker pool.
    ///
    /// Compile errors are returned here; execution errors end up in
    /// [`Client::retries`].
    pub fn mutate_buffered(&self, mutation: &Query) -> Result<u64> {
        let statement = mutation.compile()?;
        self.pipeline.submit(statement)
    }

    pub fn pipeline(&self) -> &MutationPipeline {
        &self.pipeline
    }

    /// Waits until every buffered mutation has been executed.
    pub fn flush(&self) {
        self.pipeline.flush();
    }

    pub fn retries(&self) -> Vec<FailedMutation> {
        self.pipeline.retries()
    }

    pub fn replay_retries(&self) -> Result<usize> {
        self.pipeline.replay_retries()
    }

    pub fn stats(&self) -> PipelineStats {
        self.pipeline.stats()
    }

    /// Drains buffered mutations and stops the workers.
    pub fn shutdown(&self) {
        self.pipeline.shutdown();
    }
}
