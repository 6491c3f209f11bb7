use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, info, warn};

use super::transport::{CancelToken, RemoteTxn, Request, Response, Transport, TxnMode};
use crate::error::{DqlError, Result};
use crate::query::{Query, QueryBatch, Statement};

static NEXT_TXN_ID: AtomicU64 = AtomicU64::new(1);

/// The state of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxnState {
    /// Transaction is open and can execute statements.
    Active,
    /// Transaction was committed, explicitly or by a self-committing mutation.
    Committed,
    /// Transaction was discarded.
    Discarded,
}

/// A remote transaction with guaranteed cleanup.
///
/// Every exit path ends in exactly one `commit` or `discard` on the remote
/// side: dropping an active transaction discards it, and a cancelled token
/// discards it instead of committing.
///
/// # Lifecycle
///
/// 1. Open with [`crate::Client::txn`] or [`crate::Client::read_only_txn`]
/// 2. Run queries and mutations
/// 3. `commit()`, `discard()`, or drop
pub struct Txn {
    remote: Box<dyn RemoteTxn>,
    id: u64,
    mode: TxnMode,
    state: TxnState,
    cancel: CancelToken,
}

impl std::fmt::Debug for Txn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Txn")
            .field("id", &self.id)
            .field("mode", &self.mode)
            .field("state", &self.state)
            .finish()
    }
}

impl Txn {
    pub(crate) fn begin(
        transport: &dyn Transport,
        mode: TxnMode,
        cancel: CancelToken,
    ) -> Result<Self> {
        cancel.check()?;
        let remote = transport.begin(mode)?;
        let id = NEXT_TXN_ID.fetch_add(1, Ordering::Relaxed);
        debug!(txn_id = id, mode = ?mode, "dql.txn.begin");
        Ok(Self {
            remote,
            id,
            mode,
            state: TxnState::Active,
            cancel,
        })
    }

    /// Process-unique transaction id, for logging.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Access mode.
    pub fn mode(&self) -> TxnMode {
        self.mode
    }

    /// Current state.
    pub fn state(&self) -> TxnState {
        self.state
    }

    /// Compiles and runs a read query.
    pub fn query(&mut self, query: &Query) -> Result<Response> {
        let statement = query.compile()?;
        if statement.is_mutation() {
            return Err(DqlError::invalid("use mutate() for mutation statements"));
        }
        self.execute(&statement, false)
    }

    /// Compiles and runs a merged query batch.
    pub fn query_batch(&mut self, batch: &QueryBatch) -> Result<Response> {
        let statement = batch.compile()?;
        self.execute(&statement, false)
    }

    /// Compiles and runs a mutation without committing.
    pub fn mutate(&mut self, query: &Query) -> Result<Response> {
        let statement = query.compile()?;
        self.execute(&statement, false)
    }

    /// Compiles and runs a mutation, committing in the same call.
    pub fn mutate_and_commit(&mut self, query: &Query) -> Result<Response> {
        let statement = query.compile()?;
        self.execute(&statement, true)
    }

    /// Runs an already compiled statement.
    ///
    /// A fired cancellation token discards the transaction and returns
    /// [`DqlError::Cancelled`].
    pub fn execute(&mut self, statement: &Statement, commit_now: bool) -> Result<Response> {
        self.ensure_active()?;
        if statement.is_mutation() && self.mode == TxnMode::ReadOnly {
            return Err(DqlError::invalid("mutation in a read-only transaction"));
        }
        if let Err(err) = self.cancel.check() {
            self.discard_inner();
            return Err(err);
        }
        let request = Request {
            statement,
            commit_now,
            cancel: &self.cancel,
        };
        let response = self.remote.execute(&request)?;
        if commit_now && statement.is_mutation() {
            self.state = TxnState::Committed;
            debug!(txn_id = self.id, "dql.txn.committed_with_mutation");
        }
        Ok(response)
    }

    /// Commits the transaction.
    ///
    /// The transaction is discarded instead when the token has fired, and
    /// when the commit itself fails.
    pub fn commit(mut self) -> Result<()> {
        self.ensure_active()?;
        if let Err(err) = self.cancel.check() {
            self.discard_inner();
            return Err(err);
        }
        match self.remote.commit(&self.cancel) {
            Ok(()) => {
                self.state = TxnState::Committed;
                info!(txn_id = self.id, "dql.txn.commit");
                Ok(())
            }
            Err(err) => {
                warn!(txn_id = self.id, error = %err, "dql.txn.commit_failed");
                self.discard_inner();
                Err(err)
            }
        }
    }

    /// Discards the transaction.
    pub fn discard(mut self) -> Result<()> {
        if self.state != TxnState::Active {
            return Ok(());
        }
        self.state = TxnState::Discarded;
        debug!(txn_id = self.id, "dql.txn.discard");
        self.remote.discard()
    }

    fn discard_inner(&mut self) {
        if self.state != TxnState::Active {
            return;
        }
        self.state = TxnState::Discarded;
        if let Err(err) = self.remote.discard() {
            warn!(txn_id = self.id, error = %err, "dql.txn.discard_failed");
        } else {
            debug!(txn_id = self.id, "dql.txn.discard");
        }
    }

    fn ensure_active(&self) -> Result<()> {
        if self.state != TxnState::Active {
            return Err(DqlError::invalid("transaction is no longer active"));
        }
        Ok(())
    }
}

impl Drop for Txn {
    fn drop(&mut self) {
        self.discard_inner();
    }
}
