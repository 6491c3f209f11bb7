//! Boundary to the network layer.
//!
//! The crate never speaks the wire protocol itself. A [`Transport`] opens
//! remote transactions; each [`RemoteTxn`] executes compiled statements and is
//! finished by exactly one `commit` or `discard`.
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;

use crate::error::{DqlError, Result};
use crate::query::Statement;

/// Transaction access mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TxnMode {
    ReadOnly,
    ReadWrite,
}

/// Opens transactions against the remote database.
pub trait Transport: Send + Sync {
    /// Begins a transaction in the given mode.
    fn begin(&self, mode: TxnMode) -> Result<Box<dyn RemoteTxn>>;
}

/// One open remote transaction.
pub trait RemoteTxn: Send {
    /// Executes one statement.
    fn execute(&mut self, request: &Request<'_>) -> Result<Response>;
    /// Commits the transaction.
    fn commit(&mut self, cancel: &CancelToken) -> Result<()>;
    /// Discards the transaction.
    fn discard(&mut self) -> Result<()>;
}

/// A statement handed to [`RemoteTxn::execute`].
#[derive(Debug)]
pub struct Request<'a> {
    /// Compiled statement with its bindings.
    pub statement: &'a Statement,
    /// Ask the server to commit as part of this call.
    pub commit_now: bool,
    /// Deadline and cancellation for the call.
    pub cancel: &'a CancelToken,
}

/// Raw server answer.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Response {
    /// JSON result bytes of a query.
    pub json: Vec<u8>,
    /// Blank-node name to assigned node identifier, for mutations.
    pub uids: HashMap<String, String>,
}

impl Response {
    /// Decodes the JSON body into a caller type.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.json)?)
    }
}

/// Cooperative cancellation flag with an optional deadline.
///
/// Clones share the flag.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl CancelToken {
    /// Token that never fires on its own.
    pub fn new() -> Self {
        Self::default()
    }

    /// Token that fires at `deadline`.
    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            deadline: Some(deadline),
        }
    }

    /// Token that fires after `timeout`.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    /// Fires the token for every clone.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Whether the token was cancelled or its deadline passed.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
            || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Time left before the deadline, if one is set.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Returns [`DqlError::Cancelled`] once the token has fired.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(DqlError::Cancelled)
        } else {
            Ok(())
        }
    }
}
