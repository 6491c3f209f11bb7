#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dqlc::db::{CancelToken, RemoteTxn, Request, Response, Transport, TxnMode};
use dqlc::{DqlError, Result};
use parking_lot::Mutex;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    Begin(TxnMode),
    Execute { text: String, commit_now: bool },
    Commit,
    Discard,
}

#[derive(Default)]
struct State {
    events: Mutex<Vec<Event>>,
    fail_execute: AtomicBool,
    fail_commit: AtomicBool,
    fail_discard: AtomicBool,
    panic_execute: AtomicBool,
    executed: AtomicUsize,
    delay: Mutex<Option<Duration>>,
}

/// In-memory transport that records every call.
#[derive(Clone, Default)]
pub struct FakeTransport {
    state: Arc<State>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        let transport = Self::new();
        transport.set_fail_execute(true);
        transport
    }

    pub fn set_fail_execute(&self, fail: bool) {
        self.state.fail_execute.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_commit(&self, fail: bool) {
        self.state.fail_commit.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_discard(&self, fail: bool) {
        self.state.fail_discard.store(fail, Ordering::SeqCst);
    }

    pub fn set_panic_execute(&self, panic: bool) {
        self.state.panic_execute.store(panic, Ordering::SeqCst);
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.state.delay.lock() = Some(delay);
    }

    pub fn events(&self) -> Vec<Event> {
        self.state.events.lock().clone()
    }

    pub fn count(&self, want: &Event) -> usize {
        self.state.events.lock().iter().filter(|e| *e == want).count()
    }

    pub fn executed(&self) -> usize {
        self.state.executed.load(Ordering::SeqCst)
    }

    pub fn shared(&self) -> Arc<dyn Transport> {
        Arc::new(self.clone())
    }
}

impl Transport for FakeTransport {
    fn begin(&self, mode: TxnMode) -> Result<Box<dyn RemoteTxn>> {
        self.state.events.lock().push(Event::Begin(mode));
        Ok(Box::new(FakeTxn {
            state: Arc::clone(&self.state),
        }))
    }
}

struct FakeTxn {
    state: Arc<State>,
}

impl RemoteTxn for FakeTxn {
    fn execute(&mut self, request: &Request<'_>) -> Result<Response> {
        if self.state.panic_execute.load(Ordering::SeqCst) {
            panic!("remote connection lost mid-call");
        }
        let delay = *self.state.delay.lock();
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }
        self.state.events.lock().push(Event::Execute {
            text: request.statement.text.clone(),
            commit_now: request.commit_now,
        });
        if self.state.fail_execute.load(Ordering::SeqCst) {
            return Err(DqlError::transport("connection refused"));
        }
        self.state.executed.fetch_add(1, Ordering::SeqCst);
        let mut response = Response {
            json: br#"{"q":[]}"#.to_vec(),
            ..Response::default()
        };
        if request.statement.is_mutation() {
            response.uids.insert("a".to_owned(), "0x1".to_owned());
        }
        Ok(response)
    }

    fn commit(&mut self, cancel: &CancelToken) -> Result<()> {
        cancel.check()?;
        self.state.events.lock().push(Event::Commit);
        if self.state.fail_commit.load(Ordering::SeqCst) {
            return Err(DqlError::transport("commit aborted"));
        }
        Ok(())
    }

    fn discard(&mut self) -> Result<()> {
        self.state.events.lock().push(Event::Discard);
        if self.state.fail_discard.load(Ordering::SeqCst) {
            return Err(DqlError::transport("discard timed out"));
        }
        Ok(())
    }
}
