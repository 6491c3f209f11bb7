#![allow(missing_docs)]

mod common;

use std::time::Duration;

use common::{Event, FakeTransport};
use dqlc::db::{CancelToken, ClientConfig, TxnMode, TxnState};
use dqlc::query::{Function, Query, QueryBatch};
use dqlc::{Client, DqlError, Result};
use serde_json::json;

fn client(transport: &FakeTransport) -> Result<Client> {
    Client::new(transport.shared())
}

fn read_query() -> Query {
    Query::new().func(Function::has("name")).field("name")
}

fn set_mutation() -> Query {
    Query::mutation().set(&json!({"uid": "_:a", "name": "Ann"}))
}

#[test]
fn query_runs_in_a_discarded_read_only_txn() -> Result<()> {
    let transport = FakeTransport::new();
    let client = client(&transport)?;
    let response = client.query(&read_query())?;
    let body: serde_json::Value = response.decode()?;
    assert!(body["q"].is_array());
    assert_eq!(
        transport.events(),
        vec![
            Event::Begin(TxnMode::ReadOnly),
            Event::Execute {
                text: "{ q(func: has(<name>)) { name uid } }".to_owned(),
                commit_now: false,
            },
            Event::Discard,
        ]
    );
    Ok(())
}

#[test]
fn sync_mutation_commits_in_the_same_call() -> Result<()> {
    let transport = FakeTransport::new();
    let client = client(&transport)?;
    let response = client.mutate(&set_mutation())?;
    assert_eq!(response.uids.get("a").map(String::as_str), Some("0x1"));
    assert_eq!(transport.count(&Event::Discard), 0);
    assert!(matches!(
        transport.events().last(),
        Some(Event::Execute { commit_now: true, .. })
    ));
    Ok(())
}

#[test]
fn dropping_an_active_txn_discards_it() -> Result<()> {
    let transport = FakeTransport::new();
    let client = client(&transport)?;
    {
        let mut txn = client.txn()?;
        txn.mutate(&set_mutation())?;
        assert_eq!(txn.state(), TxnState::Active);
    }
    assert_eq!(transport.count(&Event::Discard), 1);
    assert_eq!(transport.count(&Event::Commit), 0);
    Ok(())
}

#[test]
fn explicit_commit_does_not_discard() -> Result<()> {
    let transport = FakeTransport::new();
    let client = client(&transport)?;
    let mut txn = client.txn()?;
    txn.mutate(&set_mutation())?;
    txn.commit()?;
    assert_eq!(transport.count(&Event::Commit), 1);
    assert_eq!(transport.count(&Event::Discard), 0);
    Ok(())
}

#[test]
fn failed_commit_discards() -> Result<()> {
    let transport = FakeTransport::new();
    transport.set_fail_commit(true);
    let client = client(&transport)?;
    let mut txn = client.txn()?;
    txn.mutate(&set_mutation())?;
    let err = txn.commit().unwrap_err();
    assert_eq!(err.to_string(), "transport: commit aborted");
    assert_eq!(transport.count(&Event::Discard), 1);
    Ok(())
}

#[test]
fn cancelled_token_discards_instead_of_committing() -> Result<()> {
    let transport = FakeTransport::new();
    let client = client(&transport)?;
    let token = CancelToken::new();
    let mut txn = client.txn_with(TxnMode::ReadWrite, token.clone())?;
    txn.mutate(&set_mutation())?;
    token.cancel();
    assert!(matches!(txn.commit(), Err(DqlError::Cancelled)));
    assert_eq!(transport.count(&Event::Commit), 0);
    assert_eq!(transport.count(&Event::Discard), 1);
    Ok(())
}

#[test]
fn expired_deadline_never_reaches_the_wire() -> Result<()> {
    let transport = FakeTransport::new();
    let client = client(&transport)?;
    let token = CancelToken::with_timeout(Duration::ZERO);
    let err = client.query_with(&read_query(), token).unwrap_err();
    assert!(matches!(err, DqlError::Cancelled));
    assert!(transport.events().is_empty());
    Ok(())
}

#[test]
fn read_only_txn_rejects_mutations() -> Result<()> {
    let transport = FakeTransport::new();
    let client = client(&transport)?;
    let mut txn = client.read_only_txn()?;
    let err = txn.mutate(&set_mutation()).unwrap_err();
    assert!(matches!(err, DqlError::InvalidArgument(_)));
    drop(txn);
    assert_eq!(transport.executed(), 0);
    Ok(())
}

#[test]
fn transport_failure_is_returned_with_prefix() -> Result<()> {
    let transport = FakeTransport::failing();
    let client = client(&transport)?;
    let err = client.mutate(&set_mutation()).unwrap_err();
    assert_eq!(err.to_string(), "transport: connection refused");
    assert_eq!(err.code(), "TransportFailure");
    assert_eq!(transport.count(&Event::Discard), 1);
    assert!(client.retries().is_empty());
    Ok(())
}

#[test]
fn compile_errors_never_open_a_txn() -> Result<()> {
    let transport = FakeTransport::new();
    let client = client(&transport)?;
    let err = client
        .query(&Query::new().func(Function::has("a").predicate("b")))
        .unwrap_err();
    assert!(err.is_compile_error());
    let err = client.mutate(&Query::mutation()).unwrap_err();
    assert!(matches!(err, DqlError::EmptyMutation));
    let err = client.mutate(&read_query()).unwrap_err();
    assert!(matches!(err, DqlError::InvalidArgument(_)));
    assert!(transport.events().is_empty());
    Ok(())
}

#[test]
fn batch_is_one_request() -> Result<()> {
    let transport = FakeTransport::new();
    let client = client(&transport)?;
    let batch: QueryBatch = [read_query(), read_query()].into_iter().collect();
    client.query_batch(&batch)?;
    assert_eq!(transport.executed(), 1);
    Ok(())
}

#[test]
fn txn_is_unusable_after_self_commit() -> Result<()> {
    let transport = FakeTransport::new();
    let client = client(&transport)?;
    let mut txn = client.txn()?;
    txn.mutate_and_commit(&set_mutation())?;
    assert_eq!(txn.state(), TxnState::Committed);
    assert!(txn.query(&read_query()).is_err());
    drop(txn);
    assert_eq!(transport.count(&Event::Discard), 0);
    Ok(())
}

#[test]
fn default_timeout_is_applied() -> Result<()> {
    let transport = FakeTransport::new();
    let config = ClientConfig {
        default_timeout_ms: Some(60_000),
        ..ClientConfig::default()
    };
    let client = Client::with_config(transport.shared(), config)?;
    assert!(client.default_token().remaining().is_some());
    client.query(&read_query())?;
    Ok(())
}

#[test]
fn failed_discard_after_read_keeps_the_response() -> Result<()> {
    let transport = FakeTransport::new();
    transport.set_fail_discard(true);
    let client = client(&transport)?;
    let response = client.query(&read_query())?;
    let body: serde_json::Value = response.decode()?;
    assert!(body["q"].is_array());
    assert_eq!(transport.count(&Event::Discard), 1);
    Ok(())
}
