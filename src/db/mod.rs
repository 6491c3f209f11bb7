mod client;
mod config;
mod metrics;
mod pipeline;
mod transaction;
mod transport;

pub use client::Client;
pub use config::{ClientConfig, ConfigError, Endpoint, PipelineConfig, TlsConfig};
pub use metrics::PipelineStats;
pub use pipeline::{FailedMutation, MutationPipeline, PendingMutation};
pub use transaction::{Txn, TxnState};
pub use transport::{CancelToken, RemoteTxn, Request, Response, Transport, TxnMode};
