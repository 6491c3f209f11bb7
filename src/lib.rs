//! Typed builder and compiler for graph query and mutation statements.
//!
//! [`query`] turns builder calls into statement text plus a bindings map,
//! routing every string and integer argument through parameters. [`db`]
//! runs compiled statements over a pluggable [`db::Transport`], either
//! synchronously inside a transaction or through a buffered worker pool.
//!
//! ```
//! use dqlc::{Function, Query};
//!
//! let stmt = Query::new()
//!     .name("people")
//!     .func(Function::eq("name", "Alice"))
//!     .fields(["name", "age"])
//!     .compile()
//!     .unwrap();
//! assert!(stmt.text.starts_with("query people($p0: string)"));
//! assert_eq!(stmt.vars["$p0"], "Alice");
//! ```

#![warn(missing_docs)]

pub mod db;
pub mod error;
pub mod query;

pub use db::{CancelToken, Client, ClientConfig, MutationPipeline, Transport, Txn, TxnMode};
pub use error::{DqlError, Result};
pub use query::{
    Field, Filter, FilterExpr, FuncKind, Function, Query, QueryBatch, Statement, Value,
};
