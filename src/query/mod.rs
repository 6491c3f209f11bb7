#![forbid(unsafe_code)]

//! Statement compiler.
//!
//! Builds graph-query statements from typed builders and renders them into
//! the wire text format, binding every string and integer argument through a
//! statement-scoped variable table.

/// Query and mutation builder.
///
/// Fluent API that collects the root function, the field tree, modifiers,
/// directives and mutation payloads.
pub mod builder;

/// Statement compilation and multi-query batches.
pub mod compile;

/// Field selection tree.
pub mod field;

/// Post-filter clauses and boolean filter expressions.
pub mod filter;

/// Root and filter functions with arity validation.
pub mod function;

/// Ordering, pagination, aggregate and facet modifiers keyed by field path.
pub mod modifier;

/// Typed argument values.
pub mod value;

/// Parameter table shared by one statement or one batch.
pub mod vars;

pub use builder::{Directive, Mutation, MutationKind, MutationPayload, Operation, Query};
pub use compile::{QueryBatch, Statement, StatementKind};
pub use field::{Field, FieldFlags};
pub use filter::{Filter, FilterExpr};
pub use function::{FuncKind, Function};
pub use modifier::{Aggregate, AggregateKind, Direction, OrderBy, Pagination};
pub use value::{Value, ValueKind};
pub use vars::{Binding, VarTable};
