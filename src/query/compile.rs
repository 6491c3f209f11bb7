//! Compilation of queries, mutations, and merged query batches into wire
//! statements.
use std::collections::BTreeMap;

use tracing::debug;

use crate::error::{DqlError, Result};
use crate::query::builder::{MutationKind, Operation, Query};
use crate::query::field::render_selection;
use crate::query::modifier::{FieldMeta, RenderedModifiers, SourceKind, ROOT_PATH};
use crate::query::value::validate_name;
use crate::query::vars::VarTable;

/// What a compiled statement does on the server.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatementKind {
    /// Read-only query text.
    Query,
    /// JSON set mutation.
    Set,
    /// JSON delete mutation.
    Delete,
}

/// Wire-ready statement plus its parameter bindings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Statement {
    /// Statement kind.
    pub kind: StatementKind,
    /// Query text or mutation JSON.
    pub text: String,
    /// Parameter values keyed by name (`$p0` -> `alice`).
    pub vars: BTreeMap<String, String>,
}

impl Statement {
    /// Whether the statement writes.
    pub fn is_mutation(&self) -> bool {
        !matches!(self.kind, StatementKind::Query)
    }
}

impl Query {
    /// Validates and renders the statement.
    pub fn compile(&self) -> Result<Statement> {
        self.check()?;
        let statement = match self.operation() {
            Operation::Query => {
                let mut vars = VarTable::new();
                let block = self.render_block(&mut vars)?;
                let text = if self.is_standalone() {
                    wrap(self.statement_name(), &vars, &block)
                } else {
                    block
                };
                Statement {
                    kind: StatementKind::Query,
                    text,
                    vars: vars.bindings(),
                }
            }
            Operation::Mutation => self.compile_mutation()?,
        };
        debug!(
            name = self.statement_name(),
            kind = ?statement.kind,
            params = statement.vars.len(),
            "dql.compile.statement"
        );
        Ok(statement)
    }

    /// Renders `name(func: ...) @filter(...) @directives { fields uid }`.
    pub(crate) fn render_block(&self, vars: &mut VarTable) -> Result<String> {
        let function = self.function().ok_or(DqlError::MissingFunction)?;
        let mut out = String::new();
        out.push_str(self.statement_name());
        out.push_str("(func: ");
        out.push_str(&function.compile(vars)?);

        let meta = FieldMeta {
            predicate: self.statement_name(),
            alias: None,
            source: SourceKind::Root,
        };
        let mut mods = self.modifiers().for_path(ROOT_PATH);
        let rendered = RenderedModifiers::render(&mut mods, &meta, vars)?;
        for arg in &rendered.args {
            out.push_str(", ");
            out.push_str(arg);
        }
        out.push(')');
        for directive in &rendered.directives {
            out.push(' ');
            out.push_str(directive);
        }
        for directive in self.directives() {
            out.push(' ');
            out.push_str(&directive.render()?);
        }
        out.push(' ');
        render_selection(self.selection(), self.modifiers(), ROOT_PATH, vars, &mut out)?;
        Ok(out)
    }

    fn compile_mutation(&self) -> Result<Statement> {
        let kind = match self.mutation_kind() {
            Some(MutationKind::Set) => StatementKind::Set,
            Some(MutationKind::Delete) => StatementKind::Delete,
            None => return Err(DqlError::EmptyMutation),
        };
        let text = match self.mutations() {
            [single] => serde_json::to_string(&single.payload)?,
            many => {
                let mut parts = Vec::with_capacity(many.len());
                for m in many {
                    parts.push(serde_json::to_string(&m.payload)?);
                }
                format!("[{}]", parts.join(","))
            }
        };
        Ok(Statement {
            kind,
            text,
            vars: BTreeMap::new(),
        })
    }
}

/// Several read queries sent as one request.
///
/// Queries are renamed `q0, q1, ...` and share one variable table, so their
/// parameter names never collide under the common declaration header.
#[derive(Clone, Debug)]
pub struct QueryBatch {
    name: String,
    queries: Vec<Query>,
}

impl Default for QueryBatch {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryBatch {
    /// Empty batch whose header is named `q`.
    pub fn new() -> Self {
        Self::named(crate::query::builder::DEFAULT_QUERY_NAME)
    }

    /// Empty batch with a custom header name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            queries: Vec::new(),
        }
    }

    /// Adds a query, renaming it and marking it non-standalone.
    pub fn push(&mut self, mut query: Query) {
        query.rename(format!("q{}", self.queries.len()));
        query.set_standalone(false);
        self.queries.push(query);
    }

    /// Builder form of [`QueryBatch::push`].
    pub fn with(mut self, query: Query) -> Self {
        self.push(query);
        self
    }

    /// Number of queries.
    pub fn len(&self) -> usize {
        self.queries.len()
    }

    /// Whether the batch is empty.
    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }

    /// Queries in batch order.
    pub fn queries(&self) -> &[Query] {
        &self.queries
    }

    /// Renders every query under one shared header.
    pub fn compile(&self) -> Result<Statement> {
        if self.queries.is_empty() {
            return Err(DqlError::invalid("query batch is empty"));
        }
        validate_name(&self.name)?;
        let mut vars = VarTable::new();
        let mut blocks = Vec::with_capacity(self.queries.len());
        for query in &self.queries {
            if query.operation() != Operation::Query {
                return Err(DqlError::invalid("mutations cannot be merged into a query batch"));
            }
            query.check()?;
            blocks.push(query.render_block(&mut vars)?);
        }
        debug!(
            queries = self.queries.len(),
            params = vars.len(),
            "dql.compile.batch"
        );
        Ok(Statement {
            kind: StatementKind::Query,
            text: wrap(&self.name, &vars, &blocks.join(" ")),
            vars: vars.bindings(),
        })
    }
}

impl FromIterator<Query> for QueryBatch {
    fn from_iter<T: IntoIterator<Item = Query>>(iter: T) -> Self {
        let mut batch = QueryBatch::new();
        for query in iter {
            batch.push(query);
        }
        batch
    }
}

fn wrap(name: &str, vars: &VarTable, body: &str) -> String {
    if vars.is_empty() {
        format!("{{ {body} }}")
    } else {
        format!("query {name}({}) {{ {body} }}", vars.declarations())
    }
}
