//! Fluent query and mutation builder.
use serde::Serialize;
use tracing::debug;

use crate::error::{DqlError, Result};
use crate::query::field::Field;
use crate::query::filter::Filter;
use crate::query::function::Function;
use crate::query::modifier::{Aggregate, Modifiers, OrderBy, Pagination, ROOT_PATH};
use crate::query::value::{validate_name, validate_predicate};

/// Default statement name.
pub const DEFAULT_QUERY_NAME: &str = "q";

/// Whether a [`Query`] reads or writes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operation {
    Query,
    Mutation,
}

/// Mutation flavour. The two are never mixed in one statement.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MutationKind {
    Set,
    Delete,
}

/// Capability to encode a mutation payload into its wire JSON form.
///
/// Every `Serialize` type gets this for free.
pub trait MutationPayload {
    /// Encodes the payload.
    fn encode(&self) -> Result<serde_json::Value>;
}

impl<T: Serialize + ?Sized> MutationPayload for T {
    fn encode(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }
}

/// One encoded mutation payload.
#[derive(Clone, Debug, PartialEq)]
pub struct Mutation {
    /// Set or delete.
    pub kind: MutationKind,
    /// Encoded payload.
    pub payload: serde_json::Value,
}

/// Root-level directive rendered after the root filter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Directive {
    /// `@cascade`, optionally restricted to some predicates.
    Cascade(Vec<String>),
    /// `@normalize`
    Normalize,
    /// `@ignorereflex`
    IgnoreReflex,
    /// `@recurse(depth: N, loop: B)`
    Recurse {
        depth: Option<u32>,
        allow_loop: bool,
    },
}

impl Directive {
    pub(crate) fn render(&self) -> Result<String> {
        match self {
            Directive::Cascade(fields) if fields.is_empty() => Ok("@cascade".to_owned()),
            Directive::Cascade(fields) => {
                for field in fields {
                    validate_predicate(field)?;
                }
                Ok(format!("@cascade({})", fields.join(", ")))
            }
            Directive::Normalize => Ok("@normalize".to_owned()),
            Directive::IgnoreReflex => Ok("@ignorereflex".to_owned()),
            Directive::Recurse { depth, allow_loop } => {
                let mut args = Vec::new();
                if let Some(depth) = depth {
                    args.push(format!("depth: {depth}"));
                }
                if *allow_loop {
                    args.push("loop: true".to_owned());
                }
                if args.is_empty() {
                    Ok("@recurse".to_owned())
                } else {
                    Ok(format!("@recurse({})", args.join(", ")))
                }
            }
        }
    }
}

/// Root aggregate of a statement: function, field tree, modifiers, and for
/// mutations the payload list.
///
/// Builder methods never fail; the first payload encoding error is kept and
/// reported by [`Query::check`].
///
/// ```
/// use dqlc::query::{Field, Function, Query};
///
/// let stmt = Query::new()
///     .func(Function::has("value"))
///     .fields(["value", "value2"])
///     .compile()
///     .unwrap();
/// assert_eq!(stmt.text, "{ q(func: has(<value>)) { value value2 uid } }");
/// ```
#[derive(Clone, Debug)]
pub struct Query {
    op: Operation,
    name: String,
    function: Option<Function>,
    fields: Vec<Field>,
    modifiers: Modifiers,
    directives: Vec<Directive>,
    mutations: Vec<Mutation>,
    standalone: bool,
    error: Option<String>,
}

impl Default for Query {
    fn default() -> Self {
        Self::new()
    }
}

impl Query {
    /// Creates a standalone read query named `q`.
    pub fn new() -> Self {
        Self {
            op: Operation::Query,
            name: DEFAULT_QUERY_NAME.to_owned(),
            function: None,
            fields: Vec::new(),
            modifiers: Modifiers::default(),
            directives: Vec::new(),
            mutations: Vec::new(),
            standalone: true,
            error: None,
        }
    }

    /// Creates an empty mutation.
    pub fn mutation() -> Self {
        Self {
            op: Operation::Mutation,
            ..Self::new()
        }
    }

    /// Sets the statement name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the root function.
    pub fn func(mut self, function: Function) -> Self {
        self.function = Some(function);
        self
    }

    /// Appends a top-level field.
    pub fn field(mut self, field: impl Into<Field>) -> Self {
        self.fields.push(field.into());
        self
    }

    /// Appends several top-level fields.
    pub fn fields<I, F>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = F>,
        F: Into<Field>,
    {
        self.fields.extend(fields.into_iter().map(Into::into));
        self
    }

    /// Sets the root filter.
    pub fn filter(self, filter: impl Into<Filter>) -> Self {
        self.filter_at(ROOT_PATH, filter)
    }

    /// Sets the filter for a field path; the last filter per path wins.
    pub fn filter_at(mut self, path: impl Into<String>, filter: impl Into<Filter>) -> Self {
        self.modifiers.filter(path, filter.into());
        self
    }

    /// Limits the root block to the first `n` results.
    pub fn first(self, n: i64) -> Self {
        self.paginate_at(ROOT_PATH, Pagination::First(n))
    }

    /// Skips `n` root results.
    pub fn offset(self, n: i64) -> Self {
        self.paginate_at(ROOT_PATH, Pagination::Offset(n))
    }

    /// Starts the root block after the given node identifier.
    pub fn after(self, uid: impl Into<String>) -> Self {
        self.paginate_at(ROOT_PATH, Pagination::After(uid.into()))
    }

    /// Appends a pagination argument for a field path.
    pub fn paginate_at(mut self, path: impl Into<String>, page: Pagination) -> Self {
        self.modifiers.paginate(path, page);
        self
    }

    /// Orders root results ascending.
    pub fn order_asc(self, predicate: impl Into<String>) -> Self {
        self.order_at(ROOT_PATH, OrderBy::asc(predicate))
    }

    /// Orders root results descending.
    pub fn order_desc(self, predicate: impl Into<String>) -> Self {
        self.order_at(ROOT_PATH, OrderBy::desc(predicate))
    }

    /// Appends an ordering for a field path.
    pub fn order_at(mut self, path: impl Into<String>, order: OrderBy) -> Self {
        self.modifiers.order(path, order);
        self
    }

    /// Replaces a field with an aggregate over it.
    pub fn aggregate_at(mut self, path: impl Into<String>, aggregate: Aggregate) -> Self {
        self.modifiers.aggregate(path, aggregate);
        self
    }

    /// Requests edge facets for a field path.
    pub fn facets_at(mut self, path: impl Into<String>) -> Self {
        self.modifiers.facets(path);
        self
    }

    /// Appends a root directive.
    pub fn directive(mut self, directive: Directive) -> Self {
        self.directives.push(directive);
        self
    }

    /// Shorthand for `@cascade`.
    pub fn cascade(self) -> Self {
        self.directive(Directive::Cascade(Vec::new()))
    }

    /// Shorthand for `@normalize`.
    pub fn normalize(self) -> Self {
        self.directive(Directive::Normalize)
    }

    /// Adds a set payload.
    pub fn set<P: MutationPayload + ?Sized>(self, payload: &P) -> Self {
        self.push_mutation(MutationKind::Set, payload)
    }

    /// Adds a delete payload.
    pub fn delete<P: MutationPayload + ?Sized>(self, payload: &P) -> Self {
        self.push_mutation(MutationKind::Delete, payload)
    }

    /// Whether the statement wraps itself in an outer block with a header.
    pub fn standalone(mut self, standalone: bool) -> Self {
        self.standalone = standalone;
        self
    }

    fn push_mutation<P: MutationPayload + ?Sized>(
        mut self,
        kind: MutationKind,
        payload: &P,
    ) -> Self {
        self.op = Operation::Mutation;
        match payload.encode() {
            Ok(payload) => self.mutations.push(Mutation { kind, payload }),
            Err(err) => {
                debug!(error = %err, "dql.builder.payload_encode_failed");
                if self.error.is_none() {
                    self.error = Some(err.to_string());
                }
            }
        }
        self
    }

    pub(crate) fn rename(&mut self, name: String) {
        self.name = name;
    }

    pub(crate) fn set_standalone(&mut self, standalone: bool) {
        self.standalone = standalone;
    }

    /// Query or mutation.
    pub fn operation(&self) -> Operation {
        self.op
    }

    /// Statement name.
    pub fn statement_name(&self) -> &str {
        &self.name
    }

    /// Whether the statement is standalone.
    pub fn is_standalone(&self) -> bool {
        self.standalone
    }

    /// Root function, if set.
    pub fn function(&self) -> Option<&Function> {
        self.function.as_ref()
    }

    /// Top-level fields.
    pub fn selection(&self) -> &[Field] {
        &self.fields
    }

    /// Path-keyed modifiers.
    pub fn modifiers(&self) -> &Modifiers {
        &self.modifiers
    }

    /// Root directives.
    pub fn directives(&self) -> &[Directive] {
        &self.directives
    }

    /// Encoded mutation payloads.
    pub fn mutations(&self) -> &[Mutation] {
        &self.mutations
    }

    /// Kind shared by every payload, once [`Query::check`] passes.
    pub fn mutation_kind(&self) -> Option<MutationKind> {
        self.mutations.first().map(|m| m.kind)
    }

    /// Validates the statement without rendering it.
    pub fn check(&self) -> Result<()> {
        if let Some(msg) = &self.error {
            return Err(DqlError::Serialization(msg.clone()));
        }
        match self.op {
            Operation::Query => {
                validate_name(&self.name)?;
                let function = self.function.as_ref().ok_or(DqlError::MissingFunction)?;
                function.check()?;
                for (_, filter) in self.modifiers.filters() {
                    filter.check()?;
                }
                Ok(())
            }
            Operation::Mutation => {
                let Some(first) = self.mutations.first() else {
                    return Err(DqlError::EmptyMutation);
                };
                if self.mutations.iter().any(|m| m.kind != first.kind) {
                    return Err(DqlError::MixedMutation);
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::ser::Error as _;
    use serde_json::json;

    struct Unencodable;

    impl Serialize for Unencodable {
        fn serialize<S: serde::Serializer>(&self, _: S) -> std::result::Result<S::Ok, S::Error> {
            Err(S::Error::custom("refused"))
        }
    }

    #[test]
    fn query_requires_function() {
        let q = Query::new().field("name");
        assert!(matches!(q.check(), Err(DqlError::MissingFunction)));
    }

    #[test]
    fn statement_name_cannot_be_reversed() {
        let q = Query::new().name("~x").func(Function::has("a"));
        assert!(matches!(q.check(), Err(DqlError::InvalidPredicate(_))));
    }

    #[test]
    fn check_validates_every_filter() {
        let q = Query::new()
            .func(Function::has("name"))
            .filter_at("friend", Function::named("has"));
        assert!(matches!(
            q.check(),
            Err(DqlError::MissingVariables { .. })
        ));
    }

    #[test]
    fn mutation_kinds_cannot_mix() {
        let q = Query::mutation()
            .set(&json!({"uid": "0x1", "name": "a"}))
            .delete(&json!({"uid": "0x2"}));
        assert!(matches!(q.check(), Err(DqlError::MixedMutation)));
        assert!(matches!(
            Query::mutation().check(),
            Err(DqlError::EmptyMutation)
        ));
    }

    #[test]
    fn payload_errors_surface_at_check() {
        let q = Query::mutation().set(&Unencodable).set(&json!({"a": 1}));
        assert!(matches!(q.check(), Err(DqlError::Serialization(_))));
        assert_eq!(q.mutations().len(), 1);
    }

    #[test]
    fn directives_render() {
        assert_eq!(Directive::Cascade(vec![]).render().unwrap(), "@cascade");
        assert_eq!(
            Directive::Cascade(vec!["name".into(), "age".into()])
                .render()
                .unwrap(),
            "@cascade(name, age)"
        );
        assert_eq!(
            Directive::Recurse {
                depth: Some(4),
                allow_loop: true
            }
            .render()
            .unwrap(),
            "@recurse(depth: 4, loop: true)"
        );
        assert!(Directive::Cascade(vec!["a)".into()]).render().is_err());
    }
}
