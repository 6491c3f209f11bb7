//! Ordering, pagination, aggregation, filter, and facet modifiers.
//!
//! Modifiers are registered against a field path (`friend/name`, or the empty
//! root path) and rendered in a fixed priority order because the wire syntax
//! is positional.
use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::error::{DqlError, Result};
use crate::query::filter::Filter;
use crate::query::value::Value;
use crate::query::vars::VarTable;

/// Path of the root block.
pub const ROOT_PATH: &str = "";

/// Separator between path segments. Field names may not contain it.
pub const PATH_SEPARATOR: char = '/';

/// Joins a parent path and a child field name.
pub fn join_path(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_owned()
    } else {
        format!("{prefix}{PATH_SEPARATOR}{name}")
    }
}

/// Where a modifier is being attached.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceKind {
    /// The root function block.
    Root,
    /// A field in the selection tree.
    Field,
}

/// Render rank; lower renders first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Priority {
    Aggregate,
    Pagination,
    Ordering,
    Filter,
    Facets,
}

/// Field information handed to modifiers while rendering.
#[derive(Clone, Copy, Debug)]
pub struct FieldMeta<'a> {
    /// Predicate including a leading `~` for reverse edges.
    pub predicate: &'a str,
    /// Response key, when it differs from the predicate.
    pub alias: Option<&'a str>,
    /// Root block or nested field.
    pub source: SourceKind,
}

impl FieldMeta<'_> {
    fn key(&self) -> &str {
        self.alias
            .unwrap_or_else(|| self.predicate.trim_start_matches('~'))
    }
}

/// Piece of text produced by a modifier.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Fragment {
    /// Replaces the field's own token.
    Head(String),
    /// Goes into the parenthesized argument list.
    Arg(String),
    /// Appended after the arguments.
    Directive(String),
}

/// Common contract of all modifier kinds.
pub trait Modifier {
    /// Whether the modifier is meaningful for the given source.
    fn can_apply_to(&self, source: SourceKind) -> bool;
    /// Render rank.
    fn priority(&self) -> Priority;
    /// Produces the modifier's text, binding any scalars into `vars`.
    fn render(&self, field: &FieldMeta<'_>, vars: &mut VarTable) -> Result<Option<Fragment>>;
}

/// Pagination argument.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Pagination {
    /// `first: N`
    First(i64),
    /// `offset: N`
    Offset(i64),
    /// `after: <uid>`
    After(String),
}

impl Modifier for Pagination {
    fn can_apply_to(&self, _source: SourceKind) -> bool {
        true
    }

    fn priority(&self) -> Priority {
        Priority::Pagination
    }

    fn render(&self, _field: &FieldMeta<'_>, vars: &mut VarTable) -> Result<Option<Fragment>> {
        let (key, value) = match self {
            Pagination::First(n) => ("first", Value::Int(*n)),
            Pagination::Offset(n) => ("offset", Value::Int(*n)),
            Pagination::After(uid) => ("after", Value::uid(uid.as_str())),
        };
        let binding = vars.register(&value)?;
        Ok(Some(Fragment::Arg(format!("{key}: {}", binding.as_token()))))
    }
}

/// Sort direction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

/// `orderasc: pred` / `orderdesc: pred`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrderBy {
    /// Sort direction.
    pub direction: Direction,
    /// Predicate to sort on.
    pub predicate: String,
}

impl OrderBy {
    /// Ascending order on `predicate`.
    pub fn asc(predicate: impl Into<String>) -> Self {
        Self {
            direction: Direction::Asc,
            predicate: predicate.into(),
        }
    }

    /// Descending order on `predicate`.
    pub fn desc(predicate: impl Into<String>) -> Self {
        Self {
            direction: Direction::Desc,
            predicate: predicate.into(),
        }
    }
}

impl Modifier for OrderBy {
    fn can_apply_to(&self, _source: SourceKind) -> bool {
        true
    }

    fn priority(&self) -> Priority {
        Priority::Ordering
    }

    fn render(&self, _field: &FieldMeta<'_>, vars: &mut VarTable) -> Result<Option<Fragment>> {
        let binding = vars.register(&Value::predicate(self.predicate.as_str()))?;
        let key = match self.direction {
            Direction::Asc => "orderasc",
            Direction::Desc => "orderdesc",
        };
        Ok(Some(Fragment::Arg(format!("{key}: {}", binding.as_token()))))
    }
}

/// Aggregation function applied to a field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AggregateKind {
    Count,
    Min,
    Max,
    Sum,
    Avg,
}

impl fmt::Display for AggregateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AggregateKind::Count => "count",
            AggregateKind::Min => "min",
            AggregateKind::Max => "max",
            AggregateKind::Sum => "sum",
            AggregateKind::Avg => "avg",
        };
        f.write_str(name)
    }
}

/// Renders `alias : kind(predicate)` in place of the field token.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Aggregate {
    /// Aggregation function.
    pub kind: AggregateKind,
    /// Response key; defaults to `<field>_<kind>`.
    pub alias: Option<String>,
}

impl Aggregate {
    /// Aggregate with the default alias.
    pub fn new(kind: AggregateKind) -> Self {
        Self { kind, alias: None }
    }

    /// `count(field)`
    pub fn count() -> Self {
        Self::new(AggregateKind::Count)
    }

    /// Overrides the response key.
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }
}

impl Modifier for Aggregate {
    fn can_apply_to(&self, source: SourceKind) -> bool {
        source == SourceKind::Field
    }

    fn priority(&self) -> Priority {
        Priority::Aggregate
    }

    fn render(&self, field: &FieldMeta<'_>, vars: &mut VarTable) -> Result<Option<Fragment>> {
        let alias = match &self.alias {
            Some(alias) => alias.clone(),
            None => format!("{}_{}", field.key(), self.kind),
        };
        vars.register(&Value::predicate(alias.as_str()))?;
        Ok(Some(Fragment::Head(format!(
            "{alias} : {}({})",
            self.kind, field.predicate
        ))))
    }
}

impl Modifier for Filter {
    fn can_apply_to(&self, _source: SourceKind) -> bool {
        true
    }

    fn priority(&self) -> Priority {
        Priority::Filter
    }

    fn render(&self, _field: &FieldMeta<'_>, vars: &mut VarTable) -> Result<Option<Fragment>> {
        if self.is_empty() {
            return Ok(None);
        }
        Ok(Some(Fragment::Directive(self.compile(vars)?)))
    }
}

/// Requests the facets stored on an edge.
///
/// Only the bare `@facets` form is supported; selecting individual facet
/// keys is not.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FacetRequest;

impl Modifier for FacetRequest {
    fn can_apply_to(&self, source: SourceKind) -> bool {
        source == SourceKind::Field
    }

    fn priority(&self) -> Priority {
        Priority::Facets
    }

    fn render(&self, _field: &FieldMeta<'_>, _vars: &mut VarTable) -> Result<Option<Fragment>> {
        Ok(Some(Fragment::Directive("@facets".to_owned())))
    }
}

/// Rendered modifier output for one path, grouped by position.
#[derive(Debug, Default)]
pub struct RenderedModifiers {
    /// Replacement for the field token (aggregates).
    pub head: Option<String>,
    /// Parenthesized arguments in render order.
    pub args: Vec<String>,
    /// Trailing directives in render order.
    pub directives: Vec<String>,
}

impl RenderedModifiers {
    /// Renders `mods` in priority order.
    pub fn render(
        mods: &mut Vec<&dyn Modifier>,
        field: &FieldMeta<'_>,
        vars: &mut VarTable,
    ) -> Result<Self> {
        mods.sort_by_key(|m| m.priority());
        let mut out = Self::default();
        for modifier in mods.iter() {
            if !modifier.can_apply_to(field.source) {
                return Err(DqlError::invalid(format!(
                    "{:?} modifier cannot be attached to '{}'",
                    modifier.priority(),
                    field.key()
                )));
            }
            match modifier.render(field, vars)? {
                Some(Fragment::Head(head)) => out.head = Some(head),
                Some(Fragment::Arg(arg)) => out.args.push(arg),
                Some(Fragment::Directive(d)) => out.directives.push(d),
                None => {}
            }
        }
        Ok(out)
    }
}

/// Path-keyed modifier maps owned by a query.
///
/// Orderings and pagination append; filters and aggregates keep the last
/// value written for a path.
#[derive(Clone, Debug, Default)]
pub struct Modifiers {
    orderings: HashMap<String, Vec<OrderBy>>,
    pagination: HashMap<String, Vec<Pagination>>,
    filters: HashMap<String, Filter>,
    aggregates: HashMap<String, Aggregate>,
    facets: HashSet<String>,
}

impl Modifiers {
    /// Appends an ordering for `path`.
    pub fn order(&mut self, path: impl Into<String>, order: OrderBy) {
        self.orderings.entry(path.into()).or_default().push(order);
    }

    /// Appends a pagination argument for `path`.
    pub fn paginate(&mut self, path: impl Into<String>, page: Pagination) {
        self.pagination.entry(path.into()).or_default().push(page);
    }

    /// Sets the filter for `path`.
    pub fn filter(&mut self, path: impl Into<String>, filter: Filter) {
        self.filters.insert(path.into(), filter);
    }

    /// Sets the aggregate for `path`.
    pub fn aggregate(&mut self, path: impl Into<String>, aggregate: Aggregate) {
        self.aggregates.insert(path.into(), aggregate);
    }

    /// Requests facets for `path`.
    pub fn facets(&mut self, path: impl Into<String>) {
        self.facets.insert(path.into());
    }

    /// Filter registered for `path`.
    pub fn filter_at(&self, path: &str) -> Option<&Filter> {
        self.filters.get(path)
    }

    /// Every registered filter.
    pub fn filters(&self) -> impl Iterator<Item = (&str, &Filter)> {
        self.filters.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Whether an aggregate is registered for `path`.
    pub fn has_aggregate(&self, path: &str) -> bool {
        self.aggregates.contains_key(path)
    }

    /// Whether facets were requested for `path`.
    pub fn has_facets(&self, path: &str) -> bool {
        self.facets.contains(path)
    }

    /// Modifiers registered under `path`, unsorted.
    pub fn for_path(&self, path: &str) -> Vec<&dyn Modifier> {
        let mut mods: Vec<&dyn Modifier> = Vec::new();
        if let Some(agg) = self.aggregates.get(path) {
            mods.push(agg);
        }
        if let Some(pages) = self.pagination.get(path) {
            mods.extend(pages.iter().map(|p| p as &dyn Modifier));
        }
        if let Some(orders) = self.orderings.get(path) {
            mods.extend(orders.iter().map(|o| o as &dyn Modifier));
        }
        if let Some(filter) = self.filters.get(path) {
            mods.push(filter);
        }
        if self.facets.contains(path) {
            mods.push(&FacetRequest);
        }
        mods
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::function::Function;

    fn field(name: &str) -> FieldMeta<'_> {
        FieldMeta {
            predicate: name,
            alias: None,
            source: SourceKind::Field,
        }
    }

    #[test]
    fn paths_join_with_slash() {
        assert_eq!(join_path(ROOT_PATH, "friend"), "friend");
        assert_eq!(join_path("friend", "name"), "friend/name");
    }

    #[test]
    fn renders_in_priority_order() {
        let mut m = Modifiers::default();
        m.facets("friend");
        m.filter("friend", Filter::new(Function::has("name")));
        m.order("friend", OrderBy::desc("age"));
        m.paginate("friend", Pagination::First(10));
        m.order("friend", OrderBy::asc("name"));

        let mut vars = VarTable::new();
        let mut mods = m.for_path("friend");
        let out = RenderedModifiers::render(&mut mods, &field("friend"), &mut vars).unwrap();
        assert_eq!(out.head, None);
        assert_eq!(out.args, vec!["first: $p0", "orderdesc: age", "orderasc: name"]);
        assert_eq!(out.directives, vec!["@filter(has(<name>))", "@facets"]);
    }

    #[test]
    fn aggregate_replaces_head() {
        let mut m = Modifiers::default();
        m.aggregate("friend", Aggregate::count());
        m.aggregate("~friend", Aggregate::count().alias("followers"));
        let mut vars = VarTable::new();

        let mut mods = m.for_path("friend");
        let out = RenderedModifiers::render(&mut mods, &field("friend"), &mut vars).unwrap();
        assert_eq!(out.head.as_deref(), Some("friend_count : count(friend)"));

        let mut mods = m.for_path("~friend");
        let out = RenderedModifiers::render(&mut mods, &field("~friend"), &mut vars).unwrap();
        assert_eq!(out.head.as_deref(), Some("followers : count(~friend)"));
    }

    #[test]
    fn last_filter_wins_and_orderings_append() {
        let mut m = Modifiers::default();
        m.filter("a", Filter::new(Function::has("x")));
        m.filter("a", Filter::new(Function::has("y")));
        m.order("a", OrderBy::asc("x"));
        m.order("a", OrderBy::asc("y"));
        assert_eq!(m.filter_at("a"), Some(&Filter::new(Function::has("y"))));
        assert_eq!(m.for_path("a").len(), 3);
    }

    #[test]
    fn root_rejects_field_only_modifiers() {
        let mut m = Modifiers::default();
        m.facets(ROOT_PATH);
        let meta = FieldMeta {
            predicate: "q",
            alias: None,
            source: SourceKind::Root,
        };
        let mut mods = m.for_path(ROOT_PATH);
        let err = RenderedModifiers::render(&mut mods, &meta, &mut VarTable::new());
        assert!(matches!(err, Err(DqlError::InvalidArgument(_))));
    }

    #[test]
    fn after_cursor_is_inline() {
        let mut vars = VarTable::new();
        let frag = Pagination::After("0x2a".into())
            .render(&field("friend"), &mut vars)
            .unwrap();
        assert_eq!(frag, Some(Fragment::Arg("after: 0x2a".into())));
        assert!(vars.is_empty());
    }
}
