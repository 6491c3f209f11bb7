//! `@filter(...)` clauses.
use crate::error::{DqlError, Result};
use crate::query::function::Function;
use crate::query::vars::VarTable;

/// Boolean combination of functions inside a filter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FilterExpr {
    /// A single function call.
    Func(Function),
    /// All operands must hold.
    And(Vec<FilterExpr>),
    /// Any operand may hold.
    Or(Vec<FilterExpr>),
    /// Negation.
    Not(Box<FilterExpr>),
}

impl FilterExpr {
    fn check(&self) -> Result<()> {
        match self {
            FilterExpr::Func(f) => f.check(),
            FilterExpr::And(args) | FilterExpr::Or(args) if args.is_empty() => Err(
                DqlError::invalid("boolean filter needs at least one operand"),
            ),
            FilterExpr::And(args) | FilterExpr::Or(args) => {
                args.iter().try_for_each(FilterExpr::check)
            }
            FilterExpr::Not(inner) => inner.check(),
        }
    }

    fn compile(&self, vars: &mut VarTable) -> Result<String> {
        match self {
            FilterExpr::Func(f) => f.compile(vars),
            FilterExpr::And(args) => Self::join(args, " AND ", vars),
            FilterExpr::Or(args) => Self::join(args, " OR ", vars),
            FilterExpr::Not(inner) => Ok(format!("NOT {}", inner.compile_operand(vars)?)),
        }
    }

    fn compile_operand(&self, vars: &mut VarTable) -> Result<String> {
        match self {
            FilterExpr::And(args) | FilterExpr::Or(args) if args.len() > 1 => {
                Ok(format!("({})", self.compile(vars)?))
            }
            _ => self.compile(vars),
        }
    }

    fn join(args: &[FilterExpr], sep: &str, vars: &mut VarTable) -> Result<String> {
        let mut parts = Vec::with_capacity(args.len());
        for arg in args {
            parts.push(arg.compile_operand(vars)?);
        }
        Ok(parts.join(sep))
    }
}

/// Post-filter attached to the root or to any field.
///
/// An empty filter compiles to nothing.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Filter {
    expr: Option<FilterExpr>,
}

impl Filter {
    /// Wraps a single function.
    pub fn new(function: Function) -> Self {
        Self {
            expr: Some(FilterExpr::Func(function)),
        }
    }

    /// A filter with no function; compiles to an empty string.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Returns true when no function is attached.
    pub fn is_empty(&self) -> bool {
        self.expr.is_none()
    }

    /// Combines with another filter using `AND`.
    pub fn and(self, other: impl Into<Filter>) -> Self {
        self.combine(other.into(), FilterExpr::And)
    }

    /// Combines with another filter using `OR`.
    pub fn or(self, other: impl Into<Filter>) -> Self {
        self.combine(other.into(), FilterExpr::Or)
    }

    /// Negates the filter.
    pub fn negate(self) -> Self {
        Self {
            expr: self.expr.map(|e| FilterExpr::Not(Box::new(e))),
        }
    }

    fn combine(self, other: Filter, op: fn(Vec<FilterExpr>) -> FilterExpr) -> Self {
        let expr = match (self.expr, other.expr) {
            (Some(a), Some(b)) => Some(op(vec![a, b])),
            (a, b) => a.or(b),
        };
        Self { expr }
    }

    /// Validates every function in the filter.
    pub fn check(&self) -> Result<()> {
        match &self.expr {
            Some(expr) => expr.check(),
            None => Ok(()),
        }
    }

    /// Renders `@filter(...)`, or an empty string for an empty filter.
    pub fn compile(&self, vars: &mut VarTable) -> Result<String> {
        match &self.expr {
            Some(expr) => {
                expr.check()?;
                Ok(format!("@filter({})", expr.compile(vars)?))
            }
            None => Ok(String::new()),
        }
    }
}

impl From<Function> for Filter {
    fn from(function: Function) -> Self {
        Filter::new(function)
    }
}

impl From<FilterExpr> for Filter {
    fn from(expr: FilterExpr) -> Self {
        Self { expr: Some(expr) }
    }
}
