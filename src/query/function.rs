//! Root and filter functions such as `has(<name>)` or `eq(<age>, $p0)`.
use std::fmt;

use crate::error::{DqlError, Result};
use crate::query::value::{validate_function_name, validate_name, Value, ValueKind};
use crate::query::vars::{Binding, VarTable};

/// Function name understood by the server.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum FuncKind {
    Eq,
    Le,
    Lt,
    Ge,
    Gt,
    Between,
    Has,
    Type,
    Uid,
    UidIn,
    AllOfTerms,
    AnyOfTerms,
    AllOfText,
    AnyOfText,
    Regexp,
    Match,
    /// Any other function; only the non-empty argument rule applies.
    Custom(String),
}

impl FuncKind {
    /// Parses a function name, falling back to [`FuncKind::Custom`].
    pub fn parse(name: &str) -> Self {
        match name {
            "eq" => FuncKind::Eq,
            "le" => FuncKind::Le,
            "lt" => FuncKind::Lt,
            "ge" => FuncKind::Ge,
            "gt" => FuncKind::Gt,
            "between" => FuncKind::Between,
            "has" => FuncKind::Has,
            "type" => FuncKind::Type,
            "uid" => FuncKind::Uid,
            "uid_in" => FuncKind::UidIn,
            "allofterms" => FuncKind::AllOfTerms,
            "anyofterms" => FuncKind::AnyOfTerms,
            "alloftext" => FuncKind::AllOfText,
            "anyoftext" => FuncKind::AnyOfText,
            "regexp" => FuncKind::Regexp,
            "match" => FuncKind::Match,
            other => FuncKind::Custom(other.to_owned()),
        }
    }

    /// Wire name of the function.
    pub fn name(&self) -> &str {
        match self {
            FuncKind::Eq => "eq",
            FuncKind::Le => "le",
            FuncKind::Lt => "lt",
            FuncKind::Ge => "ge",
            FuncKind::Gt => "gt",
            FuncKind::Between => "between",
            FuncKind::Has => "has",
            FuncKind::Type => "type",
            FuncKind::Uid => "uid",
            FuncKind::UidIn => "uid_in",
            FuncKind::AllOfTerms => "allofterms",
            FuncKind::AnyOfTerms => "anyofterms",
            FuncKind::AllOfText => "alloftext",
            FuncKind::AnyOfText => "anyoftext",
            FuncKind::Regexp => "regexp",
            FuncKind::Match => "match",
            FuncKind::Custom(name) => name,
        }
    }
}

impl fmt::Display for FuncKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Argument shape accepted in one position.
#[derive(Clone, Copy)]
enum Slot {
    Predicate,
    Scalar,
    Uid,
    Str,
    Int,
}

impl Slot {
    fn accepts(self, kind: ValueKind) -> bool {
        match self {
            Slot::Predicate => kind == ValueKind::Predicate,
            Slot::Scalar => kind.is_parameterized(),
            Slot::Uid => kind == ValueKind::Uid,
            Slot::Str => kind == ValueKind::String,
            Slot::Int => kind == ValueKind::Int,
        }
    }
}

/// Arity rule for one function kind.
struct Arity {
    fixed: &'static [Slot],
    /// Slot repeated after the fixed prefix, with the minimum repeat count.
    rest: Option<(Slot, usize)>,
    expected: &'static str,
}

impl Arity {
    fn matches(&self, args: &[Value]) -> bool {
        if args.len() < self.fixed.len() {
            return false;
        }
        let (head, tail) = args.split_at(self.fixed.len());
        if !head
            .iter()
            .zip(self.fixed)
            .all(|(v, slot)| slot.accepts(v.kind()))
        {
            return false;
        }
        match self.rest {
            None => tail.is_empty(),
            Some((slot, min)) => tail.len() >= min && tail.iter().all(|v| slot.accepts(v.kind())),
        }
    }
}

fn arity(kind: &FuncKind) -> Option<Arity> {
    use Slot::*;
    let rule = match kind {
        FuncKind::Has => Arity {
            fixed: &[Predicate],
            rest: None,
            expected: "exactly one predicate",
        },
        FuncKind::Type => Arity {
            fixed: &[Predicate],
            rest: None,
            expected: "exactly one type name",
        },
        FuncKind::Uid => Arity {
            fixed: &[],
            rest: Some((Uid, 1)),
            expected: "one or more node identifiers",
        },
        FuncKind::UidIn => Arity {
            fixed: &[Predicate, Uid],
            rest: None,
            expected: "a predicate and a node identifier",
        },
        FuncKind::Eq => Arity {
            fixed: &[Predicate],
            rest: Some((Scalar, 1)),
            expected: "a predicate and one or more values",
        },
        FuncKind::Le
        | FuncKind::Lt
        | FuncKind::Ge
        | FuncKind::Gt
        | FuncKind::AllOfTerms
        | FuncKind::AnyOfTerms
        | FuncKind::AllOfText
        | FuncKind::AnyOfText
        | FuncKind::Regexp => Arity {
            fixed: &[Predicate, Scalar],
            rest: None,
            expected: "a predicate and one value",
        },
        FuncKind::Match => Arity {
            fixed: &[Predicate, Str, Int],
            rest: None,
            expected: "a predicate, a string and a distance",
        },
        FuncKind::Between => Arity {
            fixed: &[Predicate, Scalar, Scalar],
            rest: None,
            expected: "a predicate and two bounds",
        },
        FuncKind::Custom(_) => return None,
    };
    Some(rule)
}

/// A single function call with its ordered arguments.
///
/// ```
/// use dqlc::query::Function;
///
/// let f = Function::eq("name", "alice");
/// assert!(f.check().is_ok());
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Function {
    kind: FuncKind,
    args: Vec<Value>,
}

impl Function {
    /// Starts a function of the given kind with no arguments.
    pub fn build(kind: FuncKind) -> Self {
        Self {
            kind,
            args: Vec::new(),
        }
    }

    /// Starts a function from its wire name.
    pub fn named(name: &str) -> Self {
        Self::build(FuncKind::parse(name))
    }

    /// `has(<predicate>)`
    pub fn has(predicate: impl Into<String>) -> Self {
        Self::build(FuncKind::Has).predicate(predicate)
    }

    /// `type(Name)`
    pub fn of_type(name: impl Into<String>) -> Self {
        Self::build(FuncKind::Type).predicate(name)
    }

    /// `eq(<predicate>, value)`
    pub fn eq(predicate: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::build(FuncKind::Eq).predicate_value(predicate, value)
    }

    /// `uid("0x1", ...)`
    pub fn uid<I, S>(uids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::build(FuncKind::Uid).values(uids.into_iter().map(Value::uid))
    }

    /// Appends a value argument.
    pub fn value(mut self, value: impl Into<Value>) -> Self {
        self.args.push(value.into());
        self
    }

    /// Appends a predicate argument.
    pub fn predicate(mut self, name: impl Into<String>) -> Self {
        self.args.push(Value::predicate(name));
        self
    }

    /// Appends a predicate followed by a value.
    pub fn predicate_value(self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.predicate(name).value(value)
    }

    /// Appends several value arguments.
    pub fn values<I, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.args.extend(values.into_iter().map(Into::into));
        self
    }

    /// Function kind.
    pub fn kind(&self) -> &FuncKind {
        &self.kind
    }

    /// Arguments in call order.
    pub fn args(&self) -> &[Value] {
        &self.args
    }

    /// Validates the kind and the argument shape.
    pub fn check(&self) -> Result<()> {
        if self.kind.name().is_empty() {
            return Err(DqlError::MissingFunction);
        }
        validate_function_name(self.kind.name())?;
        if self.args.is_empty() {
            return Err(DqlError::MissingVariables {
                function: self.kind.name().to_owned(),
            });
        }
        if let Some(rule) = arity(&self.kind) {
            if !rule.matches(&self.args) {
                return Err(DqlError::ArityMismatch {
                    function: self.kind.name().to_owned(),
                    expected: rule.expected,
                    got: self.args.len(),
                });
            }
        }
        if self.kind == FuncKind::Type {
            for arg in &self.args {
                if let Value::Predicate(name) = arg {
                    validate_name(name)?;
                }
            }
        }
        Ok(())
    }

    /// Renders `kind(arg, ...)`, binding scalar arguments into `vars`.
    pub fn compile(&self, vars: &mut VarTable) -> Result<String> {
        self.check()?;
        let mut rendered = Vec::with_capacity(self.args.len());
        for arg in &self.args {
            let binding = vars.register(arg)?;
            let text = match (&self.kind, &binding) {
                (FuncKind::Type, Binding::Predicate(name)) => name.clone(),
                _ => binding.as_argument(),
            };
            rendered.push(text);
        }
        Ok(format!("{}({})", self.kind, rendered.join(", ")))
    }
}
