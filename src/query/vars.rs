//! Statement-scoped variable table.
//!
//! Every string or integer argument is replaced by a generated `$pN`
//! parameter. Node identifiers and predicates are checked and returned as
//! inline tokens instead, without a table entry.
use std::collections::BTreeMap;

use tracing::trace;

use crate::error::Result;
use crate::query::value::{validate_predicate, validate_uid, Value, ValueKind};

/// How a registered value appears in the statement text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Binding {
    /// Reference to a declared parameter, e.g. `$p0`.
    Param(String),
    /// Bounds-checked node identifier written inline.
    Uid(String),
    /// Bounds-checked predicate written inline.
    Predicate(String),
}

impl Binding {
    /// Renders the binding in function-argument position.
    pub fn as_argument(&self) -> String {
        match self {
            Binding::Param(name) => name.clone(),
            Binding::Uid(uid) => format!("\"{uid}\""),
            Binding::Predicate(pred) => format!("<{pred}>"),
        }
    }

    /// Renders the binding as a bare token (ordering, pagination, type names).
    pub fn as_token(&self) -> &str {
        match self {
            Binding::Param(s) | Binding::Uid(s) | Binding::Predicate(s) => s,
        }
    }
}

/// One declared parameter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VarEntry {
    /// Generated parameter name including the `$` sigil.
    pub name: String,
    /// Declared kind (string or int).
    pub kind: ValueKind,
    /// Raw value text sent alongside the statement.
    pub value: String,
}

/// Parameter table for one compiled statement (or one merged batch).
#[derive(Clone, Debug, Default)]
pub struct VarTable {
    entries: Vec<VarEntry>,
    next: usize,
}

impl VarTable {
    /// Creates an empty table whose names start at `$p0`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds a value, allocating a parameter name for strings and integers.
    ///
    /// Registering an identical `(kind, value)` pair again reuses the existing
    /// parameter. Node identifiers and predicates are validated and returned
    /// inline.
    pub fn register(&mut self, value: &Value) -> Result<Binding> {
        match value {
            Value::Uid(uid) => {
                validate_uid(uid)?;
                Ok(Binding::Uid(uid.clone()))
            }
            Value::Predicate(pred) => {
                validate_predicate(pred)?;
                Ok(Binding::Predicate(pred.clone()))
            }
            Value::String(_) | Value::Int(_) => {
                let kind = value.kind();
                let raw = value.raw();
                if let Some(existing) = self
                    .entries
                    .iter()
                    .find(|e| e.kind == kind && e.value == raw)
                {
                    return Ok(Binding::Param(existing.name.clone()));
                }
                let name = self.next_name();
                trace!(param = %name, kind = %kind, "dql.vars.register");
                self.entries.push(VarEntry {
                    name: name.clone(),
                    kind,
                    value: raw,
                });
                Ok(Binding::Param(name))
            }
        }
    }

    /// Number of declared parameters.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true when nothing was parameterized.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates the declared parameters in allocation order.
    pub fn iter(&self) -> impl Iterator<Item = &VarEntry> {
        self.entries.iter()
    }

    /// Renders the `name: type` declaration list.
    pub fn declarations(&self) -> String {
        self.entries
            .iter()
            .filter_map(|e| {
                e.kind
                    .declared_type()
                    .map(|ty| format!("{}: {}", e.name, ty))
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Parameter bindings keyed by name, as sent with the statement.
    pub fn bindings(&self) -> BTreeMap<String, String> {
        self.entries
            .iter()
            .map(|e| (e.name.clone(), e.value.clone()))
            .collect()
    }

    fn next_name(&mut self) -> String {
        let idx = self.next;
        self.next += 1;
        format!("$p{idx}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DqlError;

    #[test]
    fn scalars_get_monotonic_names() {
        let mut vars = VarTable::new();
        assert_eq!(
            vars.register(&Value::from("alice")).unwrap(),
            Binding::Param("$p0".into())
        );
        assert_eq!(
            vars.register(&Value::from(42)).unwrap(),
            Binding::Param("$p1".into())
        );
        assert_eq!(vars.declarations(), "$p0: string, $p1: int");
        assert_eq!(vars.bindings().get("$p1").map(String::as_str), Some("42"));
    }

    #[test]
    fn identical_values_share_a_parameter() {
        let mut vars = VarTable::new();
        let a = vars.register(&Value::from("x")).unwrap();
        let b = vars.register(&Value::from("x")).unwrap();
        assert_eq!(a, b);
        assert_eq!(vars.len(), 1);
        // same text, different kind
        vars.register(&Value::String("1".into())).unwrap();
        vars.register(&Value::Int(1)).unwrap();
        assert_eq!(vars.len(), 3);
    }

    #[test]
    fn inline_kinds_do_not_touch_the_table() {
        let mut vars = VarTable::new();
        assert_eq!(
            vars.register(&Value::uid("0x1")).unwrap().as_argument(),
            "\"0x1\""
        );
        assert_eq!(
            vars.register(&Value::predicate("name")).unwrap().as_argument(),
            "<name>"
        );
        assert!(vars.is_empty());
        assert_eq!(vars.declarations(), "");
    }

    #[test]
    fn long_uids_are_rejected() {
        let mut vars = VarTable::new();
        let err = vars.register(&Value::uid("0x".to_owned() + &"f".repeat(40)));
        assert!(matches!(err, Err(DqlError::InvalidIdentifier(_))));
    }
}
