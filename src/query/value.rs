//! Typed argument values bound into compiled statements.
//!
//! Strings and integers always travel as parameters. Node identifiers and
//! predicate names are written into the statement text, so both pass a bounds
//! check before they are accepted.
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{DqlError, Result};

/// Longest node identifier accepted inline (`0x` plus sixteen hex digits).
pub const MAX_UID_LEN: usize = 18;

/// Characters that would let a predicate escape its token position.
const RESERVED_PREDICATE_CHARS: &[char] = &[
    '{', '}', '(', ')', '<', '>', '[', ']', ',', '"', '\'', '$', '/', '#', '\\', ';', '=', '!',
];

/// Kind tag carried by every [`Value`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    /// UTF-8 string literal.
    String,
    /// Signed 64-bit integer literal.
    Int,
    /// Node identifier such as `0x1f`.
    Uid,
    /// Predicate (or type) name.
    Predicate,
}

impl ValueKind {
    /// Whether values of this kind go through the variable table.
    pub fn is_parameterized(self) -> bool {
        matches!(self, ValueKind::String | ValueKind::Int)
    }

    /// Type name used in the variable declaration header.
    pub fn declared_type(self) -> Option<&'static str> {
        match self {
            ValueKind::String => Some("string"),
            ValueKind::Int => Some("int"),
            ValueKind::Uid | ValueKind::Predicate => None,
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::String => "string",
            ValueKind::Int => "int",
            ValueKind::Uid => "uid",
            ValueKind::Predicate => "predicate",
        };
        f.write_str(name)
    }
}

/// Argument value tagged with its kind.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "t", content = "v")]
pub enum Value {
    /// Parameterized string.
    String(String),
    /// Parameterized integer.
    Int(i64),
    /// Inline node identifier.
    Uid(String),
    /// Inline predicate name.
    Predicate(String),
}

impl Value {
    /// Creates a node identifier value.
    pub fn uid(uid: impl Into<String>) -> Self {
        Value::Uid(uid.into())
    }

    /// Creates a predicate value.
    pub fn predicate(name: impl Into<String>) -> Self {
        Value::Predicate(name.into())
    }

    /// Returns the kind tag.
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::String(_) => ValueKind::String,
            Value::Int(_) => ValueKind::Int,
            Value::Uid(_) => ValueKind::Uid,
            Value::Predicate(_) => ValueKind::Predicate,
        }
    }

    /// Raw text of the value, as sent in the variable bindings.
    pub fn raw(&self) -> String {
        match self {
            Value::String(s) | Value::Uid(s) | Value::Predicate(s) => s.clone(),
            Value::Int(i) => i.to_string(),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<&String> for Value {
    fn from(value: &String) -> Self {
        Value::String(value.clone())
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(i64::from(value))
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Value::Int(i64::from(value))
    }
}

/// Checks that a node identifier is short and free of syntax characters.
pub fn validate_uid(uid: &str) -> Result<()> {
    if uid.is_empty()
        || uid.len() > MAX_UID_LEN
        || !uid.chars().all(|c| c.is_ascii_alphanumeric())
    {
        return Err(DqlError::InvalidIdentifier(uid.to_owned()));
    }
    Ok(())
}

/// Checks that a predicate name can be written as a bare token.
///
/// A single leading `~` (reverse edge) is allowed.
pub fn validate_predicate(name: &str) -> Result<()> {
    let body = name.strip_prefix('~').unwrap_or(name);
    if body.is_empty()
        || body
            .chars()
            .any(|c| c.is_whitespace() || c.is_control() || c == '~')
        || body.contains(RESERVED_PREDICATE_CHARS)
    {
        return Err(DqlError::InvalidPredicate(name.to_owned()));
    }
    Ok(())
}

/// Like [`validate_predicate`], but rejects the reverse-edge prefix.
///
/// Used for statement names, aliases and type names.
pub fn validate_name(name: &str) -> Result<()> {
    if name.starts_with('~') {
        return Err(DqlError::InvalidPredicate(name.to_owned()));
    }
    validate_predicate(name)
}

/// Checks that a function name is a plain identifier (`[A-Za-z0-9_]+`).
pub fn validate_function_name(name: &str) -> Result<()> {
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(DqlError::invalid(format!("invalid function name '{name}'")));
    }
    Ok(())
}
