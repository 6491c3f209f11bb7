use std::io;
use thiserror::Error;

/// Result alias used across the compiler and the execution pipeline.
pub type Result<T> = std::result::Result<T, DqlError>;

/// Errors raised while building, compiling, or executing statements.
///
/// The first group is structural: it is detected before anything is sent over
/// the wire and is always fixable by correcting the builder calls. The second
/// group comes from the runtime half (transport, cancellation, worker pool).
#[derive(Debug, Error)]
pub enum DqlError {
    #[error("function kind is missing")]
    MissingFunction,
    #[error("function '{function}' was given no arguments")]
    MissingVariables { function: String },
    #[error("function '{function}' expects {expected} (got {got} arguments)")]
    ArityMismatch {
        function: String,
        expected: &'static str,
        got: usize,
    },
    #[error("invalid node identifier '{0}'")]
    InvalidIdentifier(String),
    #[error("invalid predicate name '{0}'")]
    InvalidPredicate(String),
    #[error("field name cannot be empty")]
    MissingFieldName,
    #[error("mutation requires at least one payload")]
    EmptyMutation,
    #[error("set and delete payloads cannot share one mutation")]
    MixedMutation,
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("transport: {0}")]
    Transport(String),
    #[error("operation cancelled before completion")]
    Cancelled,
    #[error("mutation pipeline is shut down")]
    PipelineClosed,
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl DqlError {
    /// Wraps an opaque failure reported by a transport implementation.
    pub fn transport(msg: impl Into<String>) -> Self {
        DqlError::Transport(msg.into())
    }

    /// Builds an [`DqlError::InvalidArgument`] from any message.
    pub fn invalid(msg: impl Into<String>) -> Self {
        DqlError::InvalidArgument(msg.into())
    }

    /// Returns true for structural errors that never reach the wire.
    pub fn is_compile_error(&self) -> bool {
        matches!(
            self,
            DqlError::MissingFunction
                | DqlError::MissingVariables { .. }
                | DqlError::ArityMismatch { .. }
                | DqlError::InvalidIdentifier(_)
                | DqlError::InvalidPredicate(_)
                | DqlError::MissingFieldName
                | DqlError::EmptyMutation
                | DqlError::MixedMutation
                | DqlError::Serialization(_)
                | DqlError::InvalidArgument(_)
        )
    }

    /// Returns a machine-readable code for the error variant.
    pub fn code(&self) -> &'static str {
        match self {
            DqlError::MissingFunction => "MissingFunction",
            DqlError::MissingVariables { .. } => "MissingVariables",
            DqlError::ArityMismatch { .. } => "ArityMismatch",
            DqlError::InvalidIdentifier(_) => "InvalidIdentifier",
            DqlError::InvalidPredicate(_) => "InvalidPredicate",
            DqlError::MissingFieldName => "MissingFieldName",
            DqlError::EmptyMutation => "EmptyMutation",
            DqlError::MixedMutation => "MixedMutation",
            DqlError::Serialization(_) => "Serialization",
            DqlError::InvalidArgument(_) => "InvalidArgument",
            DqlError::Transport(_) => "TransportFailure",
            DqlError::Cancelled => "Cancelled",
            DqlError::PipelineClosed => "PipelineClosed",
            DqlError::Io(_) => "Io",
        }
    }
}

impl From<serde_json::Error> for DqlError {
    fn from(err: serde_json::Error) -> Self {
        DqlError::Serialization(err.to_string())
    }
}
