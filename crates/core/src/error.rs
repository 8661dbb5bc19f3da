use thiserror::Error;

/// Result alias used across the engine
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the depgraph engine
///
/// These are protocol and configuration failures reported to the caller.
/// Per-declaration and per-use problems are never errors; they are recorded
/// as [`crate::diagnostics::Diagnostic`]s on the analysis run instead.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid or unreadable configuration
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Malformed analysis input (declaration streams, unit records)
    #[error("malformed input in {file}: {message}")]
    Parse { file: String, message: String },

    /// A mutating operation was attempted on a frozen graph
    #[error("Graph is frozen: {operation} is no longer permitted")]
    GraphFrozen { operation: &'static str },

    /// A compilation unit was committed more than once
    #[error("Compilation unit '{0}' has already been committed")]
    DuplicateUnit(String),

    /// A declaration was inserted into a frozen namespace table
    #[error("Namespace table for '{0}' is frozen")]
    TableFrozen(String),

    /// A symbol lookup was attempted before the namespace table was frozen
    #[error("Namespace table for '{0}' is not frozen yet")]
    TableNotFrozen(String),

    /// A record was routed to a unit it does not belong to
    #[error("Record for unit '{found}' passed to unit '{expected}'")]
    UnitMismatch { expected: String, found: String },

    /// Invariant violations inside the engine (poisoned locks, failed tasks)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Shorthand for [`Error::Config`]
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Shorthand for [`Error::Parse`]
    pub fn parse(file: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            file: file.into(),
            message: message.into(),
        }
    }

    /// Creates a frozen-graph error for the named operation
    pub fn graph_frozen(operation: &'static str) -> Self {
        Self::GraphFrozen { operation }
    }

    /// Creates a unit mismatch error
    pub fn unit_mismatch(expected: impl Into<String>, found: impl Into<String>) -> Self {
        Self::UnitMismatch {
            expected: expected.into(),
            found: found.into(),
        }
    }

    /// Creates an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether this error reports caller protocol misuse rather than a
    /// configuration or environment failure
    pub fn is_protocol_misuse(&self) -> bool {
        matches!(
            self,
            Self::GraphFrozen { .. }
                | Self::DuplicateUnit(_)
                | Self::TableFrozen(_)
                | Self::TableNotFrozen(_)
                | Self::UnitMismatch { .. }
        )
    }
}
