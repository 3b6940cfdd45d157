//! Error types for qfilter.

use thiserror::Error;

/// The main error type for qfilter operations.
#[derive(Debug, Error)]
pub enum QfilterError {
    /// An operator registry entry has an unusable name.
    #[error("Invalid operator: '{0}'. Names must be non-empty, [A-Za-z0-9_] only, without '__'")]
    InvalidOperator(String),

    /// A custom operator refused to build its predicate.
    #[error("Operator '{name}' failed: {message}")]
    Operator { name: String, message: String },

    /// Failed to parse a query string.
    #[error("Parse error at position {position}: {message}")]
    Parse { position: usize, message: String },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl QfilterError {
    /// Create a parse error at the given position.
    pub fn parse(position: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            position,
            message: message.into(),
        }
    }

    /// Create an operator failure for the named operator.
    pub fn operator(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Operator {
            name: name.into(),
            message: message.into(),
        }
    }
}

/// Result type alias for qfilter operations.
pub type QfilterResult<T> = Result<T, QfilterError>;
