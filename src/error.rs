//! Error types for sqlweave.

use thiserror::Error;

/// The main error type for sqlweave operations.
#[derive(Debug, Error)]
pub enum WeaveError {
    /// Failed to parse a text formula.
    #[error("Parse error at position {position}: {message}")]
    Parse { position: usize, message: String },

    /// An expression tree did not match any recognised shape.
    #[error("Invalid expression: {0}")]
    Expression(String),

    /// A serialized expression tree or pipeline was not valid JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Schema resolution failed in the backend.
    #[error("Database error: {0}")]
    Database(String),

    /// Connection error.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Query execution error.
    #[error("Execution error: {0}")]
    Execution(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A pipeline description could not be turned into a query.
    #[error("Pipeline error: {0}")]
    Pipeline(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WeaveError {
    /// Create a parse error at the given position.
    pub fn parse(position: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            position,
            message: message.into(),
        }
    }

    /// Create an expression construction error.
    pub fn expression(message: impl Into<String>) -> Self {
        Self::Expression(message.into())
    }
}

/// Result type alias for sqlweave operations.
pub type WeaveResult<T> = Result<T, WeaveError>;
