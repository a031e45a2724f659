//! Error types for Sift

use thiserror::Error;

/// The main error type for Sift operations
#[derive(Error, Debug)]
pub enum Error {
    /// `where_` was given an operator token outside the recognized set
    #[error("Unable to build query: invalid operator ({operator}) for column ({column})")]
    InvalidOperator { column: String, operator: String },

    /// The `null` operator was given something other than a true/false sentinel
    #[error("Unable to build query: invalid value ({value}) for operator ({operator})")]
    InvalidValue { operator: String, value: String },

    /// The driver rejected the statement while preparing it
    #[error("Prepare error: {0}")]
    Prepare(#[source] sqlx::Error),

    /// The driver failed while executing the statement or fetching its rows
    #[error("Execution error: {0}")]
    Execution(#[source] sqlx::Error),

    /// A column value could not be materialized into a [`crate::Value`]
    #[error("Unable to decode column '{column}': {message}")]
    Decode { column: String, message: String },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Convenience Result type for Sift operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a new invalid operator error
    pub fn invalid_operator(column: impl Into<String>, operator: impl Into<String>) -> Self {
        Self::InvalidOperator {
            column: column.into(),
            operator: operator.into(),
        }
    }

    /// Create a new invalid value error
    pub fn invalid_value(operator: impl Into<String>, value: impl Into<String>) -> Self {
        Self::InvalidValue {
            operator: operator.into(),
            value: value.into(),
        }
    }

    /// Create a new decode error
    pub fn decode(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            column: column.into(),
            message: message.into(),
        }
    }
}
