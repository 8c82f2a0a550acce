//! Error type shared by the store, query, and transform layers

use arrow::error::ArrowError;
use parquet::errors::ParquetError;
use thiserror::Error;

/// Errors raised by the statistics engine.
///
/// Malformed request parameters are not represented here: the API layer
/// substitutes defaults for them instead of failing.
#[derive(Debug, Error)]
pub enum StatsError {
    /// The relational store could not be reached or read.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// A transform or query was configured against a table it cannot handle,
    /// e.g. a column that is missing or has the wrong type.
    #[error("transform precondition failed: {0}")]
    TransformPrecondition(String),

    #[error("unknown endpoint: {0}")]
    UnknownEndpoint(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Arrow(#[from] ArrowError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl StatsError {
    pub(crate) fn precondition(message: impl Into<String>) -> Self {
        Self::TransformPrecondition(message.into())
    }

    pub(crate) fn store(message: impl Into<String>) -> Self {
        Self::StoreUnavailable(message.into())
    }
}

impl From<ParquetError> for StatsError {
    fn from(err: ParquetError) -> Self {
        Self::StoreUnavailable(err.to_string())
    }
}

impl From<std::io::Error> for StatsError {
    fn from(err: std::io::Error) -> Self {
        Self::StoreUnavailable(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, StatsError>;
