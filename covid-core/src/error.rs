//! Error types for query and aggregation operations

use thiserror::Error;

/// Result type for covid-core operations
pub type CovidResult<T> = Result<T, CovidError>;

/// Errors surfaced by the translation layer and the document store.
///
/// Malformed caller input (bad dates, unknown fields, unknown entity keys)
/// never produces one of these; it is absorbed by the option builder.
#[derive(Error, Debug)]
pub enum CovidError {
    #[error("Store error: {0}")]
    Store(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Timeout error: operation timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("{operation}: {source}")]
    Query {
        operation: String,
        #[source]
        source: Box<CovidError>,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CovidError {
    /// Create a new store error
    pub fn store<S: Into<String>>(message: S) -> Self {
        Self::Store(message.into())
    }

    /// Create a new decode error
    pub fn decode<S: Into<String>>(message: S) -> Self {
        Self::Decode(message.into())
    }

    /// Create a new timeout error
    pub fn timeout(timeout_ms: u64) -> Self {
        Self::Timeout { timeout_ms }
    }

    /// Tag an error with the operation that produced it, e.g. `db.global.find()`
    pub fn with_operation<S: Into<String>>(self, operation: S) -> Self {
        Self::Query {
            operation: operation.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error, skipping operation tags
    pub fn root(&self) -> &CovidError {
        match self {
            CovidError::Query { source, .. } => source.root(),
            other => other,
        }
    }

    /// Check if the error was caused by the per-call deadline
    pub fn is_timeout(&self) -> bool {
        matches!(self.root(), CovidError::Timeout { .. })
    }

    /// Get the error category for monitoring/metrics
    pub fn category(&self) -> &'static str {
        match self.root() {
            CovidError::Store(_) => "store",
            CovidError::Decode(_) => "decode",
            CovidError::Timeout { .. } => "timeout",
            CovidError::Query { .. } => "query",
            CovidError::Io(_) => "io",
            CovidError::Json(_) => "json",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_tag_is_prefixed() {
        let err = CovidError::store("connection reset").with_operation("db.global.find()");
        assert_eq!(
            err.to_string(),
            "db.global.find(): Store error: connection reset"
        );
        assert_eq!(err.category(), "store");
    }

    #[test]
    fn test_timeout_survives_wrapping() {
        let err = CovidError::timeout(30_000).with_operation("db.greece.agg()");
        assert!(err.is_timeout());
        assert_eq!(err.category(), "timeout");
        assert!(!CovidError::decode("bad").is_timeout());
    }
}
