//! Database client error classification.

use wsprnet_core::error::{Classified, Severity};

#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// Connection refused, timeout, server 5xx, readonly mode. Retried
    /// internally up to [`crate::retry::DEFAULT_MAX_ATTEMPTS`] times before
    /// surfacing.
    #[error("transient database failure: {0}")]
    Transient(String),
    /// Schema mismatch, type coercion failure, authentication. Surfaces
    /// immediately, never retried.
    #[error("permanent database failure: {0}")]
    Permanent(String),
}

impl Classified for DbError {
    fn severity(&self) -> Severity {
        match self {
            DbError::Transient(_) => Severity::TransientNetwork,
            DbError::Permanent(_) => Severity::FatalConfig,
        }
    }
}

impl DbError {
    /// Classifies a `clickhouse` client error using status-code / message
    /// heuristics: connection and timeout errors, and any 5xx or "readonly"
    /// response, are transient; anything else (auth failures, malformed
    /// queries, type mismatches) is permanent.
    pub fn classify(err: clickhouse::error::Error) -> Self {
        use clickhouse::error::Error as ChError;
        match &err {
            ChError::Network(_) | ChError::Compression(_) => {
                DbError::Transient(err.to_string())
            }
            ChError::BadResponse(msg) => {
                let lower = msg.to_lowercase();
                if lower.contains("readonly") || lower.contains("timeout") || lower.contains("50")
                {
                    DbError::Transient(err.to_string())
                } else {
                    DbError::Permanent(err.to_string())
                }
            }
            _ => DbError::Permanent(err.to_string()),
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, DbError::Transient(_))
    }
}
