//! Cache error types

use tally_model::DataKind;
use thiserror::Error;

/// Cache store errors
#[derive(Debug, Error)]
pub enum CacheError {
    /// Database error
    #[error("database error: {0}")]
    Database(#[from] turso::Error),

    /// Payload (de)serialization error
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Payload kind does not match the key's data kind
    #[error("payload kind {payload} does not match key kind {key}")]
    KindMismatch { key: DataKind, payload: DataKind },

    /// Store cannot be opened or holds unreadable data
    #[error("cache unavailable: {0}")]
    Unavailable(String),
}

impl CacheError {
    /// Another connection holds the database lock; the operation can be retried
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            Self::Database(turso::Error::SqlExecutionFailure(msg))
                if msg.contains("database is locked")
        )
    }
}

/// Result type for cache operations
pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_busy() {
        let locked = CacheError::Database(turso::Error::SqlExecutionFailure(
            "database is locked".into(),
        ));
        assert!(locked.is_busy());

        let other = CacheError::Database(turso::Error::SqlExecutionFailure("no such table".into()));
        assert!(!other.is_busy());
        assert!(!CacheError::Unavailable("x".into()).is_busy());
    }
}
