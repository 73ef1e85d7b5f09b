//! Sync error types

use tally_cache::CacheError;
use tally_connectors::ConnectorError;
use tally_model::RangeError;
use thiserror::Error;

/// Sync engine errors
///
/// Connector failures during aggregation never appear here; they degrade
/// inside the aggregator. Only direct passthrough reads surface them.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Cache store failure
    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    /// Unknown account or unusable credentials
    #[error("credentials error: {0}")]
    Credentials(String),

    /// Direct source read failed
    #[error("source error: {0}")]
    Source(#[from] ConnectorError),

    /// Bad date input
    #[error("invalid range: {0}")]
    InvalidRange(#[from] RangeError),
}

/// Result type for sync operations
pub type Result<T> = std::result::Result<T, SyncError>;
