//! Error types for connectors

use thiserror::Error;

/// Errors that can occur during connector operations
#[derive(Error, Debug)]
pub enum ConnectorError {
    /// Failed to initialize connector (e.g., HTTP client creation failed)
    #[error("failed to initialize connector: {0}")]
    Init(String),

    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// Response parsed but did not have the expected shape
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// API rate limited
    #[error("Rate limited, retry after {retry_after_secs} seconds")]
    RateLimited { retry_after_secs: u64 },

    /// Authentication failed
    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    /// Resource not found
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Source rejected the request (4xx other than auth/404/429)
    #[error("Request rejected with status {status}: {message}")]
    Client { status: u16, message: String },

    /// Source failed (5xx)
    #[error("Server error {status}: {message}")]
    Server { status: u16, message: String },

    /// Bulk export job failed, was cancelled or expired
    #[error("Bulk export failed: {0}")]
    BulkJob(String),

    /// Operation exceeded its deadline
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Transient failures persisted through every retry
    #[error("failed after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl ConnectorError {
    /// Transient errors worth retrying: timeouts, connection errors, 5xx and 429
    pub fn is_retryable(&self) -> bool {
        match self {
            ConnectorError::Http(e) => {
                if e.is_timeout() || e.is_connect() {
                    return true;
                }
                e.status()
                    .is_some_and(|s| s.is_server_error() || s.as_u16() == 429)
            }
            ConnectorError::RateLimited { .. }
            | ConnectorError::Server { .. }
            | ConnectorError::Timeout(_) => true,
            _ => false,
        }
    }
}
