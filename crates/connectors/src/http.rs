//! Shared HTTP plumbing

use crate::error::ConnectorError;
use std::time::Duration;

/// User agent sent by every connector
pub const USER_AGENT: &str = "tally/0.1";

/// Longest error body kept in an error message
const MAX_ERROR_BODY: usize = 512;

/// Build an HTTP client for a connector
pub fn build_client(connector: &str, timeout: Duration) -> Result<reqwest::Client, ConnectorError> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
        .map_err(|e| ConnectorError::Init(format!("{} HTTP client: {}", connector, e)))
}

/// Map a non-success response to a connector error
pub async fn status_error(response: reqwest::Response, context: &str) -> ConnectorError {
    let status = response.status();
    let retry_after_secs = response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(60);
    let mut body = response.text().await.unwrap_or_default();
    if body.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }

    match status {
        reqwest::StatusCode::NOT_FOUND => ConnectorError::NotFound(context.to_string()),
        reqwest::StatusCode::UNAUTHORIZED => {
            ConnectorError::AuthFailed("Invalid or missing access token".into())
        }
        reqwest::StatusCode::FORBIDDEN => {
            ConnectorError::AuthFailed("Access denied - check API permissions".into())
        }
        reqwest::StatusCode::TOO_MANY_REQUESTS => ConnectorError::RateLimited { retry_after_secs },
        s if s.is_server_error() => ConnectorError::Server {
            status: s.as_u16(),
            message: format!("{}: {}", context, body),
        },
        s => ConnectorError::Client {
            status: s.as_u16(),
            message: format!("{}: {}", context, body),
        },
    }
}

/// Parse a decimal amount that a source may send as a string or a number
pub fn parse_amount(value: &serde_json::Value) -> f64 {
    match value {
        serde_json::Value::Number(n) => n.as_f64().unwrap_or(0.0),
        serde_json::Value::String(s) => s.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    }
}
