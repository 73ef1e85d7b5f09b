//! Connector configuration types
//!
//! Each connector defines its own config struct here.
//! Configs are parsed from raw TOML values provided by the config crate.

use crate::error::ConnectorError;
use crate::resilience::{
    Backoff, DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_BASE_DELAY_MS, DEFAULT_TIMEOUT_SECS, RetryPolicy,
};
use serde::Deserialize;
use std::time::Duration;

/// Retry settings shared by every connector config
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Request timeout in seconds (default: 30)
    pub timeout_secs: u64,

    /// Attempts per request, first try included (default: 3)
    pub max_attempts: u32,

    /// Base delay between attempts in milliseconds (default: 1000)
    pub retry_base_delay_ms: u64,

    /// Backoff function: linear or exponential (default: linear)
    pub backoff: Backoff,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_base_delay_ms: DEFAULT_RETRY_BASE_DELAY_MS,
            backoff: Backoff::Linear,
        }
    }
}

impl RetrySettings {
    /// Build the retry policy from these settings
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            base_delay: Duration::from_millis(self.retry_base_delay_ms),
            backoff: self.backoff,
            attempt_timeout: Duration::from_secs(self.timeout_secs),
        }
    }

    fn validate(&self, connector: &str) -> Result<(), ConnectorError> {
        if self.max_attempts == 0 {
            return Err(ConnectorError::ConfigError(format!(
                "{}: max_attempts must be at least 1",
                connector
            )));
        }
        if self.timeout_secs == 0 {
            return Err(ConnectorError::ConfigError(format!(
                "{}: timeout_secs must be positive",
                connector
            )));
        }
        Ok(())
    }
}

fn parse_section<T: serde::de::DeserializeOwned>(
    value: &toml::Value,
    connector: &str,
) -> Result<T, ConnectorError> {
    value.clone().try_into().map_err(|e: toml::de::Error| {
        ConnectorError::ConfigError(format!("Invalid {} config: {}", connector, e))
    })
}

/// Commerce connector configuration
///
/// Drives Shopify Admin GraphQL bulk operations.
///
/// # Example
///
/// ```toml
/// [connectors.commerce]
/// api_version = "2024-10"
/// poll_interval_ms = 2000
/// poll_timeout_secs = 1800   # optional, default: poll until the job ends
/// max_attempts = 3
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CommerceConnectorConfig {
    /// Admin API version (default: 2024-10)
    pub api_version: String,

    /// Interval between bulk job status polls in milliseconds (default: 2000)
    pub poll_interval_ms: u64,

    /// Give up waiting on a bulk job after this many seconds (default: none)
    pub poll_timeout_secs: Option<u64>,

    #[serde(flatten)]
    pub retry: RetrySettings,
}

impl Default for CommerceConnectorConfig {
    fn default() -> Self {
        Self {
            api_version: "2024-10".to_string(),
            poll_interval_ms: 2000,
            poll_timeout_secs: None,
            retry: RetrySettings::default(),
        }
    }
}

impl CommerceConnectorConfig {
    /// Parse config from raw TOML value
    pub fn from_toml(value: &toml::Value) -> Result<Self, ConnectorError> {
        let config: CommerceConnectorConfig = parse_section(value, "commerce")?;
        config.retry.validate("commerce")?;
        if config.poll_interval_ms == 0 {
            return Err(ConnectorError::ConfigError(
                "commerce: poll_interval_ms must be positive".to_string(),
            ));
        }
        Ok(config)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn poll_timeout(&self) -> Option<Duration> {
        self.poll_timeout_secs.map(Duration::from_secs)
    }
}

/// Ad connector configuration
///
/// Pulls insights from the Meta Marketing API.
///
/// # Example
///
/// ```toml
/// [connectors.ads]
/// api_url = "https://graph.facebook.com"
/// api_version = "v19.0"
/// max_attempts = 4
/// retry_base_delay_ms = 2000
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AdsConnectorConfig {
    /// Graph API base URL (default: https://graph.facebook.com)
    pub api_url: String,

    /// Graph API version (default: v19.0)
    pub api_version: String,

    /// Rows requested per insights page (default: 500)
    pub page_limit: u32,

    #[serde(flatten)]
    pub retry: RetrySettings,
}

impl Default for AdsConnectorConfig {
    fn default() -> Self {
        Self {
            api_url: "https://graph.facebook.com".to_string(),
            api_version: "v19.0".to_string(),
            page_limit: 500,
            retry: RetrySettings::default(),
        }
    }
}

impl AdsConnectorConfig {
    /// Parse config from raw TOML value
    pub fn from_toml(value: &toml::Value) -> Result<Self, ConnectorError> {
        let config: AdsConnectorConfig = parse_section(value, "ads")?;
        config.retry.validate("ads")?;
        if config.page_limit == 0 {
            return Err(ConnectorError::ConfigError(
                "ads: page_limit must be positive".to_string(),
            ));
        }
        Ok(config)
    }
}

/// Fulfillment connector configuration
///
/// Pulls shipments from the Shiprocket external API.
///
/// # Example
///
/// ```toml
/// [connectors.fulfillment]
/// api_url = "https://apiv2.shiprocket.in"
/// page_size = 100
/// rto_surcharge_ratio = 1.0
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FulfillmentConnectorConfig {
    /// API base URL (default: https://apiv2.shiprocket.in)
    pub api_url: String,

    /// Rows per page (default: 100)
    pub page_size: usize,

    /// Stop after this many pages even if the last one was full (default: 500)
    pub max_pages: usize,

    /// RTO surcharge as a multiple of forward freight (default: 1.0)
    pub rto_surcharge_ratio: f64,

    #[serde(flatten)]
    pub retry: RetrySettings,
}

impl Default for FulfillmentConnectorConfig {
    fn default() -> Self {
        Self {
            api_url: "https://apiv2.shiprocket.in".to_string(),
            page_size: 100,
            max_pages: 500,
            rto_surcharge_ratio: 1.0,
            retry: RetrySettings::default(),
        }
    }
}

impl FulfillmentConnectorConfig {
    /// Parse config from raw TOML value
    pub fn from_toml(value: &toml::Value) -> Result<Self, ConnectorError> {
        let config: FulfillmentConnectorConfig = parse_section(value, "fulfillment")?;
        config.retry.validate("fulfillment")?;
        if config.page_size == 0 || config.max_pages == 0 {
            return Err(ConnectorError::ConfigError(
                "fulfillment: page_size and max_pages must be positive".to_string(),
            ));
        }
        if !config.rto_surcharge_ratio.is_finite() || config.rto_surcharge_ratio < 0.0 {
            return Err(ConnectorError::ConfigError(
                "fulfillment: rto_surcharge_ratio must be >= 0".to_string(),
            ));
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commerce_config_defaults() {
        let config = CommerceConnectorConfig::default();
        assert_eq!(config.api_version, "2024-10");
        assert_eq!(config.poll_interval(), Duration::from_secs(2));
        assert!(config.poll_timeout().is_none());
        assert_eq!(config.retry.max_attempts, 3);
    }

    #[test]
    fn test_commerce_config_from_toml() {
        let toml_str = r#"
api_version = "2025-01"
poll_interval_ms = 500
poll_timeout_secs = 600
max_attempts = 5
backoff = "exponential"
"#;
        let value: toml::Value = toml::from_str(toml_str).unwrap();
        let config = CommerceConnectorConfig::from_toml(&value).unwrap();

        assert_eq!(config.api_version, "2025-01");
        assert_eq!(config.poll_interval(), Duration::from_millis(500));
        assert_eq!(config.poll_timeout(), Some(Duration::from_secs(600)));
        let policy = config.retry.retry_policy();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.backoff, Backoff::Exponential);
    }

    #[test]
    fn test_ads_config_rejects_zero_attempts() {
        let value: toml::Value = toml::from_str("max_attempts = 0").unwrap();
        let result = AdsConnectorConfig::from_toml(&value);
        assert!(matches!(result, Err(ConnectorError::ConfigError(_))));
    }

    #[test]
    fn test_ads_config_linear_backoff_by_default() {
        let value: toml::Value = toml::from_str("retry_base_delay_ms = 250").unwrap();
        let config = AdsConnectorConfig::from_toml(&value).unwrap();
        let policy = config.retry.retry_policy();
        assert_eq!(policy.backoff, Backoff::Linear);
        assert_eq!(policy.delay(2), Duration::from_millis(500));
        assert_eq!(config.api_url, "https://graph.facebook.com");
    }

    #[test]
    fn test_fulfillment_config_from_toml() {
        let toml_str = r#"
page_size = 50
rto_surcharge_ratio = 0.5
"#;
        let value: toml::Value = toml::from_str(toml_str).unwrap();
        let config = FulfillmentConnectorConfig::from_toml(&value).unwrap();
        assert_eq!(config.page_size, 50);
        assert_eq!(config.max_pages, 500);
        assert_eq!(config.rto_surcharge_ratio, 0.5);
    }

    #[test]
    fn test_fulfillment_config_rejects_negative_surcharge() {
        let value: toml::Value = toml::from_str("rto_surcharge_ratio = -1.0").unwrap();
        assert!(FulfillmentConnectorConfig::from_toml(&value).is_err());
    }
}
