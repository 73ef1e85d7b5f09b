//! Tally configuration
//!
//! Loads the TOML file that drives the `tally` binary. Every section has
//! defaults, so an empty file is a valid (if account-less) config.
//!
//! # Example
//!
//! ```toml
//! [log]
//! level = "info"
//!
//! [sync]
//! interval_secs = 1800
//! timezone = "Asia/Kolkata"
//!
//! [cache]
//! path = "data/tally.db"
//!
//! [[accounts]]
//! account_id = "acme"
//!
//! [accounts.ads]
//! ad_account_id = "1234567890"
//! access_token = "EAAB..."
//! ```

mod accounts;
mod cache;
mod connectors;
mod error;
mod logging;
mod sync;
mod validation;

pub use accounts::AccountConfig;
pub use cache::CacheConfig;
pub use connectors::ConnectorsConfig;
pub use error::{ConfigError, Result};
pub use logging::{LogConfig, LogFormat, LogLevel, LogOutput};
pub use sync::SyncConfig;
pub use validation::{MAX_TTL_DAYS, MAX_WINDOW_DAYS};

use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub log: LogConfig,
    pub sync: SyncConfig,
    pub cache: CacheConfig,
    pub connectors: ConnectorsConfig,
    pub accounts: Vec<AccountConfig>,
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read, parsed, or fails validation.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::IoError {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::parse(&content)
    }

    fn parse(s: &str) -> Result<Self> {
        let config: Config = toml::from_str(s).map_err(ConfigError::ParseError)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        validation::validate_config(self)
    }

    pub fn account(&self, account_id: &str) -> Option<&AccountConfig> {
        self.accounts.iter().find(|a| a.account_id() == account_id)
    }
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
