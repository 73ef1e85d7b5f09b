//! Cache storage configuration

use serde::Deserialize;

/// Where cache entries and product costs are stored
///
/// # Example
///
/// ```toml
/// [cache]
/// path = "/var/lib/tally/tally.db"
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Database file (default: data/tally.db)
    pub path: String,

    /// Keep everything in process memory; nothing survives a restart
    pub memory: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            path: "data/tally.db".into(),
            memory: false,
        }
    }
}
