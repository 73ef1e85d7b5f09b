//! Sync scheduler configuration

use chrono_tz::Tz;
use serde::Deserialize;

/// Scheduler, freshness and window settings
///
/// # Example
///
/// ```toml
/// [sync]
/// interval_secs = 1800
/// freshness_secs = 1800
/// window_days = 30
/// ttl_days = 7
/// timezone = "Asia/Kolkata"
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Seconds between scheduler ticks (default: 1800)
    pub interval_secs: u64,

    /// Age in seconds after which a summary is refreshed (default: 1800)
    pub freshness_secs: u64,

    /// Rolling window length in days, today included (default: 30)
    pub window_days: u32,

    /// Days a cache entry lives before purge (default: 7)
    pub ttl_days: u64,

    /// IANA timezone that defines the business day (default: Asia/Kolkata)
    pub timezone: Tz,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            interval_secs: 1800,
            freshness_secs: 1800,
            window_days: 30,
            ttl_days: 7,
            timezone: chrono_tz::Asia::Kolkata,
        }
    }
}
