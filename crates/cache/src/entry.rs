//! Cache entries and their freshness rules

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use tally_model::{CacheKey, CachePayload};

/// Default freshness window (30 minutes)
pub const DEFAULT_FRESHNESS_SECS: i64 = 30 * 60;

/// Default time to live (7 days)
pub const DEFAULT_TTL_DAYS: i64 = 7;

/// Sync status of a cache entry
///
/// absent → syncing → {success | failed}. Both terminal states persist until
/// the next refresh overwrites them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheStatus {
    Success,
    Failed,
    Syncing,
}

impl CacheStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Syncing => "syncing",
        }
    }
}

impl fmt::Display for CacheStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CacheStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(Self::Success),
            "failed" => Ok(Self::Failed),
            "syncing" => Ok(Self::Syncing),
            other => Err(format!("unknown cache status: {}", other)),
        }
    }
}

/// Freshness window and time to live
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    /// A success entry older than this should be refreshed
    pub freshness: TimeDelta,
    /// Entries are dropped this long after their last success
    pub ttl: TimeDelta,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            freshness: TimeDelta::seconds(DEFAULT_FRESHNESS_SECS),
            ttl: TimeDelta::days(DEFAULT_TTL_DAYS),
        }
    }
}

impl CachePolicy {
    pub fn new(freshness_secs: u64, ttl_days: u64) -> Self {
        Self {
            freshness: i64::try_from(freshness_secs)
                .ok()
                .and_then(TimeDelta::try_seconds)
                .unwrap_or(TimeDelta::MAX),
            ttl: i64::try_from(ttl_days)
                .ok()
                .and_then(TimeDelta::try_days)
                .unwrap_or(TimeDelta::MAX),
        }
    }

    /// Expiry time for an entry last synced at `from`
    pub fn expiry(&self, from: DateTime<Utc>) -> DateTime<Utc> {
        from.checked_add_signed(self.ttl).unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

/// One cache slot
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub key: CacheKey,
    /// Last successfully written payload, kept through later status changes
    pub payload: Option<CachePayload>,
    /// Time of the last successful write
    pub synced_at: Option<DateTime<Utc>>,
    pub status: CacheStatus,
    pub error_message: Option<String>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl CacheEntry {
    /// Entry for a successful write
    pub fn success(
        key: CacheKey,
        payload: CachePayload,
        now: DateTime<Utc>,
        policy: &CachePolicy,
    ) -> Self {
        Self {
            key,
            payload: Some(payload),
            synced_at: Some(now),
            status: CacheStatus::Success,
            error_message: None,
            updated_at: now,
            expires_at: policy.expiry(now),
        }
    }

    /// Status change that keeps the previous payload and sync time
    pub fn transition(
        key: CacheKey,
        previous: Option<CacheEntry>,
        status: CacheStatus,
        error_message: Option<String>,
        now: DateTime<Utc>,
        policy: &CachePolicy,
    ) -> Self {
        let (payload, synced_at) = previous
            .map(|e| (e.payload, e.synced_at))
            .unwrap_or((None, None));
        Self {
            key,
            payload,
            synced_at,
            status,
            error_message,
            updated_at: now,
            expires_at: policy.expiry(synced_at.unwrap_or(now)),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Successful and no older than the freshness window
    pub fn is_fresh(&self, now: DateTime<Utc>, freshness: TimeDelta) -> bool {
        self.status == CacheStatus::Success
            && self.synced_at.is_some_and(|t| now - t <= freshness)
    }
}
