//! Cache store trait

use crate::clock::Clock;
use crate::entry::{CacheEntry, CachePolicy};
use crate::error::{CacheError, Result};
use async_trait::async_trait;
use tally_model::{CacheKey, CachePayload};

/// Persistent cache keyed by (account, data kind, date range)
///
/// Overlapping ranges are independent keys. Status transitions are atomic
/// per key; `mark_syncing` and `mark_failed` keep the last successful
/// payload so reads keep working while a refresh is in flight or after one
/// fails.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Time source used for freshness and expiry
    fn clock(&self) -> &dyn Clock;

    fn policy(&self) -> CachePolicy;

    /// Full unexpired entry, for status display
    async fn entry(&self, key: &CacheKey) -> Result<Option<CacheEntry>>;

    /// Unconditional upsert of a successful result
    ///
    /// Rejects a payload whose kind differs from the key's kind.
    async fn set(&self, key: &CacheKey, payload: CachePayload) -> Result<()>;

    /// Record that a refresh has started
    async fn mark_syncing(&self, key: &CacheKey) -> Result<()>;

    /// Record that a refresh failed
    async fn mark_failed(&self, key: &CacheKey, message: &str) -> Result<()>;

    /// Delete one entry; returns whether it existed
    async fn clear(&self, key: &CacheKey) -> Result<bool>;

    /// Delete every entry for an account
    async fn clear_account(&self, account_id: &str) -> Result<u64>;

    /// Delete entries past their expiry
    async fn purge_expired(&self) -> Result<u64>;

    /// True unless a success entry exists within the freshness window
    async fn should_refresh(&self, key: &CacheKey) -> Result<bool> {
        let now = self.clock().now();
        let freshness = self.policy().freshness;
        Ok(!self
            .entry(key)
            .await?
            .is_some_and(|e| e.is_fresh(now, freshness)))
    }

    /// Last successful payload, if unexpired
    async fn get(&self, key: &CacheKey) -> Result<Option<CachePayload>> {
        Ok(self.entry(key).await?.and_then(|e| e.payload))
    }
}

pub(crate) fn check_kind(key: &CacheKey, payload: &CachePayload) -> Result<()> {
    if payload.kind() != key.data_kind {
        return Err(CacheError::KindMismatch {
            key: key.data_kind,
            payload: payload.kind(),
        });
    }
    Ok(())
}
