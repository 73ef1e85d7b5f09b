//! In-memory cache store

use crate::clock::{Clock, SystemClock};
use crate::entry::{CacheEntry, CachePolicy, CacheStatus};
use crate::error::Result;
use crate::store::{CacheStore, check_kind};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tally_model::{CacheKey, CachePayload};

/// Cache store backed by a process-local map
pub struct MemoryCacheStore {
    entries: RwLock<HashMap<CacheKey, CacheEntry>>,
    clock: Arc<dyn Clock>,
    policy: CachePolicy,
}

impl MemoryCacheStore {
    pub fn new(policy: CachePolicy) -> Self {
        Self::with_clock(policy, Arc::new(SystemClock))
    }

    pub fn with_clock(policy: CachePolicy, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            clock,
            policy,
        }
    }

    /// Number of stored entries, expired ones included
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    fn transition(&self, key: &CacheKey, status: CacheStatus, message: Option<String>) {
        let now = self.clock.now();
        let mut entries = self.entries.write();
        let previous = entries.get(key).filter(|e| !e.is_expired(now)).cloned();
        let entry = CacheEntry::transition(key.clone(), previous, status, message, now, &self.policy);
        entries.insert(key.clone(), entry);
    }
}

impl Default for MemoryCacheStore {
    fn default() -> Self {
        Self::new(CachePolicy::default())
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    fn policy(&self) -> CachePolicy {
        self.policy
    }

    async fn entry(&self, key: &CacheKey) -> Result<Option<CacheEntry>> {
        let now = self.clock.now();
        Ok(self
            .entries
            .read()
            .get(key)
            .filter(|e| !e.is_expired(now))
            .cloned())
    }

    async fn set(&self, key: &CacheKey, payload: CachePayload) -> Result<()> {
        check_kind(key, &payload)?;
        let entry = CacheEntry::success(key.clone(), payload, self.clock.now(), &self.policy);
        self.entries.write().insert(key.clone(), entry);
        Ok(())
    }

    async fn mark_syncing(&self, key: &CacheKey) -> Result<()> {
        self.transition(key, CacheStatus::Syncing, None);
        Ok(())
    }

    async fn mark_failed(&self, key: &CacheKey, message: &str) -> Result<()> {
        self.transition(key, CacheStatus::Failed, Some(message.to_string()));
        Ok(())
    }

    async fn clear(&self, key: &CacheKey) -> Result<bool> {
        Ok(self.entries.write().remove(key).is_some())
    }

    async fn clear_account(&self, account_id: &str) -> Result<u64> {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|key, _| key.account_id != account_id);
        Ok((before - entries.len()) as u64)
    }

    async fn purge_expired(&self) -> Result<u64> {
        let now = self.clock.now();
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, e| !e.is_expired(now));
        Ok((before - entries.len()) as u64)
    }
}
