//! Configuration validation
//!
//! Checks values serde cannot: ranges, uniqueness and cross-field rules.

use crate::error::{ConfigError, Result};
use crate::{AccountConfig, CacheConfig, Config, SyncConfig};
use std::collections::HashSet;

/// Longest rolling window accepted
pub const MAX_WINDOW_DAYS: u32 = tally_model::MAX_RANGE_DAYS;

/// Longest cache TTL accepted (ten years)
pub const MAX_TTL_DAYS: u64 = 3650;

pub(crate) fn validate_config(config: &Config) -> Result<()> {
    validate_sync(&config.sync)?;
    validate_cache(&config.cache)?;
    validate_accounts(&config.accounts)?;
    Ok(())
}

fn validate_sync(sync: &SyncConfig) -> Result<()> {
    if sync.interval_secs == 0 {
        return Err(ConfigError::invalid("sync", "interval_secs", "must be positive"));
    }
    if sync.freshness_secs == 0 {
        return Err(ConfigError::invalid("sync", "freshness_secs", "must be positive"));
    }
    if !(1..=MAX_WINDOW_DAYS).contains(&sync.window_days) {
        return Err(ConfigError::invalid(
            "sync",
            "window_days",
            format!("must be between 1 and {}", MAX_WINDOW_DAYS),
        ));
    }
    if !(1..=MAX_TTL_DAYS).contains(&sync.ttl_days) {
        return Err(ConfigError::invalid(
            "sync",
            "ttl_days",
            format!("must be between 1 and {}", MAX_TTL_DAYS),
        ));
    }
    Ok(())
}

fn validate_cache(cache: &CacheConfig) -> Result<()> {
    if !cache.memory && cache.path.trim().is_empty() {
        return Err(ConfigError::invalid(
            "cache",
            "path",
            "required unless memory = true",
        ));
    }
    Ok(())
}

fn validate_accounts(accounts: &[AccountConfig]) -> Result<()> {
    let mut seen = HashSet::new();
    for account in accounts {
        let id = account.account_id();
        if id.trim().is_empty() {
            return Err(ConfigError::invalid("accounts", "account_id", "cannot be empty"));
        }
        if !seen.insert(id) {
            return Err(ConfigError::invalid(
                "accounts",
                "account_id",
                format!("duplicate account '{}'", id),
            ));
        }
        for (product_id, cost) in &account.costs {
            if !cost.is_finite() || *cost < 0.0 {
                return Err(ConfigError::invalid(
                    "accounts",
                    format!("{}.costs.{}", id, product_id),
                    "must be a finite, non-negative number",
                ));
            }
        }
    }
    Ok(())
}
