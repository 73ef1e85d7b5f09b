//! Tally - Cache
//!
//! Staleness-aware store for sync results, keyed by (account, data kind,
//! date range).
//!
//! # Stores
//!
//! - [`MemoryCacheStore`] - process-local map, for tests and `cache.memory = true`
//! - [`TursoCacheStore`] - `cache_entries` table in a Turso database
//!
//! # Entry lifecycle
//!
//! ```text
//! absent ──mark_syncing──▶ syncing ──set──▶ success
//!                              └──mark_failed──▶ failed
//! ```
//!
//! A status change never drops the last successful payload. Every entry
//! expires `ttl` after its last success (or after creation if it never
//! succeeded), whatever its status.

mod clock;
mod db;
mod entry;
mod error;
mod memory;
mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use db::{TursoCacheStore, retry_busy};
pub use entry::{
    CacheEntry, CachePolicy, CacheStatus, DEFAULT_FRESHNESS_SECS, DEFAULT_TTL_DAYS,
};
pub use error::{CacheError, Result};
pub use memory::MemoryCacheStore;
pub use store::CacheStore;
