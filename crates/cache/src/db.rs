//! Turso-backed cache store
//!
//! One row per cache key in `cache_entries`. Payloads are stored as tagged
//! JSON text and timestamps as fixed-width RFC 3339 UTC text, so expiry can
//! be compared in SQL.
//!
//! Every statement runs on one connection behind an async mutex, so reads
//! and writes from this process never contend for the file lock. Another
//! process holding the lock is retried with a short backoff.

use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use tally_model::{CacheKey, CachePayload};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use turso::{Builder, Connection, Database};

use crate::clock::{Clock, SystemClock};
use crate::entry::{CacheEntry, CachePolicy, CacheStatus};
use crate::error::{CacheError, Result};
use crate::store::{CacheStore, check_kind};

/// Attempts for an operation that keeps finding the database locked
const BUSY_ATTEMPTS: u32 = 20;

/// Backoff step between busy retries (grows linearly)
const BUSY_BACKOFF: Duration = Duration::from_millis(10);

/// Cache store persisted in a Turso database
pub struct TursoCacheStore {
    db: Database,
    /// Shared by every operation; holding it also makes status transitions atomic
    conn: Mutex<Connection>,
    clock: Arc<dyn Clock>,
    policy: CachePolicy,
}

impl TursoCacheStore {
    /// Open (or create) a file-based cache database
    pub async fn open(path: impl AsRef<Path>, policy: CachePolicy) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                CacheError::Unavailable(format!("failed to create {}: {}", parent.display(), e))
            })?;
        }

        let path_str = path.to_string_lossy();
        info!(path = %path_str, "Opening cache database");
        let db = Builder::new_local(&path_str).build().await?;
        Self::init(db, policy).await
    }

    /// In-memory cache database (for testing)
    pub async fn in_memory(policy: CachePolicy) -> Result<Self> {
        let db = Builder::new_local(":memory:").build().await?;
        Self::init(db, policy).await
    }

    /// Replace the time source
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Database handle, shared with other tables in the same file
    pub fn database(&self) -> &Database {
        &self.db
    }

    async fn init(db: Database, policy: CachePolicy) -> Result<Self> {
        let conn = db.connect()?;
        conn.execute(SCHEMA_CACHE_ENTRIES, ()).await?;
        conn.execute(INDEX_CACHE_ENTRIES_EXPIRES, ()).await?;
        debug!("Cache schema initialized");

        Ok(Self {
            db,
            conn: Mutex::new(conn),
            clock: Arc::new(SystemClock),
            policy,
        })
    }

    async fn load(&self, conn: &Connection, key: &CacheKey) -> Result<Option<CacheEntry>> {
        let start = key.date_range.start_date.to_string();
        let end = key.date_range.end_date.to_string();

        let mut rows = conn
            .query(
                r#"
                SELECT payload, synced_at, status, error_message, updated_at, expires_at
                FROM cache_entries
                WHERE account_id = ?1 AND data_kind = ?2 AND start_date = ?3 AND end_date = ?4
                "#,
                [
                    key.account_id.as_str(),
                    key.data_kind.as_str(),
                    start.as_str(),
                    end.as_str(),
                ],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(Self::row_to_entry(key.clone(), &row)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, conn: &Connection, entry: &CacheEntry) -> Result<()> {
        let key = &entry.key;
        let start = key.date_range.start_date.to_string();
        let end = key.date_range.end_date.to_string();
        let payload = entry
            .payload
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let synced_at = entry.synced_at.map(timestamp);
        let updated_at = timestamp(entry.updated_at);
        let expires_at = timestamp(entry.expires_at);

        conn.execute(
            r#"
            INSERT OR REPLACE INTO cache_entries (account_id, data_kind, start_date, end_date, payload, synced_at, status, error_message, updated_at, expires_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            [
                key.account_id.as_str(),
                key.data_kind.as_str(),
                start.as_str(),
                end.as_str(),
                payload.as_deref().unwrap_or(""),
                synced_at.as_deref().unwrap_or(""),
                entry.status.as_str(),
                entry.error_message.as_deref().unwrap_or(""),
                updated_at.as_str(),
                expires_at.as_str(),
            ],
        )
        .await?;

        Ok(())
    }

    async fn transition(
        &self,
        key: &CacheKey,
        status: CacheStatus,
        message: Option<String>,
    ) -> Result<()> {
        let conn = self.conn.lock().await;
        retry_busy(|| async {
            let now = self.clock.now();
            let previous = self.load(&conn, key).await?.filter(|e| !e.is_expired(now));
            let entry = CacheEntry::transition(
                key.clone(),
                previous,
                status,
                message.clone(),
                now,
                &self.policy,
            );
            self.save(&conn, &entry).await
        })
        .await
    }

    // =========================================================================
    // Row conversion helper
    // =========================================================================

    fn row_to_entry(key: CacheKey, row: &turso::Row) -> Result<CacheEntry> {
        let payload_json = text(row, 0)?;
        let synced_at_str = text(row, 1)?;
        let status_str = text(row, 2)?;
        let error_message = text(row, 3)?;
        let updated_at_str = text(row, 4)?;
        let expires_at_str = text(row, 5)?;

        let payload: Option<CachePayload> = Some(payload_json)
            .filter(|s| !s.is_empty())
            .map(|s| serde_json::from_str(&s))
            .transpose()?;
        let synced_at = Some(synced_at_str)
            .filter(|s| !s.is_empty())
            .map(|s| parse_timestamp(&s))
            .transpose()?;
        let status: CacheStatus = status_str.parse().map_err(CacheError::Unavailable)?;

        Ok(CacheEntry {
            key,
            payload,
            synced_at,
            status,
            error_message: Some(error_message).filter(|s| !s.is_empty()),
            updated_at: parse_timestamp(&updated_at_str)?,
            expires_at: parse_timestamp(&expires_at_str)?,
        })
    }
}

#[async_trait]
impl CacheStore for TursoCacheStore {
    fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    fn policy(&self) -> CachePolicy {
        self.policy
    }

    async fn entry(&self, key: &CacheKey) -> Result<Option<CacheEntry>> {
        let conn = self.conn.lock().await;
        let now = self.clock.now();
        let entry = retry_busy(|| self.load(&conn, key)).await?;
        Ok(entry.filter(|e| !e.is_expired(now)))
    }

    async fn set(&self, key: &CacheKey, payload: CachePayload) -> Result<()> {
        check_kind(key, &payload)?;
        let conn = self.conn.lock().await;
        let entry = CacheEntry::success(key.clone(), payload, self.clock.now(), &self.policy);
        retry_busy(|| self.save(&conn, &entry)).await
    }

    async fn mark_syncing(&self, key: &CacheKey) -> Result<()> {
        self.transition(key, CacheStatus::Syncing, None).await
    }

    async fn mark_failed(&self, key: &CacheKey, message: &str) -> Result<()> {
        self.transition(key, CacheStatus::Failed, Some(message.to_string()))
            .await
    }

    async fn clear(&self, key: &CacheKey) -> Result<bool> {
        let conn = self.conn.lock().await;
        let start = key.date_range.start_date.to_string();
        let end = key.date_range.end_date.to_string();

        let affected = retry_busy(|| async {
            conn.execute(
                r#"
                DELETE FROM cache_entries
                WHERE account_id = ?1 AND data_kind = ?2 AND start_date = ?3 AND end_date = ?4
                "#,
                [
                    key.account_id.as_str(),
                    key.data_kind.as_str(),
                    start.as_str(),
                    end.as_str(),
                ],
            )
            .await
            .map_err(CacheError::from)
        })
        .await?;

        Ok(affected > 0)
    }

    async fn clear_account(&self, account_id: &str) -> Result<u64> {
        let conn = self.conn.lock().await;
        retry_busy(|| async {
            conn.execute("DELETE FROM cache_entries WHERE account_id = ?1", [account_id])
                .await
                .map_err(CacheError::from)
        })
        .await
    }

    async fn purge_expired(&self) -> Result<u64> {
        let conn = self.conn.lock().await;
        let now = timestamp(self.clock.now());
        let affected = retry_busy(|| async {
            conn.execute("DELETE FROM cache_entries WHERE expires_at <= ?1", [now.as_str()])
                .await
                .map_err(CacheError::from)
        })
        .await?;
        if affected > 0 {
            debug!(purged = affected, "Purged expired cache entries");
        }
        Ok(affected)
    }
}

/// Run `op` again while another connection holds the database lock
///
/// Gives up after [`BUSY_ATTEMPTS`] and returns the last busy error.
pub async fn retry_busy<T, F, Fut>(mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Err(e) if e.is_busy() && attempt < BUSY_ATTEMPTS => {
                debug!(attempt, "database locked, retrying");
                tokio::time::sleep(BUSY_BACKOFF * attempt).await;
                attempt += 1;
            }
            Err(e) if e.is_busy() => {
                warn!(attempts = attempt, "database still locked, giving up");
                return Err(e);
            }
            result => return result,
        }
    }
}

fn text(row: &turso::Row, idx: usize) -> Result<String> {
    Ok(row.get_value(idx)?.as_text().cloned().unwrap_or_default())
}

fn timestamp(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| CacheError::Unavailable(format!("invalid timestamp {:?}: {}", s, e)))
}

// =============================================================================
// Schema
// =============================================================================

const SCHEMA_CACHE_ENTRIES: &str = r#"
CREATE TABLE IF NOT EXISTS cache_entries (
    account_id TEXT NOT NULL,
    data_kind TEXT NOT NULL,
    start_date TEXT NOT NULL,
    end_date TEXT NOT NULL,
    payload TEXT,
    synced_at TEXT,
    status TEXT NOT NULL,
    error_message TEXT,
    updated_at TEXT NOT NULL,
    expires_at TEXT NOT NULL,
    PRIMARY KEY (account_id, data_kind, start_date, end_date)
)
"#;

const INDEX_CACHE_ENTRIES_EXPIRES: &str =
    "CREATE INDEX IF NOT EXISTS idx_cache_entries_expires ON cache_entries(expires_at)";
