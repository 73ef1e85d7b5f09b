//! Periodic sync of every fully-credentialed account
//!
//! Each tick purges expired cache entries, then walks the accounts one at a
//! time. For a stale account the three sources are fetched concurrently,
//! each successful source is cached under its own data kind, and the merged
//! summary is cached last. One account failing never stops the tick.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono_tz::Tz;
use tally_cache::CacheStore;
use tally_connectors::business_today;
use tally_model::{
    AccountCredentials, CacheKey, CachePayload, DataKind, DateRange, NoData, SourceKind,
};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::aggregator::{Aggregation, Aggregator};
use crate::credentials::CredentialStore;
use crate::error::{Result, SyncError};

/// Default tick interval (30 minutes)
pub const DEFAULT_INTERVAL_SECS: u64 = 30 * 60;

/// Default rolling window (today and the 29 days before)
pub const DEFAULT_WINDOW_DAYS: u32 = 30;

/// Scheduler settings
#[derive(Debug, Clone, Copy)]
pub struct SyncSettings {
    pub interval: Duration,
    pub window_days: u32,
    /// Business timezone that defines "today"
    pub timezone: Tz,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(DEFAULT_INTERVAL_SECS),
            window_days: DEFAULT_WINDOW_DAYS,
            timezone: chrono_tz::Asia::Kolkata,
        }
    }
}

/// Outcome of one tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Accounts considered
    pub accounts: usize,
    /// Accounts whose cache was rewritten
    pub refreshed: usize,
    /// Accounts skipped as still fresh
    pub fresh: usize,
    /// Accounts that hit an error
    pub failed: usize,
    /// Expired cache entries removed
    pub purged: u64,
}

/// Outcome of syncing one account
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountSync {
    /// Summary still within the freshness window
    Fresh,
    /// Sources fetched and cache rewritten
    Refreshed {
        range: DateRange,
        degraded: Vec<SourceKind>,
        no_data: bool,
    },
}

/// Interval-driven sync scheduler
pub struct SyncScheduler {
    aggregator: Arc<Aggregator>,
    cache: Arc<dyn CacheStore>,
    credentials: Arc<dyn CredentialStore>,
    settings: SyncSettings,
}

impl SyncScheduler {
    pub fn new(
        aggregator: Arc<Aggregator>,
        cache: Arc<dyn CacheStore>,
        credentials: Arc<dyn CredentialStore>,
        settings: SyncSettings,
    ) -> Self {
        Self {
            aggregator,
            cache,
            credentials,
            settings,
        }
    }

    /// Run ticks until `shutdown` is cancelled
    ///
    /// The first tick fires immediately. A tick that overruns the interval
    /// delays the next one instead of bursting.
    pub async fn run(&self, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(self.settings.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            interval_secs = self.settings.interval.as_secs(),
            window_days = self.settings.window_days,
            timezone = %self.settings.timezone,
            "starting sync scheduler"
        );

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("sync scheduler stopped");
                    return;
                }
                _ = ticker.tick() => {
                    match self.tick().await {
                        Ok(report) => info!(
                            accounts = report.accounts,
                            refreshed = report.refreshed,
                            fresh = report.fresh,
                            failed = report.failed,
                            purged = report.purged,
                            "sync tick complete"
                        ),
                        Err(e) => error!(error = %e, "sync tick failed"),
                    }
                }
            }
        }
    }

    /// One scheduled pass over every account
    pub async fn tick(&self) -> Result<TickReport> {
        self.sync(None, false).await
    }

    /// One pass over all accounts or a single one
    ///
    /// `force` bypasses the staleness check. Naming an account that is
    /// unknown or lacks credentials is an error; during a full pass such
    /// accounts are skipped.
    pub async fn sync(&self, account: Option<&str>, force: bool) -> Result<TickReport> {
        let purged = self.cache.purge_expired().await?;

        let accounts = match account {
            Some(id) => {
                let creds = self
                    .credentials
                    .get(id)
                    .await?
                    .ok_or_else(|| SyncError::Credentials(format!("unknown account: {}", id)))?;
                let missing = creds.missing_sources();
                if !missing.is_empty() {
                    return Err(SyncError::Credentials(format!(
                        "account {} is missing credentials for {:?}",
                        id, missing
                    )));
                }
                vec![creds]
            }
            None => self.credentials.accounts().await?,
        };

        let mut report = TickReport {
            purged,
            ..Default::default()
        };

        for creds in accounts {
            if !creds.is_complete() {
                debug!(
                    account = %creds.account_id,
                    missing = ?creds.missing_sources(),
                    "skipping account without full credentials"
                );
                continue;
            }
            report.accounts += 1;

            match self.sync_account(&creds, force).await {
                Ok(AccountSync::Fresh) => report.fresh += 1,
                Ok(AccountSync::Refreshed { .. }) => report.refreshed += 1,
                Err(e) => {
                    error!(account = %creds.account_id, error = %e, "account sync failed");
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }

    /// Refresh one account's rolling window if stale (or forced)
    pub async fn sync_account(
        &self,
        credentials: &AccountCredentials,
        force: bool,
    ) -> Result<AccountSync> {
        let account = credentials.account_id.as_str();
        let today = business_today(self.cache.clock().now(), self.settings.timezone);
        let range = DateRange::rolling(today, self.settings.window_days)?;
        let summary_key = CacheKey::new(account, DataKind::AggregatedSummary, range);

        if !force && !self.cache.should_refresh(&summary_key).await? {
            debug!(account = %account, range = %range, "cache fresh, skipping");
            return Ok(AccountSync::Fresh);
        }

        for kind in DataKind::ALL {
            self.cache.mark_syncing(&summary_key.with_kind(kind)).await?;
        }

        let data = self.aggregator.fetch_sources(credentials, &range).await;

        let sources = [
            (SourceKind::Commerce, data.orders.clone().map(CachePayload::Commerce)),
            (SourceKind::Ads, data.ads.clone().map(CachePayload::Ads)),
            (SourceKind::Fulfillment, data.shipments.clone().map(CachePayload::Fulfillment)),
        ];
        for (source, payload) in sources {
            self.write_source(&summary_key, source, payload, &data.failures)
                .await?;
        }

        let degraded = data.degraded();
        let no_data = match Aggregator::merge(account, &range, &data) {
            Aggregation::Metrics(metrics) => {
                self.cache
                    .set(&summary_key, CachePayload::AggregatedSummary(metrics))
                    .await?;
                false
            }
            Aggregation::NoData(no_data) => {
                self.cache
                    .mark_failed(&summary_key, &no_data_message(&no_data))
                    .await?;
                true
            }
        };

        info!(
            account = %account,
            range = %range,
            degraded = ?degraded,
            no_data,
            "account synced"
        );
        Ok(AccountSync::Refreshed {
            range,
            degraded,
            no_data,
        })
    }

    async fn write_source(
        &self,
        summary_key: &CacheKey,
        source: SourceKind,
        payload: Option<CachePayload>,
        failures: &BTreeMap<SourceKind, String>,
    ) -> Result<()> {
        let key = summary_key.with_kind(source.into());
        match payload {
            Some(payload) => self.cache.set(&key, payload).await?,
            None => {
                let message = failures
                    .get(&source)
                    .map(String::as_str)
                    .unwrap_or("source unavailable");
                warn!(account = %key.account_id, connector = %source, "caching source failure");
                self.cache.mark_failed(&key, message).await?;
            }
        }
        Ok(())
    }
}

/// Error message stored on a summary that had nothing to report
pub fn no_data_message(no_data: &NoData) -> String {
    if no_data.degraded_sources.is_empty() {
        "no data: no orders in range".to_string()
    } else {
        let sources: Vec<&str> = no_data.degraded_sources.iter().map(|s| s.as_str()).collect();
        format!("no data: degraded sources {}", sources.join(", "))
    }
}
