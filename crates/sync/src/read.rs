//! Read path for dashboards and chat
//!
//! Serves the cached summary for an exact (account, range) key. On a miss,
//! or when the summary is past the freshness window, it aggregates on
//! demand, caches the result and returns it. A refresh that degrades keeps
//! the older summary, served with `stale: true`. When nothing can be
//! produced the caller gets a typed diagnosis instead of an error.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tally_cache::{CacheStatus, CacheStore};
use tally_model::{
    AdOverview, AggregatedMetrics, CacheKey, CachePayload, DataKind, DateRange, MAX_RANGE_DAYS,
    SourceKind,
};
use tracing::{debug, info, warn};

use crate::aggregator::{Aggregation, Aggregator};
use crate::credentials::CredentialStore;
use crate::error::Result;
use crate::scheduler::no_data_message;

/// Response to a metrics read
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ReadResponse {
    Ok(MetricsView),
    Unavailable(Unavailable),
}

/// Metrics with their provenance
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsView {
    #[serde(flatten)]
    pub metrics: AggregatedMetrics,
    pub synced_at: DateTime<Utc>,
    /// Served from cache rather than aggregated for this request
    pub cached: bool,
    /// Older than the freshness window; a refresh was attempted and failed
    pub stale: bool,
}

/// Why no metrics could be served
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum UnavailableReason {
    UnknownAccount,
    MissingCredentials,
    NoData,
}

/// Typed "data unavailable" diagnosis
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Unavailable {
    pub account_id: String,
    pub date_range: DateRange,
    pub reason: UnavailableReason,
    /// Sources with no configured credentials
    pub missing_credentials: Vec<SourceKind>,
    /// Sources that failed or had no credentials during aggregation
    pub degraded_sources: Vec<SourceKind>,
}

/// Cache state of one data kind, for sync indicators
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KindStatus {
    pub data_kind: DataKind,
    /// `None` when nothing is cached
    pub status: Option<CacheStatus>,
    pub synced_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Cache-first metrics reads
pub struct ReadPath {
    aggregator: Arc<Aggregator>,
    cache: Arc<dyn CacheStore>,
    credentials: Arc<dyn CredentialStore>,
}

impl ReadPath {
    pub fn new(
        aggregator: Arc<Aggregator>,
        cache: Arc<dyn CacheStore>,
        credentials: Arc<dyn CredentialStore>,
    ) -> Self {
        Self {
            aggregator,
            cache,
            credentials,
        }
    }

    /// Metrics for an account and ISO date range
    ///
    /// # Errors
    ///
    /// Returns error for malformed or inverted dates, and for cache or
    /// credential store failures.
    pub async fn metrics(
        &self,
        account_id: &str,
        start: &str,
        end: &str,
    ) -> Result<ReadResponse> {
        let range = DateRange::parse(start, end)?.limit(MAX_RANGE_DAYS)?;
        let key = CacheKey::new(account_id, DataKind::AggregatedSummary, range);

        let previous = match self.cached_view(&key).await? {
            Some(view) if !view.stale => {
                debug!(account = %account_id, range = %range, "serving cached metrics");
                return Ok(ReadResponse::Ok(view));
            }
            other => other,
        };

        let Some(credentials) = self.credentials.get(account_id).await? else {
            return Ok(stale_or(
                previous,
                Unavailable {
                    account_id: account_id.to_string(),
                    date_range: range,
                    reason: UnavailableReason::UnknownAccount,
                    missing_credentials: SourceKind::ALL.to_vec(),
                    degraded_sources: Vec::new(),
                },
            ));
        };

        let missing = credentials.missing_sources();
        if missing.len() == SourceKind::ALL.len() {
            return Ok(stale_or(
                previous,
                Unavailable {
                    account_id: account_id.to_string(),
                    date_range: range,
                    reason: UnavailableReason::MissingCredentials,
                    missing_credentials: missing,
                    degraded_sources: Vec::new(),
                },
            ));
        }

        if previous.is_some() {
            info!(
                account = %account_id,
                range = %range,
                "cached metrics stale, refreshing on demand"
            );
        } else {
            info!(account = %account_id, range = %range, "cache miss, aggregating on demand");
        }

        let data = self.aggregator.fetch_sources(&credentials, &range).await;
        let degraded = data.degraded();

        match Aggregator::merge(account_id, &range, &data) {
            Aggregation::Metrics(metrics) => {
                // A partial refresh never replaces a complete older summary
                if let Some(view) = previous
                    && !degraded.is_empty()
                {
                    warn!(
                        account = %account_id,
                        range = %range,
                        degraded = ?degraded,
                        "refresh degraded, serving stale metrics"
                    );
                    self.cache
                        .mark_failed(&key, &degraded_message(&degraded))
                        .await?;
                    return Ok(ReadResponse::Ok(view));
                }

                self.cache
                    .set(&key, CachePayload::AggregatedSummary(metrics.clone()))
                    .await?;
                Ok(ReadResponse::Ok(MetricsView {
                    metrics,
                    synced_at: self.cache.clock().now(),
                    cached: false,
                    stale: false,
                }))
            }
            Aggregation::NoData(no_data) => {
                self.cache
                    .mark_failed(&key, &no_data_message(&no_data))
                    .await?;
                Ok(stale_or(
                    previous,
                    Unavailable {
                        account_id: account_id.to_string(),
                        date_range: range,
                        reason: UnavailableReason::NoData,
                        missing_credentials: missing,
                        degraded_sources: no_data.degraded_sources,
                    },
                ))
            }
        }
    }

    /// Cached summary with its staleness, if one is stored
    async fn cached_view(&self, key: &CacheKey) -> Result<Option<MetricsView>> {
        let Some(entry) = self.cache.entry(key).await? else {
            return Ok(None);
        };
        let fresh = entry.is_fresh(self.cache.clock().now(), self.cache.policy().freshness);

        Ok(match (entry.payload.and_then(CachePayload::into_summary), entry.synced_at) {
            (Some(metrics), Some(synced_at)) => Some(MetricsView {
                metrics,
                synced_at,
                cached: true,
                stale: !fresh,
            }),
            _ => None,
        })
    }

    /// Range-level ad insights for an account, fetched live
    ///
    /// `None` when the account is unknown or has no ad credentials.
    ///
    /// # Errors
    ///
    /// Returns error for bad dates and when the ad source fails.
    pub async fn ad_overview(
        &self,
        account_id: &str,
        start: &str,
        end: &str,
    ) -> Result<Option<AdOverview>> {
        let range = DateRange::parse(start, end)?.limit(MAX_RANGE_DAYS)?;
        let Some(ads) = self
            .credentials
            .get(account_id)
            .await?
            .and_then(|c| c.ads)
        else {
            return Ok(None);
        };

        debug!(account = %account_id, range = %range, "fetching ad overview");
        Ok(Some(self.aggregator.ad_overview(&ads, &range).await?))
    }

    /// Cache status of every data kind for an account and range
    pub async fn status(
        &self,
        account_id: &str,
        start: &str,
        end: &str,
    ) -> Result<Vec<KindStatus>> {
        let range = DateRange::parse(start, end)?.limit(MAX_RANGE_DAYS)?;
        let mut statuses = Vec::with_capacity(DataKind::ALL.len());

        for data_kind in DataKind::ALL {
            let key = CacheKey::new(account_id, data_kind, range);
            let status = match self.cache.entry(&key).await? {
                Some(entry) => KindStatus {
                    data_kind,
                    status: Some(entry.status),
                    synced_at: entry.synced_at,
                    error_message: entry.error_message,
                    expires_at: Some(entry.expires_at),
                },
                None => KindStatus {
                    data_kind,
                    status: None,
                    synced_at: None,
                    error_message: None,
                    expires_at: None,
                },
            };
            statuses.push(status);
        }

        Ok(statuses)
    }
}

/// Stale metrics when there are some, otherwise the diagnosis
fn stale_or(previous: Option<MetricsView>, unavailable: Unavailable) -> ReadResponse {
    match previous {
        Some(view) => ReadResponse::Ok(view),
        None => ReadResponse::Unavailable(unavailable),
    }
}

fn degraded_message(degraded: &[SourceKind]) -> String {
    let sources: Vec<&str> = degraded.iter().map(|s| s.as_str()).collect();
    format!("partial refresh: degraded sources {}", sources.join(", "))
}
