//! Commerce connector
//!
//! Pulls orders through an asynchronous bulk export: start a job, poll it to
//! completion, download the JSON Lines result and rebuild orders from it.
//! Only one export job may run per store, so an in-flight job is cancelled
//! (and its cancellation awaited) before a new one starts.

mod bulk;
mod shopify;


pub use bulk::{legacy_id, orders_query, reconstruct_orders};
pub use shopify::ShopifyBulkApi;

use crate::config::CommerceConnectorConfig;
use crate::error::ConnectorError;
use crate::resilience::{RetryPolicy, execute_with_retry};
use crate::timezone::range_bounds;
use crate::traits::CommerceSource;
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use chrono_tz::Tz;
use parking_lot::Mutex;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tally_model::{CanonicalOrder, CommerceCredentials, DateRange};
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Bulk export job state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BulkJobStatus {
    Created,
    Running,
    Completed,
    Canceling,
    Canceled,
    Failed,
    Expired,
}

impl BulkJobStatus {
    /// Job occupies the store's single export slot
    pub fn is_in_flight(&self) -> bool {
        matches!(self, Self::Created | Self::Running | Self::Canceling)
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_in_flight()
    }
}

/// Snapshot of a bulk export job
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkJob {
    pub id: String,
    pub status: BulkJobStatus,
    #[serde(default)]
    pub error_code: Option<String>,
    /// Result file, absent until completion and when nothing matched
    #[serde(default)]
    pub url: Option<String>,
}

/// Source-side bulk export API
///
/// Implemented over HTTP by [`ShopifyBulkApi`].
#[async_trait]
pub trait BulkExportApi: Send + Sync {
    /// The store's current (most recent) export job, if any
    async fn current_job(
        &self,
        credentials: &CommerceCredentials,
    ) -> Result<Option<BulkJob>, ConnectorError>;

    /// Request cancellation of a job
    async fn cancel_job(
        &self,
        credentials: &CommerceCredentials,
        job_id: &str,
    ) -> Result<(), ConnectorError>;

    /// Start a new export job for a bulk query
    async fn start_job(
        &self,
        credentials: &CommerceCredentials,
        query: &str,
    ) -> Result<BulkJob, ConnectorError>;

    /// Current state of a job
    async fn job(
        &self,
        credentials: &CommerceCredentials,
        job_id: &str,
    ) -> Result<BulkJob, ConnectorError>;

    /// Download a completed job's result file
    async fn download(&self, url: &str) -> Result<String, ConnectorError>;
}

/// Commerce connector for fetching orders
pub struct CommerceConnector<A = ShopifyBulkApi> {
    api: A,
    timezone: Tz,
    retry: RetryPolicy,
    poll_interval: Duration,
    poll_timeout: Option<Duration>,
    /// Serializes fetches per store within this process
    store_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl CommerceConnector<ShopifyBulkApi> {
    /// Create a commerce connector from connector config (from TOML)
    ///
    /// # Errors
    ///
    /// Returns error if HTTP client creation fails
    pub fn from_config(config: &CommerceConnectorConfig, timezone: Tz) -> Result<Self, ConnectorError> {
        let api = ShopifyBulkApi::new(&config.api_version, config.retry.retry_policy().attempt_timeout)?;
        Ok(Self::with_api(api, config.retry.retry_policy(), timezone)
            .with_polling(config.poll_interval(), config.poll_timeout()))
    }
}

impl<A: BulkExportApi> CommerceConnector<A> {
    /// Create a connector over any bulk export API
    pub fn with_api(api: A, retry: RetryPolicy, timezone: Tz) -> Self {
        Self {
            api,
            timezone,
            retry,
            poll_interval: Duration::from_secs(2),
            poll_timeout: None,
            store_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Set job polling interval and optional deadline
    pub fn with_polling(mut self, interval: Duration, timeout: Option<Duration>) -> Self {
        self.poll_interval = interval;
        self.poll_timeout = timeout;
        self
    }

    /// Fetch orders created in `[since, until]`
    ///
    /// Any failure is logged and yields an empty list, so callers cannot tell
    /// "no orders" from "fetch failed". Use [`CommerceConnector::try_fetch`]
    /// to see the error.
    pub async fn fetch(
        &self,
        credentials: &CommerceCredentials,
        since: DateTime<FixedOffset>,
        until: DateTime<FixedOffset>,
    ) -> Vec<CanonicalOrder> {
        match self.try_fetch(credentials, since, until).await {
            Ok(orders) => orders,
            Err(e) => {
                warn!(
                    connector = "commerce",
                    store = %credentials.shop_domain,
                    error = %e,
                    "order export failed, returning no orders"
                );
                Vec::new()
            }
        }
    }

    /// Fetch orders created in `[since, until]`, surfacing failures
    pub async fn try_fetch(
        &self,
        credentials: &CommerceCredentials,
        since: DateTime<FixedOffset>,
        until: DateTime<FixedOffset>,
    ) -> Result<Vec<CanonicalOrder>, ConnectorError> {
        let store = credentials.shop_domain.as_str();
        let lock = self.store_lock(store);
        let _guard = lock.lock().await;

        self.cancel_in_flight(credentials).await?;

        let query = orders_query(&since.to_rfc3339(), &until.to_rfc3339());
        let job = self
            .call("start_job", || self.api.start_job(credentials, &query))
            .await?;
        info!(connector = "commerce", store, job = %job.id, "started bulk export");

        let finished = self.wait_for(credentials, &job.id).await?;
        match finished.status {
            BulkJobStatus::Completed => {}
            status => {
                return Err(ConnectorError::BulkJob(format!(
                    "job {} ended {:?} ({})",
                    finished.id,
                    status,
                    finished.error_code.as_deref().unwrap_or("no error code")
                )));
            }
        }

        let Some(url) = finished.url else {
            debug!(connector = "commerce", store, "bulk export matched no orders");
            return Ok(Vec::new());
        };

        let body = self.call("download", || self.api.download(&url)).await?;
        let orders = reconstruct_orders(&body, self.timezone)?;
        debug!(
            connector = "commerce",
            store,
            orders = orders.len(),
            "reconstructed orders from bulk export"
        );
        Ok(orders)
    }

    /// Cancel the store's running job, if any, and wait until it stops
    async fn cancel_in_flight(&self, credentials: &CommerceCredentials) -> Result<(), ConnectorError> {
        let current = self
            .call("current_job", || self.api.current_job(credentials))
            .await?;
        let Some(job) = current else {
            return Ok(());
        };
        if job.status.is_terminal() {
            return Ok(());
        }

        if job.status != BulkJobStatus::Canceling {
            info!(
                connector = "commerce",
                store = %credentials.shop_domain,
                job = %job.id,
                status = ?job.status,
                "cancelling in-flight bulk export"
            );
            self.call("cancel_job", || self.api.cancel_job(credentials, &job.id))
                .await?;
        }

        let stopped = self.wait_for(credentials, &job.id).await?;
        debug!(
            connector = "commerce",
            job = %stopped.id,
            status = ?stopped.status,
            "previous bulk export stopped"
        );
        Ok(())
    }

    /// Poll a job at the fixed interval until it reaches a terminal state
    async fn wait_for(
        &self,
        credentials: &CommerceCredentials,
        job_id: &str,
    ) -> Result<BulkJob, ConnectorError> {
        let started = Instant::now();
        loop {
            let job = self.call("job_status", || self.api.job(credentials, job_id)).await?;
            if job.status.is_terminal() {
                return Ok(job);
            }
            if let Some(limit) = self.poll_timeout
                && started.elapsed() >= limit
            {
                return Err(ConnectorError::Timeout(format!(
                    "bulk job {} still {:?} after {}s",
                    job_id,
                    job.status,
                    limit.as_secs()
                )));
            }
            debug!(connector = "commerce", job = job_id, status = ?job.status, "bulk export pending");
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    async fn call<T, F, Fut>(&self, operation: &str, op: F) -> Result<T, ConnectorError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, ConnectorError>>,
    {
        Ok(execute_with_retry(&self.retry, operation, ConnectorError::is_retryable, op).await?)
    }

    fn store_lock(&self, store: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.store_locks.lock();
        Arc::clone(locks.entry(store.to_string()).or_default())
    }
}

#[async_trait]
impl<A: BulkExportApi> CommerceSource for CommerceConnector<A> {
    fn name(&self) -> &'static str {
        "commerce"
    }

    async fn orders(
        &self,
        credentials: &CommerceCredentials,
        range: &DateRange,
    ) -> Result<Vec<CanonicalOrder>, ConnectorError> {
        let (since, until) = range_bounds(range, self.timezone);
        let orders = self.try_fetch(credentials, since, until).await?;
        Ok(orders
            .into_iter()
            .filter(|order| range.contains(order.business_day()))
            .collect())
    }
}
