//! Fulfillment connector for shipment records
//!
//! Pages through the Shiprocket shipments API and normalizes each row into a
//! `ShipmentRecord`. Order dates are interpreted in the business timezone.

use crate::config::FulfillmentConnectorConfig;
use crate::error::ConnectorError;
use crate::http::{build_client, parse_amount, status_error};
use crate::resilience::{RetryPolicy, execute_with_retry};
use crate::timezone::{localize, to_business};
use crate::traits::FulfillmentSource;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use chrono_tz::Tz;
use serde::Deserialize;
use serde_json::Value;
use std::future::Future;
use tally_model::{DateRange, FulfillmentCredentials, ShipmentRecord, ShipmentStatus};
use tracing::{debug, warn};

/// Fulfillment connector for fetching shipments
pub struct FulfillmentConnector {
    client: reqwest::Client,
    api_url: String,
    page_size: usize,
    max_pages: usize,
    rto_surcharge_ratio: f64,
    timezone: Tz,
    retry: RetryPolicy,
}

impl FulfillmentConnector {
    /// Create a fulfillment connector from connector config (from TOML)
    ///
    /// # Errors
    ///
    /// Returns error if HTTP client creation fails
    pub fn from_config(
        config: &FulfillmentConnectorConfig,
        timezone: Tz,
    ) -> Result<Self, ConnectorError> {
        let retry = config.retry.retry_policy();
        Ok(Self {
            client: build_client("Shiprocket", retry.attempt_timeout)?,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            page_size: config.page_size,
            max_pages: config.max_pages,
            rto_surcharge_ratio: config.rto_surcharge_ratio,
            timezone,
            retry,
        })
    }

    /// All shipments for orders placed within the range
    pub async fn fetch_shipments(
        &self,
        credentials: &FulfillmentCredentials,
        range: &DateRange,
    ) -> Result<Vec<ShipmentRecord>, ConnectorError> {
        let rows = paginate(self.page_size, self.max_pages, |offset| async move {
            Ok(execute_with_retry(
                &self.retry,
                "fulfillment/shipments",
                ConnectorError::is_retryable,
                || self.fetch_page(credentials, range, offset),
            )
            .await?)
        })
        .await?;

        let total = rows.len();
        let records: Vec<ShipmentRecord> = rows
            .iter()
            .filter_map(|row| self.to_record(row))
            .filter(|record| range.contains(record.order_date))
            .collect();

        debug!(
            connector = "fulfillment",
            rows = total,
            shipments = records.len(),
            range = %range,
            "fetched shipments"
        );
        Ok(records)
    }

    async fn fetch_page(
        &self,
        credentials: &FulfillmentCredentials,
        range: &DateRange,
        offset: usize,
    ) -> Result<Vec<ShipmentRow>, ConnectorError> {
        let page = offset / self.page_size + 1;
        let url = format!("{}/v1/external/shipments", self.api_url);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&credentials.api_token)
            .query(&[
                ("page", page.to_string()),
                ("per_page", self.page_size.to_string()),
                ("from", range.start_date.to_string()),
                ("to", range.end_date.to_string()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(status_error(response, "Shipments").await);
        }

        let body: ShipmentsPage = response.json().await?;
        Ok(body.data)
    }

    fn to_record(&self, row: &ShipmentRow) -> Option<ShipmentRecord> {
        let raw_date = row.order_date.as_deref().or(row.created_at.as_deref())?;
        let Some(order_date) = parse_order_date(raw_date, self.timezone) else {
            debug!(
                connector = "fulfillment",
                shipment = %row.id,
                date = raw_date,
                "skipping shipment with unparsable order date"
            );
            return None;
        };

        let status = classify_status(&row.status);
        let freight_cost = parse_amount(&row.charges.freight_charges);
        let rto_surcharge = if status == ShipmentStatus::Rto {
            freight_cost * self.rto_surcharge_ratio
        } else {
            0.0
        };

        Some(ShipmentRecord {
            id: id_string(&row.id),
            order_date,
            status,
            raw_status: row.status.clone(),
            freight_cost,
            cod_charge: parse_amount(&row.charges.cod_charges),
            rto_surcharge,
            payment_method: row.payment_method.clone().unwrap_or_default(),
        })
    }
}

#[async_trait]
impl FulfillmentSource for FulfillmentConnector {
    fn name(&self) -> &'static str {
        "fulfillment"
    }

    async fn shipments(
        &self,
        credentials: &FulfillmentCredentials,
        range: &DateRange,
    ) -> Result<Vec<ShipmentRecord>, ConnectorError> {
        self.fetch_shipments(credentials, range).await
    }
}

/// Collect pages until one comes back short
///
/// `fetch` receives the row offset of the page. Stops after `max_pages`
/// with a warning if the source keeps returning full pages.
pub async fn paginate<T, F, Fut>(
    page_size: usize,
    max_pages: usize,
    mut fetch: F,
) -> Result<Vec<T>, ConnectorError>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = Result<Vec<T>, ConnectorError>>,
{
    let mut items = Vec::new();
    for page in 0..max_pages {
        let batch = fetch(page * page_size).await?;
        let len = batch.len();
        items.extend(batch);
        if len < page_size {
            return Ok(items);
        }
    }

    warn!(
        max_pages,
        rows = items.len(),
        "pagination limit reached, results may be truncated"
    );
    Ok(items)
}

/// Map a raw carrier status to a shipment status
///
/// Case-insensitive substring match. RTO wins over everything else, so
/// "RTO Delivered" is a return, not a delivery.
pub fn classify_status(raw: &str) -> ShipmentStatus {
    let s = raw.to_lowercase();
    let has = |needles: &[&str]| needles.iter().any(|n| s.contains(n));

    if has(&["rto"]) {
        ShipmentStatus::Rto
    } else if has(&["pickup", "pending", "new"]) {
        ShipmentStatus::PickupPending
    } else if has(&["transit", "shipped", "out for delivery"]) {
        ShipmentStatus::InTransit
    } else if has(&["ndr", "undelivered"]) {
        ShipmentStatus::Ndr
    } else if has(&["delivered"]) {
        ShipmentStatus::Delivered
    } else if has(&["cancel"]) {
        ShipmentStatus::Cancelled
    } else {
        ShipmentStatus::Other
    }
}

/// Business-timezone day of an order timestamp
///
/// Accepts RFC 3339, a naive `YYYY-MM-DD HH:MM:SS` in business time, or a bare date.
fn parse_order_date(raw: &str, tz: Tz) -> Option<NaiveDate> {
    let raw = raw.trim();
    if let Ok(instant) = DateTime::parse_from_rfc3339(raw) {
        return Some(to_business(&instant, tz).date_naive());
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Some(localize(naive, tz).date_naive());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()
}

fn id_string(id: &Value) -> String {
    match id {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

// --- API Response Types ---

#[derive(Debug, Deserialize)]
struct ShipmentsPage {
    #[serde(default)]
    data: Vec<ShipmentRow>,
}

#[derive(Debug, Deserialize)]
struct ShipmentRow {
    #[serde(default)]
    id: Value,
    #[serde(default)]
    status: String,
    order_date: Option<String>,
    created_at: Option<String>,
    payment_method: Option<String>,
    #[serde(default)]
    charges: Charges,
}

#[derive(Debug, Default, Deserialize)]
struct Charges {
    #[serde(default)]
    freight_charges: Value,
    #[serde(default)]
    cod_charges: Value,
}
