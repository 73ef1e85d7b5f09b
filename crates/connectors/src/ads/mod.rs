//! Ad connector for pulling ad-spend insights
//!
//! Fetches daily and range-aggregate insights from the Meta Marketing API.
//! Network errors, 5xx and rate limits are retried with the configured
//! backoff; auth and other 4xx errors fail immediately.

use crate::config::AdsConnectorConfig;
use crate::error::ConnectorError;
use crate::http::{build_client, parse_amount};
use crate::resilience::{RetryPolicy, execute_with_retry};
use crate::traits::AdSource;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::Value;
use tally_model::{AdCredentials, AdDailyReport, AdDay, AdOverview, DateRange};
use tracing::{debug, warn};

const INSIGHT_FIELDS: &str = "spend,impressions,clicks,reach,purchase_roas";

/// Upper bound on followed `paging.next` links
const MAX_PAGES: usize = 100;

/// Ad connector for fetching insights
pub struct AdConnector {
    client: reqwest::Client,
    api_url: String,
    api_version: String,
    page_limit: u32,
    retry: RetryPolicy,
}

impl AdConnector {
    /// Create an ad connector from connector config (from TOML)
    ///
    /// # Errors
    ///
    /// Returns error if HTTP client creation fails
    pub fn from_config(config: &AdsConnectorConfig) -> Result<Self, ConnectorError> {
        let retry = config.retry.retry_policy();
        Ok(Self {
            client: build_client("Meta", retry.attempt_timeout)?,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            api_version: config.api_version.clone(),
            page_limit: config.page_limit,
            retry,
        })
    }

    /// Insights URL for an ad account
    fn insights_url(&self, credentials: &AdCredentials, range: &DateRange, daily: bool) -> String {
        let time_range = format!(
            r#"{{"since":"{}","until":"{}"}}"#,
            range.start_date, range.end_date
        );
        let mut url = format!(
            "{}/{}/act_{}/insights?level=account&fields={}&time_range={}&limit={}&access_token={}",
            self.api_url,
            self.api_version,
            credentials.ad_account_id.trim_start_matches("act_"),
            INSIGHT_FIELDS,
            urlencoding::encode(&time_range),
            self.page_limit,
            urlencoding::encode(&credentials.access_token),
        );
        if daily {
            url.push_str("&time_increment=1");
        }
        url
    }

    /// Daily insights covering every day of the range
    pub async fn fetch_daily(
        &self,
        credentials: &AdCredentials,
        range: &DateRange,
    ) -> Result<AdDailyReport, ConnectorError> {
        let rows = self.fetch_rows(credentials, range, true).await?;
        let report = fill_daily(range, &rows);
        debug!(
            connector = "ads",
            account = %credentials.ad_account_id,
            rows = rows.len(),
            days = report.len(),
            "fetched daily insights"
        );
        Ok(report)
    }

    /// One aggregate record for the whole range
    pub async fn fetch_overview(
        &self,
        credentials: &AdCredentials,
        range: &DateRange,
    ) -> Result<AdOverview, ConnectorError> {
        let rows = self.fetch_rows(credentials, range, false).await?;
        Ok(overview_from_rows(&rows))
    }

    /// Fetch every page of insight rows
    async fn fetch_rows(
        &self,
        credentials: &AdCredentials,
        range: &DateRange,
        daily: bool,
    ) -> Result<Vec<InsightRow>, ConnectorError> {
        let mut rows = Vec::new();
        let mut next = Some(self.insights_url(credentials, range, daily));
        let mut pages = 0usize;

        while let Some(url) = next.take() {
            let page = execute_with_retry(
                &self.retry,
                "ads/insights",
                ConnectorError::is_retryable,
                || self.fetch_page(&url),
            )
            .await?;
            rows.extend(page.data);
            pages += 1;

            next = page.paging.and_then(|p| p.next);
            if pages >= MAX_PAGES && next.is_some() {
                warn!(
                    connector = "ads",
                    account = %credentials.ad_account_id,
                    pages,
                    "insights paging limit reached, truncating"
                );
                break;
            }
        }

        Ok(rows)
    }

    async fn fetch_page(&self, url: &str) -> Result<InsightsPage, ConnectorError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }

        let body: Value = response.json().await.unwrap_or(Value::Null);
        Err(graph_error(status, &body))
    }
}

#[async_trait]
impl AdSource for AdConnector {
    fn name(&self) -> &'static str {
        "ads"
    }

    async fn daily(
        &self,
        credentials: &AdCredentials,
        range: &DateRange,
    ) -> Result<AdDailyReport, ConnectorError> {
        self.fetch_daily(credentials, range).await
    }

    async fn overview(
        &self,
        credentials: &AdCredentials,
        range: &DateRange,
    ) -> Result<AdOverview, ConnectorError> {
        self.fetch_overview(credentials, range).await
    }
}

/// Map a Graph API error response to a connector error
///
/// Code 190 is an invalid/expired token; 4, 17, 32 and 613 are throttling.
fn graph_error(status: reqwest::StatusCode, body: &Value) -> ConnectorError {
    let error = &body["error"];
    let code = error["code"].as_i64().unwrap_or_default();
    let message = error["message"]
        .as_str()
        .unwrap_or("unknown Graph API error")
        .to_string();

    match code {
        190 => ConnectorError::AuthFailed(message),
        4 | 17 | 32 | 613 => ConnectorError::RateLimited {
            retry_after_secs: 60,
        },
        _ if status.is_server_error() => ConnectorError::Server {
            status: status.as_u16(),
            message,
        },
        _ if status == reqwest::StatusCode::UNAUTHORIZED
            || status == reqwest::StatusCode::FORBIDDEN =>
        {
            ConnectorError::AuthFailed(message)
        }
        _ if status == reqwest::StatusCode::TOO_MANY_REQUESTS => ConnectorError::RateLimited {
            retry_after_secs: 60,
        },
        _ => ConnectorError::Client {
            status: status.as_u16(),
            message,
        },
    }
}

/// Zero-filled daily report from insight rows
///
/// Rows outside the range are ignored; a repeated day overwrites the earlier row.
pub(crate) fn fill_daily(range: &DateRange, rows: &[InsightRow]) -> AdDailyReport {
    let mut report: AdDailyReport = range.days().map(|day| (day, AdDay::default())).collect();
    for row in rows {
        let Some(day) = row.day() else {
            continue;
        };
        if range.contains(day) {
            report.insert(day, row.to_ad_day());
        }
    }
    report
}

/// Range aggregate from insight rows
///
/// Counters are summed; ROAS is the spend-weighted mean of row ROAS.
pub(crate) fn overview_from_rows(rows: &[InsightRow]) -> AdOverview {
    let days: Vec<AdDay> = rows.iter().map(InsightRow::to_ad_day).collect();
    let spend: f64 = days.iter().map(|d| d.spend).sum();
    let weighted_roas: f64 = days.iter().map(|d| d.roas * d.spend).sum();
    let roas = if spend == 0.0 { 0.0 } else { weighted_roas / spend };
    AdDay::from_counters(
        spend,
        days.iter().map(|d| d.impressions).sum(),
        days.iter().map(|d| d.clicks).sum(),
        days.iter().map(|d| d.reach).sum(),
        roas,
    )
}

// --- API Response Types ---

#[derive(Debug, Deserialize)]
struct InsightsPage {
    #[serde(default)]
    data: Vec<InsightRow>,
    paging: Option<Paging>,
}

#[derive(Debug, Deserialize)]
struct Paging {
    next: Option<String>,
}

/// Raw insight row; Graph API sends numbers as strings
#[derive(Debug, Default, Deserialize)]
pub(crate) struct InsightRow {
    date_start: Option<String>,
    #[serde(default)]
    spend: Value,
    #[serde(default)]
    impressions: Value,
    #[serde(default)]
    clicks: Value,
    #[serde(default)]
    reach: Value,
    #[serde(default)]
    purchase_roas: Vec<ActionValue>,
}

#[derive(Debug, Deserialize)]
struct ActionValue {
    #[serde(default)]
    value: Value,
}

impl InsightRow {
    fn day(&self) -> Option<NaiveDate> {
        let raw = self.date_start.as_deref()?;
        NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()
    }

    fn to_ad_day(&self) -> AdDay {
        let count = |v: &Value| parse_amount(v).max(0.0) as u64;
        let roas = self
            .purchase_roas
            .first()
            .map(|a| parse_amount(&a.value))
            .unwrap_or(0.0);
        AdDay::from_counters(
            parse_amount(&self.spend),
            count(&self.impressions),
            count(&self.clicks),
            count(&self.reach),
            roas,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rows(value: Value) -> Vec<InsightRow> {
        let page: InsightsPage = serde_json::from_value(value).unwrap();
        page.data
    }

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_fill_daily_zero_placeholders() {
        let range = DateRange::parse("2024-03-01", "2024-03-03").unwrap();
        let rows = rows(json!({
            "data": [
                {"date_start": "2024-03-02", "date_stop": "2024-03-02", "spend": "150.50",
                 "impressions": "12000", "clicks": "60", "reach": "9000",
                 "purchase_roas": [{"action_type": "omni_purchase", "value": "2.4"}]}
            ]
        }));

        let report = fill_daily(&range, &rows);
        assert_eq!(report.len(), 3);
        assert!(report[&day("2024-03-01")].is_zero());
        assert!(report[&day("2024-03-03")].is_zero());

        let active = report[&day("2024-03-02")];
        assert_eq!(active.spend, 150.5);
        assert_eq!(active.impressions, 12000);
        assert_eq!(active.clicks, 60);
        assert_eq!(active.reach, 9000);
        assert_eq!(active.roas, 2.4);
        assert_eq!(active.ctr, 0.5);
    }

    #[test]
    fn test_fill_daily_ignores_out_of_range_rows() {
        let range = DateRange::parse("2024-03-01", "2024-03-01").unwrap();
        let rows = rows(json!({
            "data": [{"date_start": "2024-02-29", "spend": "10"}]
        }));
        let report = fill_daily(&range, &rows);
        assert_eq!(report.len(), 1);
        assert!(report[&day("2024-03-01")].is_zero());
    }

    #[test]
    fn test_fill_daily_later_row_overwrites() {
        let range = DateRange::parse("2024-03-01", "2024-03-01").unwrap();
        let rows = rows(json!({
            "data": [
                {"date_start": "2024-03-01", "spend": "10"},
                {"date_start": "2024-03-01", "spend": "12"}
            ]
        }));
        assert_eq!(fill_daily(&range, &rows)[&day("2024-03-01")].spend, 12.0);
    }

    #[test]
    fn test_overview_weighted_roas() {
        let rows = rows(json!({
            "data": [
                {"spend": "100", "impressions": "1000", "clicks": "10", "reach": "800",
                 "purchase_roas": [{"value": "2"}]},
                {"spend": "300", "impressions": "3000", "clicks": "30", "reach": "2000",
                 "purchase_roas": [{"value": "4"}]}
            ]
        }));
        let overview = overview_from_rows(&rows);
        assert_eq!(overview.spend, 400.0);
        assert_eq!(overview.impressions, 4000);
        assert_eq!(overview.clicks, 40);
        assert_eq!(overview.roas, 3.5);
        assert_eq!(overview.cpc, 10.0);
    }

    #[test]
    fn test_overview_no_rows() {
        assert!(overview_from_rows(&[]).is_zero());
    }

    #[test]
    fn test_graph_error_classification() {
        let auth = graph_error(
            reqwest::StatusCode::BAD_REQUEST,
            &json!({"error": {"message": "Error validating access token", "code": 190}}),
        );
        assert!(matches!(auth, ConnectorError::AuthFailed(_)));
        assert!(!auth.is_retryable());

        let throttled = graph_error(
            reqwest::StatusCode::BAD_REQUEST,
            &json!({"error": {"message": "User request limit reached", "code": 17}}),
        );
        assert!(throttled.is_retryable());

        let server = graph_error(reqwest::StatusCode::BAD_GATEWAY, &Value::Null);
        assert!(matches!(server, ConnectorError::Server { status: 502, .. }));
        assert!(server.is_retryable());

        let bad_request = graph_error(
            reqwest::StatusCode::BAD_REQUEST,
            &json!({"error": {"message": "Invalid parameter", "code": 100}}),
        );
        assert!(matches!(bad_request, ConnectorError::Client { status: 400, .. }));
        assert!(!bad_request.is_retryable());
    }

    #[test]
    fn test_insights_url() {
        let connector = AdConnector::from_config(&AdsConnectorConfig::default()).unwrap();
        let creds = AdCredentials {
            ad_account_id: "act_42".into(),
            access_token: "EAAB token".into(),
        };
        let range = DateRange::parse("2024-03-01", "2024-03-30").unwrap();

        let daily = connector.insights_url(&creds, &range, true);
        assert!(daily.starts_with("https://graph.facebook.com/v19.0/act_42/insights?"));
        assert!(daily.contains("time_increment=1"));
        assert!(daily.contains("access_token=EAAB%20token"));
        assert!(daily.contains(&*urlencoding::encode(r#"{"since":"2024-03-01","until":"2024-03-30"}"#)));

        let overview = connector.insights_url(&creds, &range, false);
        assert!(!overview.contains("time_increment"));
    }

    #[tokio::test]
    #[ignore = "requires network access"]
    async fn test_meta_real_account() {
        let connector = AdConnector::from_config(&AdsConnectorConfig::default()).unwrap();
        let creds = AdCredentials {
            ad_account_id: std::env::var("META_AD_ACCOUNT").expect("META_AD_ACCOUNT"),
            access_token: std::env::var("META_TOKEN").expect("META_TOKEN"),
        };
        let range = DateRange::parse("2024-03-01", "2024-03-07").unwrap();
        let report = connector.fetch_daily(&creds, &range).await.unwrap();
        assert_eq!(report.len(), 7);
    }
}
