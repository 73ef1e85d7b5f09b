//! Cross-source aggregation
//!
//! `fetch_sources` runs the three connectors and the cost lookup
//! concurrently, isolating failures per source. `merge` is a pure function
//! of what was fetched, so the same inputs always produce the same metrics.

use std::collections::BTreeMap;
use std::fmt::Display;
use std::sync::Arc;

use chrono::NaiveDate;
use tally_connectors::{AdSource, CommerceSource, ConnectorError, FulfillmentSource};
use tally_model::{
    AccountCredentials, AdCredentials, AdDailyReport, AdOverview, AggregatedMetrics,
    CanonicalOrder, CostMap, DateRange, DayMetrics, MetricTotals, NoData, ShipmentRecord,
    SourceKind,
};
use tracing::{debug, info, warn};

use crate::ledger::CostLedger;

/// Everything fetched for one account and range
///
/// A `None` source failed or had no credentials; `failures` says why.
#[derive(Debug, Clone, Default)]
pub struct SourceData {
    pub orders: Option<Vec<CanonicalOrder>>,
    pub ads: Option<AdDailyReport>,
    pub shipments: Option<Vec<ShipmentRecord>>,
    pub costs: CostMap,
    pub failures: BTreeMap<SourceKind, String>,
}

impl SourceData {
    /// Sources that contributed nothing
    pub fn degraded(&self) -> Vec<SourceKind> {
        self.failures.keys().copied().collect()
    }
}

/// Result of an aggregation
#[derive(Debug, Clone, PartialEq)]
pub enum Aggregation {
    Metrics(AggregatedMetrics),
    NoData(NoData),
}

/// Merges connector output and product costs into metrics
pub struct Aggregator {
    commerce: Arc<dyn CommerceSource>,
    ads: Arc<dyn AdSource>,
    fulfillment: Arc<dyn FulfillmentSource>,
    ledger: Arc<dyn CostLedger>,
}

impl Aggregator {
    pub fn new(
        commerce: Arc<dyn CommerceSource>,
        ads: Arc<dyn AdSource>,
        fulfillment: Arc<dyn FulfillmentSource>,
        ledger: Arc<dyn CostLedger>,
    ) -> Self {
        Self {
            commerce,
            ads,
            fulfillment,
            ledger,
        }
    }

    /// Fetch and merge in one step
    pub async fn aggregate(
        &self,
        credentials: &AccountCredentials,
        range: &DateRange,
    ) -> Aggregation {
        let data = self.fetch_sources(credentials, range).await;
        Self::merge(&credentials.account_id, range, &data)
    }

    /// Range-level ad insights straight from the ad source, uncached
    pub async fn ad_overview(
        &self,
        credentials: &AdCredentials,
        range: &DateRange,
    ) -> Result<AdOverview, ConnectorError> {
        self.ads.overview(credentials, range).await
    }

    /// Run every source concurrently; one failing never stops the others
    pub async fn fetch_sources(
        &self,
        credentials: &AccountCredentials,
        range: &DateRange,
    ) -> SourceData {
        let account = credentials.account_id.as_str();

        let commerce = async {
            match &credentials.commerce {
                Some(creds) => self
                    .commerce
                    .orders(creds, range)
                    .await
                    .map_err(|e| e.to_string()),
                None => Err(NO_CREDENTIALS.to_string()),
            }
        };
        let ads = async {
            match &credentials.ads {
                Some(creds) => self.ads.daily(creds, range).await.map_err(|e| e.to_string()),
                None => Err(NO_CREDENTIALS.to_string()),
            }
        };
        let fulfillment = async {
            match &credentials.fulfillment {
                Some(creds) => self
                    .fulfillment
                    .shipments(creds, range)
                    .await
                    .map_err(|e| e.to_string()),
                None => Err(NO_CREDENTIALS.to_string()),
            }
        };
        let costs = self.ledger.costs(account);

        let (orders, ads, shipments, costs) = tokio::join!(commerce, ads, fulfillment, costs);

        let mut data = SourceData {
            costs,
            ..Default::default()
        };
        data.orders = settle(&mut data.failures, account, SourceKind::Commerce, orders);
        data.ads = settle(&mut data.failures, account, SourceKind::Ads, ads);
        data.shipments = settle(&mut data.failures, account, SourceKind::Fulfillment, shipments);

        if !data.failures.is_empty() {
            warn!(
                account = %account,
                range = %range,
                degraded = ?data.degraded(),
                "partial aggregation, degraded sources contribute zero"
            );
        }
        data
    }

    /// Merge fetched data into per-day and per-range metrics
    ///
    /// Every day of the range gets a zero record first; records dated
    /// outside the range are ignored.
    pub fn merge(account_id: &str, range: &DateRange, data: &SourceData) -> Aggregation {
        let mut days: BTreeMap<NaiveDate, MetricTotals> = range
            .days()
            .map(|day| (day, MetricTotals::default()))
            .collect();

        for order in data.orders.iter().flatten() {
            if let Some(totals) = days.get_mut(&order.business_day()) {
                totals.revenue += order.total_amount;
                totals.orders += 1;
                totals.cogs += order.cogs(|product| data.costs.get(product).copied());
            }
        }

        for (day, ad) in data.ads.iter().flatten() {
            if let Some(totals) = days.get_mut(day) {
                totals.ad_spend += ad.spend;
            }
        }

        for shipment in data.shipments.iter().flatten() {
            if let Some(totals) = days.get_mut(&shipment.order_date) {
                totals.shipping_cost += shipment.shipping_cost();
            }
        }

        let mut range_totals = MetricTotals::default();
        for totals in days.values() {
            range_totals.accumulate(totals);
        }

        if range_totals.has_no_sales() {
            info!(account = %account_id, range = %range, "no sales data for range");
            return Aggregation::NoData(NoData {
                account_id: account_id.to_string(),
                date_range: *range,
                degraded_sources: data.degraded(),
            });
        }

        let per_day = days
            .iter()
            .map(|(day, totals)| DayMetrics::from_totals(*day, totals))
            .collect();
        debug!(
            account = %account_id,
            range = %range,
            orders = range_totals.orders,
            revenue = range_totals.revenue,
            "aggregated metrics"
        );
        Aggregation::Metrics(AggregatedMetrics::from_totals(
            account_id,
            *range,
            &range_totals,
            per_day,
        ))
    }
}

const NO_CREDENTIALS: &str = "no credentials";

/// Record a source failure and turn it into a missing contribution
fn settle<T, E: Display>(
    failures: &mut BTreeMap<SourceKind, String>,
    account: &str,
    source: SourceKind,
    result: Result<T, E>,
) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(account = %account, connector = %source, error = %e, "source fetch failed");
            failures.insert(source, e.to_string());
            None
        }
    }
}
