//! Aggregated financial metrics
//!
//! Every derived figure (aov, gross profit, net profit, roas) is a pure
//! function of [`MetricTotals`]. Metrics are rebuilt from totals on every
//! aggregation and never patched in place.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::cache::DataKind;
use crate::credentials::SourceKind;
use crate::range::DateRange;

/// Summed inputs for a day or a range
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricTotals {
    pub revenue: f64,
    pub orders: u64,
    pub cogs: f64,
    pub ad_spend: f64,
    pub shipping_cost: f64,
}

impl MetricTotals {
    /// Average order value, 0 without orders
    pub fn aov(&self) -> f64 {
        if self.orders == 0 {
            0.0
        } else {
            self.revenue / self.orders as f64
        }
    }

    pub fn gross_profit(&self) -> f64 {
        self.revenue - self.cogs
    }

    /// `revenue - cogs - ad_spend - shipping_cost`
    pub fn net_profit(&self) -> f64 {
        self.revenue - self.cogs - self.ad_spend - self.shipping_cost
    }

    /// Blended return on ad spend, 0 without spend
    pub fn roas(&self) -> f64 {
        if self.ad_spend == 0.0 {
            0.0
        } else {
            self.revenue / self.ad_spend
        }
    }

    /// Add another set of totals into this one
    pub fn accumulate(&mut self, other: &MetricTotals) {
        self.revenue += other.revenue;
        self.orders += other.orders;
        self.cogs += other.cogs;
        self.ad_spend += other.ad_spend;
        self.shipping_cost += other.shipping_cost;
    }

    /// No orders and no revenue
    pub fn has_no_sales(&self) -> bool {
        self.orders == 0 && self.revenue == 0.0
    }
}

/// Metrics for a single business day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DayMetrics {
    pub date: NaiveDate,
    pub revenue: f64,
    pub orders: u64,
    pub aov: f64,
    pub cogs: f64,
    pub gross_profit: f64,
    pub ad_spend: f64,
    pub shipping_cost: f64,
    pub net_profit: f64,
    pub roas: f64,
}

impl DayMetrics {
    pub fn from_totals(date: NaiveDate, totals: &MetricTotals) -> Self {
        Self {
            date,
            revenue: totals.revenue,
            orders: totals.orders,
            aov: totals.aov(),
            cogs: totals.cogs,
            gross_profit: totals.gross_profit(),
            ad_spend: totals.ad_spend,
            shipping_cost: totals.shipping_cost,
            net_profit: totals.net_profit(),
            roas: totals.roas(),
        }
    }
}

/// Merged metrics for one account and range
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedMetrics {
    pub account_id: String,
    pub data_kind: DataKind,
    pub date_range: DateRange,
    pub revenue: f64,
    pub orders: u64,
    pub aov: f64,
    pub cogs: f64,
    pub gross_profit: f64,
    pub ad_spend: f64,
    pub shipping_cost: f64,
    pub net_profit: f64,
    pub roas: f64,
    pub per_day_breakdown: Vec<DayMetrics>,
}

impl AggregatedMetrics {
    /// Build range metrics from range totals and the per-day breakdown
    pub fn from_totals(
        account_id: impl Into<String>,
        date_range: DateRange,
        totals: &MetricTotals,
        per_day_breakdown: Vec<DayMetrics>,
    ) -> Self {
        Self {
            account_id: account_id.into(),
            data_kind: DataKind::AggregatedSummary,
            date_range,
            revenue: totals.revenue,
            orders: totals.orders,
            aov: totals.aov(),
            cogs: totals.cogs,
            gross_profit: totals.gross_profit(),
            ad_spend: totals.ad_spend,
            shipping_cost: totals.shipping_cost,
            net_profit: totals.net_profit(),
            roas: totals.roas(),
            per_day_breakdown,
        }
    }
}

/// Aggregation produced no orders and no revenue
///
/// Distinct from a zero-revenue [`AggregatedMetrics`] so readers can report
/// unavailability instead of a misleading zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoData {
    pub account_id: String,
    pub date_range: DateRange,
    /// Sources that failed or had no credentials
    pub degraded_sources: Vec<SourceKind>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_scenario() {
        let totals = MetricTotals {
            revenue: 3000.0,
            orders: 3,
            cogs: 500.0,
            ad_spend: 200.0,
            shipping_cost: 100.0,
        };
        assert_eq!(totals.gross_profit(), 2500.0);
        assert_eq!(totals.net_profit(), 2200.0);
        assert_eq!(totals.aov(), 1000.0);
        assert_eq!(totals.roas(), 15.0);
    }

    #[test]
    fn test_zero_denominators() {
        let totals = MetricTotals {
            revenue: 0.0,
            orders: 0,
            cogs: 0.0,
            ad_spend: 0.0,
            shipping_cost: 40.0,
        };
        assert_eq!(totals.aov(), 0.0);
        assert_eq!(totals.roas(), 0.0);
        assert_eq!(totals.net_profit(), -40.0);
        assert!(totals.has_no_sales());
    }

    #[test]
    fn test_accumulate() {
        let mut range = MetricTotals::default();
        range.accumulate(&MetricTotals {
            revenue: 100.0,
            orders: 1,
            cogs: 10.0,
            ad_spend: 5.0,
            shipping_cost: 2.0,
        });
        range.accumulate(&MetricTotals {
            revenue: 50.0,
            orders: 2,
            cogs: 0.0,
            ad_spend: 1.0,
            shipping_cost: 0.0,
        });
        assert_eq!(range.revenue, 150.0);
        assert_eq!(range.orders, 3);
        assert_eq!(range.net_profit(), 150.0 - 10.0 - 6.0 - 2.0);
    }
}
