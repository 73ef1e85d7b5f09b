//! Canonical commerce orders

use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};

/// Source-agnostic order
///
/// `timestamp` is already converted to the business timezone, so
/// [`CanonicalOrder::business_day`] is the bucket used by every merge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalOrder {
    /// Source order id (identity)
    pub id: String,
    /// Order creation time in the business timezone
    pub timestamp: DateTime<FixedOffset>,
    /// Order total in shop currency
    pub total_amount: f64,
    pub line_items: Vec<LineItem>,
}

/// One line of an order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    /// Linked product, `None` for custom items
    pub product_id: Option<String>,
    pub quantity: u32,
}

impl CanonicalOrder {
    /// Business-timezone calendar day of the order
    pub fn business_day(&self) -> NaiveDate {
        self.timestamp.date_naive()
    }

    /// Cost of goods for this order given a unit-cost lookup
    ///
    /// Line items without a product or without a known cost contribute 0.
    pub fn cogs(&self, unit_cost: impl Fn(&str) -> Option<f64>) -> f64 {
        self.line_items
            .iter()
            .filter_map(|item| {
                let product = item.product_id.as_deref()?;
                Some(unit_cost(product).unwrap_or(0.0) * f64::from(item.quantity))
            })
            .sum()
    }
}
