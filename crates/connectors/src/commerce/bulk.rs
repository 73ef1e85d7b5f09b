//! Bulk export reconstruction
//!
//! A bulk export file is JSON Lines. Nested connections are flattened: a line
//! item is its own line carrying `__parentId` instead of sitting inside its
//! order, and lines arrive in no guaranteed order. Reconstruction is two
//! passes: index every record by id and type, then attach children to parents.
//! The export has a single nesting level.

use crate::error::ConnectorError;
use crate::timezone::to_business;
use chrono::DateTime;
use chrono_tz::Tz;
use serde::Deserialize;
use std::collections::HashMap;
use tally_model::{CanonicalOrder, LineItem};
use tracing::debug;

/// Bulk query selecting orders in a window, with their line items
pub fn orders_query(since: &str, until: &str) -> String {
    format!(
        r#"{{
  orders(query: "created_at:>='{since}' AND created_at:<='{until}'") {{
    edges {{
      node {{
        id
        createdAt
        totalPriceSet {{ shopMoney {{ amount }} }}
        lineItems {{
          edges {{
            node {{
              id
              quantity
              product {{ id }}
            }}
          }}
        }}
      }}
    }}
  }}
}}"#
    )
}

/// Strip a global id down to its trailing resource id
///
/// `gid://shopify/Product/123` becomes `123`; other strings pass through.
pub fn legacy_id(gid: &str) -> &str {
    if gid.starts_with("gid://") {
        gid.rsplit('/').next().unwrap_or(gid)
    } else {
        gid
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BulkLine {
    id: String,
    #[serde(rename = "__parentId")]
    parent_id: Option<String>,
    created_at: Option<String>,
    total_price_set: Option<MoneyBag>,
    quantity: Option<u32>,
    product: Option<ProductRef>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MoneyBag {
    shop_money: Money,
}

#[derive(Debug, Deserialize)]
struct Money {
    amount: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ProductRef {
    id: String,
}

/// Rebuild orders from a bulk export file
///
/// Timestamps are converted to `tz`. Orders come back sorted by time, then id.
/// Line items whose parent order is absent are dropped.
pub fn reconstruct_orders(jsonl: &str, tz: Tz) -> Result<Vec<CanonicalOrder>, ConnectorError> {
    // Pass 1: index parents by id, collect children
    let mut orders: HashMap<String, CanonicalOrder> = HashMap::new();
    let mut children: Vec<(String, LineItem)> = Vec::new();

    for (index, line) in jsonl.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let record: BulkLine = serde_json::from_str(line).map_err(|e| {
            ConnectorError::InvalidResponse(format!("bulk export line {}: {}", index + 1, e))
        })?;

        match record.parent_id {
            Some(parent) => {
                children.push((
                    legacy_id(&parent).to_string(),
                    LineItem {
                        product_id: record.product.map(|p| legacy_id(&p.id).to_string()),
                        quantity: record.quantity.unwrap_or(0),
                    },
                ));
            }
            None => {
                let created_at = record.created_at.ok_or_else(|| {
                    ConnectorError::InvalidResponse(format!(
                        "bulk export line {}: order {} has no createdAt",
                        index + 1,
                        record.id
                    ))
                })?;
                let timestamp = DateTime::parse_from_rfc3339(&created_at).map_err(|e| {
                    ConnectorError::InvalidResponse(format!(
                        "bulk export line {}: bad createdAt '{}': {}",
                        index + 1,
                        created_at,
                        e
                    ))
                })?;
                let total_amount = record
                    .total_price_set
                    .map(|set| crate::http::parse_amount(&set.shop_money.amount))
                    .unwrap_or(0.0);
                let id = legacy_id(&record.id).to_string();
                orders.insert(
                    id.clone(),
                    CanonicalOrder {
                        id,
                        timestamp: to_business(&timestamp, tz),
                        total_amount,
                        line_items: Vec::new(),
                    },
                );
            }
        }
    }

    // Pass 2: resolve parent links
    let mut orphans = 0usize;
    for (parent, item) in children {
        match orders.get_mut(&parent) {
            Some(order) => order.line_items.push(item),
            None => orphans += 1,
        }
    }
    if orphans > 0 {
        debug!(orphans, "dropped line items without a parent order");
    }

    let mut orders: Vec<CanonicalOrder> = orders.into_values().collect();
    orders.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));
    Ok(orders)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::Asia::Kolkata;

    const EXPORT: &str = r#"{"id":"gid://shopify/Order/2","createdAt":"2024-03-01T20:00:00Z","totalPriceSet":{"shopMoney":{"amount":"1200.00"}}}
{"id":"gid://shopify/LineItem/21","quantity":2,"product":{"id":"gid://shopify/Product/900"},"__parentId":"gid://shopify/Order/2"}
{"id":"gid://shopify/LineItem/11","quantity":1,"product":{"id":"gid://shopify/Product/901"},"__parentId":"gid://shopify/Order/1"}
{"id":"gid://shopify/Order/1","createdAt":"2024-03-01T04:00:00Z","totalPriceSet":{"shopMoney":{"amount":"800.00"}}}
{"id":"gid://shopify/LineItem/12","quantity":3,"product":null,"__parentId":"gid://shopify/Order/1"}
"#;

    #[test]
    fn test_children_before_parents_are_resolved() {
        let orders = reconstruct_orders(EXPORT, Kolkata).unwrap();
        assert_eq!(orders.len(), 2);

        let first = &orders[0];
        assert_eq!(first.id, "1");
        assert_eq!(first.total_amount, 800.0);
        assert_eq!(first.line_items.len(), 2);
        assert_eq!(first.line_items[0].product_id.as_deref(), Some("901"));
        assert_eq!(first.line_items[1].product_id, None);
        assert_eq!(first.line_items[1].quantity, 3);

        let second = &orders[1];
        assert_eq!(second.id, "2");
        assert_eq!(second.line_items[0].quantity, 2);
        // 20:00 UTC is 01:30 the next day in India
        assert_eq!(second.timestamp.to_rfc3339(), "2024-03-02T01:30:00+05:30");
    }

    #[test]
    fn test_orphan_line_items_dropped() {
        let export = r#"{"id":"gid://shopify/LineItem/5","quantity":1,"product":{"id":"gid://shopify/Product/1"},"__parentId":"gid://shopify/Order/404"}"#;
        let orders = reconstruct_orders(export, Kolkata).unwrap();
        assert!(orders.is_empty());
    }

    #[test]
    fn test_empty_export() {
        assert!(reconstruct_orders("", Kolkata).unwrap().is_empty());
        assert!(reconstruct_orders("\n\n", Kolkata).unwrap().is_empty());
    }

    #[test]
    fn test_malformed_line_reports_line_number() {
        let export = "{\"id\":\"gid://shopify/Order/1\",\"createdAt\":\"2024-03-01T04:00:00Z\"}\nnot json";
        let err = reconstruct_orders(export, Kolkata).unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_legacy_id() {
        assert_eq!(legacy_id("gid://shopify/Product/123"), "123");
        assert_eq!(legacy_id("123"), "123");
    }

    #[test]
    fn test_orders_query_filters_window() {
        let query = orders_query("2024-03-01T00:00:00+05:30", "2024-03-30T23:59:59+05:30");
        assert!(query.contains("created_at:>='2024-03-01T00:00:00+05:30'"));
        assert!(query.contains("created_at:<='2024-03-30T23:59:59+05:30'"));
        assert!(query.contains("lineItems"));
    }
}
