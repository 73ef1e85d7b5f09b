//! Product cost ledger
//!
//! Read-only from the aggregator's point of view. A lookup never fails: read
//! errors and invalid entries degrade to "no cost", which makes COGS 0 for
//! the affected products.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tally_cache::{CacheError, retry_busy};
use tally_model::{CostEntry, CostMap};
use tracing::{debug, warn};
use turso::Database;

use crate::error::Result;

/// Per-account product unit costs
#[async_trait]
pub trait CostLedger: Send + Sync {
    /// productId -> unitCost for an account; empty on any failure
    async fn costs(&self, account_id: &str) -> CostMap;
}

/// Keep only usable entries
fn to_cost_map<'a>(
    account_id: &str,
    entries: impl IntoIterator<Item = &'a CostEntry>,
) -> CostMap {
    let mut map = CostMap::new();
    for entry in entries {
        if entry.is_valid() {
            map.insert(entry.product_id.clone(), entry.unit_cost);
        } else {
            warn!(
                account = %account_id,
                product = %entry.product_id,
                unit_cost = entry.unit_cost,
                "skipping invalid unit cost"
            );
        }
    }
    map
}

/// Costs held in memory
#[derive(Debug, Clone, Default)]
pub struct StaticCostLedger {
    accounts: HashMap<String, Vec<CostEntry>>,
}

impl StaticCostLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) one product cost for an account
    pub fn with_cost(mut self, account_id: &str, product_id: &str, unit_cost: f64) -> Self {
        let entries = self.accounts.entry(account_id.to_string()).or_default();
        entries.retain(|e| e.product_id != product_id);
        entries.push(CostEntry {
            product_id: product_id.to_string(),
            unit_cost,
            updated_at: Utc::now(),
        });
        self
    }
}

#[async_trait]
impl CostLedger for StaticCostLedger {
    async fn costs(&self, account_id: &str) -> CostMap {
        self.accounts
            .get(account_id)
            .map(|entries| to_cost_map(account_id, entries))
            .unwrap_or_default()
    }
}

/// Costs stored in the `product_costs` table
pub struct TursoCostLedger {
    db: Database,
}

impl TursoCostLedger {
    /// Use an open database, creating the table if needed
    pub async fn new(db: Database) -> Result<Self> {
        let conn = db.connect().map_err(CacheError::from)?;
        conn.execute(SCHEMA_PRODUCT_COSTS, ())
            .await
            .map_err(CacheError::from)?;
        Ok(Self { db })
    }

    /// Insert or replace a product cost
    pub async fn set_cost(&self, account_id: &str, entry: &CostEntry) -> Result<()> {
        let conn = self.db.connect().map_err(CacheError::from)?;
        let unit_cost = entry.unit_cost.to_string();
        let updated_at = entry.updated_at.to_rfc3339();

        retry_busy(|| async {
            conn.execute(
                r#"
                INSERT OR REPLACE INTO product_costs (account_id, product_id, unit_cost, updated_at)
                VALUES (?1, ?2, ?3, ?4)
                "#,
                [
                    account_id,
                    entry.product_id.as_str(),
                    unit_cost.as_str(),
                    updated_at.as_str(),
                ],
            )
            .await
            .map_err(CacheError::from)
        })
        .await?;

        Ok(())
    }

    async fn load(&self, account_id: &str) -> turso::Result<Vec<CostEntry>> {
        let conn = self.db.connect()?;
        let mut rows = conn
            .query(
                "SELECT product_id, unit_cost, updated_at FROM product_costs WHERE account_id = ?1",
                [account_id],
            )
            .await?;

        let mut entries = Vec::new();
        while let Some(row) = rows.next().await? {
            let product_id = row
                .get_value(0)?
                .as_text()
                .unwrap_or(&String::new())
                .clone();
            let unit_cost = number(&row.get_value(1)?).unwrap_or(f64::NAN);
            let updated_at_str = row
                .get_value(2)?
                .as_text()
                .unwrap_or(&String::new())
                .clone();
            let updated_at = DateTime::parse_from_rfc3339(&updated_at_str)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now());

            entries.push(CostEntry {
                product_id,
                unit_cost,
                updated_at,
            });
        }
        Ok(entries)
    }
}

#[async_trait]
impl CostLedger for TursoCostLedger {
    async fn costs(&self, account_id: &str) -> CostMap {
        let loaded =
            retry_busy(|| async { self.load(account_id).await.map_err(CacheError::from) }).await;
        match loaded {
            Ok(entries) => {
                debug!(account = %account_id, entries = entries.len(), "loaded product costs");
                to_cost_map(account_id, &entries)
            }
            Err(e) => {
                warn!(account = %account_id, error = %e, "cost lookup failed, COGS will be 0");
                CostMap::new()
            }
        }
    }
}

fn number(value: &turso::Value) -> Option<f64> {
    match value {
        turso::Value::Real(f) => Some(*f),
        turso::Value::Integer(i) => Some(*i as f64),
        turso::Value::Text(s) => s.parse().ok(),
        _ => None,
    }
}

// =============================================================================
// Schema
// =============================================================================

const SCHEMA_PRODUCT_COSTS: &str = r#"
CREATE TABLE IF NOT EXISTS product_costs (
    account_id TEXT NOT NULL,
    product_id TEXT NOT NULL,
    unit_cost REAL NOT NULL,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (account_id, product_id)
)
"#;

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(product_id: &str, unit_cost: f64) -> CostEntry {
        CostEntry {
            product_id: product_id.to_string(),
            unit_cost,
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_static_ledger_skips_invalid() {
        let ledger = StaticCostLedger::new()
            .with_cost("acct_1", "101", 250.0)
            .with_cost("acct_1", "102", -5.0)
            .with_cost("acct_1", "103", f64::NAN)
            .with_cost("acct_2", "101", 99.0);

        let costs = ledger.costs("acct_1").await;
        assert_eq!(costs.len(), 1);
        assert_eq!(costs["101"], 250.0);
        assert!(ledger.costs("acct_3").await.is_empty());
    }

    #[tokio::test]
    async fn test_static_ledger_replaces() {
        let ledger = StaticCostLedger::new()
            .with_cost("acct_1", "101", 250.0)
            .with_cost("acct_1", "101", 300.0);
        assert_eq!(ledger.costs("acct_1").await["101"], 300.0);
    }

    #[tokio::test]
    async fn test_turso_ledger_round_trip() {
        let db = turso::Builder::new_local(":memory:").build().await.unwrap();
        let ledger = TursoCostLedger::new(db).await.unwrap();

        ledger.set_cost("acct_1", &entry("101", 250.0)).await.unwrap();
        ledger.set_cost("acct_1", &entry("102", 12.5)).await.unwrap();
        ledger.set_cost("acct_1", &entry("102", 15.0)).await.unwrap();
        ledger.set_cost("acct_1", &entry("103", -1.0)).await.unwrap();
        ledger.set_cost("acct_2", &entry("101", 1.0)).await.unwrap();

        let costs = ledger.costs("acct_1").await;
        assert_eq!(costs.len(), 2);
        assert_eq!(costs["101"], 250.0);
        assert_eq!(costs["102"], 15.0);
    }

    #[test]
    fn test_number_variants() {
        assert_eq!(number(&turso::Value::Real(1.5)), Some(1.5));
        assert_eq!(number(&turso::Value::Integer(2)), Some(2.0));
        assert_eq!(number(&turso::Value::Text("3.25".into())), Some(3.25));
        assert_eq!(number(&turso::Value::Null), None);
    }
}
