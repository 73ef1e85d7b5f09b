//! Merchant accounts

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use tally_model::{AccountCredentials, CostEntry};

/// One `[[accounts]]` entry
///
/// # Example
///
/// ```toml
/// [[accounts]]
/// account_id = "acme"
///
/// [accounts.commerce]
/// shop_domain = "acme.myshopify.com"
/// access_token = "shpat_..."
///
/// [accounts.costs]
/// "501" = 250.0
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct AccountConfig {
    #[serde(flatten)]
    pub credentials: AccountCredentials,

    /// Unit cost per product id
    #[serde(default)]
    pub costs: HashMap<String, f64>,
}

impl AccountConfig {
    pub fn account_id(&self) -> &str {
        &self.credentials.account_id
    }

    /// Costs as ledger entries, ordered by product id
    pub fn cost_entries(&self, updated_at: DateTime<Utc>) -> Vec<CostEntry> {
        let mut entries: Vec<CostEntry> = self
            .costs
            .iter()
            .map(|(product_id, unit_cost)| CostEntry {
                product_id: product_id.clone(),
                unit_cost: *unit_cost,
                updated_at,
            })
            .collect();
        entries.sort_by(|a, b| a.product_id.cmp(&b.product_id));
        entries
    }
}
