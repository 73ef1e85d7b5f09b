//! Product unit costs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Unit cost of one product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostEntry {
    pub product_id: String,
    /// Always >= 0
    pub unit_cost: f64,
    pub updated_at: DateTime<Utc>,
}

impl CostEntry {
    /// Usable as a cost: finite and non-negative
    pub fn is_valid(&self) -> bool {
        self.unit_cost.is_finite() && self.unit_cost >= 0.0
    }
}

/// productId -> unitCost. A missing product costs 0.
pub type CostMap = HashMap<String, f64>;
