//! Tally - Model
//!
//! Source-agnostic records shared by the connectors, the cache and the sync engine.
//!
//! # Records
//!
//! - [`CanonicalOrder`] - normalized commerce order with line items
//! - [`AdDay`] / [`AdOverview`] - ad-spend insights per day and per range
//! - [`ShipmentRecord`] - classified fulfillment shipment
//! - [`CostEntry`] - per-product unit cost
//! - [`AggregatedMetrics`] - merged financial metrics for a date range
//!
//! All dates are business-timezone calendar days. Connectors convert source
//! timestamps before records reach this crate's types, so every merge works on
//! the same day buckets.

mod ads;
mod cache;
mod cost;
mod credentials;
mod metrics;
mod order;
mod range;
mod shipment;

pub use ads::{AdDailyReport, AdDay, AdOverview};
pub use cache::{CacheKey, CachePayload, DataKind};
pub use cost::{CostEntry, CostMap};
pub use credentials::{
    AccountCredentials, AdCredentials, CommerceCredentials, FulfillmentCredentials, SourceKind,
};
pub use metrics::{AggregatedMetrics, DayMetrics, MetricTotals, NoData};
pub use order::{CanonicalOrder, LineItem};
pub use range::{DateRange, MAX_RANGE_DAYS, RangeError};
pub use shipment::{ShipmentRecord, ShipmentStatus};
