//! Source traits
//!
//! The aggregator talks to connectors through these traits so sources can be
//! swapped or faked. Credentials travel with every call.

use crate::error::ConnectorError;
use async_trait::async_trait;
use tally_model::{
    AdCredentials, AdDailyReport, AdOverview, CanonicalOrder, CommerceCredentials, DateRange,
    FulfillmentCredentials, ShipmentRecord,
};

/// Source of commerce orders
#[async_trait]
pub trait CommerceSource: Send + Sync {
    /// Connector name for logging
    fn name(&self) -> &'static str;

    /// Orders placed within the range, sorted by time
    async fn orders(
        &self,
        credentials: &CommerceCredentials,
        range: &DateRange,
    ) -> Result<Vec<CanonicalOrder>, ConnectorError>;
}

/// Source of ad-spend insights
#[async_trait]
pub trait AdSource: Send + Sync {
    /// Connector name for logging
    fn name(&self) -> &'static str;

    /// One record per day of the range, zero-filled where the source is silent
    async fn daily(
        &self,
        credentials: &AdCredentials,
        range: &DateRange,
    ) -> Result<AdDailyReport, ConnectorError>;

    /// Single aggregate over the range
    async fn overview(
        &self,
        credentials: &AdCredentials,
        range: &DateRange,
    ) -> Result<AdOverview, ConnectorError>;
}

/// Source of fulfillment shipments
#[async_trait]
pub trait FulfillmentSource: Send + Sync {
    /// Connector name for logging
    fn name(&self) -> &'static str;

    /// Shipments for orders placed within the range
    async fn shipments(
        &self,
        credentials: &FulfillmentCredentials,
        range: &DateRange,
    ) -> Result<Vec<ShipmentRecord>, ConnectorError>;
}
