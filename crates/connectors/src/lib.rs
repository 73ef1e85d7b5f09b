//! Tally - Connectors
//!
//! Pull-based connectors that fetch one merchant's data from an external
//! platform and normalize it into `tally-model` types.
//!
//! # Available Connectors
//!
//! - **commerce** - Orders via the Shopify bulk export API
//! - **ads** - Daily spend/impression insights via the Meta Marketing API
//! - **fulfillment** - Shipments and charges via the Shiprocket API
//!
//! # Design Principles
//!
//! - **Pull-based**: Connectors fetch on demand; scheduling lives in `tally-sync`
//! - **Credentials per call**: One connector instance serves every account
//! - **Business time**: Timestamps are interpreted in the configured timezone
//! - **Trait seams**: The aggregator sees only [`CommerceSource`], [`AdSource`]
//!   and [`FulfillmentSource`]
//!
//! # Example
//!
//! ```ignore
//! use tally_connectors::{CommerceConnector, CommerceConnectorConfig};
//!
//! let shop = CommerceConnector::from_config(&CommerceConnectorConfig::default(), tz)?;
//! let orders = shop.fetch(&credentials, &range).await;
//! ```

mod ads;
mod commerce;
pub mod config;
mod error;
mod fulfillment;
pub mod http;
pub mod resilience;
pub mod timezone;
mod traits;

// Re-exports
pub use ads::AdConnector;
pub use commerce::{
    BulkExportApi, BulkJob, BulkJobStatus, CommerceConnector, ShopifyBulkApi, legacy_id,
    orders_query, reconstruct_orders,
};
pub use config::{
    AdsConnectorConfig, CommerceConnectorConfig, FulfillmentConnectorConfig, RetrySettings,
};
pub use error::ConnectorError;
pub use fulfillment::{FulfillmentConnector, classify_status, paginate};
pub use resilience::{Backoff, RetryError, RetryPolicy, execute_with_retry};
pub use timezone::{business_today, range_bounds};
pub use traits::{AdSource, CommerceSource, FulfillmentSource};
