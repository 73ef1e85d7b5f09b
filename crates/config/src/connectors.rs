//! Connector configuration
//!
//! Each connector's table is kept as raw TOML and parsed by that
//! connector's own config struct, so this crate stays free of
//! connector details.

use serde::Deserialize;

/// Raw connector tables
///
/// # Example
///
/// ```toml
/// [connectors.commerce]
/// api_version = "2024-10"
///
/// [connectors.ads]
/// page_limit = 500
///
/// [connectors.fulfillment]
/// rto_surcharge_ratio = 1.0
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ConnectorsConfig {
    pub commerce: Option<toml::Value>,
    pub ads: Option<toml::Value>,
    pub fulfillment: Option<toml::Value>,
}

impl ConnectorsConfig {
    /// Commerce table, or an empty table for connector defaults
    pub fn commerce(&self) -> toml::Value {
        table_or_empty(self.commerce.as_ref())
    }

    pub fn ads(&self) -> toml::Value {
        table_or_empty(self.ads.as_ref())
    }

    pub fn fulfillment(&self) -> toml::Value {
        table_or_empty(self.fulfillment.as_ref())
    }
}

fn table_or_empty(value: Option<&toml::Value>) -> toml::Value {
    value
        .cloned()
        .unwrap_or_else(|| toml::Value::Table(toml::map::Map::new()))
}
