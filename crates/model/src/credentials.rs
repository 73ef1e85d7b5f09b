//! Per-account source credentials
//!
//! Credentials are handed to each aggregation explicitly; nothing caches them
//! process-wide.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The three external sources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Commerce,
    Ads,
    Fulfillment,
}

impl SourceKind {
    pub const ALL: [SourceKind; 3] = [Self::Commerce, Self::Ads, Self::Fulfillment];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Commerce => "commerce",
            Self::Ads => "ads",
            Self::Fulfillment => "fulfillment",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Commerce store credentials
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommerceCredentials {
    /// Store domain (e.g., mystore.myshopify.com)
    pub shop_domain: String,
    pub access_token: String,
}

/// Ad account credentials
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdCredentials {
    /// Ad account id without the `act_` prefix
    pub ad_account_id: String,
    pub access_token: String,
}

/// Fulfillment API credentials
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FulfillmentCredentials {
    pub api_token: String,
}

/// All credentials known for one account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountCredentials {
    pub account_id: String,
    #[serde(default)]
    pub commerce: Option<CommerceCredentials>,
    #[serde(default)]
    pub ads: Option<AdCredentials>,
    #[serde(default)]
    pub fulfillment: Option<FulfillmentCredentials>,
}

impl AccountCredentials {
    pub fn new(account_id: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            commerce: None,
            ads: None,
            fulfillment: None,
        }
    }

    /// Sources without credentials
    pub fn missing_sources(&self) -> Vec<SourceKind> {
        SourceKind::ALL
            .into_iter()
            .filter(|kind| !self.has(*kind))
            .collect()
    }

    pub fn has(&self, kind: SourceKind) -> bool {
        match kind {
            SourceKind::Commerce => self.commerce.is_some(),
            SourceKind::Ads => self.ads.is_some(),
            SourceKind::Fulfillment => self.fulfillment.is_some(),
        }
    }

    /// Whether all three sources are configured
    pub fn is_complete(&self) -> bool {
        self.missing_sources().is_empty()
    }
}

fn redact(token: &str) -> String {
    let prefix: String = token.chars().take(4).collect();
    format!("{}***", prefix)
}

impl fmt::Debug for CommerceCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommerceCredentials")
            .field("shop_domain", &self.shop_domain)
            .field("access_token", &redact(&self.access_token))
            .finish()
    }
}

impl fmt::Debug for AdCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdCredentials")
            .field("ad_account_id", &self.ad_account_id)
            .field("access_token", &redact(&self.access_token))
            .finish()
    }
}

impl fmt::Debug for FulfillmentCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FulfillmentCredentials")
            .field("api_token", &redact(&self.api_token))
            .finish()
    }
}
