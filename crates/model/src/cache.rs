//! Cache keys and typed payloads

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::ads::AdDailyReport;
use crate::credentials::SourceKind;
use crate::metrics::AggregatedMetrics;
use crate::order::CanonicalOrder;
use crate::range::DateRange;
use crate::shipment::ShipmentRecord;

/// Kind of data held by a cache entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DataKind {
    Commerce,
    Ads,
    Fulfillment,
    AggregatedSummary,
}

impl DataKind {
    pub const ALL: [DataKind; 4] = [
        Self::Commerce,
        Self::Ads,
        Self::Fulfillment,
        Self::AggregatedSummary,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Commerce => "commerce",
            Self::Ads => "ads",
            Self::Fulfillment => "fulfillment",
            Self::AggregatedSummary => "aggregated-summary",
        }
    }
}

impl From<SourceKind> for DataKind {
    fn from(kind: SourceKind) -> Self {
        match kind {
            SourceKind::Commerce => Self::Commerce,
            SourceKind::Ads => Self::Ads,
            SourceKind::Fulfillment => Self::Fulfillment,
        }
    }
}

impl fmt::Display for DataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("unknown data kind: {}", s))
    }
}

/// Cache key: (account, data kind, date range)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheKey {
    pub account_id: String,
    pub data_kind: DataKind,
    pub date_range: DateRange,
}

impl CacheKey {
    pub fn new(account_id: impl Into<String>, data_kind: DataKind, date_range: DateRange) -> Self {
        Self {
            account_id: account_id.into(),
            data_kind,
            date_range,
        }
    }

    /// Same account and range, different kind
    pub fn with_kind(&self, data_kind: DataKind) -> Self {
        Self {
            account_id: self.account_id.clone(),
            data_kind,
            date_range: self.date_range,
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.account_id, self.data_kind, self.date_range)
    }
}

/// Typed cache payload, one fixed schema per data kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "kebab-case")]
pub enum CachePayload {
    Commerce(Vec<CanonicalOrder>),
    Ads(AdDailyReport),
    Fulfillment(Vec<ShipmentRecord>),
    AggregatedSummary(AggregatedMetrics),
}

impl CachePayload {
    pub fn kind(&self) -> DataKind {
        match self {
            Self::Commerce(_) => DataKind::Commerce,
            Self::Ads(_) => DataKind::Ads,
            Self::Fulfillment(_) => DataKind::Fulfillment,
            Self::AggregatedSummary(_) => DataKind::AggregatedSummary,
        }
    }

    pub fn into_summary(self) -> Option<AggregatedMetrics> {
        match self {
            Self::AggregatedSummary(metrics) => Some(metrics),
            _ => None,
        }
    }
}
