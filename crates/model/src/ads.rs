//! Ad-spend insights

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Ad performance for one calendar day (or one range, see [`AdOverview`])
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdDay {
    pub spend: f64,
    pub impressions: u64,
    pub clicks: u64,
    pub reach: u64,
    /// Source-reported return on ad spend
    pub roas: f64,
    /// Click-through rate in percent
    pub ctr: f64,
    /// Cost per click
    pub cpc: f64,
    /// Cost per thousand impressions
    pub cpm: f64,
}

impl AdDay {
    /// Build a record from raw counters, deriving ctr/cpc/cpm
    pub fn from_counters(spend: f64, impressions: u64, clicks: u64, reach: u64, roas: f64) -> Self {
        let ratio = |num: f64, den: u64| if den == 0 { 0.0 } else { num / den as f64 };
        Self {
            spend,
            impressions,
            clicks,
            reach,
            roas,
            ctr: ratio(clicks as f64 * 100.0, impressions),
            cpc: ratio(spend, clicks),
            cpm: ratio(spend * 1000.0, impressions),
        }
    }

    pub fn is_zero(&self) -> bool {
        self.spend == 0.0 && self.impressions == 0 && self.clicks == 0 && self.reach == 0
    }
}

/// Range-aggregate ad record
pub type AdOverview = AdDay;

/// Daily ad insights covering every day of a range
///
/// Days the source did not report are zero-valued placeholders. Refetching a
/// day overwrites it.
pub type AdDailyReport = BTreeMap<NaiveDate, AdDay>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_ratios() {
        let day = AdDay::from_counters(200.0, 10_000, 50, 8_000, 3.5);
        assert_eq!(day.ctr, 0.5);
        assert_eq!(day.cpc, 4.0);
        assert_eq!(day.cpm, 20.0);
        assert_eq!(day.roas, 3.5);
    }

    #[test]
    fn test_derived_ratios_zero_denominators() {
        let day = AdDay::from_counters(10.0, 0, 0, 0, 0.0);
        assert_eq!(day.ctr, 0.0);
        assert_eq!(day.cpc, 0.0);
        assert_eq!(day.cpm, 0.0);
        assert!(!day.is_zero());
        assert!(AdDay::default().is_zero());
    }
}
