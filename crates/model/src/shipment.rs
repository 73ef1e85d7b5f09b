//! Fulfillment shipments

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Classified shipment status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShipmentStatus {
    PickupPending,
    InTransit,
    Delivered,
    /// Return to origin
    #[serde(rename = "RTO")]
    Rto,
    /// Non-delivery report
    #[serde(rename = "NDR")]
    Ndr,
    Cancelled,
    Other,
}

impl ShipmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PickupPending => "PickupPending",
            Self::InTransit => "InTransit",
            Self::Delivered => "Delivered",
            Self::Rto => "RTO",
            Self::Ndr => "NDR",
            Self::Cancelled => "Cancelled",
            Self::Other => "Other",
        }
    }
}

impl fmt::Display for ShipmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Source-agnostic shipment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShipmentRecord {
    pub id: String,
    /// Business-timezone day the underlying order was placed
    pub order_date: NaiveDate,
    pub status: ShipmentStatus,
    /// Status string as reported by the source
    pub raw_status: String,
    pub freight_cost: f64,
    pub cod_charge: f64,
    /// Extra charge billed when the parcel returns to origin
    pub rto_surcharge: f64,
    pub payment_method: String,
}

impl ShipmentRecord {
    /// Shipping cost: freight + COD charge, plus the RTO surcharge for RTO shipments
    pub fn shipping_cost(&self) -> f64 {
        let base = self.freight_cost + self.cod_charge;
        if self.status == ShipmentStatus::Rto {
            base + self.rto_surcharge
        } else {
            base
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shipment(status: ShipmentStatus) -> ShipmentRecord {
        ShipmentRecord {
            id: "s1".into(),
            order_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            status,
            raw_status: status.to_string(),
            freight_cost: 60.0,
            cod_charge: 25.0,
            rto_surcharge: 60.0,
            payment_method: "cod".into(),
        }
    }

    #[test]
    fn test_shipping_cost_ignores_surcharge_unless_rto() {
        assert_eq!(shipment(ShipmentStatus::Delivered).shipping_cost(), 85.0);
    }

    #[test]
    fn test_shipping_cost_rto_adds_surcharge() {
        assert_eq!(shipment(ShipmentStatus::Rto).shipping_cost(), 145.0);
    }

    #[test]
    fn test_status_serialized_names() {
        assert_eq!(
            serde_json::to_string(&ShipmentStatus::Rto).unwrap(),
            "\"RTO\""
        );
        assert_eq!(
            serde_json::to_string(&ShipmentStatus::PickupPending).unwrap(),
            "\"PickupPending\""
        );
    }
}
