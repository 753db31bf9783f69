use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::state_machine::states::{OrderStatus, ShippingStatus};

/// A purchase of one product by one buyer from one seller.
///
/// Money invariant: `seller_amount + platform_fee == total_amount`.
/// Orders are never physically deleted; cancellation is a status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub product_id: i64,
    pub buyer_id: i64,
    pub seller_id: i64,
    pub total_amount: Decimal,
    pub platform_fee: Decimal,
    pub seller_amount: Decimal,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    /// Set once on the Pending -> Paid transition, never rewound.
    pub paid_at: Option<DateTime<Utc>>,
    /// Set on the transition into Completed.
    pub completed_at: Option<DateTime<Utc>>,
    /// 1:1 shipping record; created together with the order, no
    /// independent lifecycle.
    pub shipping: Option<ShippingInfo>,
}

/// Shipping details and delivery state for an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShippingInfo {
    pub recipient_name: String,
    pub address: String,
    pub city: String,
    pub postal_code: String,
    pub phone_number: String,
    pub status: ShippingStatus,
    pub fee: Decimal,
    pub method: Option<String>,
}

/// Order data for creation (without generated fields).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrder {
    pub product_id: i64,
    pub buyer_id: i64,
    pub seller_id: i64,
    pub total_amount: Decimal,
    pub platform_fee: Decimal,
    pub seller_amount: Decimal,
    pub shipping: NewShippingInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewShippingInfo {
    pub recipient_name: String,
    pub address: String,
    pub city: String,
    pub postal_code: String,
    pub phone_number: String,
    pub fee: Decimal,
    pub method: Option<String>,
}

impl NewShippingInfo {
    pub fn into_shipping_info(self) -> ShippingInfo {
        ShippingInfo {
            recipient_name: self.recipient_name,
            address: self.address,
            city: self.city,
            postal_code: self.postal_code,
            phone_number: self.phone_number,
            status: ShippingStatus::Pending,
            fee: self.fee,
            method: self.method,
        }
    }
}

impl Order {
    pub fn shipping_status(&self) -> Option<ShippingStatus> {
        self.shipping.as_ref().map(|s| s.status)
    }
}
