//! Shared fixtures for the integration suite: a seeded in-memory gateway
//! and builders for the entities the core collaborates with.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use bazaar_core::models::{NewShippingInfo, Order, Product, ProductStatus, ShippingInfo, User};
use bazaar_core::services::OrderService;
use bazaar_core::state_machine::{OrderStatus, ShippingStatus};
use bazaar_core::storage::MemoryStorage;

pub fn test_storage() -> Arc<MemoryStorage> {
    Arc::new(MemoryStorage::new())
}

pub fn seed_user(storage: &MemoryStorage, id: i64, full_name: &str) {
    storage.insert_user(User {
        id,
        full_name: full_name.to_string(),
    });
}

pub fn seed_product(storage: &MemoryStorage, id: i64, owner_id: i64, price: Decimal) {
    storage.insert_product(Product {
        id,
        user_id: owner_id,
        title: format!("product-{id}"),
        price,
        status: ProductStatus::Available,
        created_at: Utc::now(),
    });
}

pub fn shipping_dto() -> NewShippingInfo {
    NewShippingInfo {
        recipient_name: "Sam Buyer".to_string(),
        address: "12 Market Street".to_string(),
        city: "Cairo".to_string(),
        postal_code: "11511".to_string(),
        phone_number: "0100000000".to_string(),
        fee: dec!(25.00),
        method: Some("courier".to_string()),
    }
}

/// Default platform fee used across the suite (5%).
pub fn order_service(storage: &Arc<MemoryStorage>) -> OrderService {
    OrderService::new(storage.clone(), dec!(0.05))
}

/// Build an order directly in an arbitrary status pair, bypassing the
/// machines, for drift scenarios.
pub fn order_in_state(
    id: i64,
    order_status: OrderStatus,
    shipping_status: ShippingStatus,
) -> Order {
    Order {
        id,
        product_id: 10,
        buyer_id: 1,
        seller_id: 2,
        total_amount: dec!(100.00),
        platform_fee: dec!(5.00),
        seller_amount: dec!(95.00),
        status: order_status,
        created_at: Utc::now(),
        paid_at: None,
        completed_at: None,
        shipping: Some(ShippingInfo {
            recipient_name: "Sam Buyer".to_string(),
            address: "12 Market Street".to_string(),
            city: "Cairo".to_string(),
            postal_code: "11511".to_string(),
            phone_number: "0100000000".to_string(),
            status: shipping_status,
            fee: dec!(25.00),
            method: Some("courier".to_string()),
        }),
    }
}

/// Build an order that never had a shipping record.
pub fn order_without_shipping(id: i64, order_status: OrderStatus) -> Order {
    let mut order = order_in_state(id, order_status, ShippingStatus::Pending);
    order.shipping = None;
    order
}
