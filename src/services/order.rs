use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::models::{NewOrder, NewShippingInfo, Order};
use crate::state_machine::states::OrderStatus;
use crate::state_machine::{OrderStatusMachine, StatusSynchronizer};
use crate::storage::{OrderStatusUpdate, Storage};

/// Order intake and administration around the status machines.
pub struct OrderService {
    storage: Arc<dyn Storage>,
    machine: OrderStatusMachine,
    synchronizer: StatusSynchronizer,
    platform_fee_rate: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOrder {
    pub product_id: i64,
    pub buyer_id: i64,
    pub shipping: NewShippingInfo,
}

impl OrderService {
    pub fn new(storage: Arc<dyn Storage>, platform_fee_rate: Decimal) -> Self {
        Self {
            machine: OrderStatusMachine::new(storage.clone()),
            synchronizer: StatusSynchronizer::new(storage.clone()),
            storage,
            platform_fee_rate,
        }
    }

    /// Create an order (and its shipping record) for a product. The
    /// platform keeps `platform_fee_rate` of the total; the seller
    /// receives the remainder, so the two always sum to the total.
    pub async fn create_order(&self, dto: CreateOrder) -> Result<Order> {
        let product = self
            .storage
            .find_product(dto.product_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Product"))?;

        let seller = self
            .storage
            .find_user(product.user_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Seller"))?;

        let platform_fee = (product.price * self.platform_fee_rate).round_dp(2);
        let seller_amount = product.price - platform_fee;

        let order = self
            .storage
            .add_order(NewOrder {
                product_id: product.id,
                buyer_id: dto.buyer_id,
                seller_id: seller.id,
                total_amount: product.price,
                platform_fee,
                seller_amount,
                shipping: dto.shipping,
            })
            .await?;

        tracing::info!(
            order_id = order.id,
            product_id = product.id,
            buyer_id = dto.buyer_id,
            seller_id = seller.id,
            total = %order.total_amount,
            "Order created"
        );
        Ok(order)
    }

    /// Buyer-initiated cancellation, allowed only while the order is
    /// still Pending.
    pub async fn cancel_order(&self, order_id: i64, buyer_id: i64) -> Result<Order> {
        self.storage
            .find_order(order_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Order"))?;

        if !self.storage.can_buyer_cancel(order_id, buyer_id).await? {
            return Err(CoreError::Forbidden(
                "Only the buyer of a pending order can cancel it".into(),
            ));
        }

        self.machine
            .request_transition(order_id, OrderStatus::Cancelled)
            .await
    }

    /// Administrative status edit that bypasses the validating machine
    /// (stamps timestamps like the machine would), immediately followed
    /// by synchronization so the shipping record cannot drift.
    pub async fn force_status(&self, order_id: i64, new_status: OrderStatus) -> Result<Order> {
        let order = self
            .storage
            .find_order(order_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Order"))?;

        let now = Utc::now();
        let paid_at = (new_status == OrderStatus::Paid && order.paid_at.is_none()).then_some(now);
        let completed_at = (new_status == OrderStatus::Completed).then_some(now);

        self.storage
            .save_status(OrderStatusUpdate {
                order_id,
                status: new_status,
                paid_at,
                completed_at,
                shipping_status: None,
            })
            .await?;

        tracing::info!(order_id, status = %new_status, "Order status forced");

        if order.shipping.is_some() {
            self.synchronizer.synchronize(order_id).await?;
        }
        self.order(order_id).await
    }

    pub async fn order(&self, order_id: i64) -> Result<Order> {
        self.storage
            .find_order(order_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Order"))
    }

    /// Orders where the user is buyer or seller, newest first.
    pub async fn orders_by_user(&self, user_id: i64) -> Result<Vec<Order>> {
        Ok(self.storage.orders_by_user(user_id).await?)
    }

    pub async fn orders_by_buyer(&self, buyer_id: i64) -> Result<Vec<Order>> {
        Ok(self.storage.orders_by_buyer(buyer_id).await?)
    }

    pub async fn orders_by_seller(&self, seller_id: i64) -> Result<Vec<Order>> {
        Ok(self.storage.orders_by_seller(seller_id).await?)
    }
}
