use std::sync::Arc;

use chrono::Utc;

use crate::error::{CoreError, Result};
use crate::models::Order;
use crate::state_machine::states::{OrderStatus, ShippingStatus};
use crate::storage::{OrderStatusUpdate, Storage};

/// Validating path for order status changes.
///
/// Transitions are checked against the [`OrderStatus`] table; a valid
/// transition stamps timestamps and drives the order's shipping record to
/// its canonical counterpart, all committed as one unit of work.
pub struct OrderStatusMachine {
    storage: Arc<dyn Storage>,
}

impl OrderStatusMachine {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Attempt to transition the order to `new_status`.
    pub async fn request_transition(
        &self,
        order_id: i64,
        new_status: OrderStatus,
    ) -> Result<Order> {
        let mut order = self
            .storage
            .find_order(order_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Order"))?;

        let current = order.status;
        if !current.can_transition_to(new_status) {
            tracing::warn!(
                order_id,
                current = %current,
                requested = %new_status,
                allowed = ?current.allowed_transitions(),
                "Invalid order status transition"
            );
            return Err(CoreError::Validation(format!(
                "Invalid status transition from {current} to {new_status}"
            )));
        }

        let now = Utc::now();
        order.status = new_status;

        let mut paid_at = None;
        let mut completed_at = None;
        if new_status == OrderStatus::Paid && order.paid_at.is_none() {
            order.paid_at = Some(now);
            paid_at = Some(now);
        }
        if new_status == OrderStatus::Completed {
            order.completed_at = Some(now);
            completed_at = Some(now);
        }

        let shipping_status = self.drive_shipping(&mut order, new_status);

        self.storage
            .save_status(OrderStatusUpdate {
                order_id,
                status: new_status,
                paid_at,
                completed_at,
                shipping_status,
            })
            .await?;

        tracing::info!(order_id, from = %current, to = %new_status, "Order status updated");
        Ok(order)
    }

    /// Apply the shipping side effect of an order transition, then repair
    /// any remaining drift against the canonical table. Returns the
    /// shipping status to persist, when it changed.
    fn drive_shipping(&self, order: &mut Order, new_status: OrderStatus) -> Option<ShippingStatus> {
        let order_id = order.id;
        let shipping = order.shipping.as_mut()?;
        let before = shipping.status;

        match new_status {
            // Hand-off to the carrier only moves a parcel that was waiting
            OrderStatus::Shipped if shipping.status == ShippingStatus::Pending => {
                shipping.status = ShippingStatus::InTransit;
            }
            OrderStatus::Completed => {
                shipping.status = ShippingStatus::Delivered;
            }
            OrderStatus::Cancelled => {
                shipping.status = ShippingStatus::Failed;
            }
            _ => {}
        }

        if let Some(expected) = new_status.expected_shipping_status() {
            if shipping.status != expected {
                tracing::info!(
                    order_id,
                    current = %shipping.status,
                    expected = %expected,
                    "Auto-correcting shipping status"
                );
                shipping.status = expected;
            }
        }

        (shipping.status != before).then_some(shipping.status)
    }
}
