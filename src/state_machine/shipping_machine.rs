use std::sync::Arc;

use chrono::Utc;

use crate::error::{CoreError, Result};
use crate::models::Order;
use crate::state_machine::states::{OrderStatus, ShippingStatus};
use crate::storage::{OrderStatusUpdate, Storage};

/// Validating path for shipping status changes (the delivery partner's
/// update path).
///
/// Transitions are checked against the [`ShippingStatus`] table; a valid
/// transition drives the order status forward and repairs completed/
/// delivered drift before committing order and shipping as one unit of
/// work.
pub struct ShippingStatusMachine {
    storage: Arc<dyn Storage>,
}

impl ShippingStatusMachine {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Attempt to transition the order's shipping record to `new_status`.
    pub async fn request_transition(
        &self,
        order_id: i64,
        new_status: ShippingStatus,
    ) -> Result<Order> {
        let mut order = self
            .storage
            .find_order(order_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Order"))?;

        let current = order
            .shipping_status()
            .ok_or_else(|| CoreError::not_found("Shipping information"))?;

        if !current.can_transition_to(new_status) {
            tracing::warn!(
                order_id,
                current = %current,
                requested = %new_status,
                allowed = ?current.allowed_transitions(),
                "Invalid shipping status transition"
            );
            return Err(CoreError::Validation(format!(
                "Invalid shipping status transition from {current} to {new_status}"
            )));
        }

        let order_status_before = order.status;
        let now = Utc::now();
        let mut completed_at = None;

        if let Some(shipping) = order.shipping.as_mut() {
            shipping.status = new_status;
        }

        // Forward effects on the order
        match new_status {
            ShippingStatus::InTransit => {
                if order.status == OrderStatus::Paid {
                    order.status = OrderStatus::Shipped;
                    tracing::info!(order_id, "Order automatically updated to shipped");
                }
            }
            ShippingStatus::Delivered => {
                order.status = OrderStatus::Completed;
                order.completed_at = Some(now);
                completed_at = Some(now);
                tracing::info!(order_id, "Order automatically updated to completed");
            }
            ShippingStatus::Failed => {
                order.status = OrderStatus::Cancelled;
                tracing::info!(order_id, "Order automatically updated to cancelled");
            }
            // A parcel returning to the depot does not move the order back
            ShippingStatus::Pending => {}
        }

        // Repair completed/delivered drift before committing
        if order.status == OrderStatus::Completed {
            if let Some(shipping) = order.shipping.as_mut() {
                if shipping.status != ShippingStatus::Delivered {
                    tracing::warn!(
                        order_id,
                        shipping_status = %shipping.status,
                        "Order is completed but shipping is not delivered; auto-correcting"
                    );
                    shipping.status = ShippingStatus::Delivered;
                }
            }
        }
        if order.shipping_status() == Some(ShippingStatus::Delivered)
            && order.status != OrderStatus::Completed
        {
            tracing::warn!(
                order_id,
                order_status = %order.status,
                "Shipping is delivered but order is not completed; auto-correcting"
            );
            order.status = OrderStatus::Completed;
            order.completed_at = Some(now);
            completed_at = Some(now);
        }

        self.storage
            .save_status(OrderStatusUpdate {
                order_id,
                status: order.status,
                paid_at: None,
                completed_at,
                shipping_status: order.shipping_status(),
            })
            .await?;

        tracing::info!(
            order_id,
            from = %current,
            to = %new_status,
            order_from = %order_status_before,
            order_to = %order.status,
            "Shipping status updated"
        );
        Ok(order)
    }
}
