use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::state_machine::states::{is_synchronized, OrderStatus, ShippingStatus};
use crate::storage::{OrderStatusUpdate, Storage};

/// Repairing path for order/shipping drift.
///
/// Unlike the two validating machines, the synchronizer never rejects a
/// state it finds: it trusts the canonical correspondence table and
/// silently restores it. It is the only component allowed to touch both
/// statuses outside a validated transition, and runs after any manual
/// status edit that bypasses the machines.
pub struct StatusSynchronizer {
    storage: Arc<dyn Storage>,
}

/// Read model for the repair console: where the pair stands, where each
/// machine allows it to go next, and what an operator should probably do.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailableTransitions {
    pub order_id: i64,
    pub current_order_status: OrderStatus,
    pub current_shipping_status: Option<ShippingStatus>,
    pub is_synchronized: bool,
    pub order_status_transitions: Vec<OrderStatus>,
    pub shipping_status_transitions: Vec<ShippingStatus>,
    pub recommendations: Vec<String>,
}

impl StatusSynchronizer {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Restore the canonical order/shipping correspondence for one order.
    ///
    /// Returns whether any correction was written. Idempotent: a second
    /// call with no intervening change reports `false`.
    pub async fn synchronize(&self, order_id: i64) -> Result<bool> {
        let mut order = self
            .storage
            .find_order(order_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Order"))?;

        let mut shipping_status = order
            .shipping_status()
            .ok_or_else(|| CoreError::Validation("Order has no shipping information".into()))?;

        let mut changed = false;
        let mut completed_at = None;

        // Correct shipping from the order side of the table
        if let Some(expected) = order.status.expected_shipping_status() {
            if shipping_status != expected {
                tracing::info!(
                    order_id,
                    current = %shipping_status,
                    expected = %expected,
                    "Correcting shipping status"
                );
                shipping_status = expected;
                changed = true;
            }
        }

        // Correct the order from the (possibly corrected) shipping side
        let expected_order = shipping_status.expected_order_status();
        if order.status != expected_order {
            tracing::info!(
                order_id,
                current = %order.status,
                expected = %expected_order,
                "Correcting order status"
            );
            order.status = expected_order;
            if expected_order == OrderStatus::Completed {
                let now = Utc::now();
                order.completed_at = Some(now);
                completed_at = Some(now);
            }
            changed = true;
        }

        if changed {
            self.storage
                .save_status(OrderStatusUpdate {
                    order_id,
                    status: order.status,
                    paid_at: None,
                    completed_at,
                    shipping_status: Some(shipping_status),
                })
                .await?;
            tracing::info!(order_id, "Order status synchronized");
        } else {
            tracing::debug!(order_id, "Order status already synchronized");
        }

        Ok(changed)
    }

    /// Pure read: the current status pair, the statically allowed next
    /// statuses from the transition tables, and repair recommendations.
    pub async fn available_transitions(&self, order_id: i64) -> Result<AvailableTransitions> {
        let order = self
            .storage
            .find_order(order_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Order"))?;

        let shipping_status = order.shipping_status();

        Ok(AvailableTransitions {
            order_id: order.id,
            current_order_status: order.status,
            current_shipping_status: shipping_status,
            is_synchronized: shipping_status
                .map(|s| is_synchronized(order.status, s))
                .unwrap_or(false),
            order_status_transitions: order.status.allowed_transitions().to_vec(),
            shipping_status_transitions: shipping_status
                .map(|s| s.allowed_transitions().to_vec())
                .unwrap_or_default(),
            recommendations: recommendations(order.status, shipping_status),
        })
    }
}

fn recommendations(
    order_status: OrderStatus,
    shipping_status: Option<ShippingStatus>,
) -> Vec<String> {
    let mut recommendations = Vec::new();

    if order_status == OrderStatus::Completed && shipping_status == Some(ShippingStatus::Pending) {
        recommendations.push(
            "Order is completed but shipping is pending. Consider updating shipping status to 'delivered'"
                .to_string(),
        );
    } else if order_status == OrderStatus::Paid && shipping_status == Some(ShippingStatus::Pending)
    {
        recommendations.push(
            "Order is paid. Consider updating shipping status to 'in_transit' or 'delivered'"
                .to_string(),
        );
    } else if shipping_status == Some(ShippingStatus::Delivered)
        && order_status != OrderStatus::Completed
    {
        recommendations
            .push("Shipping is delivered. Order status should be 'completed'".to_string());
    } else if shipping_status == Some(ShippingStatus::Failed)
        && order_status != OrderStatus::Cancelled
    {
        recommendations.push("Shipping failed. Consider cancelling the order".to_string());
    }

    recommendations
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recommendations_for_drifted_pairs() {
        let recs = recommendations(OrderStatus::Shipped, Some(ShippingStatus::Delivered));
        assert_eq!(recs.len(), 1);
        assert!(recs[0].contains("Shipping is delivered"));

        let recs = recommendations(OrderStatus::Paid, Some(ShippingStatus::Failed));
        assert_eq!(recs.len(), 1);
        assert!(recs[0].contains("Shipping failed"));
    }

    #[test]
    fn test_no_recommendations_without_shipping() {
        assert!(recommendations(OrderStatus::Completed, None).is_empty());
    }

    #[test]
    fn test_no_recommendations_for_synchronized_terminal_pair() {
        assert!(recommendations(OrderStatus::Completed, Some(ShippingStatus::Delivered)).is_empty());
        assert!(recommendations(OrderStatus::Cancelled, Some(ShippingStatus::Failed)).is_empty());
    }
}
