use serde::{Deserialize, Serialize};
use std::fmt;

/// Order lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Initial state when the order is created
    Pending,
    /// Buyer's payment has been captured
    Paid,
    /// Parcel handed to the delivery partner
    Shipped,
    /// Order fulfilled and delivered
    Completed,
    /// Order cancelled (a status, never a deletion)
    Cancelled,
}

impl OrderStatus {
    /// Statuses reachable from this one through the validating path.
    ///
    /// This table is the single source of truth for order transitions;
    /// adding a variant forces this match to be revisited.
    pub fn allowed_transitions(self) -> &'static [OrderStatus] {
        match self {
            Self::Pending => &[Self::Paid, Self::Cancelled],
            Self::Paid => &[Self::Shipped, Self::Cancelled],
            Self::Shipped => &[Self::Completed, Self::Cancelled],
            Self::Completed => &[],
            Self::Cancelled => &[],
        }
    }

    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        self.allowed_transitions().contains(&next)
    }

    /// Check if this is a terminal state (no further transitions allowed)
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Shipping status this order status corresponds to in the canonical
    /// correspondence table, used for drift repair. `Pending` orders have
    /// no shipping counterpart.
    pub fn expected_shipping_status(self) -> Option<ShippingStatus> {
        match self {
            Self::Pending => None,
            Self::Paid => Some(ShippingStatus::Pending),
            Self::Shipped => Some(ShippingStatus::InTransit),
            Self::Completed => Some(ShippingStatus::Delivered),
            Self::Cancelled => Some(ShippingStatus::Failed),
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Paid => write!(f, "paid"),
            Self::Shipped => write!(f, "shipped"),
            Self::Completed => write!(f, "completed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "paid" => Ok(Self::Paid),
            "shipped" => Ok(Self::Shipped),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(format!("Invalid order status: {s}")),
        }
    }
}

impl Default for OrderStatus {
    fn default() -> Self {
        Self::Pending
    }
}

/// Shipping lifecycle states for an order's shipping info.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShippingStatus {
    /// Awaiting pickup by the delivery partner
    Pending,
    /// Parcel is on its way
    InTransit,
    /// Parcel handed to the recipient
    Delivered,
    /// Delivery attempt failed
    Failed,
}

impl ShippingStatus {
    /// Statuses reachable from this one through the validating path.
    ///
    /// Pending may jump straight to Delivered (pickup-at-warehouse
    /// shortcut) and InTransit may fall back to Pending (parcel returned
    /// to depot); both are deliberate exceptions, not bugs.
    pub fn allowed_transitions(self) -> &'static [ShippingStatus] {
        match self {
            Self::Pending => &[Self::InTransit, Self::Failed, Self::Delivered],
            Self::InTransit => &[Self::Delivered, Self::Failed, Self::Pending],
            Self::Delivered => &[],
            Self::Failed => &[Self::Pending, Self::Delivered],
        }
    }

    pub fn can_transition_to(self, next: ShippingStatus) -> bool {
        self.allowed_transitions().contains(&next)
    }

    /// Check if this is a terminal state (no further transitions allowed)
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered)
    }

    /// Order status this shipping status corresponds to in the canonical
    /// correspondence table.
    pub fn expected_order_status(self) -> OrderStatus {
        match self {
            Self::Pending => OrderStatus::Paid,
            Self::InTransit => OrderStatus::Shipped,
            Self::Delivered => OrderStatus::Completed,
            Self::Failed => OrderStatus::Cancelled,
        }
    }
}

impl fmt::Display for ShippingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::InTransit => write!(f, "in_transit"),
            Self::Delivered => write!(f, "delivered"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for ShippingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "in_transit" => Ok(Self::InTransit),
            "delivered" => Ok(Self::Delivered),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("Invalid shipping status: {s}")),
        }
    }
}

impl Default for ShippingStatus {
    fn default() -> Self {
        Self::Pending
    }
}

/// Check whether an (order, shipping) pair sits on the canonical
/// correspondence table.
pub fn is_synchronized(order_status: OrderStatus, shipping_status: ShippingStatus) -> bool {
    order_status.expected_shipping_status() == Some(shipping_status)
}
