// State machines for order and shipping lifecycle management.
//
// Two validating machines (one per status enum, each checking the
// transition tables on the status types) and one repairing synchronizer
// that restores the canonical order/shipping correspondence when the two
// drift.

pub mod order_machine;
pub mod shipping_machine;
pub mod states;
pub mod synchronizer;

// Re-export main types for convenient access
pub use order_machine::OrderStatusMachine;
pub use shipping_machine::ShippingStatusMachine;
pub use states::{is_synchronized, OrderStatus, ShippingStatus};
pub use synchronizer::{AvailableTransitions, StatusSynchronizer};
