//! # Bazaar Core
//!
//! Business core of a marketplace backend: the coupled order/shipping
//! status state machines, the wallet transactional ledger, the
//! payment-to-wallet bridge, and the exchange-request workflow.
//!
//! ## Architecture
//!
//! Controllers, image storage, authentication, and the chat assistant
//! live in the surrounding application; this crate owns the parts with
//! real invariants — valid transitions, drift repair, conservation of
//! money — behind a narrow Persistence Gateway.
//!
//! - [`models`] - domain structs and status enums
//! - [`state_machine`] - validating order/shipping machines and the
//!   repairing synchronizer
//! - [`services`] - wallet ledger, payment bridge, exchange workflow,
//!   order service
//! - [`storage`] - Persistence Gateway traits plus Postgres and
//!   in-memory backends
//! - [`response`] - the result envelope handed to controllers
//! - [`error`] - structured error taxonomy
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use bazaar_core::services::WalletLedger;
//! use bazaar_core::storage::MemoryStorage;
//! use rust_decimal::Decimal;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let storage = Arc::new(MemoryStorage::new());
//! let ledger = WalletLedger::new(storage);
//!
//! let wallet = ledger.create_wallet(1).await?;
//! let wallet = ledger.deposit(1, Decimal::new(10000, 2), Some("signup credit".into())).await?;
//! assert_eq!(wallet.balance, Decimal::new(10000, 2));
//! # Ok(())
//! # }
//! ```
//!
//! ## Concurrency
//!
//! The gateway contract serializes writers per wallet (Postgres row
//! locks, exclusive in-memory entries) and commits each balance write
//! together with its ledger entry, so a committed balance is never
//! negative and never missing its audit row.

pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod response;
pub mod services;
pub mod state_machine;
pub mod storage;

pub use config::CoreConfig;
pub use error::{CoreError, Result};
pub use response::ApiResponse;
pub use services::{CreateOrder, ExchangeService, OrderService, PaymentBridge, WalletLedger};
pub use state_machine::{
    AvailableTransitions, OrderStatus, OrderStatusMachine, ShippingStatus, ShippingStatusMachine,
    StatusSynchronizer,
};
pub use storage::{MemoryStorage, PgStorage, Storage};
