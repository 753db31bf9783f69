//! Persistence Gateway: abstract read/write access to orders, wallets,
//! transactions, payments, and exchange requests.
//!
//! The core demarcates its units of work through these traits; a backend
//! must commit each named unit atomically (all-or-nothing) and serialize
//! concurrent writers per wallet. Two backends ship with the crate:
//! [`postgres::PgStorage`] and [`memory::MemoryStorage`].

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;

use crate::error::CoreError;
use crate::models::{
    ExchangeRequest, ExchangeStatus, NewExchangeRequest, NewOrder, NewPayment, NewTransaction,
    Order, Payment, PaymentStatus, Product, Transaction, TransactionStatus, User, Wallet,
};
use crate::state_machine::states::{OrderStatus, ShippingStatus};

pub use memory::MemoryStorage;
pub use postgres::PgStorage;

/// Errors surfaced by gateway implementations.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("{entity} not found")]
    NotFound { entity: &'static str },

    #[error("{0}")]
    Conflict(String),

    /// The balance re-check inside the wallet critical section failed.
    #[error("Insufficient balance")]
    InsufficientFunds,

    /// The lock re-check inside the wallet critical section failed.
    #[error("Wallet is locked")]
    WalletLocked,

    /// A persisted status string no longer parses as a known variant.
    #[error("Invalid persisted state: {state}")]
    InvalidState { state: String },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StorageError {
    pub fn not_found(entity: &'static str) -> Self {
        Self::NotFound { entity }
    }
}

impl From<StorageError> for CoreError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound { entity } => CoreError::not_found(entity),
            StorageError::Conflict(msg) => CoreError::Conflict(msg),
            StorageError::InsufficientFunds => CoreError::Validation("Insufficient balance".into()),
            StorageError::WalletLocked => CoreError::Forbidden("Wallet is locked".into()),
            StorageError::InvalidState { state } => {
                CoreError::Internal(format!("Invalid persisted state: {state}"))
            }
            StorageError::Database(e) => CoreError::Database(e),
            StorageError::Serialization(e) => CoreError::Serialization(e),
        }
    }
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Status-pair write for an order and its shipping record, committed as
/// one unit of work. `paid_at`/`completed_at` are set only when `Some`;
/// an existing `paid_at` is never overwritten.
#[derive(Debug, Clone)]
pub struct OrderStatusUpdate {
    pub order_id: i64,
    pub status: OrderStatus,
    pub paid_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub shipping_status: Option<ShippingStatus>,
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Insert the order together with its shipping record.
    async fn add_order(&self, new_order: NewOrder) -> StorageResult<Order>;

    /// Load an order with its shipping record.
    async fn find_order(&self, order_id: i64) -> StorageResult<Option<Order>>;

    /// Persist an order/shipping status pair atomically.
    async fn save_status(&self, update: OrderStatusUpdate) -> StorageResult<()>;

    async fn orders_by_user(&self, user_id: i64) -> StorageResult<Vec<Order>>;
    async fn orders_by_buyer(&self, buyer_id: i64) -> StorageResult<Vec<Order>>;
    async fn orders_by_seller(&self, seller_id: i64) -> StorageResult<Vec<Order>>;

    /// Whether the order is still Pending and owned by this buyer.
    async fn can_buyer_cancel(&self, order_id: i64, buyer_id: i64) -> StorageResult<bool>;
}

#[async_trait]
pub trait ProductStore: Send + Sync {
    async fn find_product(&self, product_id: i64) -> StorageResult<Option<Product>>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_user(&self, user_id: i64) -> StorageResult<Option<User>>;
}

#[async_trait]
pub trait WalletStore: Send + Sync {
    /// Create a wallet with zero balance; `Conflict` when the user already
    /// has one.
    async fn add_wallet(&self, user_id: i64) -> StorageResult<Wallet>;

    async fn find_wallet_by_user(&self, user_id: i64) -> StorageResult<Option<Wallet>>;
    async fn wallet_exists_for_user(&self, user_id: i64) -> StorageResult<bool>;
    async fn set_wallet_locked(&self, user_id: i64, locked: bool) -> StorageResult<()>;
    async fn link_payment_method(&self, user_id: i64, method: &str) -> StorageResult<()>;

    /// Apply a signed balance delta and append the ledger entry as one
    /// unit of work.
    ///
    /// Implementations serialize concurrent writers per wallet (row lock
    /// or exclusive entry) and re-check inside the critical section that
    /// the resulting balance stays non-negative and, when
    /// `require_unlocked`, that the wallet is not locked.
    async fn apply_ledger_entry(
        &self,
        user_id: i64,
        delta: Decimal,
        require_unlocked: bool,
        entry: NewTransaction,
    ) -> StorageResult<(Wallet, Transaction)>;
}

#[async_trait]
pub trait TransactionStore: Send + Sync {
    async fn find_transaction(&self, transaction_id: i64) -> StorageResult<Option<Transaction>>;

    async fn find_transaction_for_wallet(
        &self,
        transaction_id: i64,
        wallet_id: i64,
    ) -> StorageResult<Option<Transaction>>;

    /// Newest first.
    async fn transactions_by_wallet(&self, wallet_id: i64) -> StorageResult<Vec<Transaction>>;

    /// Advance a transaction's status. Returns false when the row is
    /// absent. Amount, kind, and wallet are immutable.
    async fn set_transaction_status(
        &self,
        transaction_id: i64,
        status: TransactionStatus,
    ) -> StorageResult<bool>;
}

#[async_trait]
pub trait PaymentStore: Send + Sync {
    async fn add_payment(
        &self,
        new_payment: NewPayment,
        status: PaymentStatus,
        gateway_reference: Option<String>,
    ) -> StorageResult<Payment>;

    async fn find_payment(&self, payment_id: i64) -> StorageResult<Option<Payment>>;
    async fn payments_by_user(&self, user_id: i64) -> StorageResult<Vec<Payment>>;

    /// Insert a Completed payment, debit the payer's wallet, and append
    /// the `Payment` ledger entry referencing both the payment and the
    /// order — one unit of work. On any failure (missing wallet, locked,
    /// insufficient balance) nothing is persisted.
    async fn settle_payment(
        &self,
        new_payment: NewPayment,
        gateway_reference: String,
        entry_description: String,
    ) -> StorageResult<(Payment, Wallet, Transaction)>;
}

#[async_trait]
pub trait ExchangeStore: Send + Sync {
    /// Insert a Pending request; `Conflict` when a Pending request already
    /// exists between the same product pair (enforced atomically).
    async fn add_exchange_request(
        &self,
        request: NewExchangeRequest,
    ) -> StorageResult<ExchangeRequest>;

    async fn find_exchange_request(&self, request_id: i64) -> StorageResult<Option<ExchangeRequest>>;

    async fn has_pending_between(
        &self,
        offered_product_id: i64,
        requested_product_id: i64,
    ) -> StorageResult<bool>;

    /// The request, provided it is Pending and the requested product
    /// belongs to `responder_user_id`.
    async fn find_pending_for_response(
        &self,
        request_id: i64,
        responder_user_id: i64,
    ) -> StorageResult<Option<ExchangeRequest>>;

    /// The request, provided it is Pending and `user_id` owns either side
    /// of the pairing.
    async fn find_pending_for_deletion(
        &self,
        request_id: i64,
        user_id: i64,
    ) -> StorageResult<Option<ExchangeRequest>>;

    async fn set_exchange_status(
        &self,
        request_id: i64,
        status: ExchangeStatus,
        responded_at: DateTime<Utc>,
        completed_at: Option<DateTime<Utc>>,
    ) -> StorageResult<bool>;

    async fn delete_exchange_request(&self, request_id: i64) -> StorageResult<bool>;

    /// Requests whose offered product belongs to `user_id`.
    async fn exchange_requests_sent_by(&self, user_id: i64) -> StorageResult<Vec<ExchangeRequest>>;

    /// Requests whose requested product belongs to `user_id`.
    async fn exchange_requests_received_by(
        &self,
        user_id: i64,
    ) -> StorageResult<Vec<ExchangeRequest>>;
}

/// The full Persistence Gateway consumed by the services.
pub trait Storage:
    OrderStore
    + ProductStore
    + UserStore
    + WalletStore
    + TransactionStore
    + PaymentStore
    + ExchangeStore
{
}

impl<T> Storage for T where
    T: OrderStore
        + ProductStore
        + UserStore
        + WalletStore
        + TransactionStore
        + PaymentStore
        + ExchangeStore
{
}
