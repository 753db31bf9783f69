//! Domain model layer: orders and their shipping records, wallets and
//! their ledger, payments, exchange requests, and the read-only
//! product/user projections the core collaborates with.

pub mod exchange_request;
pub mod order;
pub mod payment;
pub mod product;
pub mod transaction;
pub mod user;
pub mod wallet;

pub use exchange_request::{ExchangeRequest, ExchangeStatus, NewExchangeRequest};
pub use order::{NewOrder, NewShippingInfo, Order, ShippingInfo};
pub use payment::{NewPayment, Payment, PaymentGateway, PaymentReceipt, PaymentStatus};
pub use product::{Product, ProductStatus};
pub use transaction::{NewTransaction, Transaction, TransactionKind, TransactionStatus};
pub use user::User;
pub use wallet::Wallet;
