//! Service layer: the wallet ledger, the payment-to-wallet bridge, the
//! exchange workflow, and order intake/administration. Each service owns
//! its business checks and talks to the Persistence Gateway for the
//! atomic parts.

pub mod exchange;
pub mod order;
pub mod payment;
pub mod wallet;

pub use exchange::ExchangeService;
pub use order::{CreateOrder, OrderService};
pub use payment::PaymentBridge;
pub use wallet::WalletLedger;
