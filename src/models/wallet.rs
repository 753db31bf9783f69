use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A user's balance account. One wallet per user; created explicitly,
/// never on demand. Mutated only through the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wallet {
    pub id: i64,
    pub user_id: i64,
    /// Non-negative at every committed state.
    pub balance: Decimal,
    /// Gate on payments; deposits and withdrawals ignore it.
    pub is_locked: bool,
    pub linked_payment_method: Option<String>,
    pub created_at: DateTime<Utc>,
}
