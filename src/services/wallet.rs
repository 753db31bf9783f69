use std::sync::Arc;

use rust_decimal::Decimal;

use crate::error::{CoreError, Result};
use crate::models::{
    NewTransaction, Transaction, TransactionKind, TransactionStatus, Wallet,
};
use crate::storage::Storage;

/// The wallet ledger: balance mutation plus the append-only transaction
/// audit trail, one wallet per user.
///
/// Every balance write commits together with its ledger entry as one
/// gateway unit of work, and the gateway re-checks balance and lock
/// inside the per-wallet critical section. Deposits and withdrawals
/// ignore the lock flag; only payments honor it.
pub struct WalletLedger {
    storage: Arc<dyn Storage>,
}

impl WalletLedger {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Create the user's wallet with a zero balance.
    pub async fn create_wallet(&self, user_id: i64) -> Result<Wallet> {
        let wallet = self.storage.add_wallet(user_id).await?;
        tracing::info!(user_id, wallet_id = wallet.id, "Wallet created");
        Ok(wallet)
    }

    /// Credit the wallet. Always allowed, locked or not.
    pub async fn deposit(
        &self,
        user_id: i64,
        amount: Decimal,
        description: Option<String>,
    ) -> Result<Wallet> {
        if amount <= Decimal::ZERO {
            return Err(CoreError::Validation(
                "Amount must be greater than zero".into(),
            ));
        }

        let (wallet, transaction) = self
            .storage
            .apply_ledger_entry(
                user_id,
                amount,
                false,
                NewTransaction::completed(TransactionKind::Deposit, amount, description),
            )
            .await?;

        tracing::info!(
            user_id,
            transaction_id = transaction.id,
            %amount,
            balance = %wallet.balance,
            "Deposit recorded"
        );
        Ok(wallet)
    }

    /// Debit the wallet without an order attached.
    pub async fn withdraw(
        &self,
        user_id: i64,
        amount: Decimal,
        description: Option<String>,
    ) -> Result<Wallet> {
        let current = self.wallet(user_id).await?;
        if current.balance < amount {
            return Err(CoreError::Validation("Insufficient balance".into()));
        }

        let (wallet, transaction) = self
            .storage
            .apply_ledger_entry(
                user_id,
                -amount,
                false,
                NewTransaction::completed(TransactionKind::Withdraw, amount, description),
            )
            .await?;

        tracing::info!(
            user_id,
            transaction_id = transaction.id,
            %amount,
            balance = %wallet.balance,
            "Withdrawal recorded"
        );
        Ok(wallet)
    }

    /// Debit the wallet to pay for an order.
    pub async fn pay(
        &self,
        user_id: i64,
        amount: Decimal,
        order_id: i64,
        description: Option<String>,
    ) -> Result<Wallet> {
        let current = self.wallet(user_id).await?;
        if current.is_locked {
            return Err(CoreError::Forbidden("Wallet is locked".into()));
        }
        if current.balance < amount {
            return Err(CoreError::Validation("Insufficient balance".into()));
        }

        let entry_description = match &description {
            Some(description) => format!("Payment for Order #{order_id} - {description}"),
            None => format!("Payment for Order #{order_id}"),
        };
        let (wallet, transaction) = self
            .storage
            .apply_ledger_entry(
                user_id,
                -amount,
                true,
                NewTransaction {
                    amount,
                    kind: TransactionKind::Payment,
                    status: TransactionStatus::Completed,
                    related_order_id: Some(order_id),
                    payment_id: None,
                    description: Some(entry_description),
                },
            )
            .await?;

        tracing::info!(
            user_id,
            order_id,
            transaction_id = transaction.id,
            %amount,
            balance = %wallet.balance,
            "Payment recorded"
        );
        Ok(wallet)
    }

    /// Reverse a completed payment by appending a new `Refund` entry;
    /// the original row is never mutated.
    pub async fn refund(
        &self,
        user_id: i64,
        transaction_id: i64,
        reason: &str,
    ) -> Result<Wallet> {
        let current = self.wallet(user_id).await?;

        let original = self
            .storage
            .find_transaction_for_wallet(transaction_id, current.id)
            .await?
            .ok_or_else(|| CoreError::not_found("Original transaction"))?;

        if original.kind != TransactionKind::Payment {
            return Err(CoreError::Validation("Only payments can be refunded".into()));
        }
        if original.status != TransactionStatus::Completed {
            return Err(CoreError::Validation("Transaction is not completed".into()));
        }

        let (wallet, refund) = self
            .storage
            .apply_ledger_entry(
                user_id,
                original.amount,
                false,
                NewTransaction::completed(
                    TransactionKind::Refund,
                    original.amount,
                    Some(format!("Refund for Transaction #{transaction_id} - {reason}")),
                ),
            )
            .await?;

        tracing::info!(
            user_id,
            original_transaction_id = transaction_id,
            refund_transaction_id = refund.id,
            amount = %original.amount,
            balance = %wallet.balance,
            "Refund recorded"
        );
        Ok(wallet)
    }

    pub async fn lock_wallet(&self, user_id: i64) -> Result<()> {
        let wallet = self.wallet(user_id).await?;
        if wallet.is_locked {
            return Err(CoreError::Validation("Wallet is already locked".into()));
        }
        self.storage.set_wallet_locked(user_id, true).await?;
        tracing::info!(user_id, "Wallet locked");
        Ok(())
    }

    pub async fn unlock_wallet(&self, user_id: i64) -> Result<()> {
        self.storage.set_wallet_locked(user_id, false).await?;
        tracing::info!(user_id, "Wallet unlocked");
        Ok(())
    }

    pub async fn link_payment_method(&self, user_id: i64, method_name: &str) -> Result<()> {
        self.storage.link_payment_method(user_id, method_name).await?;
        tracing::info!(user_id, method = method_name, "Payment method linked");
        Ok(())
    }

    /// Advance a pending transaction to completed.
    pub async fn confirm_transaction(&self, transaction_id: i64) -> Result<()> {
        let transaction = self
            .storage
            .find_transaction(transaction_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Transaction"))?;

        match transaction.status {
            TransactionStatus::Completed => {
                Err(CoreError::Conflict("Transaction already completed".into()))
            }
            status if status.is_terminal_failure() => Err(CoreError::Validation(
                "Cannot confirm a failed or cancelled transaction".into(),
            )),
            _ => {
                self.storage
                    .set_transaction_status(transaction_id, TransactionStatus::Completed)
                    .await?;
                tracing::info!(transaction_id, "Transaction confirmed");
                Ok(())
            }
        }
    }

    pub async fn wallet(&self, user_id: i64) -> Result<Wallet> {
        self.storage
            .find_wallet_by_user(user_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Wallet"))
    }

    pub async fn balance(&self, user_id: i64) -> Result<Decimal> {
        Ok(self.wallet(user_id).await?.balance)
    }

    /// Ledger entries for the user's wallet, newest first.
    pub async fn transactions(&self, user_id: i64) -> Result<Vec<Transaction>> {
        let wallet = self.wallet(user_id).await?;
        Ok(self.storage.transactions_by_wallet(wallet.id).await?)
    }

    pub async fn transaction(&self, user_id: i64, transaction_id: i64) -> Result<Transaction> {
        let wallet = self.wallet(user_id).await?;
        self.storage
            .find_transaction_for_wallet(transaction_id, wallet.id)
            .await?
            .ok_or_else(|| CoreError::not_found("Transaction"))
    }
}
