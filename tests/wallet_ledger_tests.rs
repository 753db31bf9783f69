//! Wallet ledger behavior: conservation of money, the append-only audit
//! trail, and the lock/insufficient-funds gates.

mod common;

use std::sync::Arc;

use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use bazaar_core::error::CoreError;
use bazaar_core::models::{NewTransaction, TransactionKind, TransactionStatus};
use bazaar_core::services::WalletLedger;
use bazaar_core::storage::WalletStore;

use common::test_storage;

#[tokio::test]
async fn test_create_wallet_twice_returns_conflict() {
    let storage = test_storage();
    let ledger = WalletLedger::new(storage.clone());

    let wallet = ledger.create_wallet(9).await.unwrap();
    assert_eq!(wallet.balance, Decimal::ZERO);
    assert!(!wallet.is_locked);

    let err = ledger.create_wallet(9).await.unwrap_err();
    assert!(matches!(err, CoreError::Conflict(_)));
    assert_eq!(err.status_code(), 409);

    // Exactly one wallet row survives
    let existing = ledger.wallet(9).await.unwrap();
    assert_eq!(existing.id, wallet.id);
}

#[tokio::test]
async fn test_deposit_rejects_non_positive_amounts() {
    let storage = test_storage();
    let ledger = WalletLedger::new(storage.clone());
    ledger.create_wallet(1).await.unwrap();

    for amount in [Decimal::ZERO, dec!(-5.00)] {
        let err = ledger.deposit(1, amount, None).await.unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }
    assert_eq!(ledger.balance(1).await.unwrap(), Decimal::ZERO);
    assert!(ledger.transactions(1).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_deposit_without_wallet_is_not_found() {
    let storage = test_storage();
    let ledger = WalletLedger::new(storage.clone());

    let err = ledger.deposit(42, dec!(10.00), None).await.unwrap_err();
    assert!(matches!(err, CoreError::NotFound(_)));
}

#[tokio::test]
async fn test_pay_debits_balance_and_records_transaction() {
    let storage = test_storage();
    let ledger = WalletLedger::new(storage.clone());
    ledger.create_wallet(1).await.unwrap();
    ledger.deposit(1, dec!(100.00), None).await.unwrap();

    let wallet = ledger
        .pay(1, dec!(30.00), 5, Some("toy".to_string()))
        .await
        .unwrap();
    assert_eq!(wallet.balance, dec!(70.00));

    let payments: Vec<_> = ledger
        .transactions(1)
        .await
        .unwrap()
        .into_iter()
        .filter(|t| t.kind == TransactionKind::Payment)
        .collect();
    assert_eq!(payments.len(), 1);
    assert_eq!(payments[0].amount, dec!(30.00));
    assert_eq!(payments[0].status, TransactionStatus::Completed);
    assert_eq!(payments[0].related_order_id, Some(5));
    assert!(payments[0]
        .description
        .as_deref()
        .unwrap()
        .contains("Order #5"));
}

#[tokio::test]
async fn test_pay_on_locked_wallet_is_forbidden() {
    let storage = test_storage();
    let ledger = WalletLedger::new(storage.clone());
    ledger.create_wallet(1).await.unwrap();
    ledger.deposit(1, dec!(100.00), None).await.unwrap();
    ledger.lock_wallet(1).await.unwrap();

    let err = ledger.pay(1, dec!(30.00), 5, None).await.unwrap_err();
    assert!(matches!(err, CoreError::Forbidden(_)));
    assert_eq!(err.status_code(), 403);
    assert_eq!(ledger.balance(1).await.unwrap(), dec!(100.00));
}

#[tokio::test]
async fn test_pay_with_insufficient_balance_is_rejected() {
    let storage = test_storage();
    let ledger = WalletLedger::new(storage.clone());
    ledger.create_wallet(1).await.unwrap();
    ledger.deposit(1, dec!(20.00), None).await.unwrap();

    let err = ledger.pay(1, dec!(30.00), 5, None).await.unwrap_err();
    assert!(matches!(err, CoreError::Validation(_)));
    assert_eq!(ledger.balance(1).await.unwrap(), dec!(20.00));
}

#[tokio::test]
async fn test_withdraw_with_insufficient_balance_is_rejected() {
    let storage = test_storage();
    let ledger = WalletLedger::new(storage.clone());
    ledger.create_wallet(1).await.unwrap();
    ledger.deposit(1, dec!(10.00), None).await.unwrap();

    let err = ledger.withdraw(1, dec!(10.01), None).await.unwrap_err();
    assert!(matches!(err, CoreError::Validation(_)));
    assert_eq!(ledger.balance(1).await.unwrap(), dec!(10.00));
}

// Observed platform behavior: only payments consult the lock flag.
#[tokio::test]
async fn test_locked_wallet_still_allows_deposit_and_withdraw() {
    let storage = test_storage();
    let ledger = WalletLedger::new(storage.clone());
    ledger.create_wallet(1).await.unwrap();
    ledger.deposit(1, dec!(50.00), None).await.unwrap();
    ledger.lock_wallet(1).await.unwrap();

    ledger.deposit(1, dec!(10.00), None).await.unwrap();
    let wallet = ledger.withdraw(1, dec!(20.00), None).await.unwrap();
    assert_eq!(wallet.balance, dec!(40.00));
}

#[tokio::test]
async fn test_refund_restores_balance_and_appends_new_entry() {
    let storage = test_storage();
    let ledger = WalletLedger::new(storage.clone());
    ledger.create_wallet(1).await.unwrap();
    ledger.deposit(1, dec!(100.00), None).await.unwrap();
    ledger.pay(1, dec!(30.00), 5, None).await.unwrap();

    let payment_tx = ledger
        .transactions(1)
        .await
        .unwrap()
        .into_iter()
        .find(|t| t.kind == TransactionKind::Payment)
        .unwrap();

    let wallet = ledger
        .refund(1, payment_tx.id, "item returned")
        .await
        .unwrap();
    assert_eq!(wallet.balance, dec!(100.00));

    let transactions = ledger.transactions(1).await.unwrap();
    let refunds: Vec<_> = transactions
        .iter()
        .filter(|t| t.kind == TransactionKind::Refund)
        .collect();
    assert_eq!(refunds.len(), 1);
    assert_eq!(refunds[0].amount, dec!(30.00));
    assert!(refunds[0]
        .description
        .as_deref()
        .unwrap()
        .contains("item returned"));

    // The original row is never mutated
    let original = ledger.transaction(1, payment_tx.id).await.unwrap();
    assert_eq!(original.kind, TransactionKind::Payment);
    assert_eq!(original.status, TransactionStatus::Completed);
    assert_eq!(original.amount, dec!(30.00));
}

#[tokio::test]
async fn test_refund_of_non_payment_is_rejected() {
    let storage = test_storage();
    let ledger = WalletLedger::new(storage.clone());
    ledger.create_wallet(1).await.unwrap();
    ledger.deposit(1, dec!(100.00), None).await.unwrap();

    let deposit_tx = ledger.transactions(1).await.unwrap().remove(0);
    let err = ledger.refund(1, deposit_tx.id, "oops").await.unwrap_err();
    assert!(matches!(err, CoreError::Validation(_)));
    assert_eq!(ledger.balance(1).await.unwrap(), dec!(100.00));
}

#[tokio::test]
async fn test_refund_of_foreign_transaction_is_not_found() {
    let storage = test_storage();
    let ledger = WalletLedger::new(storage.clone());
    ledger.create_wallet(1).await.unwrap();
    ledger.create_wallet(2).await.unwrap();
    ledger.deposit(2, dec!(100.00), None).await.unwrap();
    ledger.pay(2, dec!(30.00), 5, None).await.unwrap();

    let other_tx = ledger
        .transactions(2)
        .await
        .unwrap()
        .into_iter()
        .find(|t| t.kind == TransactionKind::Payment)
        .unwrap();

    let err = ledger.refund(1, other_tx.id, "not mine").await.unwrap_err();
    assert!(matches!(err, CoreError::NotFound(_)));
}

#[tokio::test]
async fn test_confirm_transaction_lifecycle() {
    let storage = test_storage();
    let ledger = WalletLedger::new(storage.clone());
    ledger.create_wallet(1).await.unwrap();

    // A pending entry, as an external settlement flow would leave it
    let (_, pending) = storage
        .apply_ledger_entry(
            1,
            dec!(15.00),
            false,
            NewTransaction {
                amount: dec!(15.00),
                kind: TransactionKind::Deposit,
                status: TransactionStatus::Pending,
                related_order_id: None,
                payment_id: None,
                description: None,
            },
        )
        .await
        .unwrap();

    ledger.confirm_transaction(pending.id).await.unwrap();
    let confirmed = ledger.transaction(1, pending.id).await.unwrap();
    assert_eq!(confirmed.status, TransactionStatus::Completed);

    // Confirming again must not duplicate the monetary effect
    let balance_before = ledger.balance(1).await.unwrap();
    let err = ledger.confirm_transaction(pending.id).await.unwrap_err();
    assert!(matches!(err, CoreError::Conflict(_)));
    assert_eq!(ledger.balance(1).await.unwrap(), balance_before);
}

#[tokio::test]
async fn test_confirm_cancelled_transaction_is_rejected() {
    let storage = test_storage();
    let ledger = WalletLedger::new(storage.clone());
    ledger.create_wallet(1).await.unwrap();

    let (_, tx) = storage
        .apply_ledger_entry(
            1,
            Decimal::ZERO,
            false,
            NewTransaction {
                amount: dec!(15.00),
                kind: TransactionKind::Deposit,
                status: TransactionStatus::Cancelled,
                related_order_id: None,
                payment_id: None,
                description: None,
            },
        )
        .await
        .unwrap();

    let err = ledger.confirm_transaction(tx.id).await.unwrap_err();
    assert!(matches!(err, CoreError::Validation(_)));
}

#[tokio::test]
async fn test_lock_twice_is_rejected_and_unlock_is_unconditional() {
    let storage = test_storage();
    let ledger = WalletLedger::new(storage.clone());
    ledger.create_wallet(1).await.unwrap();

    ledger.lock_wallet(1).await.unwrap();
    let err = ledger.lock_wallet(1).await.unwrap_err();
    assert!(matches!(err, CoreError::Validation(_)));

    ledger.unlock_wallet(1).await.unwrap();
    ledger.unlock_wallet(1).await.unwrap();
    assert!(!ledger.wallet(1).await.unwrap().is_locked);
}

#[tokio::test]
async fn test_link_payment_method() {
    let storage = test_storage();
    let ledger = WalletLedger::new(storage.clone());
    ledger.create_wallet(1).await.unwrap();

    ledger.link_payment_method(1, "visa-1234").await.unwrap();
    assert_eq!(
        ledger.wallet(1).await.unwrap().linked_payment_method.as_deref(),
        Some("visa-1234")
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_pays_cannot_overdraw() {
    let storage = test_storage();
    let ledger = Arc::new(WalletLedger::new(storage.clone()));
    ledger.create_wallet(1).await.unwrap();
    ledger.deposit(1, dec!(100.00), None).await.unwrap();

    // Funds cover only one of the two payments; the per-wallet critical
    // section must serialize them.
    let first = tokio::spawn({
        let ledger = ledger.clone();
        async move { ledger.pay(1, dec!(60.00), 7, None).await }
    });
    let second = tokio::spawn({
        let ledger = ledger.clone();
        async move { ledger.pay(1, dec!(60.00), 8, None).await }
    });

    let results = [first.await.unwrap(), second.await.unwrap()];
    let successes = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 1);
    assert_eq!(ledger.balance(1).await.unwrap(), dec!(40.00));
}

proptest! {
    // Any sequence of individually-successful ledger operations keeps the
    // committed balance non-negative.
    #[test]
    fn prop_balance_never_negative(ops in prop::collection::vec((0u8..3, 1i64..500), 1..40)) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        runtime.block_on(async move {
            let storage = test_storage();
            let ledger = WalletLedger::new(storage.clone());
            ledger.create_wallet(1).await.unwrap();

            for (kind, cents) in ops {
                let amount = Decimal::new(cents, 2);
                let result = match kind {
                    0 => ledger.deposit(1, amount, None).await,
                    1 => ledger.withdraw(1, amount, None).await,
                    _ => ledger.pay(1, amount, 1, None).await,
                };
                // Failures are fine; partial effects are not
                let _ = result;
                let balance = ledger.balance(1).await.unwrap();
                prop_assert!(balance >= Decimal::ZERO, "balance went negative: {balance}");
            }
            Ok(())
        })?;
    }
}
