//! sqlx/Postgres gateway.
//!
//! Every unit of work named by the gateway contract is one database
//! transaction; wallet read-modify-writes take a `FOR UPDATE` row lock so
//! concurrent writers against the same wallet serialize. Duplicate
//! pending exchange requests are rejected by a partial unique index over
//! `(offered_product_id, requested_product_id) WHERE status = 'pending'`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use crate::models::{
    ExchangeRequest, ExchangeStatus, NewExchangeRequest, NewOrder, NewPayment, NewTransaction,
    Order, Payment, PaymentStatus, Product, ShippingInfo, Transaction, TransactionStatus, User,
    Wallet,
};
use crate::state_machine::states::OrderStatus;

use super::{
    ExchangeStore, OrderStatusUpdate, OrderStore, PaymentStore, ProductStore, StorageError,
    StorageResult, TransactionStore, UserStore, WalletStore,
};

#[derive(Debug, Clone)]
pub struct PgStorage {
    pool: PgPool,
}

impl PgStorage {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn parse_state<T: std::str::FromStr>(state: &str) -> StorageResult<T> {
    state
        .parse()
        .map_err(|_| StorageError::InvalidState { state: state.to_string() })
}

fn map_order_row(row: &PgRow) -> StorageResult<Order> {
    let status: String = row.try_get("status")?;
    let shipping_status: Option<String> = row.try_get("shipping_status")?;
    let shipping = match shipping_status {
        Some(shipping_status) => Some(ShippingInfo {
            recipient_name: row.try_get("recipient_name")?,
            address: row.try_get("address")?,
            city: row.try_get("city")?,
            postal_code: row.try_get("postal_code")?,
            phone_number: row.try_get("phone_number")?,
            status: parse_state(&shipping_status)?,
            fee: row.try_get("shipping_fee")?,
            method: row.try_get("shipping_method")?,
        }),
        None => None,
    };

    Ok(Order {
        id: row.try_get("id")?,
        product_id: row.try_get("product_id")?,
        buyer_id: row.try_get("buyer_id")?,
        seller_id: row.try_get("seller_id")?,
        total_amount: row.try_get("total_amount")?,
        platform_fee: row.try_get("platform_fee")?,
        seller_amount: row.try_get("seller_amount")?,
        status: parse_state(&status)?,
        created_at: row.try_get("created_at")?,
        paid_at: row.try_get("paid_at")?,
        completed_at: row.try_get("completed_at")?,
        shipping,
    })
}

const ORDER_SELECT: &str = r#"
    SELECT o.id, o.product_id, o.buyer_id, o.seller_id,
           o.total_amount, o.platform_fee, o.seller_amount,
           o.status, o.created_at, o.paid_at, o.completed_at,
           s.recipient_name, s.address, s.city, s.postal_code, s.phone_number,
           s.status AS shipping_status, s.fee AS shipping_fee, s.method AS shipping_method
    FROM bazaar_orders o
    LEFT JOIN bazaar_shipping_infos s ON s.order_id = o.id
"#;

fn map_wallet_row(row: &PgRow) -> StorageResult<Wallet> {
    Ok(Wallet {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        balance: row.try_get("balance")?,
        is_locked: row.try_get("is_locked")?,
        linked_payment_method: row.try_get("linked_payment_method")?,
        created_at: row.try_get("created_at")?,
    })
}

fn map_transaction_row(row: &PgRow) -> StorageResult<Transaction> {
    let kind: String = row.try_get("kind")?;
    let status: String = row.try_get("status")?;
    Ok(Transaction {
        id: row.try_get("id")?,
        wallet_id: row.try_get("wallet_id")?,
        amount: row.try_get("amount")?,
        kind: parse_state(&kind)?,
        status: parse_state(&status)?,
        related_order_id: row.try_get("related_order_id")?,
        payment_id: row.try_get("payment_id")?,
        description: row.try_get("description")?,
        created_at: row.try_get("created_at")?,
    })
}

fn map_payment_row(row: &PgRow) -> StorageResult<Payment> {
    let gateway: String = row.try_get("gateway")?;
    let status: String = row.try_get("status")?;
    Ok(Payment {
        id: row.try_get("id")?,
        amount: row.try_get("amount")?,
        user_id: row.try_get("user_id")?,
        order_id: row.try_get("order_id")?,
        gateway: parse_state(&gateway)?,
        gateway_reference: row.try_get("gateway_reference")?,
        description: row.try_get("description")?,
        status: parse_state(&status)?,
        created_at: row.try_get("created_at")?,
    })
}

fn map_exchange_row(row: &PgRow) -> StorageResult<ExchangeRequest> {
    let status: String = row.try_get("status")?;
    Ok(ExchangeRequest {
        id: row.try_get("id")?,
        offered_product_id: row.try_get("offered_product_id")?,
        requested_product_id: row.try_get("requested_product_id")?,
        status: parse_state(&status)?,
        message: row.try_get("message")?,
        requested_at: row.try_get("requested_at")?,
        responded_at: row.try_get("responded_at")?,
        completed_at: row.try_get("completed_at")?,
    })
}

#[async_trait]
impl OrderStore for PgStorage {
    async fn add_order(&self, new_order: NewOrder) -> StorageResult<Order> {
        let mut tx = self.pool.begin().await?;

        let order_row = sqlx::query(
            r#"
            INSERT INTO bazaar_orders
                (product_id, buyer_id, seller_id, total_amount, platform_fee, seller_amount,
                 status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, NOW())
            RETURNING id, created_at
            "#,
        )
        .bind(new_order.product_id)
        .bind(new_order.buyer_id)
        .bind(new_order.seller_id)
        .bind(new_order.total_amount)
        .bind(new_order.platform_fee)
        .bind(new_order.seller_amount)
        .bind(OrderStatus::Pending.to_string())
        .fetch_one(&mut *tx)
        .await?;

        let order_id: i64 = order_row.try_get("id")?;
        let created_at: DateTime<Utc> = order_row.try_get("created_at")?;
        let shipping = new_order.shipping.into_shipping_info();

        sqlx::query(
            r#"
            INSERT INTO bazaar_shipping_infos
                (order_id, recipient_name, address, city, postal_code, phone_number,
                 status, fee, method)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(order_id)
        .bind(&shipping.recipient_name)
        .bind(&shipping.address)
        .bind(&shipping.city)
        .bind(&shipping.postal_code)
        .bind(&shipping.phone_number)
        .bind(shipping.status.to_string())
        .bind(shipping.fee)
        .bind(&shipping.method)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Order {
            id: order_id,
            product_id: new_order.product_id,
            buyer_id: new_order.buyer_id,
            seller_id: new_order.seller_id,
            total_amount: new_order.total_amount,
            platform_fee: new_order.platform_fee,
            seller_amount: new_order.seller_amount,
            status: OrderStatus::Pending,
            created_at,
            paid_at: None,
            completed_at: None,
            shipping: Some(shipping),
        })
    }

    async fn find_order(&self, order_id: i64) -> StorageResult<Option<Order>> {
        let row = sqlx::query(&format!("{ORDER_SELECT} WHERE o.id = $1"))
            .bind(order_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(map_order_row).transpose()
    }

    async fn save_status(&self, update: OrderStatusUpdate) -> StorageResult<()> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE bazaar_orders
            SET status = $2,
                paid_at = COALESCE(paid_at, $3),
                completed_at = COALESCE($4, completed_at)
            WHERE id = $1
            "#,
        )
        .bind(update.order_id)
        .bind(update.status.to_string())
        .bind(update.paid_at)
        .bind(update.completed_at)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::not_found("Order"));
        }

        if let Some(shipping_status) = update.shipping_status {
            sqlx::query("UPDATE bazaar_shipping_infos SET status = $2 WHERE order_id = $1")
                .bind(update.order_id)
                .bind(shipping_status.to_string())
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn orders_by_user(&self, user_id: i64) -> StorageResult<Vec<Order>> {
        let rows = sqlx::query(&format!(
            "{ORDER_SELECT} WHERE o.buyer_id = $1 OR o.seller_id = $1 ORDER BY o.created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(map_order_row).collect()
    }

    async fn orders_by_buyer(&self, buyer_id: i64) -> StorageResult<Vec<Order>> {
        let rows = sqlx::query(&format!(
            "{ORDER_SELECT} WHERE o.buyer_id = $1 ORDER BY o.created_at DESC"
        ))
        .bind(buyer_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(map_order_row).collect()
    }

    async fn orders_by_seller(&self, seller_id: i64) -> StorageResult<Vec<Order>> {
        let rows = sqlx::query(&format!(
            "{ORDER_SELECT} WHERE o.seller_id = $1 ORDER BY o.created_at DESC"
        ))
        .bind(seller_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(map_order_row).collect()
    }

    async fn can_buyer_cancel(&self, order_id: i64, buyer_id: i64) -> StorageResult<bool> {
        let row = sqlx::query(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM bazaar_orders
                WHERE id = $1 AND buyer_id = $2 AND status = $3
            ) AS can_cancel
            "#,
        )
        .bind(order_id)
        .bind(buyer_id)
        .bind(OrderStatus::Pending.to_string())
        .fetch_one(&self.pool)
        .await?;
        Ok(row.try_get("can_cancel")?)
    }
}

#[async_trait]
impl ProductStore for PgStorage {
    async fn find_product(&self, product_id: i64) -> StorageResult<Option<Product>> {
        let row = sqlx::query(
            "SELECT id, user_id, title, price, status, created_at FROM bazaar_products WHERE id = $1",
        )
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| {
            let status: String = row.try_get("status")?;
            Ok(Product {
                id: row.try_get("id")?,
                user_id: row.try_get("user_id")?,
                title: row.try_get("title")?,
                price: row.try_get("price")?,
                status: parse_state(&status)?,
                created_at: row.try_get("created_at")?,
            })
        })
        .transpose()
    }
}

#[async_trait]
impl UserStore for PgStorage {
    async fn find_user(&self, user_id: i64) -> StorageResult<Option<User>> {
        let row = sqlx::query("SELECT id, full_name FROM bazaar_users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| {
            Ok(User {
                id: row.try_get("id")?,
                full_name: row.try_get("full_name")?,
            })
        })
        .transpose()
    }
}

const WALLET_SELECT: &str =
    "SELECT id, user_id, balance, is_locked, linked_payment_method, created_at FROM bazaar_wallets";

#[async_trait]
impl WalletStore for PgStorage {
    async fn add_wallet(&self, user_id: i64) -> StorageResult<Wallet> {
        let row = sqlx::query(
            r#"
            INSERT INTO bazaar_wallets (user_id, balance, is_locked, created_at)
            VALUES ($1, 0, FALSE, NOW())
            ON CONFLICT (user_id) DO NOTHING
            RETURNING id, user_id, balance, is_locked, linked_payment_method, created_at
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => map_wallet_row(&row),
            None => Err(StorageError::Conflict("Wallet already exists".into())),
        }
    }

    async fn find_wallet_by_user(&self, user_id: i64) -> StorageResult<Option<Wallet>> {
        let row = sqlx::query(&format!("{WALLET_SELECT} WHERE user_id = $1"))
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(map_wallet_row).transpose()
    }

    async fn wallet_exists_for_user(&self, user_id: i64) -> StorageResult<bool> {
        let row =
            sqlx::query("SELECT EXISTS(SELECT 1 FROM bazaar_wallets WHERE user_id = $1) AS found")
                .bind(user_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(row.try_get("found")?)
    }

    async fn set_wallet_locked(&self, user_id: i64, locked: bool) -> StorageResult<()> {
        let result = sqlx::query("UPDATE bazaar_wallets SET is_locked = $2 WHERE user_id = $1")
            .bind(user_id)
            .bind(locked)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StorageError::not_found("Wallet"));
        }
        Ok(())
    }

    async fn link_payment_method(&self, user_id: i64, method: &str) -> StorageResult<()> {
        let result =
            sqlx::query("UPDATE bazaar_wallets SET linked_payment_method = $2 WHERE user_id = $1")
                .bind(user_id)
                .bind(method)
                .execute(&self.pool)
                .await?;
        if result.rows_affected() == 0 {
            return Err(StorageError::not_found("Wallet"));
        }
        Ok(())
    }

    async fn apply_ledger_entry(
        &self,
        user_id: i64,
        delta: Decimal,
        require_unlocked: bool,
        entry: NewTransaction,
    ) -> StorageResult<(Wallet, Transaction)> {
        let mut tx = self.pool.begin().await?;

        // Row lock held until commit: the balance check, the balance
        // write, and the ledger insert form one critical section.
        let row = sqlx::query(&format!("{WALLET_SELECT} WHERE user_id = $1 FOR UPDATE"))
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| StorageError::not_found("Wallet"))?;
        let mut wallet = map_wallet_row(&row)?;

        if require_unlocked && wallet.is_locked {
            return Err(StorageError::WalletLocked);
        }
        let new_balance = wallet.balance + delta;
        if new_balance < Decimal::ZERO {
            return Err(StorageError::InsufficientFunds);
        }

        sqlx::query("UPDATE bazaar_wallets SET balance = $2 WHERE id = $1")
            .bind(wallet.id)
            .bind(new_balance)
            .execute(&mut *tx)
            .await?;

        let tx_row = sqlx::query(
            r#"
            INSERT INTO bazaar_transactions
                (wallet_id, amount, kind, status, related_order_id, payment_id, description,
                 created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, NOW())
            RETURNING id, created_at
            "#,
        )
        .bind(wallet.id)
        .bind(entry.amount)
        .bind(entry.kind.to_string())
        .bind(entry.status.to_string())
        .bind(entry.related_order_id)
        .bind(entry.payment_id)
        .bind(&entry.description)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        wallet.balance = new_balance;
        let transaction = Transaction {
            id: tx_row.try_get("id")?,
            wallet_id: wallet.id,
            amount: entry.amount,
            kind: entry.kind,
            status: entry.status,
            related_order_id: entry.related_order_id,
            payment_id: entry.payment_id,
            description: entry.description,
            created_at: tx_row.try_get("created_at")?,
        };
        Ok((wallet, transaction))
    }
}

const TRANSACTION_SELECT: &str = r#"
    SELECT id, wallet_id, amount, kind, status, related_order_id, payment_id, description,
           created_at
    FROM bazaar_transactions
"#;

#[async_trait]
impl TransactionStore for PgStorage {
    async fn find_transaction(&self, transaction_id: i64) -> StorageResult<Option<Transaction>> {
        let row = sqlx::query(&format!("{TRANSACTION_SELECT} WHERE id = $1"))
            .bind(transaction_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(map_transaction_row).transpose()
    }

    async fn find_transaction_for_wallet(
        &self,
        transaction_id: i64,
        wallet_id: i64,
    ) -> StorageResult<Option<Transaction>> {
        let row = sqlx::query(&format!(
            "{TRANSACTION_SELECT} WHERE id = $1 AND wallet_id = $2"
        ))
        .bind(transaction_id)
        .bind(wallet_id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(map_transaction_row).transpose()
    }

    async fn transactions_by_wallet(&self, wallet_id: i64) -> StorageResult<Vec<Transaction>> {
        let rows = sqlx::query(&format!(
            "{TRANSACTION_SELECT} WHERE wallet_id = $1 ORDER BY created_at DESC, id DESC"
        ))
        .bind(wallet_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(map_transaction_row).collect()
    }

    async fn set_transaction_status(
        &self,
        transaction_id: i64,
        status: TransactionStatus,
    ) -> StorageResult<bool> {
        let result = sqlx::query("UPDATE bazaar_transactions SET status = $2 WHERE id = $1")
            .bind(transaction_id)
            .bind(status.to_string())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

const PAYMENT_SELECT: &str = r#"
    SELECT id, amount, user_id, order_id, gateway, gateway_reference, description, status,
           created_at
    FROM bazaar_payments
"#;

#[async_trait]
impl PaymentStore for PgStorage {
    async fn add_payment(
        &self,
        new_payment: NewPayment,
        status: PaymentStatus,
        gateway_reference: Option<String>,
    ) -> StorageResult<Payment> {
        let row = sqlx::query(
            r#"
            INSERT INTO bazaar_payments
                (amount, user_id, order_id, gateway, gateway_reference, description, status,
                 created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, NOW())
            RETURNING id, created_at
            "#,
        )
        .bind(new_payment.amount)
        .bind(new_payment.user_id)
        .bind(new_payment.order_id)
        .bind(new_payment.gateway.to_string())
        .bind(&gateway_reference)
        .bind(&new_payment.description)
        .bind(status.to_string())
        .fetch_one(&self.pool)
        .await?;

        Ok(Payment {
            id: row.try_get("id")?,
            amount: new_payment.amount,
            user_id: new_payment.user_id,
            order_id: new_payment.order_id,
            gateway: new_payment.gateway,
            gateway_reference,
            description: new_payment.description,
            status,
            created_at: row.try_get("created_at")?,
        })
    }

    async fn find_payment(&self, payment_id: i64) -> StorageResult<Option<Payment>> {
        let row = sqlx::query(&format!("{PAYMENT_SELECT} WHERE id = $1"))
            .bind(payment_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(map_payment_row).transpose()
    }

    async fn payments_by_user(&self, user_id: i64) -> StorageResult<Vec<Payment>> {
        let rows = sqlx::query(&format!(
            "{PAYMENT_SELECT} WHERE user_id = $1 ORDER BY created_at DESC, id DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(map_payment_row).collect()
    }

    async fn settle_payment(
        &self,
        new_payment: NewPayment,
        gateway_reference: String,
        entry_description: String,
    ) -> StorageResult<(Payment, Wallet, Transaction)> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(&format!("{WALLET_SELECT} WHERE user_id = $1 FOR UPDATE"))
            .bind(new_payment.user_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| StorageError::not_found("Wallet"))?;
        let mut wallet = map_wallet_row(&row)?;

        if wallet.is_locked {
            return Err(StorageError::WalletLocked);
        }
        let new_balance = wallet.balance - new_payment.amount;
        if new_balance < Decimal::ZERO {
            return Err(StorageError::InsufficientFunds);
        }

        let payment_row = sqlx::query(
            r#"
            INSERT INTO bazaar_payments
                (amount, user_id, order_id, gateway, gateway_reference, description, status,
                 created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, NOW())
            RETURNING id, created_at
            "#,
        )
        .bind(new_payment.amount)
        .bind(new_payment.user_id)
        .bind(new_payment.order_id)
        .bind(new_payment.gateway.to_string())
        .bind(&gateway_reference)
        .bind(&new_payment.description)
        .bind(PaymentStatus::Completed.to_string())
        .fetch_one(&mut *tx)
        .await?;
        let payment_id: i64 = payment_row.try_get("id")?;

        sqlx::query("UPDATE bazaar_wallets SET balance = $2 WHERE id = $1")
            .bind(wallet.id)
            .bind(new_balance)
            .execute(&mut *tx)
            .await?;

        let tx_row = sqlx::query(
            r#"
            INSERT INTO bazaar_transactions
                (wallet_id, amount, kind, status, related_order_id, payment_id, description,
                 created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, NOW())
            RETURNING id, created_at
            "#,
        )
        .bind(wallet.id)
        .bind(new_payment.amount)
        .bind(crate::models::TransactionKind::Payment.to_string())
        .bind(TransactionStatus::Completed.to_string())
        .bind(new_payment.order_id)
        .bind(payment_id)
        .bind(&entry_description)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        wallet.balance = new_balance;
        let payment = Payment {
            id: payment_id,
            amount: new_payment.amount,
            user_id: new_payment.user_id,
            order_id: new_payment.order_id,
            gateway: new_payment.gateway,
            gateway_reference: Some(gateway_reference),
            description: new_payment.description,
            status: PaymentStatus::Completed,
            created_at: payment_row.try_get("created_at")?,
        };
        let transaction = Transaction {
            id: tx_row.try_get("id")?,
            wallet_id: wallet.id,
            amount: payment.amount,
            kind: crate::models::TransactionKind::Payment,
            status: TransactionStatus::Completed,
            related_order_id: payment.order_id,
            payment_id: Some(payment.id),
            description: Some(entry_description),
            created_at: tx_row.try_get("created_at")?,
        };
        Ok((payment, wallet, transaction))
    }
}

const EXCHANGE_SELECT: &str = r#"
    SELECT e.id, e.offered_product_id, e.requested_product_id, e.status, e.message,
           e.requested_at, e.responded_at, e.completed_at
    FROM bazaar_exchange_requests e
"#;

#[async_trait]
impl ExchangeStore for PgStorage {
    async fn add_exchange_request(
        &self,
        request: NewExchangeRequest,
    ) -> StorageResult<ExchangeRequest> {
        let row = sqlx::query(
            r#"
            INSERT INTO bazaar_exchange_requests
                (offered_product_id, requested_product_id, status, message, requested_at)
            VALUES ($1, $2, $3, $4, NOW())
            RETURNING id, requested_at
            "#,
        )
        .bind(request.offered_product_id)
        .bind(request.requested_product_id)
        .bind(ExchangeStatus::Pending.to_string())
        .bind(&request.message)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if e.as_database_error()
                .is_some_and(|db| db.is_unique_violation())
            {
                StorageError::Conflict(
                    "A pending request already exists between these products".into(),
                )
            } else {
                StorageError::Database(e)
            }
        })?;

        Ok(ExchangeRequest {
            id: row.try_get("id")?,
            offered_product_id: request.offered_product_id,
            requested_product_id: request.requested_product_id,
            status: ExchangeStatus::Pending,
            message: request.message,
            requested_at: row.try_get("requested_at")?,
            responded_at: None,
            completed_at: None,
        })
    }

    async fn find_exchange_request(
        &self,
        request_id: i64,
    ) -> StorageResult<Option<ExchangeRequest>> {
        let row = sqlx::query(&format!("{EXCHANGE_SELECT} WHERE e.id = $1"))
            .bind(request_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(map_exchange_row).transpose()
    }

    async fn has_pending_between(
        &self,
        offered_product_id: i64,
        requested_product_id: i64,
    ) -> StorageResult<bool> {
        let row = sqlx::query(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM bazaar_exchange_requests
                WHERE offered_product_id = $1 AND requested_product_id = $2 AND status = $3
            ) AS found
            "#,
        )
        .bind(offered_product_id)
        .bind(requested_product_id)
        .bind(ExchangeStatus::Pending.to_string())
        .fetch_one(&self.pool)
        .await?;
        Ok(row.try_get("found")?)
    }

    async fn find_pending_for_response(
        &self,
        request_id: i64,
        responder_user_id: i64,
    ) -> StorageResult<Option<ExchangeRequest>> {
        let row = sqlx::query(&format!(
            r#"{EXCHANGE_SELECT}
            JOIN bazaar_products requested ON requested.id = e.requested_product_id
            WHERE e.id = $1 AND e.status = $2 AND requested.user_id = $3
            "#
        ))
        .bind(request_id)
        .bind(ExchangeStatus::Pending.to_string())
        .bind(responder_user_id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(map_exchange_row).transpose()
    }

    async fn find_pending_for_deletion(
        &self,
        request_id: i64,
        user_id: i64,
    ) -> StorageResult<Option<ExchangeRequest>> {
        let row = sqlx::query(&format!(
            r#"{EXCHANGE_SELECT}
            JOIN bazaar_products offered ON offered.id = e.offered_product_id
            JOIN bazaar_products requested ON requested.id = e.requested_product_id
            WHERE e.id = $1 AND e.status = $2
              AND (offered.user_id = $3 OR requested.user_id = $3)
            "#
        ))
        .bind(request_id)
        .bind(ExchangeStatus::Pending.to_string())
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(map_exchange_row).transpose()
    }

    async fn set_exchange_status(
        &self,
        request_id: i64,
        status: ExchangeStatus,
        responded_at: DateTime<Utc>,
        completed_at: Option<DateTime<Utc>>,
    ) -> StorageResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE bazaar_exchange_requests
            SET status = $2, responded_at = $3, completed_at = COALESCE($4, completed_at)
            WHERE id = $1
            "#,
        )
        .bind(request_id)
        .bind(status.to_string())
        .bind(responded_at)
        .bind(completed_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_exchange_request(&self, request_id: i64) -> StorageResult<bool> {
        let result = sqlx::query("DELETE FROM bazaar_exchange_requests WHERE id = $1")
            .bind(request_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn exchange_requests_sent_by(&self, user_id: i64) -> StorageResult<Vec<ExchangeRequest>> {
        let rows = sqlx::query(&format!(
            r#"{EXCHANGE_SELECT}
            JOIN bazaar_products offered ON offered.id = e.offered_product_id
            WHERE offered.user_id = $1
            ORDER BY e.requested_at DESC, e.id DESC
            "#
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(map_exchange_row).collect()
    }

    async fn exchange_requests_received_by(
        &self,
        user_id: i64,
    ) -> StorageResult<Vec<ExchangeRequest>> {
        let rows = sqlx::query(&format!(
            r#"{EXCHANGE_SELECT}
            JOIN bazaar_products requested ON requested.id = e.requested_product_id
            WHERE requested.user_id = $1
            ORDER BY e.requested_at DESC, e.id DESC
            "#
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(map_exchange_row).collect()
    }
}
