//! In-process gateway used by the test suite and embedded callers.
//!
//! Entity maps are `DashMap`s; holding a map entry mutably is the
//! per-wallet writer lock, so a balance read-modify-write and its ledger
//! insert happen while no other writer can touch the same wallet.
//! Pending exchange pairs are claimed through a `DashSet` so the
//! duplicate-pending check and the insert are one atomic step.

use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::{DashMap, DashSet};
use rust_decimal::Decimal;

use crate::models::{
    ExchangeRequest, ExchangeStatus, NewExchangeRequest, NewOrder, NewPayment, NewTransaction,
    Order, Payment, PaymentStatus, Product, Transaction, TransactionStatus, User, Wallet,
};
use crate::state_machine::states::OrderStatus;

use super::{
    ExchangeStore, OrderStatusUpdate, OrderStore, PaymentStore, ProductStore, StorageError,
    StorageResult, TransactionStore, UserStore, WalletStore,
};

#[derive(Debug, Default)]
pub struct MemoryStorage {
    orders: DashMap<i64, Order>,
    products: DashMap<i64, Product>,
    users: DashMap<i64, User>,
    /// Keyed by user id (wallets are 1:1 with users).
    wallets: DashMap<i64, Wallet>,
    transactions: DashMap<i64, Transaction>,
    payments: DashMap<i64, Payment>,
    exchange_requests: DashMap<i64, ExchangeRequest>,
    /// Product pairs with a live Pending exchange request.
    pending_pairs: DashSet<(i64, i64)>,
    next_order_id: AtomicI64,
    next_wallet_id: AtomicI64,
    next_transaction_id: AtomicI64,
    next_payment_id: AtomicI64,
    next_exchange_id: AtomicI64,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(counter: &AtomicI64) -> i64 {
        counter.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Seed a user (collaborator data; not part of the gateway contract).
    pub fn insert_user(&self, user: User) {
        self.users.insert(user.id, user);
    }

    /// Seed a product (collaborator data; not part of the gateway contract).
    pub fn insert_product(&self, product: Product) {
        self.products.insert(product.id, product);
    }

    /// Seed an order in an arbitrary state, for drift and repair
    /// scenarios that cannot be reached through the validating machines.
    pub fn insert_order(&self, order: Order) {
        self.next_order_id.fetch_max(order.id, Ordering::Relaxed);
        self.orders.insert(order.id, order);
    }

    fn build_transaction(&self, wallet_id: i64, entry: NewTransaction) -> Transaction {
        Transaction {
            id: Self::next_id(&self.next_transaction_id),
            wallet_id,
            amount: entry.amount,
            kind: entry.kind,
            status: entry.status,
            related_order_id: entry.related_order_id,
            payment_id: entry.payment_id,
            description: entry.description,
            created_at: Utc::now(),
        }
    }

    fn product_owner(&self, product_id: i64) -> Option<i64> {
        self.products.get(&product_id).map(|p| p.user_id)
    }
}

#[async_trait]
impl OrderStore for MemoryStorage {
    async fn add_order(&self, new_order: NewOrder) -> StorageResult<Order> {
        let order = Order {
            id: Self::next_id(&self.next_order_id),
            product_id: new_order.product_id,
            buyer_id: new_order.buyer_id,
            seller_id: new_order.seller_id,
            total_amount: new_order.total_amount,
            platform_fee: new_order.platform_fee,
            seller_amount: new_order.seller_amount,
            status: OrderStatus::Pending,
            created_at: Utc::now(),
            paid_at: None,
            completed_at: None,
            shipping: Some(new_order.shipping.into_shipping_info()),
        };
        self.orders.insert(order.id, order.clone());
        Ok(order)
    }

    async fn find_order(&self, order_id: i64) -> StorageResult<Option<Order>> {
        Ok(self.orders.get(&order_id).map(|o| o.value().clone()))
    }

    async fn save_status(&self, update: OrderStatusUpdate) -> StorageResult<()> {
        let mut order = self
            .orders
            .get_mut(&update.order_id)
            .ok_or_else(|| StorageError::not_found("Order"))?;

        order.status = update.status;
        if order.paid_at.is_none() {
            if let Some(paid_at) = update.paid_at {
                order.paid_at = Some(paid_at);
            }
        }
        if let Some(completed_at) = update.completed_at {
            order.completed_at = Some(completed_at);
        }
        if let Some(shipping_status) = update.shipping_status {
            if let Some(shipping) = order.shipping.as_mut() {
                shipping.status = shipping_status;
            }
        }
        Ok(())
    }

    async fn orders_by_user(&self, user_id: i64) -> StorageResult<Vec<Order>> {
        let mut orders: Vec<Order> = self
            .orders
            .iter()
            .filter(|o| o.buyer_id == user_id || o.seller_id == user_id)
            .map(|o| o.value().clone())
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn orders_by_buyer(&self, buyer_id: i64) -> StorageResult<Vec<Order>> {
        let mut orders: Vec<Order> = self
            .orders
            .iter()
            .filter(|o| o.buyer_id == buyer_id)
            .map(|o| o.value().clone())
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn orders_by_seller(&self, seller_id: i64) -> StorageResult<Vec<Order>> {
        let mut orders: Vec<Order> = self
            .orders
            .iter()
            .filter(|o| o.seller_id == seller_id)
            .map(|o| o.value().clone())
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn can_buyer_cancel(&self, order_id: i64, buyer_id: i64) -> StorageResult<bool> {
        Ok(self
            .orders
            .get(&order_id)
            .map(|o| o.buyer_id == buyer_id && o.status == OrderStatus::Pending)
            .unwrap_or(false))
    }
}

#[async_trait]
impl ProductStore for MemoryStorage {
    async fn find_product(&self, product_id: i64) -> StorageResult<Option<Product>> {
        Ok(self.products.get(&product_id).map(|p| p.value().clone()))
    }
}

#[async_trait]
impl UserStore for MemoryStorage {
    async fn find_user(&self, user_id: i64) -> StorageResult<Option<User>> {
        Ok(self.users.get(&user_id).map(|u| u.value().clone()))
    }
}

#[async_trait]
impl WalletStore for MemoryStorage {
    async fn add_wallet(&self, user_id: i64) -> StorageResult<Wallet> {
        match self.wallets.entry(user_id) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                Err(StorageError::Conflict("Wallet already exists".into()))
            }
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                let wallet = Wallet {
                    id: Self::next_id(&self.next_wallet_id),
                    user_id,
                    balance: Decimal::ZERO,
                    is_locked: false,
                    linked_payment_method: None,
                    created_at: Utc::now(),
                };
                vacant.insert(wallet.clone());
                Ok(wallet)
            }
        }
    }

    async fn find_wallet_by_user(&self, user_id: i64) -> StorageResult<Option<Wallet>> {
        Ok(self.wallets.get(&user_id).map(|w| w.value().clone()))
    }

    async fn wallet_exists_for_user(&self, user_id: i64) -> StorageResult<bool> {
        Ok(self.wallets.contains_key(&user_id))
    }

    async fn set_wallet_locked(&self, user_id: i64, locked: bool) -> StorageResult<()> {
        let mut wallet = self
            .wallets
            .get_mut(&user_id)
            .ok_or_else(|| StorageError::not_found("Wallet"))?;
        wallet.is_locked = locked;
        Ok(())
    }

    async fn link_payment_method(&self, user_id: i64, method: &str) -> StorageResult<()> {
        let mut wallet = self
            .wallets
            .get_mut(&user_id)
            .ok_or_else(|| StorageError::not_found("Wallet"))?;
        wallet.linked_payment_method = Some(method.to_string());
        Ok(())
    }

    async fn apply_ledger_entry(
        &self,
        user_id: i64,
        delta: Decimal,
        require_unlocked: bool,
        entry: NewTransaction,
    ) -> StorageResult<(Wallet, Transaction)> {
        // The exclusive entry is the per-wallet writer lock: checks,
        // balance write, and ledger insert happen before it is released.
        let mut wallet = self
            .wallets
            .get_mut(&user_id)
            .ok_or_else(|| StorageError::not_found("Wallet"))?;

        if require_unlocked && wallet.is_locked {
            return Err(StorageError::WalletLocked);
        }
        let new_balance = wallet.balance + delta;
        if new_balance < Decimal::ZERO {
            return Err(StorageError::InsufficientFunds);
        }

        wallet.balance = new_balance;
        let transaction = self.build_transaction(wallet.id, entry);
        self.transactions
            .insert(transaction.id, transaction.clone());

        Ok((wallet.value().clone(), transaction))
    }
}

#[async_trait]
impl TransactionStore for MemoryStorage {
    async fn find_transaction(&self, transaction_id: i64) -> StorageResult<Option<Transaction>> {
        Ok(self.transactions.get(&transaction_id).map(|t| t.value().clone()))
    }

    async fn find_transaction_for_wallet(
        &self,
        transaction_id: i64,
        wallet_id: i64,
    ) -> StorageResult<Option<Transaction>> {
        Ok(self
            .transactions
            .get(&transaction_id)
            .filter(|t| t.wallet_id == wallet_id)
            .map(|t| t.value().clone()))
    }

    async fn transactions_by_wallet(&self, wallet_id: i64) -> StorageResult<Vec<Transaction>> {
        let mut transactions: Vec<Transaction> = self
            .transactions
            .iter()
            .filter(|t| t.wallet_id == wallet_id)
            .map(|t| t.value().clone())
            .collect();
        transactions.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(transactions)
    }

    async fn set_transaction_status(
        &self,
        transaction_id: i64,
        status: TransactionStatus,
    ) -> StorageResult<bool> {
        match self.transactions.get_mut(&transaction_id) {
            Some(mut transaction) => {
                transaction.status = status;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl PaymentStore for MemoryStorage {
    async fn add_payment(
        &self,
        new_payment: NewPayment,
        status: PaymentStatus,
        gateway_reference: Option<String>,
    ) -> StorageResult<Payment> {
        let payment = Payment {
            id: Self::next_id(&self.next_payment_id),
            amount: new_payment.amount,
            user_id: new_payment.user_id,
            order_id: new_payment.order_id,
            gateway: new_payment.gateway,
            gateway_reference,
            description: new_payment.description,
            status,
            created_at: Utc::now(),
        };
        self.payments.insert(payment.id, payment.clone());
        Ok(payment)
    }

    async fn find_payment(&self, payment_id: i64) -> StorageResult<Option<Payment>> {
        Ok(self.payments.get(&payment_id).map(|p| p.value().clone()))
    }

    async fn payments_by_user(&self, user_id: i64) -> StorageResult<Vec<Payment>> {
        let mut payments: Vec<Payment> = self
            .payments
            .iter()
            .filter(|p| p.user_id == user_id)
            .map(|p| p.value().clone())
            .collect();
        payments.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(payments)
    }

    async fn settle_payment(
        &self,
        new_payment: NewPayment,
        gateway_reference: String,
        entry_description: String,
    ) -> StorageResult<(Payment, Wallet, Transaction)> {
        // All checks and writes happen under the wallet's exclusive entry,
        // so a failed settlement leaves no payment row behind.
        let mut wallet = self
            .wallets
            .get_mut(&new_payment.user_id)
            .ok_or_else(|| StorageError::not_found("Wallet"))?;

        if wallet.is_locked {
            return Err(StorageError::WalletLocked);
        }
        let new_balance = wallet.balance - new_payment.amount;
        if new_balance < Decimal::ZERO {
            return Err(StorageError::InsufficientFunds);
        }

        let payment = Payment {
            id: Self::next_id(&self.next_payment_id),
            amount: new_payment.amount,
            user_id: new_payment.user_id,
            order_id: new_payment.order_id,
            gateway: new_payment.gateway,
            gateway_reference: Some(gateway_reference),
            description: new_payment.description,
            status: PaymentStatus::Completed,
            created_at: Utc::now(),
        };
        self.payments.insert(payment.id, payment.clone());

        wallet.balance = new_balance;
        let transaction = self.build_transaction(
            wallet.id,
            NewTransaction {
                amount: payment.amount,
                kind: crate::models::TransactionKind::Payment,
                status: TransactionStatus::Completed,
                related_order_id: payment.order_id,
                payment_id: Some(payment.id),
                description: Some(entry_description),
            },
        );
        self.transactions
            .insert(transaction.id, transaction.clone());

        Ok((payment, wallet.value().clone(), transaction))
    }
}

#[async_trait]
impl ExchangeStore for MemoryStorage {
    async fn add_exchange_request(
        &self,
        request: NewExchangeRequest,
    ) -> StorageResult<ExchangeRequest> {
        let pair = (request.offered_product_id, request.requested_product_id);
        // Claiming the pair is the atomic duplicate-pending check.
        if !self.pending_pairs.insert(pair) {
            return Err(StorageError::Conflict(
                "A pending request already exists between these products".into(),
            ));
        }

        let exchange_request = ExchangeRequest {
            id: Self::next_id(&self.next_exchange_id),
            offered_product_id: request.offered_product_id,
            requested_product_id: request.requested_product_id,
            status: ExchangeStatus::Pending,
            message: request.message,
            requested_at: Utc::now(),
            responded_at: None,
            completed_at: None,
        };
        self.exchange_requests
            .insert(exchange_request.id, exchange_request.clone());
        Ok(exchange_request)
    }

    async fn find_exchange_request(
        &self,
        request_id: i64,
    ) -> StorageResult<Option<ExchangeRequest>> {
        Ok(self.exchange_requests.get(&request_id).map(|r| r.value().clone()))
    }

    async fn has_pending_between(
        &self,
        offered_product_id: i64,
        requested_product_id: i64,
    ) -> StorageResult<bool> {
        Ok(self
            .pending_pairs
            .contains(&(offered_product_id, requested_product_id)))
    }

    async fn find_pending_for_response(
        &self,
        request_id: i64,
        responder_user_id: i64,
    ) -> StorageResult<Option<ExchangeRequest>> {
        let request = match self.exchange_requests.get(&request_id) {
            Some(r) if r.status == ExchangeStatus::Pending => r.value().clone(),
            _ => return Ok(None),
        };
        match self.product_owner(request.requested_product_id) {
            Some(owner) if owner == responder_user_id => Ok(Some(request)),
            _ => Ok(None),
        }
    }

    async fn find_pending_for_deletion(
        &self,
        request_id: i64,
        user_id: i64,
    ) -> StorageResult<Option<ExchangeRequest>> {
        let request = match self.exchange_requests.get(&request_id) {
            Some(r) if r.status == ExchangeStatus::Pending => r.value().clone(),
            _ => return Ok(None),
        };
        let offered_owner = self.product_owner(request.offered_product_id);
        let requested_owner = self.product_owner(request.requested_product_id);
        if offered_owner == Some(user_id) || requested_owner == Some(user_id) {
            Ok(Some(request))
        } else {
            Ok(None)
        }
    }

    async fn set_exchange_status(
        &self,
        request_id: i64,
        status: ExchangeStatus,
        responded_at: DateTime<Utc>,
        completed_at: Option<DateTime<Utc>>,
    ) -> StorageResult<bool> {
        match self.exchange_requests.get_mut(&request_id) {
            Some(mut request) => {
                request.status = status;
                request.responded_at = Some(responded_at);
                if completed_at.is_some() {
                    request.completed_at = completed_at;
                }
                self.pending_pairs
                    .remove(&(request.offered_product_id, request.requested_product_id));
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_exchange_request(&self, request_id: i64) -> StorageResult<bool> {
        match self.exchange_requests.remove(&request_id) {
            Some((_, request)) => {
                self.pending_pairs
                    .remove(&(request.offered_product_id, request.requested_product_id));
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn exchange_requests_sent_by(&self, user_id: i64) -> StorageResult<Vec<ExchangeRequest>> {
        let mut requests: Vec<ExchangeRequest> = self
            .exchange_requests
            .iter()
            .filter(|r| self.product_owner(r.offered_product_id) == Some(user_id))
            .map(|r| r.value().clone())
            .collect();
        requests.sort_by(|a, b| b.requested_at.cmp(&a.requested_at).then(b.id.cmp(&a.id)));
        Ok(requests)
    }

    async fn exchange_requests_received_by(
        &self,
        user_id: i64,
    ) -> StorageResult<Vec<ExchangeRequest>> {
        let mut requests: Vec<ExchangeRequest> = self
            .exchange_requests
            .iter()
            .filter(|r| self.product_owner(r.requested_product_id) == Some(user_id))
            .map(|r| r.value().clone())
            .collect();
        requests.sort_by(|a, b| b.requested_at.cmp(&a.requested_at).then(b.id.cmp(&a.id)));
        Ok(requests)
    }
}
