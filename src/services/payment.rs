use std::sync::Arc;

use uuid::Uuid;

use crate::error::Result;
use crate::models::{NewPayment, Payment, PaymentGateway, PaymentReceipt, PaymentStatus};
use crate::storage::Storage;

/// Bridge between gateway payments and the wallet ledger.
///
/// The mock gateway settles synchronously: the Completed payment row, the
/// wallet debit, and the `Payment` ledger entry commit as one gateway
/// unit of work, so a failed debit never leaves a Completed payment
/// behind. Redirect gateways (Stripe, PayPal) stay Pending until an
/// external confirmation webhook, which is outside this core.
pub struct PaymentBridge {
    storage: Arc<dyn Storage>,
}

impl PaymentBridge {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    pub async fn create_payment(&self, new_payment: NewPayment) -> Result<PaymentReceipt> {
        match new_payment.gateway {
            PaymentGateway::Mock => {
                let reference = format!("MOCK-{}", Uuid::new_v4());
                let entry_description =
                    format!("Payment via {} - {}", new_payment.gateway, reference);

                let (payment, wallet, transaction) = self
                    .storage
                    .settle_payment(new_payment, reference, entry_description)
                    .await?;

                tracing::info!(
                    payment_id = payment.id,
                    user_id = payment.user_id,
                    order_id = payment.order_id,
                    transaction_id = transaction.id,
                    amount = %payment.amount,
                    balance = %wallet.balance,
                    "Mock payment settled"
                );
                Ok(PaymentReceipt {
                    payment,
                    payment_url: None,
                })
            }
            PaymentGateway::Stripe => {
                let reference = format!("STRIPE-TEST-{}", Uuid::new_v4());
                let payment = self
                    .storage
                    .add_payment(new_payment, PaymentStatus::Pending, Some(reference))
                    .await?;

                tracing::info!(
                    payment_id = payment.id,
                    user_id = payment.user_id,
                    "Stripe payment created; awaiting webhook confirmation"
                );
                Ok(PaymentReceipt {
                    payment,
                    payment_url: None,
                })
            }
            PaymentGateway::PayPal => {
                let reference = format!("PAYPAL-TEST-{}", Uuid::new_v4());
                let payment_url = format!(
                    "https://www.sandbox.paypal.com/checkoutnow?token={reference}"
                );
                let payment = self
                    .storage
                    .add_payment(new_payment, PaymentStatus::Pending, Some(reference))
                    .await?;

                tracing::info!(
                    payment_id = payment.id,
                    user_id = payment.user_id,
                    "PayPal payment created; awaiting webhook confirmation"
                );
                Ok(PaymentReceipt {
                    payment,
                    payment_url: Some(payment_url),
                })
            }
        }
    }

    pub async fn payment(&self, payment_id: i64) -> Result<Option<Payment>> {
        Ok(self.storage.find_payment(payment_id).await?)
    }

    /// Payments made by one user, newest first.
    pub async fn payments_by_user(&self, user_id: i64) -> Result<Vec<Payment>> {
        Ok(self.storage.payments_by_user(user_id).await?)
    }
}
