use std::sync::Arc;

use chrono::Utc;

use crate::error::{CoreError, Result};
use crate::models::{ExchangeRequest, ExchangeStatus, NewExchangeRequest};
use crate::storage::Storage;

/// Product-swap workflow: Pending -> Accepted | Rejected, both terminal.
///
/// Ownership checks ride on the gateway queries: a request that is not
/// Pending, or that the acting user is not authorized for, simply does
/// not come back, and the caller sees not-found.
pub struct ExchangeService {
    storage: Arc<dyn Storage>,
}

impl ExchangeService {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    pub async fn create(
        &self,
        new_request: NewExchangeRequest,
        sender_user_id: i64,
    ) -> Result<ExchangeRequest> {
        let offered = self
            .storage
            .find_product(new_request.offered_product_id)
            .await?;
        let requested = self
            .storage
            .find_product(new_request.requested_product_id)
            .await?;

        let (offered, _requested) = match (offered, requested) {
            (Some(offered), Some(requested)) => (offered, requested),
            _ => {
                return Err(CoreError::NotFound("One or both products not found".into()));
            }
        };

        if offered.user_id != sender_user_id {
            return Err(CoreError::Forbidden(
                "You can only offer your own product".into(),
            ));
        }

        // Friendly pre-check; the insert below enforces it atomically.
        if self
            .storage
            .has_pending_between(
                new_request.offered_product_id,
                new_request.requested_product_id,
            )
            .await?
        {
            return Err(CoreError::Conflict(
                "A pending request already exists between these products".into(),
            ));
        }

        let request = self.storage.add_exchange_request(new_request).await?;

        tracing::info!(
            request_id = request.id,
            sender_user_id,
            offered_product_id = request.offered_product_id,
            requested_product_id = request.requested_product_id,
            "Exchange request created"
        );
        Ok(request)
    }

    /// Accept a pending request; only the requested product's owner may.
    pub async fn approve(&self, request_id: i64, current_user_id: i64) -> Result<ExchangeRequest> {
        self.respond(request_id, current_user_id, ExchangeStatus::Accepted)
            .await
    }

    /// Reject a pending request; only the requested product's owner may.
    pub async fn reject(&self, request_id: i64, current_user_id: i64) -> Result<ExchangeRequest> {
        self.respond(request_id, current_user_id, ExchangeStatus::Rejected)
            .await
    }

    async fn respond(
        &self,
        request_id: i64,
        current_user_id: i64,
        status: ExchangeStatus,
    ) -> Result<ExchangeRequest> {
        self.storage
            .find_pending_for_response(request_id, current_user_id)
            .await?
            .ok_or_else(|| {
                CoreError::NotFound(
                    "Request not found or you are not authorized to respond to this request".into(),
                )
            })?;

        let now = Utc::now();
        let completed_at = (status == ExchangeStatus::Accepted).then_some(now);
        self.storage
            .set_exchange_status(request_id, status, now, completed_at)
            .await?;

        tracing::info!(request_id, current_user_id, status = %status, "Exchange request resolved");

        self.storage
            .find_exchange_request(request_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Request"))
    }

    /// Remove a request that is still Pending; either side of the pairing
    /// may do so.
    pub async fn delete(&self, request_id: i64, current_user_id: i64) -> Result<()> {
        self.storage
            .find_pending_for_deletion(request_id, current_user_id)
            .await?
            .ok_or_else(|| {
                CoreError::NotFound(
                    "Request not found or you are not authorized to delete this request".into(),
                )
            })?;

        self.storage.delete_exchange_request(request_id).await?;
        tracing::info!(request_id, current_user_id, "Exchange request deleted");
        Ok(())
    }

    pub async fn request(&self, request_id: i64) -> Result<ExchangeRequest> {
        self.storage
            .find_exchange_request(request_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Request"))
    }

    pub async fn sent_by(&self, user_id: i64) -> Result<Vec<ExchangeRequest>> {
        Ok(self.storage.exchange_requests_sent_by(user_id).await?)
    }

    pub async fn received_by(&self, user_id: i64) -> Result<Vec<ExchangeRequest>> {
        Ok(self.storage.exchange_requests_received_by(user_id).await?)
    }
}
