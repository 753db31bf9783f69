//! Exchange request workflow: single-shot Pending -> Accepted | Rejected
//! with ownership folded into the gateway queries.

mod common;

use rust_decimal_macros::dec;

use bazaar_core::error::CoreError;
use bazaar_core::models::{ExchangeStatus, NewExchangeRequest};
use bazaar_core::services::ExchangeService;
use bazaar_core::storage::MemoryStorage;

use common::{seed_product, test_storage};

const SENDER: i64 = 1;
const RECEIVER: i64 = 2;
const OFFERED: i64 = 10;
const REQUESTED: i64 = 20;

fn seed_pair(storage: &MemoryStorage) {
    seed_product(storage, OFFERED, SENDER, dec!(40.00));
    seed_product(storage, REQUESTED, RECEIVER, dec!(55.00));
}

fn request_dto() -> NewExchangeRequest {
    NewExchangeRequest {
        offered_product_id: OFFERED,
        requested_product_id: REQUESTED,
        message: Some("swap?".to_string()),
    }
}

#[tokio::test]
async fn test_create_exchange_request() {
    let storage = test_storage();
    seed_pair(&storage);
    let service = ExchangeService::new(storage.clone());

    let request = service.create(request_dto(), SENDER).await.unwrap();
    assert_eq!(request.status, ExchangeStatus::Pending);
    assert!(request.responded_at.is_none());
    assert!(request.completed_at.is_none());
}

#[tokio::test]
async fn test_create_with_missing_product_is_not_found() {
    let storage = test_storage();
    seed_product(&storage, OFFERED, SENDER, dec!(40.00));
    let service = ExchangeService::new(storage.clone());

    let err = service.create(request_dto(), SENDER).await.unwrap_err();
    assert!(matches!(err, CoreError::NotFound(_)));
}

#[tokio::test]
async fn test_create_with_foreign_offered_product_is_forbidden() {
    let storage = test_storage();
    seed_pair(&storage);
    let service = ExchangeService::new(storage.clone());

    // The receiver tries to offer the sender's product
    let err = service.create(request_dto(), RECEIVER).await.unwrap_err();
    assert!(matches!(err, CoreError::Forbidden(_)));

    // No row was inserted
    assert!(service.sent_by(SENDER).await.unwrap().is_empty());
    assert!(service.received_by(RECEIVER).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_duplicate_pending_request_is_conflict() {
    let storage = test_storage();
    seed_pair(&storage);
    let service = ExchangeService::new(storage.clone());

    service.create(request_dto(), SENDER).await.unwrap();
    let err = service.create(request_dto(), SENDER).await.unwrap_err();
    assert!(matches!(err, CoreError::Conflict(_)));
    assert_eq!(err.status_code(), 409);
}

#[tokio::test]
async fn test_approve_by_requested_product_owner() {
    let storage = test_storage();
    seed_pair(&storage);
    let service = ExchangeService::new(storage.clone());

    let request = service.create(request_dto(), SENDER).await.unwrap();
    let approved = service.approve(request.id, RECEIVER).await.unwrap();

    assert_eq!(approved.status, ExchangeStatus::Accepted);
    assert!(approved.responded_at.is_some());
    assert!(approved.completed_at.is_some());
}

#[tokio::test]
async fn test_approve_by_unauthorized_user_is_not_found() {
    let storage = test_storage();
    seed_pair(&storage);
    let service = ExchangeService::new(storage.clone());

    let request = service.create(request_dto(), SENDER).await.unwrap();
    // Neither the sender nor a stranger may respond
    for user in [SENDER, 99] {
        let err = service.approve(request.id, user).await.unwrap_err();
        assert!(matches!(err, CoreError::NotFound(_)));
    }
    assert_eq!(
        service.request(request.id).await.unwrap().status,
        ExchangeStatus::Pending
    );
}

#[tokio::test]
async fn test_reject_stamps_responded_only() {
    let storage = test_storage();
    seed_pair(&storage);
    let service = ExchangeService::new(storage.clone());

    let request = service.create(request_dto(), SENDER).await.unwrap();
    let rejected = service.reject(request.id, RECEIVER).await.unwrap();

    assert_eq!(rejected.status, ExchangeStatus::Rejected);
    assert!(rejected.responded_at.is_some());
    assert!(rejected.completed_at.is_none());
}

#[tokio::test]
async fn test_resolved_request_is_terminal() {
    let storage = test_storage();
    seed_pair(&storage);
    let service = ExchangeService::new(storage.clone());

    let request = service.create(request_dto(), SENDER).await.unwrap();
    service.approve(request.id, RECEIVER).await.unwrap();

    // Single-shot: no second response, in either direction
    let err = service.reject(request.id, RECEIVER).await.unwrap_err();
    assert!(matches!(err, CoreError::NotFound(_)));
    let err = service.approve(request.id, RECEIVER).await.unwrap_err();
    assert!(matches!(err, CoreError::NotFound(_)));
}

#[tokio::test]
async fn test_resolution_frees_the_product_pair() {
    let storage = test_storage();
    seed_pair(&storage);
    let service = ExchangeService::new(storage.clone());

    let request = service.create(request_dto(), SENDER).await.unwrap();
    service.reject(request.id, RECEIVER).await.unwrap();

    // A new request between the same pair is allowed again
    service.create(request_dto(), SENDER).await.unwrap();
}

#[tokio::test]
async fn test_delete_only_while_pending() {
    let storage = test_storage();
    seed_pair(&storage);
    let service = ExchangeService::new(storage.clone());

    let request = service.create(request_dto(), SENDER).await.unwrap();
    service.delete(request.id, SENDER).await.unwrap();
    let err = service.request(request.id).await.unwrap_err();
    assert!(matches!(err, CoreError::NotFound(_)));

    let request = service.create(request_dto(), SENDER).await.unwrap();
    service.approve(request.id, RECEIVER).await.unwrap();
    let err = service.delete(request.id, SENDER).await.unwrap_err();
    assert!(matches!(err, CoreError::NotFound(_)));
}

#[tokio::test]
async fn test_delete_by_stranger_is_not_found() {
    let storage = test_storage();
    seed_pair(&storage);
    let service = ExchangeService::new(storage.clone());

    let request = service.create(request_dto(), SENDER).await.unwrap();
    let err = service.delete(request.id, 99).await.unwrap_err();
    assert!(matches!(err, CoreError::NotFound(_)));
}

#[tokio::test]
async fn test_sent_and_received_listings() {
    let storage = test_storage();
    seed_pair(&storage);
    let service = ExchangeService::new(storage.clone());

    let request = service.create(request_dto(), SENDER).await.unwrap();

    let sent = service.sent_by(SENDER).await.unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].id, request.id);

    let received = service.received_by(RECEIVER).await.unwrap();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].id, request.id);

    assert!(service.sent_by(RECEIVER).await.unwrap().is_empty());
}
