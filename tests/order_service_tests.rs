//! Order intake and administration: fee split, buyer cancellation, and
//! the machine-bypassing edit path that ends in synchronization.

mod common;

use rust_decimal_macros::dec;

use bazaar_core::error::CoreError;
use bazaar_core::services::CreateOrder;
use bazaar_core::state_machine::{OrderStatus, ShippingStatus};

use common::{order_service, seed_product, seed_user, shipping_dto, test_storage};

#[tokio::test]
async fn test_create_order_splits_amounts_exactly() {
    let storage = test_storage();
    seed_user(&storage, 2, "Sal Seller");
    seed_product(&storage, 10, 2, dec!(100.00));
    let service = order_service(&storage);

    let order = service
        .create_order(CreateOrder {
            product_id: 10,
            buyer_id: 1,
            shipping: shipping_dto(),
        })
        .await
        .unwrap();

    assert_eq!(order.total_amount, dec!(100.00));
    assert_eq!(order.platform_fee, dec!(5.00));
    assert_eq!(order.seller_amount, dec!(95.00));
    assert_eq!(order.seller_amount + order.platform_fee, order.total_amount);
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.shipping_status(), Some(ShippingStatus::Pending));
    assert_eq!(order.seller_id, 2);
}

#[tokio::test]
async fn test_fee_split_conserves_total_on_awkward_prices() {
    let storage = test_storage();
    seed_user(&storage, 2, "Sal Seller");
    seed_product(&storage, 10, 2, dec!(33.33));
    let service = order_service(&storage);

    let order = service
        .create_order(CreateOrder {
            product_id: 10,
            buyer_id: 1,
            shipping: shipping_dto(),
        })
        .await
        .unwrap();

    assert_eq!(order.seller_amount + order.platform_fee, order.total_amount);
    assert_eq!(order.platform_fee, dec!(1.67));
}

#[tokio::test]
async fn test_create_order_missing_product_is_not_found() {
    let storage = test_storage();
    let service = order_service(&storage);

    let err = service
        .create_order(CreateOrder {
            product_id: 10,
            buyer_id: 1,
            shipping: shipping_dto(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::NotFound(_)));
}

#[tokio::test]
async fn test_create_order_missing_seller_is_not_found() {
    let storage = test_storage();
    seed_product(&storage, 10, 2, dec!(100.00));
    let service = order_service(&storage);

    let err = service
        .create_order(CreateOrder {
            product_id: 10,
            buyer_id: 1,
            shipping: shipping_dto(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::NotFound(_)));
}

#[tokio::test]
async fn test_buyer_cancels_pending_order() {
    let storage = test_storage();
    seed_user(&storage, 2, "Sal Seller");
    seed_product(&storage, 10, 2, dec!(100.00));
    let service = order_service(&storage);

    let order = service
        .create_order(CreateOrder {
            product_id: 10,
            buyer_id: 1,
            shipping: shipping_dto(),
        })
        .await
        .unwrap();

    let cancelled = service.cancel_order(order.id, 1).await.unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert_eq!(cancelled.shipping_status(), Some(ShippingStatus::Failed));
}

#[tokio::test]
async fn test_cancel_by_non_buyer_is_forbidden() {
    let storage = test_storage();
    seed_user(&storage, 2, "Sal Seller");
    seed_product(&storage, 10, 2, dec!(100.00));
    let service = order_service(&storage);

    let order = service
        .create_order(CreateOrder {
            product_id: 10,
            buyer_id: 1,
            shipping: shipping_dto(),
        })
        .await
        .unwrap();

    let err = service.cancel_order(order.id, 2).await.unwrap_err();
    assert!(matches!(err, CoreError::Forbidden(_)));
    assert_eq!(
        service.order(order.id).await.unwrap().status,
        OrderStatus::Pending
    );
}

#[tokio::test]
async fn test_cancel_after_payment_is_forbidden() {
    let storage = test_storage();
    seed_user(&storage, 2, "Sal Seller");
    seed_product(&storage, 10, 2, dec!(100.00));
    let service = order_service(&storage);

    let order = service
        .create_order(CreateOrder {
            product_id: 10,
            buyer_id: 1,
            shipping: shipping_dto(),
        })
        .await
        .unwrap();
    service.force_status(order.id, OrderStatus::Paid).await.unwrap();

    let err = service.cancel_order(order.id, 1).await.unwrap_err();
    assert!(matches!(err, CoreError::Forbidden(_)));
}

#[tokio::test]
async fn test_force_status_stamps_timestamps_and_synchronizes() {
    let storage = test_storage();
    seed_user(&storage, 2, "Sal Seller");
    seed_product(&storage, 10, 2, dec!(100.00));
    let service = order_service(&storage);

    let order = service
        .create_order(CreateOrder {
            product_id: 10,
            buyer_id: 1,
            shipping: shipping_dto(),
        })
        .await
        .unwrap();

    let paid = service.force_status(order.id, OrderStatus::Paid).await.unwrap();
    assert!(paid.paid_at.is_some());

    // Jump straight to completed behind the machines' back; the
    // synchronizer drags the shipping record along.
    let completed = service
        .force_status(order.id, OrderStatus::Completed)
        .await
        .unwrap();
    assert_eq!(completed.status, OrderStatus::Completed);
    assert!(completed.completed_at.is_some());
    assert_eq!(completed.shipping_status(), Some(ShippingStatus::Delivered));
}

#[tokio::test]
async fn test_order_listings_by_role() {
    let storage = test_storage();
    seed_user(&storage, 2, "Sal Seller");
    seed_product(&storage, 10, 2, dec!(100.00));
    let service = order_service(&storage);

    let order = service
        .create_order(CreateOrder {
            product_id: 10,
            buyer_id: 1,
            shipping: shipping_dto(),
        })
        .await
        .unwrap();

    assert_eq!(service.orders_by_buyer(1).await.unwrap().len(), 1);
    assert_eq!(service.orders_by_seller(2).await.unwrap().len(), 1);
    assert_eq!(service.orders_by_user(1).await.unwrap()[0].id, order.id);
    assert!(service.orders_by_buyer(2).await.unwrap().is_empty());
}
