mod common;

use assert_matches::assert_matches;
use common::TestApp;
use rust_decimal_macros::dec;

use studio_storefront::backend::{BackendOp, OrderRepository};
use studio_storefront::models::{OrderPriority, OrderStatus, PaymentMethod};
use studio_storefront::services::custom_request::{DEPOSIT_SERVICE_ID, STYLE_OPTIONS};
use studio_storefront::services::WizardStep;
use studio_storefront::ServiceError;

fn fill_project(t: &mut TestApp) {
    let request = t.app.custom_request_mut();
    request.style = STYLE_OPTIONS[0].to_string();
    request.description = "Explainer video for a coffee brand".to_string();
}

#[tokio::test]
async fn test_custom_request_creates_single_deposit_order() {
    let mut t = TestApp::new();
    t.sign_up_client().await;
    fill_project(&mut t);
    assert!(t.app.custom_request_next().await.unwrap().is_none());
    assert_eq!(t.app.custom_request_step(), WizardStep::Payment);

    let card = &mut t.app.custom_request_mut().card;
    card.number = "4242 4242 4242 4242".to_string();
    card.cvc = "123".to_string();
    let order = t.app.custom_request_next().await.unwrap().unwrap();

    assert_eq!(t.app.custom_request_step(), WizardStep::Confirmation);
    assert_eq!(order.total, dec!(100));
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.priority, OrderPriority::Urgent);
    assert_eq!(order.payment_method, Some(PaymentMethod::CreditCard));
    assert_eq!(
        order.notes.as_deref(),
        Some("Custom service request - initial deposit")
    );
    assert_eq!(order.specifications.budget_range, "Custom Quote");
    assert!(order.specifications.software.is_empty());
    assert!(order.specifications.files.is_empty());

    assert_eq!(order.items.len(), 1);
    let item = &order.items[0];
    assert_eq!(item.service_id, DEPOSIT_SERVICE_ID);
    assert_eq!(item.service_name, "Deposit: Animación 2D Vectorial");
    assert_eq!(item.price, dec!(100));
    assert_eq!(item.quantity, 1);
    assert_eq!(item.variation.as_deref(), Some("Initial deposit"));

    let stored = t.backend.list_orders().await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].items.len(), 1);
    assert_eq!(t.app.order_history().len(), 1);
}

#[tokio::test]
async fn test_custom_request_requires_sign_in() {
    let mut t = TestApp::new();
    fill_project(&mut t);
    t.app.custom_request_next().await.unwrap();
    t.app.custom_request_mut().payment_method = PaymentMethod::Paypal;

    let err = t.app.custom_request_next().await.unwrap_err();

    assert_matches!(err, ServiceError::Unauthorized(_));
    assert_eq!(t.app.custom_request_step(), WizardStep::Payment);
    assert_eq!(t.backend.calls(BackendOp::InsertOrder), 0);
}

#[tokio::test]
async fn test_failed_deposit_item_leaves_no_order() {
    let mut t = TestApp::new();
    t.sign_up_client().await;
    fill_project(&mut t);
    t.app.custom_request_next().await.unwrap();
    t.app.custom_request_mut().payment_method = PaymentMethod::Paypal;
    t.backend.fail_on(BackendOp::InsertOrderItems, "connection reset");

    assert!(t.app.custom_request_next().await.is_err());

    assert_eq!(t.app.custom_request_step(), WizardStep::Payment);
    assert_eq!(t.backend.order_count(), 0);
    assert!(t.app.order_history().is_empty());
}

#[tokio::test]
async fn test_confirmed_request_is_not_placed_twice() {
    let mut t = TestApp::new();
    t.sign_up_client().await;
    fill_project(&mut t);
    t.app.custom_request_next().await.unwrap();
    t.app.custom_request_mut().payment_method = PaymentMethod::Paypal;
    t.app.custom_request_next().await.unwrap().unwrap();

    t.app.custom_request_back();
    assert_eq!(t.app.custom_request_step(), WizardStep::Confirmation);
    assert!(t.app.custom_request_next().await.unwrap().is_none());

    assert_eq!(t.backend.calls(BackendOp::InsertOrder), 1);
    assert_eq!(t.app.order_history().len(), 1);

    t.app.custom_request_reset();
    assert_eq!(t.app.custom_request_step(), WizardStep::Details);
    assert!(t.app.custom_request().description.is_empty());
}
