mod common;

use common::{TestApp, ADMIN_EMAIL, ADMIN_PASSWORD, CLIENT_EMAIL, CLIENT_PASSWORD};
use tempfile::TempDir;

use studio_storefront::backend::BackendOp;
use studio_storefront::config::{AppConfig, BackendMode};
use studio_storefront::events::Event;
use studio_storefront::models::{Credentials, Registration};
use studio_storefront::services::{Attachments, CheckoutForm, NotificationKind};
use studio_storefront::storage::{LocalStore, SESSION_KEY};
use studio_storefront::{Storefront, View};

#[tokio::test]
async fn test_logout_clears_user_and_returns_home() {
    let mut t = TestApp::new();
    t.sign_up_client().await;
    t.app.navigate(View::Profile).await.unwrap();

    t.app.sign_out().await.unwrap();

    assert!(t.app.current_user().is_none());
    assert_eq!(t.app.view(), View::Home);
    assert!(t.app.order_history().is_empty());
    assert!(t.store.get(SESSION_KEY).unwrap().is_none());
}

#[tokio::test]
async fn test_logout_survives_backend_failure() {
    let mut t = TestApp::new();
    t.sign_up_client().await;
    t.backend.fail_on(BackendOp::SignOut, "Failed to fetch");

    t.app.sign_out().await.unwrap();

    assert!(t.app.current_user().is_none());
    assert_eq!(t.app.view(), View::Home);
}

#[tokio::test]
async fn test_invalid_credentials_are_surfaced_verbatim() {
    let mut t = TestApp::new();
    t.sign_up_client().await;
    t.app.sign_out().await.unwrap();
    t.app.open_login_prompt();

    let result = t
        .app
        .sign_in(&Credentials {
            email: CLIENT_EMAIL.to_string(),
            password: "wrong-password".to_string(),
        })
        .await;

    assert!(result.is_err());
    assert!(t.app.is_login_prompt_open());
    let latest = t.app.notifications().latest().unwrap();
    assert_eq!(latest.kind, NotificationKind::Error);
    assert_eq!(latest.message, "Invalid login credentials");
}

#[tokio::test]
async fn test_duplicate_registration_is_reported() {
    let mut t = TestApp::new();
    t.sign_up_client().await;
    t.app.sign_out().await.unwrap();

    let result = t
        .app
        .sign_up(&Registration {
            email: CLIENT_EMAIL.to_string(),
            password: CLIENT_PASSWORD.to_string(),
            first_name: None,
            last_name: None,
        })
        .await;

    assert!(result.is_err());
    assert_eq!(
        t.app.notifications().latest().unwrap().message,
        "User already registered"
    );
}

#[tokio::test]
async fn test_sign_in_closes_prompt_and_publishes() {
    let mut t = TestApp::new();
    let mut rx = t.app.subscribe();
    t.app.open_login_prompt();

    t.sign_in_admin().await;

    assert!(!t.app.is_login_prompt_open());
    assert!(t.app.current_user().unwrap().is_admin());
    match rx.recv().await.unwrap() {
        Event::SignedIn { email, .. } => assert_eq!(email, common::ADMIN_EMAIL),
        other => panic!("unexpected event {other:?}"),
    }
}

#[tokio::test]
async fn test_expired_backend_session_is_not_restored() {
    let t = TestApp::new();
    let mut first = t.reopen();
    first
        .sign_in(&Credentials {
            email: common::ADMIN_EMAIL.to_string(),
            password: common::ADMIN_PASSWORD.to_string(),
        })
        .await
        .unwrap();
    t.backend.fail_on(BackendOp::Resume, "Session not found");

    let mut second = t.reopen();
    second.start().await.unwrap();

    assert!(second.current_user().is_none());
    assert!(t.store.get(SESSION_KEY).unwrap().is_none());
}

#[tokio::test]
async fn test_mock_mode_keeps_accounts_and_orders_across_restarts() {
    let dir = TempDir::new().unwrap();
    let config = AppConfig {
        backend: BackendMode::Mock,
        storage_dir: dir.path().join("device"),
        admin_email: Some(ADMIN_EMAIL.to_string()),
        admin_password: Some(ADMIN_PASSWORD.to_string()),
        ..AppConfig::default()
    };

    let mut app = Storefront::from_config(&config).await.unwrap();
    app.sign_up(&Registration {
        email: CLIENT_EMAIL.to_string(),
        password: CLIENT_PASSWORD.to_string(),
        first_name: Some("Ana".to_string()),
        last_name: None,
    })
    .await
    .unwrap();
    app.add_to_cart("2").unwrap();
    let form = CheckoutForm::for_user(app.current_user().unwrap());
    let order = app.submit_checkout(&form, &Attachments::new()).await.unwrap();
    drop(app);

    let mut restarted = Storefront::from_config(&config).await.unwrap();
    restarted.start().await.unwrap();
    assert_eq!(restarted.current_user().unwrap().email, CLIENT_EMAIL);
    assert_eq!(restarted.order_history().len(), 1);
    assert_eq!(restarted.order_history()[0].id, order.id);

    restarted.sign_out().await.unwrap();
    restarted
        .sign_in(&Credentials {
            email: CLIENT_EMAIL.to_string(),
            password: CLIENT_PASSWORD.to_string(),
        })
        .await
        .unwrap();
    assert_eq!(restarted.order_history()[0].items.len(), 1);
}
