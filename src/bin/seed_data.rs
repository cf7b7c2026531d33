//! Seed data script - prepares a self-hosted database
//!
//! Run with: cargo run --bin seed-data
//!
//! This creates:
//! - the schema (migrations)
//! - the administrator account from `admin_email` / `admin_password`
//! - a demo client with one order per catalog service when `--demo` is passed

use anyhow::Context;
use std::sync::Arc;
use tracing::info;

use studio_storefront::backend::{AuthProvider, DatabaseBackend, OrderRepository};
use studio_storefront::config::{init_tracing, load_config};
use studio_storefront::events::EventSender;
use studio_storefront::models::{
    default_catalog, CartItem, NewOrder, OrderPriority, OrderSpecifications, OrderStatus,
    PaymentMethod, Registration,
};
use studio_storefront::services::OrderService;

const DEMO_EMAIL: &str = "demo@phk.studio";
const DEMO_PASSWORD: &str = "demo-client-2025";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = load_config().context("loading configuration")?;
    init_tracing(&config.log_level, config.log_json);

    info!("=== Studio Storefront Seed Data ===");
    let backend = Arc::new(
        DatabaseBackend::from_config(&config)
            .await
            .context("connecting to the database")?,
    );
    info!(url = %config.database_url, "Schema is up to date");

    let (email, password) = config
        .admin_email
        .as_deref()
        .zip(config.admin_password.as_deref())
        .context("admin_email and admin_password must be configured")?;
    let admin_id = backend.ensure_admin(email, password).await?;
    info!(%admin_id, %email, "Administrator ready");

    if std::env::args().any(|arg| arg == "--demo") {
        seed_demo_orders(backend).await?;
    }

    info!("Seeding complete");
    Ok(())
}

async fn seed_demo_orders(backend: Arc<DatabaseBackend>) -> anyhow::Result<()> {
    let session = backend
        .sign_up(&Registration {
            email: DEMO_EMAIL.to_string(),
            password: DEMO_PASSWORD.to_string(),
            first_name: Some("Demo".to_string()),
            last_name: Some("Client".to_string()),
        })
        .await
        .context("creating the demo client (already seeded?)")?;

    let orders = OrderService::new(backend.clone(), EventSender::default());
    for service in default_catalog() {
        let line = CartItem::from_service(&service, service.variations.first().cloned());
        let order = NewOrder {
            user_id: session.user_id,
            user_email: session.email.clone(),
            user_name: "Demo".to_string(),
            total: line.line_total(),
            status: OrderStatus::Pending,
            priority: OrderPriority::Normal,
            payment_method: Some(PaymentMethod::CreditCard),
            specifications: OrderSpecifications {
                style: "Realista".to_string(),
                description: format!("Demo order for {}", service.name),
                budget_range: "$100-500".to_string(),
                ..OrderSpecifications::default()
            },
            notes: None,
        };
        let placed = orders.place_order(order, &[line]).await?;
        info!(order_id = %placed.id, service = %service.name, "Demo order created");
    }

    let count = backend.list_orders_for_user(session.user_id).await?.len();
    info!(count, "Demo orders seeded");
    Ok(())
}
