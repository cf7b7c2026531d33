#![allow(dead_code)]

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;

use studio_storefront::backend::InMemoryBackend;
use studio_storefront::events::EventSender;
use studio_storefront::models::{Credentials, Registration, Service};
use studio_storefront::storage::MemoryStore;
use studio_storefront::Storefront;

pub const ADMIN_EMAIL: &str = "admin@phk.studio";
pub const ADMIN_PASSWORD: &str = "phkstudio2025";
pub const CLIENT_EMAIL: &str = "ana@example.com";
pub const CLIENT_PASSWORD: &str = "secret123";

/// Storefront wired to the in-process backend and an in-memory device store.
pub struct TestApp {
    pub backend: Arc<InMemoryBackend>,
    pub store: Arc<MemoryStore>,
    pub events: EventSender,
    pub app: Storefront,
}

impl TestApp {
    pub fn new() -> Self {
        let backend = Arc::new(InMemoryBackend::new());
        backend
            .seed_admin(ADMIN_EMAIL, ADMIN_PASSWORD)
            .expect("seed admin");
        let store = Arc::new(MemoryStore::new());
        let events = EventSender::default();
        let app = build(&backend, &store, &events);
        Self {
            backend,
            store,
            events,
            app,
        }
    }

    /// A second storefront over the same backend and device, as after a restart.
    pub fn reopen(&self) -> Storefront {
        build(&self.backend, &self.store, &self.events)
    }

    pub async fn sign_up_client(&mut self) {
        self.app
            .sign_up(&Registration {
                email: CLIENT_EMAIL.to_string(),
                password: CLIENT_PASSWORD.to_string(),
                first_name: Some("Ana".to_string()),
                last_name: Some("Pérez".to_string()),
            })
            .await
            .expect("client sign up");
    }

    pub async fn sign_in_admin(&mut self) {
        self.app
            .sign_in(&Credentials {
                email: ADMIN_EMAIL.to_string(),
                password: ADMIN_PASSWORD.to_string(),
            })
            .await
            .expect("admin sign in");
    }

    /// Adds a catalog entry with the given id and price.
    pub fn add_service(&mut self, id: &str, price: Decimal) -> Service {
        let mut service = self.app.catalog().find("1").expect("seeded catalog").clone();
        service.id = id.to_string();
        service.name = format!("Test service {id}");
        service.price = price;
        service.variations.clear();
        self.app
            .catalog_mut()
            .upsert(service.clone())
            .expect("catalog upsert");
        service
    }

    /// Cart of `[{price: 100, qty: 2}, {price: 50, qty: 1}]`.
    pub fn fill_reference_cart(&mut self) {
        self.add_service("100-a", dec!(100));
        self.add_service("50-b", dec!(50));
        self.app.add_to_cart("100-a").expect("add");
        self.app.add_to_cart("100-a").expect("add");
        self.app.add_to_cart("50-b").expect("add");
    }
}

fn build(
    backend: &Arc<InMemoryBackend>,
    store: &Arc<MemoryStore>,
    events: &EventSender,
) -> Storefront {
    Storefront::new(
        backend.clone(),
        store.clone(),
        events.clone(),
        "order-attachments",
        dec!(100),
    )
    .expect("storefront")
}
