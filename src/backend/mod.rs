//! Backend capabilities the storefront depends on.
//!
//! The storefront never talks to a concrete service directly. It is handed an
//! `Arc<dyn Backend>` bundling four capabilities (authentication, profile
//! lookup, order tables and object storage) so that every flow can run
//! against the in-process fake, a hosted backend-as-a-service, or the
//! self-hosted database implementation.

use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::{AppConfig, BackendMode};
use crate::errors::ServiceError;
use crate::models::{
    AuthSession, NewOrder, NewOrderItem, Order, OrderItem, OrderStatus, Profile, Registration,
};
use crate::storage::LocalStore;

pub mod database;
pub mod hosted;
pub mod memory;

pub use database::DatabaseBackend;
pub use hosted::HostedBackend;
pub use memory::{BackendOp, InMemoryBackend};

#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, ServiceError>;

    async fn sign_up(&self, registration: &Registration) -> Result<AuthSession, ServiceError>;

    async fn sign_out(&self, session: &AuthSession) -> Result<(), ServiceError>;

    /// Checks a previously issued session and returns it (possibly refreshed).
    async fn resume(&self, session: &AuthSession) -> Result<AuthSession, ServiceError>;
}

#[async_trait]
pub trait ProfileRepository: Send + Sync {
    async fn fetch_profile(&self, user_id: Uuid) -> Result<Option<Profile>, ServiceError>;
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Inserts the order row and returns it with its id; `items` is empty.
    async fn insert_order(&self, order: &NewOrder) -> Result<Order, ServiceError>;

    async fn insert_order_items(
        &self,
        items: &[NewOrderItem],
    ) -> Result<Vec<OrderItem>, ServiceError>;

    /// All orders with their items, newest first.
    async fn list_orders(&self) -> Result<Vec<Order>, ServiceError>;

    /// Orders owned by `user_id` with their items, newest first.
    async fn list_orders_for_user(&self, user_id: Uuid) -> Result<Vec<Order>, ServiceError>;

    async fn update_order_status(
        &self,
        order_id: Uuid,
        status: OrderStatus,
    ) -> Result<(), ServiceError>;

    /// Deletes an order row; its items go with it.
    async fn delete_order(&self, order_id: Uuid) -> Result<(), ServiceError>;
}

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        content_type: &str,
        body: Bytes,
    ) -> Result<(), ServiceError>;

    fn public_url(&self, bucket: &str, path: &str) -> String;
}

/// Everything the storefront needs from a backend.
pub trait Backend: AuthProvider + ProfileRepository + OrderRepository + ObjectStorage {}

impl<T> Backend for T where T: AuthProvider + ProfileRepository + OrderRepository + ObjectStorage {}

/// Builds the backend selected by `config.backend`.
///
/// Mock mode keeps its accounts and orders in `store`.
pub async fn connect(
    config: &AppConfig,
    store: Arc<dyn LocalStore>,
) -> Result<Arc<dyn Backend>, ServiceError> {
    match config.backend {
        BackendMode::Mock => {
            let backend = InMemoryBackend::persistent(store)?;
            if let (Some(email), Some(password)) =
                (&config.admin_email, &config.admin_password)
            {
                backend.seed_admin(email, password)?;
            }
            Ok(Arc::new(backend))
        }
        BackendMode::Hosted => Ok(Arc::new(HostedBackend::from_config(config)?)),
        BackendMode::Database => {
            let backend = DatabaseBackend::from_config(config).await?;
            if let (Some(email), Some(password)) =
                (&config.admin_email, &config.admin_password)
            {
                backend.ensure_admin(email, password).await?;
            }
            Ok(Arc::new(backend))
        }
    }
}
