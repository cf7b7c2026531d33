//! In-process backend used in mock mode and by the test suites.
//!
//! Behaves like the hosted service from the storefront's point of view:
//! accounts with hashed passwords, opaque session tokens, order tables with
//! cascade delete and a bucketed object store. Any operation can be made to
//! fail on demand with [`InMemoryBackend::fail_on`], and every call is
//! counted so tests can assert that nothing reached the backend.
//!
//! Built with [`InMemoryBackend::persistent`] it also writes accounts,
//! profiles, sessions and orders to the device's [`LocalStore`] after every
//! change, so mock mode survives a restart. Uploaded objects stay in memory.

use argon2::password_hash::rand_core::OsRng as PhcRng;
use argon2::password_hash::{PasswordHasher, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{Duration, Utc};
use dashmap::DashMap;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use super::{AuthProvider, ObjectStorage, OrderRepository, ProfileRepository};
use crate::auth::verify_password;
use crate::errors::ServiceError;
use crate::models::{
    AuthSession, NewOrder, NewOrderItem, Order, OrderItem, OrderStatus, Profile, Registration,
    Role,
};
use crate::storage::{load_json, save_json, LocalStore, ORDERS_KEY, USERS_KEY};

const SESSION_TTL_HOURS: i64 = 1;
const TOKEN_LEN: usize = 40;

/// Operations that can be counted and failed on demand.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, strum::Display, strum::EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum BackendOp {
    SignIn,
    SignUp,
    SignOut,
    Resume,
    FetchProfile,
    InsertOrder,
    InsertOrderItems,
    ListOrders,
    UpdateOrderStatus,
    DeleteOrder,
    Upload,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Account {
    id: Uuid,
    email: String,
    password_hash: String,
}

#[derive(Debug, Clone)]
struct StoredObject {
    content_type: String,
    body: Bytes,
}

/// What is written under `phk_users`.
#[derive(Debug, Default, Serialize, Deserialize)]
struct UsersDocument {
    #[serde(default)]
    accounts: Vec<Account>,
    #[serde(default)]
    profiles: Vec<Profile>,
    #[serde(default)]
    sessions: Vec<AuthSession>,
}

#[derive(Default)]
pub struct InMemoryBackend {
    accounts: DashMap<String, Account>,
    profiles: DashMap<Uuid, Profile>,
    sessions: DashMap<String, AuthSession>,
    orders: DashMap<Uuid, Order>,
    items: DashMap<Uuid, OrderItem>,
    objects: DashMap<String, StoredObject>,
    failures: DashMap<BackendOp, String>,
    calls: DashMap<BackendOp, usize>,
    store: Option<Arc<dyn LocalStore>>,
}

impl fmt::Debug for InMemoryBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryBackend")
            .field("accounts", &self.accounts.len())
            .field("orders", &self.orders.len())
            .field("items", &self.items.len())
            .field("objects", &self.objects.len())
            .field("persistent", &self.store.is_some())
            .finish()
    }
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restores accounts and orders saved in `store` and keeps saving there.
    pub fn persistent(store: Arc<dyn LocalStore>) -> Result<Self, ServiceError> {
        let backend = Self::default();
        let users = load_json::<UsersDocument>(store.as_ref(), USERS_KEY)?.unwrap_or_default();
        for account in users.accounts {
            backend.accounts.insert(account.email.clone(), account);
        }
        for profile in users.profiles {
            backend.profiles.insert(profile.id, profile);
        }
        for session in users.sessions.into_iter().filter(|s| !s.is_expired()) {
            backend.sessions.insert(session.access_token.clone(), session);
        }

        let orders = load_json::<Vec<Order>>(store.as_ref(), ORDERS_KEY)?.unwrap_or_default();
        for mut order in orders {
            for item in order.items.drain(..) {
                backend.items.insert(item.id, item);
            }
            backend.orders.insert(order.id, order);
        }

        debug!(
            accounts = backend.accounts.len(),
            orders = backend.orders.len(),
            "Restored mock backend from local storage"
        );
        Ok(Self {
            store: Some(store),
            ..backend
        })
    }

    /// Creates (or promotes) an administrator account.
    pub fn seed_admin(&self, email: &str, password: &str) -> Result<Uuid, ServiceError> {
        let key = email.trim().to_lowercase();
        let id = match self.accounts.get(&key) {
            Some(account) => account.id,
            None => self.create_account(&key, password)?.id,
        };
        let mut profile = self
            .profiles
            .get(&id)
            .map(|p| p.value().clone())
            .unwrap_or_else(|| Profile::empty(id));
        profile.role = Role::Admin;
        profile.first_name.get_or_insert_with(|| "Admin".to_string());
        profile.created_at.get_or_insert_with(Utc::now);
        self.profiles.insert(id, profile);
        self.save_users()?;
        info!(email = %key, "Seeded administrator account");
        Ok(id)
    }

    /// Makes every subsequent call of `op` fail with `message`.
    pub fn fail_on(&self, op: BackendOp, message: impl Into<String>) {
        self.failures.insert(op, message.into());
    }

    pub fn clear_failures(&self) {
        self.failures.clear();
    }

    /// How many times `op` has been invoked, failed calls included.
    pub fn calls(&self, op: BackendOp) -> usize {
        self.calls.get(&op).map(|c| *c).unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.iter().map(|entry| *entry.value()).sum()
    }

    pub fn order_count(&self) -> usize {
        self.orders.len()
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// Returns the stored object and its content type.
    pub fn object(&self, bucket: &str, path: &str) -> Option<(String, Bytes)> {
        self.objects
            .get(&object_key(bucket, path))
            .map(|o| (o.content_type.clone(), o.body.clone()))
    }

    fn enter(&self, op: BackendOp) -> Result<(), ServiceError> {
        *self.calls.entry(op).or_insert(0) += 1;
        match self.failures.get(&op) {
            Some(message) => {
                debug!(%op, "Injected backend failure");
                Err(ServiceError::BackendError(message.clone()))
            }
            None => Ok(()),
        }
    }

    fn create_account(&self, email: &str, password: &str) -> Result<Account, ServiceError> {
        let account = Account {
            id: Uuid::new_v4(),
            email: email.to_string(),
            password_hash: light_hash(password)?,
        };
        self.accounts.insert(email.to_string(), account.clone());
        Ok(account)
    }

    fn save_users(&self) -> Result<(), ServiceError> {
        let Some(store) = &self.store else {
            return Ok(());
        };
        let document = UsersDocument {
            accounts: self.accounts.iter().map(|a| a.value().clone()).collect(),
            profiles: self.profiles.iter().map(|p| p.value().clone()).collect(),
            sessions: self.sessions.iter().map(|s| s.value().clone()).collect(),
        };
        save_json(store.as_ref(), USERS_KEY, &document)
    }

    fn save_orders(&self) -> Result<(), ServiceError> {
        let Some(store) = &self.store else {
            return Ok(());
        };
        save_json(store.as_ref(), ORDERS_KEY, &self.sorted_orders(None))
    }

    fn open_session(&self, account: &Account) -> AuthSession {
        let token: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(TOKEN_LEN)
            .map(char::from)
            .collect();
        let session = AuthSession {
            user_id: account.id,
            email: account.email.clone(),
            access_token: token.clone(),
            expires_at: Some(Utc::now() + Duration::hours(SESSION_TTL_HOURS)),
        };
        self.sessions.insert(token, session.clone());
        session
    }

    fn with_items(&self, mut order: Order) -> Order {
        order.items = self
            .items
            .iter()
            .filter(|item| item.order_id == order.id)
            .map(|item| item.value().clone())
            .collect();
        order
    }

    fn sorted_orders(&self, owner: Option<Uuid>) -> Vec<Order> {
        let mut orders: Vec<Order> = self
            .orders
            .iter()
            .filter(|o| owner.map_or(true, |id| o.user_id == id))
            .map(|o| self.with_items(o.value().clone()))
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        orders
    }
}

fn object_key(bucket: &str, path: &str) -> String {
    format!("{bucket}/{path}")
}

/// Argon2id with small parameters; the fake never guards real accounts.
fn light_hash(password: &str) -> Result<String, ServiceError> {
    let params =
        Params::new(1024, 1, 1, None).map_err(|e| ServiceError::HashError(e.to_string()))?;
    let salt = SaltString::generate(&mut PhcRng);
    Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ServiceError::HashError(e.to_string()))
}

#[async_trait]
impl AuthProvider for InMemoryBackend {
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, ServiceError> {
        self.enter(BackendOp::SignIn)?;
        let key = email.trim().to_lowercase();
        let account = self
            .accounts
            .get(&key)
            .map(|a| a.value().clone())
            .ok_or_else(|| ServiceError::AuthError("Invalid login credentials".into()))?;
        if !verify_password(password, &account.password_hash)? {
            return Err(ServiceError::AuthError("Invalid login credentials".into()));
        }
        let session = self.open_session(&account);
        self.save_users()?;
        Ok(session)
    }

    async fn sign_up(&self, registration: &Registration) -> Result<AuthSession, ServiceError> {
        self.enter(BackendOp::SignUp)?;
        let key = registration.email.trim().to_lowercase();
        if self.accounts.contains_key(&key) {
            return Err(ServiceError::AuthError("User already registered".into()));
        }
        let account = self.create_account(&key, &registration.password)?;
        self.profiles.insert(
            account.id,
            Profile {
                id: account.id,
                first_name: registration.first_name.clone(),
                last_name: registration.last_name.clone(),
                phone: None,
                role: Role::Client,
                created_at: Some(Utc::now()),
            },
        );
        let session = self.open_session(&account);
        self.save_users()?;
        Ok(session)
    }

    async fn sign_out(&self, session: &AuthSession) -> Result<(), ServiceError> {
        self.enter(BackendOp::SignOut)?;
        self.sessions.remove(&session.access_token);
        self.save_users()
    }

    async fn resume(&self, session: &AuthSession) -> Result<AuthSession, ServiceError> {
        self.enter(BackendOp::Resume)?;
        let stored = self
            .sessions
            .get(&session.access_token)
            .map(|s| s.value().clone())
            .ok_or_else(|| ServiceError::AuthError("Session not found".into()))?;
        if stored.is_expired() {
            self.sessions.remove(&session.access_token);
            self.save_users()?;
            return Err(ServiceError::AuthError("Session expired".into()));
        }
        Ok(stored)
    }
}

#[async_trait]
impl ProfileRepository for InMemoryBackend {
    async fn fetch_profile(&self, user_id: Uuid) -> Result<Option<Profile>, ServiceError> {
        self.enter(BackendOp::FetchProfile)?;
        Ok(self.profiles.get(&user_id).map(|p| p.value().clone()))
    }
}

#[async_trait]
impl OrderRepository for InMemoryBackend {
    async fn insert_order(&self, order: &NewOrder) -> Result<Order, ServiceError> {
        self.enter(BackendOp::InsertOrder)?;
        let stored = Order {
            id: Uuid::new_v4(),
            user_id: order.user_id,
            user_email: order.user_email.clone(),
            user_name: order.user_name.clone(),
            created_at: Utc::now(),
            items: Vec::new(),
            total: order.total,
            status: order.status,
            priority: order.priority,
            payment_method: order.payment_method,
            specifications: order.specifications.clone(),
            notes: order.notes.clone(),
        };
        self.orders.insert(stored.id, stored.clone());
        self.save_orders()?;
        Ok(stored)
    }

    async fn insert_order_items(
        &self,
        items: &[NewOrderItem],
    ) -> Result<Vec<OrderItem>, ServiceError> {
        self.enter(BackendOp::InsertOrderItems)?;
        // all-or-nothing, like a single multi-row insert
        if let Some(orphan) = items.iter().find(|i| !self.orders.contains_key(&i.order_id)) {
            return Err(ServiceError::BackendError(format!(
                "insert or update on table \"order_items\" violates foreign key constraint (order {})",
                orphan.order_id
            )));
        }
        let stored: Vec<OrderItem> = items
            .iter()
            .cloned()
            .map(|item| item.into_item(Uuid::new_v4()))
            .collect();
        for item in &stored {
            self.items.insert(item.id, item.clone());
        }
        self.save_orders()?;
        Ok(stored)
    }

    async fn list_orders(&self) -> Result<Vec<Order>, ServiceError> {
        self.enter(BackendOp::ListOrders)?;
        Ok(self.sorted_orders(None))
    }

    async fn list_orders_for_user(&self, user_id: Uuid) -> Result<Vec<Order>, ServiceError> {
        self.enter(BackendOp::ListOrders)?;
        Ok(self.sorted_orders(Some(user_id)))
    }

    async fn update_order_status(
        &self,
        order_id: Uuid,
        status: OrderStatus,
    ) -> Result<(), ServiceError> {
        self.enter(BackendOp::UpdateOrderStatus)?;
        {
            let mut order = self
                .orders
                .get_mut(&order_id)
                .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;
            order.status = status;
        }
        self.save_orders()
    }

    async fn delete_order(&self, order_id: Uuid) -> Result<(), ServiceError> {
        self.enter(BackendOp::DeleteOrder)?;
        self.orders.remove(&order_id);
        self.items.retain(|_, item| item.order_id != order_id);
        self.save_orders()
    }
}

#[async_trait]
impl ObjectStorage for InMemoryBackend {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        content_type: &str,
        body: Bytes,
    ) -> Result<(), ServiceError> {
        self.enter(BackendOp::Upload)?;
        let key = object_key(bucket, path);
        // upsert is off: an existing object is a conflict
        if self.objects.contains_key(&key) {
            return Err(ServiceError::BackendError("The resource already exists".into()));
        }
        self.objects.insert(
            key,
            StoredObject {
                content_type: content_type.to_string(),
                body,
            },
        );
        Ok(())
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("memory://{bucket}/{path}")
    }
}
