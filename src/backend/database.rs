//! Self-hosted backend: sea-orm tables, local accounts and a directory of
//! attachments served from a public base URL.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{info, instrument};
use uuid::Uuid;

use super::{AuthProvider, ObjectStorage, OrderRepository, ProfileRepository};
use crate::auth::{hash_password, verify_password, TokenService};
use crate::config::AppConfig;
use crate::db::{establish_connection_with_config, run_migrations};
use crate::entities::{order, order_item, profile};
use crate::errors::ServiceError;
use crate::models::{
    AuthSession, NewOrder, NewOrderItem, Order, OrderItem, OrderStatus, Profile, Registration,
    Role,
};

#[derive(Debug, Clone)]
pub struct DatabaseBackend {
    db: Arc<DatabaseConnection>,
    tokens: TokenService,
    attachments_dir: PathBuf,
    public_base_url: String,
}

impl DatabaseBackend {
    pub fn new(
        db: Arc<DatabaseConnection>,
        tokens: TokenService,
        attachments_dir: impl Into<PathBuf>,
        public_base_url: &str,
    ) -> Self {
        Self {
            db,
            tokens,
            attachments_dir: attachments_dir.into(),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Connects, applies pending migrations and wires up token issuing.
    pub async fn from_config(config: &AppConfig) -> Result<Self, ServiceError> {
        let db = establish_connection_with_config(&config.db_config()).await?;
        run_migrations(&db).await?;
        Ok(Self::new(
            Arc::new(db),
            TokenService::new(config.token_config()),
            &config.attachments_dir,
            &config.public_base_url,
        ))
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    /// Creates the account if needed and gives it the admin role.
    #[instrument(skip(self, password))]
    pub async fn ensure_admin(&self, email: &str, password: &str) -> Result<Uuid, ServiceError> {
        let email = normalize_email(email);
        let existing = profile::Entity::find()
            .filter(profile::Column::Email.eq(email.as_str()))
            .one(&*self.db)
            .await?;

        let id = match existing {
            Some(row) => {
                let id = row.id;
                let mut active: profile::ActiveModel = row.into();
                active.role = Set(Role::Admin);
                active.update(&*self.db).await?;
                id
            }
            None => {
                let row = self
                    .insert_profile(&email, password, Some("Admin".into()), None, Role::Admin)
                    .await?;
                row.id
            }
        };
        info!(%email, user_id = %id, "Administrator account ready");
        Ok(id)
    }

    async fn insert_profile(
        &self,
        email: &str,
        password: &str,
        first_name: Option<String>,
        last_name: Option<String>,
        role: Role,
    ) -> Result<profile::Model, ServiceError> {
        let row = profile::ActiveModel {
            id: Set(Uuid::new_v4()),
            email: Set(email.to_string()),
            password_hash: Set(hash_password(password)?),
            first_name: Set(first_name),
            last_name: Set(last_name),
            phone: Set(None),
            role: Set(role),
            created_at: Set(Utc::now()),
        };
        Ok(row.insert(&*self.db).await?)
    }

    async fn orders_where(&self, owner: Option<Uuid>) -> Result<Vec<Order>, ServiceError> {
        let mut query = order::Entity::find().order_by_desc(order::Column::CreatedAt);
        if let Some(user_id) = owner {
            query = query.filter(order::Column::UserId.eq(user_id));
        }
        let rows = query
            .find_with_related(order_item::Entity)
            .all(&*self.db)
            .await?;

        let mut orders = rows
            .into_iter()
            .map(|(row, items)| row.into_order(items.into_iter().map(OrderItem::from).collect()))
            .collect::<Result<Vec<_>, _>>()?;
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    fn object_path(&self, bucket: &str, path: &str) -> Result<PathBuf, ServiceError> {
        let relative = Path::new(bucket).join(path);
        let safe = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if !safe || path.is_empty() {
            return Err(ServiceError::validation(format!(
                "Invalid object path: {bucket}/{path}"
            )));
        }
        Ok(self.attachments_dir.join(relative))
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[async_trait]
impl AuthProvider for DatabaseBackend {
    #[instrument(skip(self, password))]
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, ServiceError> {
        let invalid = || ServiceError::AuthError("Invalid login credentials".into());
        let row = profile::Entity::find()
            .filter(profile::Column::Email.eq(normalize_email(email)))
            .one(&*self.db)
            .await?
            .ok_or_else(invalid)?;
        if !verify_password(password, &row.password_hash)? {
            return Err(invalid());
        }
        self.tokens.issue(row.id, &row.email)
    }

    #[instrument(skip(self, registration), fields(email = %registration.email))]
    async fn sign_up(&self, registration: &Registration) -> Result<AuthSession, ServiceError> {
        let email = normalize_email(&registration.email);
        let taken = profile::Entity::find()
            .filter(profile::Column::Email.eq(email.as_str()))
            .one(&*self.db)
            .await?
            .is_some();
        if taken {
            return Err(ServiceError::AuthError("User already registered".into()));
        }

        let row = self
            .insert_profile(
                &email,
                &registration.password,
                registration.first_name.clone(),
                registration.last_name.clone(),
                Role::Client,
            )
            .await?;
        info!(user_id = %row.id, "Account created");
        self.tokens.issue(row.id, &row.email)
    }

    async fn sign_out(&self, session: &AuthSession) -> Result<(), ServiceError> {
        self.tokens.revoke(&session.access_token).await
    }

    async fn resume(&self, session: &AuthSession) -> Result<AuthSession, ServiceError> {
        let claims = self.tokens.validate(&session.access_token).await?;
        let user_id = Uuid::parse_str(&claims.sub)
            .map_err(|_| ServiceError::AuthError("Invalid session token".into()))?;
        if profile::Entity::find_by_id(user_id)
            .one(&*self.db)
            .await?
            .is_none()
        {
            return Err(ServiceError::AuthError("User not found".into()));
        }
        Ok(AuthSession {
            user_id,
            email: claims.email,
            access_token: session.access_token.clone(),
            expires_at: DateTime::from_timestamp(claims.exp, 0),
        })
    }
}

#[async_trait]
impl ProfileRepository for DatabaseBackend {
    async fn fetch_profile(&self, user_id: Uuid) -> Result<Option<Profile>, ServiceError> {
        let row = profile::Entity::find_by_id(user_id).one(&*self.db).await?;
        Ok(row.map(Profile::from))
    }
}

#[async_trait]
impl OrderRepository for DatabaseBackend {
    #[instrument(skip(self, new_order), fields(user_id = %new_order.user_id))]
    async fn insert_order(&self, new_order: &NewOrder) -> Result<Order, ServiceError> {
        let row = order::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(new_order.user_id),
            user_email: Set(new_order.user_email.clone()),
            user_name: Set(new_order.user_name.clone()),
            total: Set(new_order.total),
            status: Set(new_order.status),
            priority: Set(new_order.priority),
            payment_method: Set(new_order.payment_method),
            specifications: Set(serde_json::to_value(&new_order.specifications)?),
            notes: Set(new_order.notes.clone()),
            created_at: Set(Utc::now()),
        }
        .insert(&*self.db)
        .await?;
        row.into_order(Vec::new())
    }

    async fn insert_order_items(
        &self,
        items: &[NewOrderItem],
    ) -> Result<Vec<OrderItem>, ServiceError> {
        let txn = self.db.begin().await?;
        let mut stored = Vec::with_capacity(items.len());
        for item in items {
            let quantity = i32::try_from(item.quantity)
                .map_err(|_| ServiceError::validation("Quantity is out of range"))?;
            let row = order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(item.order_id),
                service_id: Set(item.service_id.clone()),
                service_name: Set(item.service_name.clone()),
                price: Set(item.price),
                quantity: Set(quantity),
                variations: Set(item.variation.clone()),
            }
            .insert(&txn)
            .await?;
            stored.push(OrderItem::from(row));
        }
        txn.commit().await?;
        Ok(stored)
    }

    async fn list_orders(&self) -> Result<Vec<Order>, ServiceError> {
        self.orders_where(None).await
    }

    async fn list_orders_for_user(&self, user_id: Uuid) -> Result<Vec<Order>, ServiceError> {
        self.orders_where(Some(user_id)).await
    }

    async fn update_order_status(
        &self,
        order_id: Uuid,
        status: OrderStatus,
    ) -> Result<(), ServiceError> {
        let row = order::Entity::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;
        let mut active: order::ActiveModel = row.into();
        active.status = Set(status);
        active.update(&*self.db).await?;
        Ok(())
    }

    async fn delete_order(&self, order_id: Uuid) -> Result<(), ServiceError> {
        let txn = self.db.begin().await?;
        order_item::Entity::delete_many()
            .filter(order_item::Column::OrderId.eq(order_id))
            .exec(&txn)
            .await?;
        order::Entity::delete_by_id(order_id).exec(&txn).await?;
        txn.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl ObjectStorage for DatabaseBackend {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        _content_type: &str,
        body: Bytes,
    ) -> Result<(), ServiceError> {
        let target = self.object_path(bucket, path)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await?;
        }
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&target)
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::AlreadyExists => {
                    ServiceError::BackendError("The resource already exists".into())
                }
                _ => ServiceError::from(e),
            })?;
        file.write_all(&body).await?;
        file.flush().await?;
        Ok(())
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("{}/{}/{}", self.public_base_url, bucket, path)
    }
}
