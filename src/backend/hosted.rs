//! Client for a Supabase-compatible backend-as-a-service.
//!
//! Auth goes through GoTrue (`/auth/v1`), tables through PostgREST
//! (`/rest/v1`) and attachments through the storage API (`/storage/v1`).
//! Every request carries the project's anon key in `apikey`; the bearer is
//! the signed-in user's access token, or the anon key while signed out.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};
use url::Url;
use uuid::Uuid;

use super::{AuthProvider, ObjectStorage, OrderRepository, ProfileRepository};
use crate::config::AppConfig;
use crate::errors::ServiceError;
use crate::models::{
    AuthSession, NewOrder, NewOrderItem, Order, OrderItem, OrderPriority, OrderSpecifications,
    OrderStatus, PaymentMethod, Profile, Registration,
};

const USER_AGENT: &str = concat!("studio-storefront/", env!("CARGO_PKG_VERSION"));
const ORDERS_WITH_ITEMS: &str = "*,order_items(*)";

/// Which API family a request belongs to; decides the error variant.
#[derive(Clone, Copy, Debug)]
enum Api {
    Auth,
    Rest,
    Storage,
}

pub struct HostedBackend {
    client: reqwest::Client,
    base_url: String,
    anon_key: String,
    access_token: RwLock<Option<String>>,
}

impl std::fmt::Debug for HostedBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostedBackend")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl HostedBackend {
    pub fn new(
        base_url: &str,
        anon_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ServiceError> {
        let parsed = Url::parse(base_url)
            .map_err(|e| ServiceError::validation(format!("Invalid hosted backend URL: {e}")))?;
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: parsed.as_str().trim_end_matches('/').to_string(),
            anon_key: anon_key.into(),
            access_token: RwLock::new(None),
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, ServiceError> {
        let url = config
            .hosted_url
            .as_deref()
            .ok_or_else(|| ServiceError::validation("hosted_url is not configured"))?;
        let key = config
            .hosted_anon_key
            .as_deref()
            .ok_or_else(|| ServiceError::validation("hosted_anon_key is not configured"))?;
        Self::new(url, key, config.request_timeout())
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn headers(&self) -> HeaderMap {
        let bearer = self
            .access_token
            .read()
            .await
            .clone()
            .unwrap_or_else(|| self.anon_key.clone());
        self.headers_with(&bearer)
    }

    fn headers_with(&self, bearer: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        match HeaderValue::from_str(&self.anon_key) {
            Ok(value) => {
                headers.insert("apikey", value);
            }
            Err(err) => warn!("Invalid anon key header value: {}", err),
        }
        match HeaderValue::from_str(&format!("Bearer {bearer}")) {
            Ok(value) => {
                headers.insert(AUTHORIZATION, value);
            }
            Err(err) => warn!("Invalid bearer header value: {}", err),
        }
        headers
    }

    async fn set_token(&self, token: Option<String>) {
        *self.access_token.write().await = token;
    }

    async fn send(&self, api: Api, request: RequestBuilder) -> Result<Response, ServiceError> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = error_message(&body).unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("Request failed")
                .to_string()
        });
        debug!(%status, %message, "Hosted backend returned an error");
        Err(match api {
            Api::Auth => ServiceError::AuthError(message),
            Api::Rest | Api::Storage => ServiceError::BackendError(message),
        })
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        api: Api,
        request: RequestBuilder,
    ) -> Result<T, ServiceError> {
        let response = self.send(api, request).await?;
        Ok(response.json::<T>().await?)
    }

    async fn open_session(&self, token: TokenResponse) -> AuthSession {
        let expires_at = token.expires_at().or_else(|| {
            token
                .expires_in
                .map(|secs| Utc::now() + ChronoDuration::seconds(secs))
        });
        self.set_token(Some(token.access_token.clone())).await;
        AuthSession {
            user_id: token.user.id,
            email: token.user.email.unwrap_or_default(),
            access_token: token.access_token,
            expires_at,
        }
    }

    async fn fetch_orders(&self, owner: Option<Uuid>) -> Result<Vec<Order>, ServiceError> {
        let mut query = vec![
            ("select", ORDERS_WITH_ITEMS.to_string()),
            ("order", "created_at.desc".to_string()),
        ];
        if let Some(user_id) = owner {
            query.push(("user_id", format!("eq.{user_id}")));
        }
        let request = self
            .client
            .get(self.endpoint("rest/v1/orders"))
            .headers(self.headers().await)
            .query(&query);
        let rows: Vec<OrderRow> = self.send_json(Api::Rest, request).await?;
        Ok(rows.into_iter().map(Order::from).collect())
    }
}

/// First of `message`, `msg`, `error_description`, `error` in a JSON body.
fn error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    ["message", "msg", "error_description", "error"]
        .iter()
        .find_map(|key| value.get(key).and_then(|v| v.as_str()))
        .map(str::to_string)
}

#[derive(Debug, Deserialize)]
struct HostedUser {
    id: Uuid,
    #[serde(default)]
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    user: HostedUser,
}

impl TokenResponse {
    fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at.and_then(|ts| DateTime::from_timestamp(ts, 0))
    }
}

/// Sign-up answers with a session when confirmation is off, a bare user otherwise.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SignUpResponse {
    Session(TokenResponse),
    Pending(HostedUser),
}

#[derive(Debug, Serialize)]
struct PasswordGrant<'a> {
    email: &'a str,
    password: &'a str,
}

/// `orders` row with the embedded `order_items` relation.
#[derive(Debug, Deserialize)]
struct OrderRow {
    id: Uuid,
    user_id: Uuid,
    user_email: String,
    user_name: String,
    created_at: DateTime<Utc>,
    total: rust_decimal::Decimal,
    status: OrderStatus,
    #[serde(default)]
    priority: OrderPriority,
    #[serde(default)]
    payment_method: Option<PaymentMethod>,
    #[serde(default)]
    specifications: Option<OrderSpecifications>,
    #[serde(default)]
    notes: Option<String>,
    #[serde(default)]
    order_items: Vec<OrderItem>,
}

impl From<OrderRow> for Order {
    fn from(row: OrderRow) -> Self {
        Order {
            id: row.id,
            user_id: row.user_id,
            user_email: row.user_email,
            user_name: row.user_name,
            created_at: row.created_at,
            items: row.order_items,
            total: row.total,
            status: row.status,
            priority: row.priority,
            payment_method: row.payment_method,
            specifications: row.specifications.unwrap_or_default(),
            notes: row.notes,
        }
    }
}

#[async_trait]
impl AuthProvider for HostedBackend {
    #[instrument(skip(self, password))]
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, ServiceError> {
        let request = self
            .client
            .post(self.endpoint("auth/v1/token"))
            .query(&[("grant_type", "password")])
            .headers(self.headers_with(&self.anon_key))
            .json(&PasswordGrant { email, password });
        let token: TokenResponse = self.send_json(Api::Auth, request).await?;
        Ok(self.open_session(token).await)
    }

    #[instrument(skip(self, registration), fields(email = %registration.email))]
    async fn sign_up(&self, registration: &Registration) -> Result<AuthSession, ServiceError> {
        let body = json!({
            "email": registration.email,
            "password": registration.password,
            "data": {
                "first_name": registration.first_name,
                "last_name": registration.last_name,
            },
        });
        let request = self
            .client
            .post(self.endpoint("auth/v1/signup"))
            .headers(self.headers_with(&self.anon_key))
            .json(&body);
        match self.send_json::<SignUpResponse>(Api::Auth, request).await? {
            SignUpResponse::Session(token) => Ok(self.open_session(token).await),
            SignUpResponse::Pending(user) => {
                debug!(user_id = %user.id, "Sign-up awaiting email confirmation");
                Err(ServiceError::AuthError(
                    "Check your email to confirm your account".into(),
                ))
            }
        }
    }

    async fn sign_out(&self, session: &AuthSession) -> Result<(), ServiceError> {
        let request = self
            .client
            .post(self.endpoint("auth/v1/logout"))
            .headers(self.headers_with(&session.access_token));
        let result = self.send(Api::Auth, request).await.map(|_| ());
        // the local token goes regardless of what the server said
        self.set_token(None).await;
        result
    }

    async fn resume(&self, session: &AuthSession) -> Result<AuthSession, ServiceError> {
        let request = self
            .client
            .get(self.endpoint("auth/v1/user"))
            .headers(self.headers_with(&session.access_token));
        let user: HostedUser = self.send_json(Api::Auth, request).await?;
        self.set_token(Some(session.access_token.clone())).await;
        Ok(AuthSession {
            user_id: user.id,
            email: user.email.unwrap_or_else(|| session.email.clone()),
            access_token: session.access_token.clone(),
            expires_at: session.expires_at,
        })
    }
}

#[async_trait]
impl ProfileRepository for HostedBackend {
    async fn fetch_profile(&self, user_id: Uuid) -> Result<Option<Profile>, ServiceError> {
        let request = self
            .client
            .get(self.endpoint("rest/v1/profiles"))
            .headers(self.headers().await)
            .query(&[("id", format!("eq.{user_id}")), ("select", "*".to_string())]);
        let rows: Vec<Profile> = self.send_json(Api::Rest, request).await?;
        Ok(rows.into_iter().next())
    }
}

#[async_trait]
impl OrderRepository for HostedBackend {
    #[instrument(skip(self, order), fields(user_id = %order.user_id))]
    async fn insert_order(&self, order: &NewOrder) -> Result<Order, ServiceError> {
        let request = self
            .client
            .post(self.endpoint("rest/v1/orders"))
            .headers(self.headers().await)
            .header("Prefer", "return=representation")
            .json(order);
        let rows: Vec<OrderRow> = self.send_json(Api::Rest, request).await?;
        rows.into_iter()
            .next()
            .map(Order::from)
            .ok_or_else(|| ServiceError::BackendError("Order insert returned no row".into()))
    }

    async fn insert_order_items(
        &self,
        items: &[NewOrderItem],
    ) -> Result<Vec<OrderItem>, ServiceError> {
        let request = self
            .client
            .post(self.endpoint("rest/v1/order_items"))
            .headers(self.headers().await)
            .header("Prefer", "return=representation")
            .json(items);
        self.send_json(Api::Rest, request).await
    }

    async fn list_orders(&self) -> Result<Vec<Order>, ServiceError> {
        self.fetch_orders(None).await
    }

    async fn list_orders_for_user(&self, user_id: Uuid) -> Result<Vec<Order>, ServiceError> {
        self.fetch_orders(Some(user_id)).await
    }

    async fn update_order_status(
        &self,
        order_id: Uuid,
        status: OrderStatus,
    ) -> Result<(), ServiceError> {
        let request = self
            .client
            .patch(self.endpoint("rest/v1/orders"))
            .headers(self.headers().await)
            .query(&[("id", format!("eq.{order_id}"))])
            .json(&json!({ "status": status }));
        self.send(Api::Rest, request).await.map(|_| ())
    }

    async fn delete_order(&self, order_id: Uuid) -> Result<(), ServiceError> {
        let request = self
            .client
            .delete(self.endpoint("rest/v1/orders"))
            .headers(self.headers().await)
            .query(&[("id", format!("eq.{order_id}"))]);
        self.send(Api::Rest, request).await.map(|_| ())
    }
}

#[async_trait]
impl ObjectStorage for HostedBackend {
    #[instrument(skip(self, body), fields(size = body.len()))]
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        content_type: &str,
        body: Bytes,
    ) -> Result<(), ServiceError> {
        let request = self
            .client
            .post(self.endpoint(&format!("storage/v1/object/{bucket}/{path}")))
            .headers(self.headers().await)
            .header(CONTENT_TYPE, content_type)
            .header("cache-control", "max-age=3600")
            .header("x-upsert", "false")
            .body(body);
        self.send(Api::Storage, request).await.map(|_| ())
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        self.endpoint(&format!("storage/v1/object/public/{bucket}/{path}"))
    }
}
