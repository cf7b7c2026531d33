use chrono::{DateTime, Duration as ChronoDuration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::models::AuthSession;

/// Claim structure for access tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,   // Subject (user ID)
    pub email: String, // User's email
    pub jti: String,   // Token ID, used for revocation
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
}

#[derive(Clone, Debug)]
pub struct TokenConfig {
    pub secret: String,
    pub issuer: String,
    pub expiration: Duration,
}

/// Issues and validates access tokens for locally managed accounts.
#[derive(Debug, Clone)]
pub struct TokenService {
    config: TokenConfig,
    // jti -> expiry
    revoked: Arc<RwLock<HashMap<String, DateTime<Utc>>>>,
}

impl TokenService {
    pub fn new(config: TokenConfig) -> Self {
        Self {
            config,
            revoked: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn issue(&self, user_id: Uuid, email: &str) -> Result<AuthSession, ServiceError> {
        let now = Utc::now();
        let expires_at = now
            + ChronoDuration::from_std(self.config.expiration)
                .map_err(|_| ServiceError::InternalError("Invalid token duration".into()))?;

        let claims = Claims {
            sub: user_id.to_string(),
            email: email.to_string(),
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            iss: self.config.issuer.clone(),
        };

        let access_token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.config.secret.as_bytes()),
        )?;

        Ok(AuthSession {
            user_id,
            email: email.to_string(),
            access_token,
            expires_at: Some(expires_at),
        })
    }

    pub async fn validate(&self, token: &str) -> Result<Claims, ServiceError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[self.config.issuer.as_str()]);

        let claims = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.config.secret.as_bytes()),
            &validation,
        )
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                ServiceError::AuthError("Session expired".into())
            }
            _ => ServiceError::AuthError("Invalid session token".into()),
        })?
        .claims;

        if self.revoked.read().await.contains_key(&claims.jti) {
            return Err(ServiceError::AuthError("Session has been revoked".into()));
        }

        Ok(claims)
    }

    /// Adds the token to the revocation list until it would have expired anyway.
    pub async fn revoke(&self, token: &str) -> Result<(), ServiceError> {
        let claims = self.validate(token).await?;
        let expiry = DateTime::from_timestamp(claims.exp, 0).unwrap_or_else(Utc::now);

        let mut revoked = self.revoked.write().await;
        let now = Utc::now();
        revoked.retain(|_, exp| *exp > now);
        revoked.insert(claims.jti, expiry);
        debug!(entries = revoked.len(), "Token revoked");
        Ok(())
    }
}
