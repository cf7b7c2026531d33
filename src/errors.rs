use serde::Serialize;

/// Broad classes of failure, used to decide how an error is presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Rejected locally before any request was sent.
    Validation,
    /// Reported by the backend (auth, database, object storage, transport).
    Backend,
    /// Anything else; shown to the user generically.
    Unexpected,
}

#[derive(Debug, thiserror::Error, Serialize)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(
        #[from]
        #[serde(skip)]
        sea_orm::error::DbErr,
    ),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Authentication error: {0}")]
    AuthError(String),

    #[error("Invalid status: {0}")]
    InvalidStatus(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Message returned by the hosted backend, kept verbatim.
    #[error("{0}")]
    BackendError(String),

    #[error("Upload failed for {file}: {message}")]
    UploadError { file: String, message: String },

    #[error("External service error: {0}")]
    ExternalServiceError(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("JWT error: {0}")]
    JwtError(String),

    #[error("Hash error: {0}")]
    HashError(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("Other error: {0}")]
    Other(
        #[from]
        #[serde(skip)]
        anyhow::Error,
    ),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        let mut fields: Vec<_> = err.field_errors().into_iter().collect();
        fields.sort_by_key(|(field, _)| *field);
        let messages: Vec<String> = fields
            .into_iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |e| match &e.message {
                    Some(message) => message.to_string(),
                    None => format!("{field} is invalid"),
                })
            })
            .collect();
        if messages.is_empty() {
            ServiceError::ValidationError(err.to_string())
        } else {
            ServiceError::ValidationError(messages.join("; "))
        }
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(err: serde_json::Error) -> Self {
        ServiceError::SerializationError(err.to_string())
    }
}

impl From<reqwest::Error> for ServiceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ServiceError::SerializationError(err.to_string())
        } else {
            ServiceError::ExternalServiceError(err.to_string())
        }
    }
}

impl From<jsonwebtoken::errors::Error> for ServiceError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        ServiceError::JwtError(err.to_string())
    }
}

impl From<std::io::Error> for ServiceError {
    fn from(err: std::io::Error) -> Self {
        ServiceError::StorageError(err.to_string())
    }
}

impl ServiceError {
    pub fn validation(message: impl Into<String>) -> Self {
        ServiceError::ValidationError(message.into())
    }

    /// Classifies the error for presentation.
    /// This is the single source of truth for error-to-category mapping.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::ValidationError(_)
            | Self::InvalidStatus(_)
            | Self::Unauthorized(_)
            | Self::Forbidden(_) => ErrorCategory::Validation,
            Self::DatabaseError(_)
            | Self::NotFound(_)
            | Self::AuthError(_)
            | Self::BackendError(_)
            | Self::UploadError { .. }
            | Self::ExternalServiceError(_)
            | Self::StorageError(_)
            | Self::JwtError(_) => ErrorCategory::Backend,
            Self::SerializationError(_)
            | Self::HashError(_)
            | Self::InternalError(_)
            | Self::Other(_) => ErrorCategory::Unexpected,
        }
    }

    /// Text suitable for a user-facing notification.
    /// Backend messages pass through verbatim; unexpected errors are generic.
    pub fn user_message(&self) -> String {
        match self {
            Self::BackendError(msg) | Self::AuthError(msg) => msg.clone(),
            Self::ValidationError(msg)
            | Self::InvalidStatus(msg)
            | Self::Unauthorized(msg)
            | Self::Forbidden(msg) => msg.clone(),
            Self::UploadError { file, message } => {
                format!("Failed to upload {}: {}", file, message)
            }
            Self::DatabaseError(err) => err.to_string(),
            _ if self.category() == ErrorCategory::Unexpected => {
                "An unexpected error occurred".to_string()
            }
            _ => self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_messages_are_verbatim() {
        let err = ServiceError::BackendError("Invalid login credentials".into());
        assert_eq!(err.category(), ErrorCategory::Backend);
        assert_eq!(err.user_message(), "Invalid login credentials");
    }

    #[test]
    fn unexpected_errors_are_generic() {
        let err = ServiceError::SerializationError("expected value at line 1".into());
        assert_eq!(err.category(), ErrorCategory::Unexpected);
        assert_eq!(err.user_message(), "An unexpected error occurred");
    }

    #[test]
    fn validation_errors_keep_their_message() {
        let err = ServiceError::validation("Your cart is empty");
        assert_eq!(err.category(), ErrorCategory::Validation);
        assert_eq!(err.user_message(), "Your cart is empty");
    }

    #[test]
    fn upload_errors_name_the_file() {
        let err = ServiceError::UploadError {
            file: "sketch.png".into(),
            message: "Payload too large".into(),
        };
        assert_eq!(err.user_message(), "Failed to upload sketch.png: Payload too large");
    }
}
