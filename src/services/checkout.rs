use bytes::Bytes;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use validator::Validate;

use crate::backend::Backend;
use crate::errors::ServiceError;
use crate::models::{
    CartItem, NewOrder, Order, OrderPriority, OrderSpecifications, OrderStatus, PaymentMethod, User,
};
use crate::services::orders::OrderService;

pub const MAX_ATTACHMENTS: usize = 3;
pub const ATTACHMENTS_BUCKET: &str = "order-attachments";
const FALLBACK_EXTENSION: &str = "bin";

/// A reference file picked by the customer.
#[derive(Clone)]
pub struct Attachment {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

impl Attachment {
    pub fn new(
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: impl Into<Bytes>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes: bytes.into(),
        }
    }

    /// Text after the last dot when it is plain ASCII letters and digits,
    /// `bin` otherwise. The result ends up in a storage path.
    pub fn extension(&self) -> &str {
        match self.file_name.rsplit_once('.') {
            Some((stem, ext))
                if !stem.is_empty()
                    && !ext.is_empty()
                    && ext.chars().all(|c| c.is_ascii_alphanumeric()) =>
            {
                ext
            }
            _ => FALLBACK_EXTENSION,
        }
    }
}

impl fmt::Debug for Attachment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attachment")
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Selected attachments, capped at [`MAX_ATTACHMENTS`].
#[derive(Clone, Debug, Default)]
pub struct Attachments {
    files: Vec<Attachment>,
}

impl Attachments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a selection; anything past the cap is dropped.
    /// Returns how many files were kept.
    pub fn add<I>(&mut self, selection: I) -> usize
    where
        I: IntoIterator<Item = Attachment>,
    {
        let before = self.files.len();
        for file in selection {
            if self.files.len() == MAX_ATTACHMENTS {
                debug!(file = %file.file_name, "Attachment limit reached; file dropped");
                continue;
            }
            self.files.push(file);
        }
        self.files.len() - before
    }

    pub fn file_names(&self) -> Vec<&str> {
        self.files.iter().map(|f| f.file_name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn clear(&mut self) {
        self.files.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &Attachment> {
        self.files.iter()
    }
}

/// Contact details and project brief entered on the checkout page.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct CheckoutForm {
    #[validate(custom = "not_blank")]
    pub name: String,
    #[validate(email(message = "A valid email is required"))]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    pub style: String,
    #[serde(default)]
    pub software: Vec<String>,
    pub budget_range: String,
    #[serde(default)]
    pub description: String,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub notes: String,
}

fn not_blank(value: &str) -> Result<(), validator::ValidationError> {
    if value.trim().is_empty() {
        let mut err = validator::ValidationError::new("required");
        err.message = Some("Name is required".into());
        return Err(err);
    }
    Ok(())
}

impl Default for CheckoutForm {
    fn default() -> Self {
        Self {
            name: String::new(),
            email: String::new(),
            phone: String::new(),
            style: "Realista".to_string(),
            software: Vec::new(),
            budget_range: "$100-500".to_string(),
            description: String::new(),
            payment_method: PaymentMethod::CreditCard,
            notes: String::new(),
        }
    }
}

impl CheckoutForm {
    /// Form prefilled from the signed-in user.
    pub fn for_user(user: &User) -> Self {
        Self {
            name: user.display_name(),
            email: user.email.clone(),
            phone: user.phone.clone().unwrap_or_default(),
            ..Self::default()
        }
    }
}

/// Turns the cart into a persisted order.
#[derive(Clone)]
pub struct CheckoutService {
    backend: Arc<dyn Backend>,
    orders: OrderService,
    bucket: String,
}

impl CheckoutService {
    pub fn new(backend: Arc<dyn Backend>, orders: OrderService) -> Self {
        Self {
            backend,
            orders,
            bucket: ATTACHMENTS_BUCKET.to_string(),
        }
    }

    pub fn with_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = bucket.into();
        self
    }

    /// Validates, uploads the attachments, then writes the order and its
    /// items. Nothing reaches the backend when validation fails, and an
    /// upload failure aborts before the order row is written.
    #[instrument(skip_all, fields(lines = cart.len(), attachments = attachments.len()))]
    pub async fn submit(
        &self,
        user: Option<&User>,
        cart: &[CartItem],
        form: &CheckoutForm,
        attachments: &Attachments,
    ) -> Result<Order, ServiceError> {
        let user = user.ok_or_else(|| {
            ServiceError::Unauthorized("You must sign in to complete the order".into())
        })?;
        if cart.is_empty() {
            return Err(ServiceError::validation(
                "Your cart is empty. Add services before checking out.",
            ));
        }
        form.validate()?;

        let order_token = format!("ORD-{}", Utc::now().timestamp_millis());
        let files = self
            .upload_attachments(&user.id.to_string(), &order_token, attachments)
            .await?;

        let total = cart.iter().map(CartItem::line_total).sum();
        let new_order = NewOrder {
            user_id: user.id,
            user_email: form.email.trim().to_string(),
            user_name: form.name.trim().to_string(),
            total,
            status: OrderStatus::Pending,
            priority: OrderPriority::Normal,
            payment_method: Some(form.payment_method),
            specifications: OrderSpecifications {
                style: form.style.clone(),
                software: form.software.clone(),
                description: form.description.clone(),
                budget_range: form.budget_range.clone(),
                files,
            },
            notes: Some(form.notes.trim().to_string()).filter(|n| !n.is_empty()),
        };

        let order = self.orders.place_order(new_order, cart).await?;
        info!(order_id = %order.id, %order_token, "Checkout completed");
        Ok(order)
    }

    async fn upload_attachments(
        &self,
        user_id: &str,
        order_token: &str,
        attachments: &Attachments,
    ) -> Result<Vec<String>, ServiceError> {
        let mut urls = Vec::with_capacity(attachments.len());
        for (index, file) in attachments.iter().enumerate() {
            let path = format!(
                "{}/{}/{}-{}.{}",
                user_id,
                order_token,
                Utc::now().timestamp_millis(),
                index,
                file.extension()
            );
            if let Err(err) = self
                .backend
                .upload(&self.bucket, &path, &file.content_type, file.bytes.clone())
                .await
            {
                warn!(file = %file.file_name, error = %err, "Attachment upload failed");
                return Err(ServiceError::UploadError {
                    file: file.file_name.clone(),
                    message: err.user_message(),
                });
            }
            urls.push(self.backend.public_url(&self.bucket, &path));
        }
        Ok(urls)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendOp, InMemoryBackend, OrderRepository};
    use crate::events::EventSender;
    use crate::models::AuthSession;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn user() -> User {
        let session = AuthSession {
            user_id: Uuid::new_v4(),
            email: "ana@example.com".into(),
            access_token: "token".into(),
            expires_at: None,
        };
        User::from_session(&session, None)
    }

    fn cart() -> Vec<CartItem> {
        vec![CartItem {
            service_id: "1".into(),
            service_name: "Ilustración".into(),
            price: dec!(250),
            quantity: 1,
            variation: None,
        }]
    }

    fn checkout(backend: &Arc<InMemoryBackend>) -> CheckoutService {
        let orders = OrderService::new(backend.clone(), EventSender::default());
        CheckoutService::new(backend.clone(), orders)
    }

    fn png(name: &str) -> Attachment {
        Attachment::new(name, "image/png", vec![0u8; 8])
    }

    #[test]
    fn selection_is_capped_at_three() {
        let mut files = Attachments::new();
        assert_eq!(files.add([png("a.png"), png("b.png")]), 2);
        assert_eq!(files.add([png("c.png"), png("d.png")]), 1);
        assert_eq!(files.file_names(), vec!["a.png", "b.png", "c.png"]);
    }

    #[test]
    fn extension_is_the_last_segment() {
        assert_eq!(png("sketch.final.psd").extension(), "psd");
        assert_eq!(png("README").extension(), "bin");
    }

    #[test]
    fn unsafe_extensions_fall_back_to_bin() {
        assert_eq!(png("a.png/x").extension(), "bin");
        assert_eq!(png("board.png/../../x").extension(), "bin");
        assert_eq!(png("notes.tar gz").extension(), "bin");
        assert_eq!(png(".env").extension(), "bin");
        assert_eq!(png("trailing.").extension(), "bin");
        assert_eq!(png("scan.JPG").extension(), "JPG");
    }

    #[test]
    fn form_is_prefilled_from_the_user() {
        let form = CheckoutForm::for_user(&user());
        assert_eq!(form.name, "ana");
        assert_eq!(form.email, "ana@example.com");
        assert_eq!(form.style, "Realista");
        assert!(form.validate().is_ok());
    }

    #[tokio::test]
    async fn anonymous_checkout_is_rejected_before_the_backend() {
        let backend = Arc::new(InMemoryBackend::new());
        let err = checkout(&backend)
            .submit(None, &cart(), &CheckoutForm::default(), &Attachments::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized(_)));
        assert_eq!(backend.total_calls(), 0);
    }

    #[tokio::test]
    async fn blank_contact_details_are_rejected() {
        let backend = Arc::new(InMemoryBackend::new());
        let form = CheckoutForm {
            email: "nope".into(),
            ..CheckoutForm::default()
        };
        let err = checkout(&backend)
            .submit(Some(&user()), &cart(), &form, &Attachments::new())
            .await
            .unwrap_err();
        assert_eq!(
            err.user_message(),
            "A valid email is required; Name is required"
        );
        assert_eq!(backend.total_calls(), 0);
    }

    #[tokio::test]
    async fn attachments_are_uploaded_and_referenced() {
        let backend = Arc::new(InMemoryBackend::new());
        let user = user();
        let mut files = Attachments::new();
        files.add([png("ref.png"), png("mood.png")]);

        let order = checkout(&backend)
            .submit(Some(&user), &cart(), &CheckoutForm::for_user(&user), &files)
            .await
            .unwrap();

        assert_eq!(order.specifications.files.len(), 2);
        assert_eq!(backend.calls(BackendOp::Upload), 2);
        for url in &order.specifications.files {
            let prefix = format!("memory://{}/{}/ORD-", ATTACHMENTS_BUCKET, user.id);
            assert!(url.starts_with(&prefix), "{url}");
            assert!(url.ends_with(".png"));
        }
        assert_eq!(order.payment_method, Some(PaymentMethod::CreditCard));
        assert_eq!(order.priority, OrderPriority::Normal);
    }

    #[tokio::test]
    async fn upload_failure_aborts_before_the_order() {
        let backend = Arc::new(InMemoryBackend::new());
        backend.fail_on(BackendOp::Upload, "Payload too large");
        let user = user();
        let mut files = Attachments::new();
        files.add([png("huge.png")]);

        let err = checkout(&backend)
            .submit(Some(&user), &cart(), &CheckoutForm::for_user(&user), &files)
            .await
            .unwrap_err();

        assert_eq!(err.user_message(), "Failed to upload huge.png: Payload too large");
        assert_eq!(backend.calls(BackendOp::InsertOrder), 0);
        assert!(backend.list_orders().await.unwrap().is_empty());
    }
}
