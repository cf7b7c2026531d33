use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{info, instrument};

use crate::errors::ServiceError;
use crate::models::{
    CartItem, NewOrder, Order, OrderPriority, OrderSpecifications, OrderStatus, PaymentMethod, User,
};
use crate::services::orders::OrderService;

pub const STYLE_OPTIONS: [&str; 6] = [
    "Animación 2D Vectorial",
    "Animación Tradicional (Frame-by-frame)",
    "3D Realista",
    "3D Low Poly",
    "Motion Graphics Corporativo",
    "Stop Motion Digital",
];

pub const DEPOSIT_SERVICE_ID: &str = "custom-deposit";
const DEPOSIT_NOTES: &str = "Custom service request - initial deposit";
const DEPOSIT_VARIATION: &str = "Initial deposit";
const CUSTOM_BUDGET: &str = "Custom Quote";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
pub enum WizardStep {
    #[default]
    Details,
    Payment,
    Confirmation,
}

/// Card fields typed into the payment step. Never sent anywhere.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct CardDetails {
    pub number: String,
    pub expiry: String,
    pub cvc: String,
    pub holder: String,
}

impl CardDetails {
    fn is_complete(&self) -> bool {
        !self.number.trim().is_empty() && !self.cvc.trim().is_empty()
    }
}

impl fmt::Debug for CardDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CardDetails")
            .field("number", &"[redacted]")
            .field("expiry", &"[redacted]")
            .field("cvc", &"[redacted]")
            .field("holder", &self.holder)
            .finish()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CustomRequest {
    pub style: String,
    pub description: String,
    pub payment_method: PaymentMethod,
    pub card: CardDetails,
}

/// Three-step intake for bespoke work, ending in a deposit order.
pub struct CustomRequestWizard {
    orders: OrderService,
    deposit: Decimal,
    step: WizardStep,
    request: CustomRequest,
    submitted: Option<Order>,
}

impl CustomRequestWizard {
    pub fn new(orders: OrderService, deposit: Decimal) -> Self {
        Self {
            orders,
            deposit,
            step: WizardStep::Details,
            request: CustomRequest::default(),
            submitted: None,
        }
    }

    pub fn step(&self) -> WizardStep {
        self.step
    }

    pub fn deposit(&self) -> Decimal {
        self.deposit
    }

    pub fn request(&self) -> &CustomRequest {
        &self.request
    }

    pub fn request_mut(&mut self) -> &mut CustomRequest {
        &mut self.request
    }

    /// The deposit order created by the last confirmation.
    pub fn submitted(&self) -> Option<&Order> {
        self.submitted.as_ref()
    }

    /// Advances one step.
    ///
    /// Leaving the payment step creates the deposit order, which is returned;
    /// the other transitions return `Ok(None)`. On error the step is kept.
    #[instrument(skip(self, user), fields(step = %self.step))]
    pub async fn next(&mut self, user: Option<&User>) -> Result<Option<Order>, ServiceError> {
        match self.step {
            WizardStep::Details => {
                if self.request.style.trim().is_empty()
                    || self.request.description.trim().is_empty()
                {
                    return Err(ServiceError::validation(
                        "Please complete every project field",
                    ));
                }
                self.step = WizardStep::Payment;
                Ok(None)
            }
            WizardStep::Payment => {
                let user = user.ok_or_else(|| {
                    ServiceError::Unauthorized(
                        "You must sign in to send a custom request".into(),
                    )
                })?;
                if self.request.payment_method == PaymentMethod::CreditCard
                    && !self.request.card.is_complete()
                {
                    return Err(ServiceError::validation("Please complete the card details"));
                }

                let (order, line) = self.deposit_order(user);
                let placed = self.orders.place_order(order, &[line]).await?;
                info!(order_id = %placed.id, deposit = %self.deposit, "Custom request submitted");

                self.step = WizardStep::Confirmation;
                self.submitted = Some(placed.clone());
                Ok(Some(placed))
            }
            WizardStep::Confirmation => Ok(None),
        }
    }

    /// Steps back from payment to details. Confirmation is final: once the
    /// deposit is placed only [`reset`](Self::reset) leaves it.
    pub fn back(&mut self) {
        if self.step == WizardStep::Payment {
            self.step = WizardStep::Details;
        }
    }

    pub fn reset(&mut self) {
        self.step = WizardStep::Details;
        self.request = CustomRequest::default();
        self.submitted = None;
    }

    fn deposit_order(&self, user: &User) -> (NewOrder, CartItem) {
        let user_name = user
            .first_name
            .clone()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| user.email.clone());
        let order = NewOrder {
            user_id: user.id,
            user_email: user.email.clone(),
            user_name,
            total: self.deposit,
            status: OrderStatus::Pending,
            priority: OrderPriority::Urgent,
            payment_method: Some(self.request.payment_method),
            specifications: OrderSpecifications {
                style: self.request.style.clone(),
                software: Vec::new(),
                description: self.request.description.clone(),
                budget_range: CUSTOM_BUDGET.to_string(),
                files: Vec::new(),
            },
            notes: Some(DEPOSIT_NOTES.to_string()),
        };
        let line = CartItem {
            service_id: DEPOSIT_SERVICE_ID.to_string(),
            service_name: format!("Deposit: {}", self.request.style),
            price: self.deposit,
            quantity: 1,
            variation: Some(DEPOSIT_VARIATION.to_string()),
        };
        (order, line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendOp, InMemoryBackend};
    use crate::events::EventSender;
    use crate::models::AuthSession;
    use rust_decimal_macros::dec;
    use std::sync::Arc;
    use uuid::Uuid;

    fn wizard(backend: &Arc<InMemoryBackend>) -> CustomRequestWizard {
        CustomRequestWizard::new(
            OrderService::new(backend.clone(), EventSender::default()),
            dec!(100),
        )
    }

    fn user() -> User {
        let session = AuthSession {
            user_id: Uuid::new_v4(),
            email: "leo@example.com".into(),
            access_token: "token".into(),
            expires_at: None,
        };
        User::from_session(&session, None)
    }

    fn fill_details(wizard: &mut CustomRequestWizard) {
        let request = wizard.request_mut();
        request.style = STYLE_OPTIONS[2].to_string();
        request.description = "Product teaser, 30 seconds".to_string();
    }

    #[tokio::test]
    async fn details_are_required_before_payment() {
        let backend = Arc::new(InMemoryBackend::new());
        let mut wizard = wizard(&backend);
        assert!(wizard.next(None).await.is_err());
        assert_eq!(wizard.step(), WizardStep::Details);

        fill_details(&mut wizard);
        assert!(wizard.next(None).await.unwrap().is_none());
        assert_eq!(wizard.step(), WizardStep::Payment);
    }

    #[tokio::test]
    async fn card_payment_needs_number_and_cvc() {
        let backend = Arc::new(InMemoryBackend::new());
        let mut wizard = wizard(&backend);
        fill_details(&mut wizard);
        wizard.next(None).await.unwrap();

        let err = wizard.next(Some(&user())).await.unwrap_err();
        assert_eq!(err.user_message(), "Please complete the card details");
        assert_eq!(wizard.step(), WizardStep::Payment);
        assert_eq!(backend.total_calls(), 0);
    }

    #[tokio::test]
    async fn anonymous_users_cannot_confirm() {
        let backend = Arc::new(InMemoryBackend::new());
        let mut wizard = wizard(&backend);
        fill_details(&mut wizard);
        wizard.next(None).await.unwrap();
        wizard.request_mut().payment_method = PaymentMethod::Paypal;

        let err = wizard.next(None).await.unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn paypal_deposit_creates_one_urgent_order() {
        let backend = Arc::new(InMemoryBackend::new());
        let mut wizard = wizard(&backend);
        fill_details(&mut wizard);
        wizard.next(None).await.unwrap();
        wizard.request_mut().payment_method = PaymentMethod::Paypal;

        let order = wizard.next(Some(&user())).await.unwrap().unwrap();
        assert_eq!(wizard.step(), WizardStep::Confirmation);
        assert_eq!(order.priority, OrderPriority::Urgent);
        assert_eq!(order.total, dec!(100));
        assert_eq!(order.user_name, "leo@example.com");
        assert_eq!(order.items.len(), 1);
        assert_eq!(order.items[0].service_name, "Deposit: 3D Realista");
        assert_eq!(order.specifications.budget_range, "Custom Quote");
        assert_eq!(backend.calls(BackendOp::InsertOrder), 1);
    }

    #[tokio::test]
    async fn back_and_reset() {
        let backend = Arc::new(InMemoryBackend::new());
        let mut wizard = wizard(&backend);
        fill_details(&mut wizard);
        wizard.next(None).await.unwrap();
        wizard.back();
        assert_eq!(wizard.step(), WizardStep::Details);
        assert_eq!(wizard.request().style, "3D Realista");

        wizard.reset();
        assert!(wizard.request().style.is_empty());
    }

    #[tokio::test]
    async fn confirmation_cannot_be_stepped_back() {
        let backend = Arc::new(InMemoryBackend::new());
        let mut wizard = wizard(&backend);
        fill_details(&mut wizard);
        wizard.next(None).await.unwrap();
        wizard.request_mut().payment_method = PaymentMethod::Paypal;
        wizard.next(Some(&user())).await.unwrap();

        wizard.back();
        assert_eq!(wizard.step(), WizardStep::Confirmation);
        assert!(wizard.next(Some(&user())).await.unwrap().is_none());
        assert_eq!(backend.calls(BackendOp::InsertOrder), 1);
        assert!(wizard.submitted().is_some());
    }

    #[test]
    fn card_debug_is_redacted() {
        let card = CardDetails {
            number: "4242424242424242".into(),
            expiry: "12/30".into(),
            cvc: "123".into(),
            holder: "Leo".into(),
        };
        let printed = format!("{card:?}");
        assert!(!printed.contains("4242"));
        assert!(!printed.contains("123"));
    }
}
