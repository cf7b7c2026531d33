//! Application state driven by a UI layer.
//!
//! [`Storefront`] owns every store and flow and exposes one async method per
//! user action. Actions never panic on backend trouble: failures are queued
//! as notifications and also returned so callers can react.

use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::backend::{self, Backend};
use crate::config::AppConfig;
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::models::{Credentials, Order, OrderStatus, Registration, User};
use crate::services::{
    AdminAccess, AdminDashboard, Attachments, CartStore, CatalogStore, CheckoutForm,
    CheckoutService, ConsentStore, CustomRequest, CustomRequestWizard, Notifier, OrderService,
    SessionManager, WizardStep,
};
use crate::storage::{FileStore, LocalStore};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, strum::Display, strum::EnumIter)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum View {
    #[default]
    Home,
    Services,
    Portfolio,
    Cart,
    Checkout,
    Profile,
    Admin,
}

pub struct Storefront {
    events: EventSender,
    view: View,
    login_prompt: bool,
    notifier: Notifier,
    consent: ConsentStore,
    catalog: CatalogStore,
    cart: CartStore,
    sessions: SessionManager,
    orders: OrderService,
    checkout: CheckoutService,
    custom_request: CustomRequestWizard,
    admin: AdminDashboard,
    order_history: Vec<Order>,
}

impl Storefront {
    /// Builds the backend and local storage selected by `config`.
    pub async fn from_config(config: &AppConfig) -> Result<Self, ServiceError> {
        let store: Arc<dyn LocalStore> = Arc::new(FileStore::open(&config.storage_dir)?);
        let backend = backend::connect(config, store.clone()).await?;
        Self::new(
            backend,
            store,
            EventSender::default(),
            &config.attachments_bucket,
            config.deposit_amount,
        )
    }

    pub fn new(
        backend: Arc<dyn Backend>,
        store: Arc<dyn LocalStore>,
        events: EventSender,
        attachments_bucket: &str,
        deposit: Decimal,
    ) -> Result<Self, ServiceError> {
        let orders = OrderService::new(backend.clone(), events.clone());
        Ok(Self {
            view: View::Home,
            login_prompt: false,
            notifier: Notifier::new(),
            consent: ConsentStore::new(store.clone()),
            catalog: CatalogStore::load(store.clone())?,
            cart: CartStore::load(store.clone())?.with_events(events.clone()),
            sessions: SessionManager::new(backend.clone(), store, events.clone()),
            checkout: CheckoutService::new(backend, orders.clone()).with_bucket(attachments_bucket),
            custom_request: CustomRequestWizard::new(orders.clone(), deposit),
            admin: AdminDashboard::new(orders.clone()),
            orders,
            events,
            order_history: Vec::new(),
        })
    }

    /// Resumes a persisted session and loads its order history.
    #[instrument(skip(self))]
    pub async fn start(&mut self) -> Result<(), ServiceError> {
        let restored = self.sessions.restore().await.map(|u| u.is_some());
        match self.report("restore_session", restored)? {
            true => self.load_order_history().await,
            false => Ok(()),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    pub fn view(&self) -> View {
        self.view
    }

    pub fn current_user(&self) -> Option<&User> {
        self.sessions.current_user()
    }

    pub fn catalog(&self) -> &CatalogStore {
        &self.catalog
    }

    pub fn catalog_mut(&mut self) -> &mut CatalogStore {
        &mut self.catalog
    }

    pub fn cart(&self) -> &CartStore {
        &self.cart
    }

    pub fn order_history(&self) -> &[Order] {
        &self.order_history
    }

    pub fn notifications(&self) -> &Notifier {
        &self.notifier
    }

    pub fn notifications_mut(&mut self) -> &mut Notifier {
        &mut self.notifier
    }

    pub fn admin(&self) -> &AdminDashboard {
        &self.admin
    }

    pub fn is_login_prompt_open(&self) -> bool {
        self.login_prompt
    }

    pub fn open_login_prompt(&mut self) {
        self.login_prompt = true;
    }

    pub fn close_login_prompt(&mut self) {
        self.login_prompt = false;
    }

    /// Switches view; the profile and admin views load their data.
    pub async fn navigate(&mut self, view: View) -> Result<(), ServiceError> {
        self.view = view;
        match view {
            View::Profile => self.load_order_history().await,
            View::Admin => self.open_admin().await.map(|_| ()),
            _ => Ok(()),
        }
    }

    pub fn add_to_cart(&mut self, service_id: &str) -> Result<(), ServiceError> {
        let result = match self.catalog.find_active(service_id) {
            Some(service) => self.cart.add(service).map(|()| service.name.clone()),
            None => Err(ServiceError::NotFound(format!("Service {} not found", service_id))),
        };
        let name = self.report("add_to_cart", result)?;
        self.notifier.success(format!("{name} added to cart"));
        Ok(())
    }

    pub fn add_variation_to_cart(&mut self, service_id: &str, label: &str) -> Result<(), ServiceError> {
        let result = match self.catalog.find_active(service_id) {
            Some(service) => self
                .cart
                .add_variation(service, label)
                .map(|()| service.name.clone()),
            None => Err(ServiceError::NotFound(format!("Service {} not found", service_id))),
        };
        let name = self.report("add_to_cart", result)?;
        self.notifier.success(format!("{name} ({label}) added to cart"));
        Ok(())
    }

    pub fn remove_from_cart(&mut self, service_id: &str) -> Result<(), ServiceError> {
        let result = self.cart.remove(service_id);
        self.report("remove_from_cart", result)
    }

    pub fn set_cart_quantity(&mut self, service_id: &str, quantity: u32) -> Result<(), ServiceError> {
        let result = self.cart.set_quantity(service_id, quantity);
        self.report("set_cart_quantity", result)
    }

    pub async fn sign_in(&mut self, credentials: &Credentials) -> Result<(), ServiceError> {
        let result = self
            .sessions
            .sign_in(credentials)
            .await
            .map(User::display_name);
        let name = self.report("sign_in", result)?;
        self.after_sign_in(name).await
    }

    pub async fn sign_up(&mut self, registration: &Registration) -> Result<(), ServiceError> {
        let result = self
            .sessions
            .sign_up(registration)
            .await
            .map(User::display_name);
        let name = self.report("sign_up", result)?;
        self.after_sign_in(name).await
    }

    /// Clears the user and every per-user view, then goes home.
    #[instrument(skip(self))]
    pub async fn sign_out(&mut self) -> Result<(), ServiceError> {
        let result = self.sessions.sign_out().await;
        self.order_history.clear();
        self.admin = AdminDashboard::new(self.orders.clone());
        self.custom_request.reset();
        self.view = View::Home;
        self.report("sign_out", result)?;
        self.notifier.info("You have signed out");
        Ok(())
    }

    /// Places the cart as an order.
    ///
    /// An anonymous user gets the login prompt and an empty cart sends the
    /// user to the services view. On success the cart is emptied, the order
    /// joins the local history and the profile view is shown; on failure the
    /// cart and history stay as they were.
    #[instrument(skip_all)]
    pub async fn submit_checkout(
        &mut self,
        form: &CheckoutForm,
        attachments: &Attachments,
    ) -> Result<Order, ServiceError> {
        if self.sessions.current_user().is_none() {
            self.login_prompt = true;
        } else if self.cart.is_empty() {
            self.view = View::Services;
        }

        let result = self
            .checkout
            .submit(self.sessions.current_user(), self.cart.items(), form, attachments)
            .await;
        let order = self.report("checkout", result)?;

        if let Err(err) = self.cart.clear() {
            self.notifier.failure("clear_cart", &err);
        }
        self.order_history.push(order.clone());
        self.view = View::Profile;
        self.notifier
            .success(format!("Order placed. Total: ${}", order.total.round_dp(2)));
        info!(order_id = %order.id, "Checkout finished");
        Ok(order)
    }

    pub async fn load_order_history(&mut self) -> Result<(), ServiceError> {
        let result = self
            .orders
            .orders_for_user(self.sessions.current_user())
            .await;
        self.order_history = self.report("load_order_history", result)?;
        Ok(())
    }

    pub async fn open_admin(&mut self) -> Result<AdminAccess, ServiceError> {
        self.view = View::Admin;
        let result = self.admin.open(self.sessions.current_user()).await;
        let access = self.report("open_admin", result)?;
        if access == AdminAccess::Denied {
            self.notifier.error("Access denied");
        }
        Ok(access)
    }

    pub async fn change_order_status(
        &mut self,
        order_id: Uuid,
        next: OrderStatus,
    ) -> Result<(), ServiceError> {
        let result = self
            .admin
            .set_status(self.sessions.current_user(), order_id, next)
            .await;
        self.report("change_order_status", result)?;
        if let Some(order) = self.order_history.iter_mut().find(|o| o.id == order_id) {
            order.status = next;
        }
        self.notifier.success(format!("Order status changed to {}", next.label()));
        Ok(())
    }

    pub fn custom_request(&self) -> &CustomRequest {
        self.custom_request.request()
    }

    pub fn custom_request_mut(&mut self) -> &mut CustomRequest {
        self.custom_request.request_mut()
    }

    pub fn custom_request_step(&self) -> WizardStep {
        self.custom_request.step()
    }

    /// Advances the custom request wizard; confirming records the deposit order.
    pub async fn custom_request_next(&mut self) -> Result<Option<Order>, ServiceError> {
        let result = self
            .custom_request
            .next(self.sessions.current_user())
            .await;
        let placed = self.report("custom_request", result)?;
        if let Some(order) = &placed {
            self.order_history.push(order.clone());
            self.notifier.success("Custom request sent");
        }
        Ok(placed)
    }

    pub fn custom_request_back(&mut self) {
        self.custom_request.back();
    }

    pub fn custom_request_reset(&mut self) {
        self.custom_request.reset();
    }

    pub fn needs_cookie_consent(&self) -> bool {
        // unreadable storage asks again
        self.consent.needs_prompt().unwrap_or(true)
    }

    pub fn accept_cookies(&mut self) -> Result<(), ServiceError> {
        let result = self.consent.accept();
        self.report("accept_cookies", result)
    }

    async fn after_sign_in(&mut self, name: String) -> Result<(), ServiceError> {
        self.login_prompt = false;
        self.notifier.success(format!("Welcome, {name}"));
        self.load_order_history().await
    }

    fn report<T>(&mut self, context: &str, result: Result<T, ServiceError>) -> Result<T, ServiceError> {
        if let Err(err) = &result {
            self.notifier.failure(context, err);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::InMemoryBackend;
    use crate::services::NotificationKind;
    use crate::storage::MemoryStore;
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;

    fn storefront() -> Storefront {
        Storefront::new(
            Arc::new(InMemoryBackend::new()),
            Arc::new(MemoryStore::new()),
            EventSender::default(),
            "order-attachments",
            dec!(100),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn anonymous_checkout_opens_the_login_prompt() {
        let mut app = storefront();
        app.add_to_cart("1").unwrap();

        let err = app
            .submit_checkout(&CheckoutForm::default(), &Attachments::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized(_)));
        assert!(app.is_login_prompt_open());
        assert_eq!(app.cart().items().len(), 1);
        assert_eq!(
            app.notifications().latest().unwrap().kind,
            NotificationKind::Error
        );
    }

    #[tokio::test]
    async fn unknown_services_are_reported() {
        let mut app = storefront();
        assert!(app.add_to_cart("nope").is_err());
        assert!(app.cart().is_empty());
        assert_eq!(
            app.notifications().latest().unwrap().message,
            "Not found: Service nope not found"
        );
    }

    #[tokio::test]
    async fn inactive_services_cannot_be_added() {
        let mut app = storefront();
        app.catalog_mut().set_active("1", false).unwrap();

        assert_matches!(app.add_to_cart("1"), Err(ServiceError::NotFound(_)));
        assert_matches!(
            app.add_variation_to_cart("1", "Basic"),
            Err(ServiceError::NotFound(_))
        );
        assert!(app.cart().is_empty());

        app.catalog_mut().set_active("1", true).unwrap();
        app.add_to_cart("1").unwrap();
        assert_eq!(app.cart().items().len(), 1);
    }

    #[tokio::test]
    async fn anonymous_admin_visit_is_denied() {
        let mut app = storefront();
        app.navigate(View::Admin).await.unwrap();
        assert_eq!(app.view(), View::Admin);
        assert_eq!(app.admin().access(), AdminAccess::Denied);
        assert_eq!(app.notifications().latest().unwrap().message, "Access denied");
    }

    #[test]
    fn cookie_prompt_until_accepted() {
        let mut app = storefront();
        assert!(app.needs_cookie_consent());
        app.accept_cookies().unwrap();
        assert!(!app.needs_cookie_consent());
    }
}
