use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::models::{Order, OrderStats, OrderStatus, User};
use crate::services::orders::OrderService;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AdminAccess {
    Granted,
    #[default]
    Denied,
}

/// Order list and figures behind the admin view.
pub struct AdminDashboard {
    orders: OrderService,
    access: AdminAccess,
    loaded: Vec<Order>,
}

impl AdminDashboard {
    pub fn new(orders: OrderService) -> Self {
        Self {
            orders,
            access: AdminAccess::Denied,
            loaded: Vec::new(),
        }
    }

    pub fn access(&self) -> AdminAccess {
        self.access
    }

    pub fn orders(&self) -> &[Order] {
        &self.loaded
    }

    pub fn stats(&self) -> OrderStats {
        OrderStats::from_orders(&self.loaded)
    }

    /// Loads every order for an administrator. Anyone else gets
    /// [`AdminAccess::Denied`] and nothing is read.
    #[instrument(skip_all)]
    pub async fn open(&mut self, user: Option<&User>) -> Result<AdminAccess, ServiceError> {
        if !user.map_or(false, User::is_admin) {
            warn!(user_id = ?user.map(|u| u.id), "Admin view denied");
            self.access = AdminAccess::Denied;
            self.loaded.clear();
            return Ok(AdminAccess::Denied);
        }

        self.loaded = self.orders.all_orders().await?;
        self.access = AdminAccess::Granted;
        info!(orders = self.loaded.len(), "Admin dashboard loaded");
        Ok(AdminAccess::Granted)
    }

    /// Persists the new status, then mirrors it into the loaded list.
    #[instrument(skip(self, user))]
    pub async fn set_status(
        &mut self,
        user: Option<&User>,
        order_id: Uuid,
        next: OrderStatus,
    ) -> Result<(), ServiceError> {
        if !user.map_or(false, User::is_admin) {
            return Err(ServiceError::Forbidden(
                "Only administrators can change order status".into(),
            ));
        }
        let order = self
            .loaded
            .iter_mut()
            .find(|o| o.id == order_id)
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        self.orders.set_status(order_id, order.status, next).await?;
        order.status = next;
        Ok(())
    }
}
