use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::backend::Backend;
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::models::{CartItem, NewOrder, NewOrderItem, Order, OrderStatus, User};

/// Order placement, history and status changes against the backend.
#[derive(Clone)]
pub struct OrderService {
    backend: Arc<dyn Backend>,
    events: EventSender,
}

impl OrderService {
    pub fn new(backend: Arc<dyn Backend>, events: EventSender) -> Self {
        Self { backend, events }
    }

    /// Inserts the order row, then one item row per line.
    ///
    /// The order is only reported as placed once both inserts succeeded.
    /// When the items insert fails the freshly created order row is deleted
    /// again; a failed delete is logged and the items error is returned.
    #[instrument(skip(self, order, lines), fields(user_id = %order.user_id, lines = lines.len()))]
    pub async fn place_order(
        &self,
        order: NewOrder,
        lines: &[CartItem],
    ) -> Result<Order, ServiceError> {
        if lines.is_empty() {
            return Err(ServiceError::validation("An order needs at least one item"));
        }

        let mut created = self.backend.insert_order(&order).await?;
        let new_items: Vec<NewOrderItem> = lines
            .iter()
            .map(|line| NewOrderItem::from_cart_line(created.id, line))
            .collect();

        match self.backend.insert_order_items(&new_items).await {
            Ok(items) => created.items = items,
            Err(err) => {
                warn!(order_id = %created.id, error = %err, "Order items insert failed; removing order");
                if let Err(cleanup) = self.backend.delete_order(created.id).await {
                    error!(order_id = %created.id, error = %cleanup, "Could not remove order without items");
                }
                return Err(err);
            }
        }

        info!(order_id = %created.id, total = %created.total, "Order placed");
        self.events.send_or_log(Event::OrderCreated {
            order_id: created.id,
            user_id: created.user_id,
            total: created.total,
            item_count: created.items.len(),
        });
        Ok(created)
    }

    /// The signed-in user's orders, newest first; nobody signed in means none.
    pub async fn orders_for_user(&self, user: Option<&User>) -> Result<Vec<Order>, ServiceError> {
        match user {
            Some(user) => self.backend.list_orders_for_user(user.id).await,
            None => Ok(Vec::new()),
        }
    }

    pub async fn all_orders(&self) -> Result<Vec<Order>, ServiceError> {
        self.backend.list_orders().await
    }

    /// Moves an order from `current` to `next`, forward only.
    ///
    /// Re-applying the current status succeeds without a backend call.
    #[instrument(skip(self))]
    pub async fn set_status(
        &self,
        order_id: Uuid,
        current: OrderStatus,
        next: OrderStatus,
    ) -> Result<(), ServiceError> {
        if current == next {
            return Ok(());
        }
        if !current.can_transition_to(next) {
            return Err(ServiceError::InvalidStatus(format!(
                "Cannot change an order from {} to {}",
                current.label(),
                next.label()
            )));
        }

        self.backend.update_order_status(order_id, next).await?;
        info!(%order_id, from = %current, to = %next, "Order status updated");
        self.events.send_or_log(Event::OrderStatusChanged {
            order_id,
            old_status: current,
            new_status: next,
        });
        Ok(())
    }
}
