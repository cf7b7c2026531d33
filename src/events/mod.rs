use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::OrderStatus;

const DEFAULT_CAPACITY: usize = 64;

/// Things that happened in the storefront that other parts may react to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    SignedIn {
        user_id: Uuid,
        email: String,
        at: DateTime<Utc>,
    },
    SignedOut {
        user_id: Uuid,
        at: DateTime<Utc>,
    },
    OrderCreated {
        order_id: Uuid,
        user_id: Uuid,
        total: Decimal,
        item_count: usize,
    },
    OrderStatusChanged {
        order_id: Uuid,
        old_status: OrderStatus,
        new_status: OrderStatus,
    },
    CartUpdated {
        item_count: u32,
        total: Decimal,
    },
}

/// Fan-out publisher; every subscriber sees every event sent after it subscribed.
#[derive(Debug, Clone)]
pub struct EventSender {
    sender: broadcast::Sender<Event>,
}

impl Default for EventSender {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl EventSender {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }

    /// Sends an event; fails when nobody is listening.
    pub fn send(&self, event: Event) -> Result<usize, String> {
        self.sender
            .send(event)
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends an event, logging instead of failing when nobody is listening.
    pub fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event) {
            debug!("{}", e);
        }
    }
}

/// Logs every event until the channel closes.
pub async fn process_events(mut rx: broadcast::Receiver<Event>) {
    info!("Starting event processing loop");

    loop {
        match rx.recv().await {
            Ok(event) => match &event {
                Event::SignedIn { user_id, email, .. } => {
                    info!(%user_id, %email, "User signed in");
                }
                Event::SignedOut { user_id, .. } => info!(%user_id, "User signed out"),
                Event::OrderCreated {
                    order_id,
                    user_id,
                    total,
                    item_count,
                } => {
                    info!(%order_id, %user_id, %total, item_count, "Order created");
                }
                Event::OrderStatusChanged {
                    order_id,
                    old_status,
                    new_status,
                } => {
                    info!(%order_id, %old_status, %new_status, "Order status changed");
                }
                Event::CartUpdated { item_count, total } => {
                    debug!(item_count, %total, "Cart updated");
                }
            },
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "Event processor lagged behind");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }

    info!("Event processing loop stopped");
}
