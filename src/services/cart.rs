use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::models::{CartItem, Service};
use crate::storage::{load_json, save_json, LocalStore, CART_KEY};

/// The shopping cart, mirrored to local storage after every change.
///
/// A line is identified by its service id: adding a service that is already
/// in the cart bumps its quantity instead of creating a second line. Every
/// mutation writes the new list first and only then replaces the in-memory
/// copy, so a failed write leaves the cart exactly as it was.
pub struct CartStore {
    store: Arc<dyn LocalStore>,
    items: Vec<CartItem>,
    events: Option<EventSender>,
}

impl CartStore {
    /// Restores the cart saved under `phk_cart`, or starts empty.
    pub fn load(store: Arc<dyn LocalStore>) -> Result<Self, ServiceError> {
        let items: Vec<CartItem> = load_json::<Vec<CartItem>>(store.as_ref(), CART_KEY)?
            .unwrap_or_default()
            .into_iter()
            .filter(|item: &CartItem| item.quantity > 0)
            .collect();
        debug!(lines = items.len(), "Cart restored");
        Ok(Self {
            store,
            items,
            events: None,
        })
    }

    pub fn with_events(mut self, events: EventSender) -> Self {
        self.events = Some(events);
        self
    }

    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of units across all lines.
    pub fn item_count(&self) -> u32 {
        self.items.iter().map(|i| i.quantity).sum()
    }

    pub fn total(&self) -> Decimal {
        self.items.iter().map(CartItem::line_total).sum()
    }

    pub fn quantity_of(&self, service_id: &str) -> u32 {
        self.items
            .iter()
            .find(|i| i.service_id == service_id)
            .map_or(0, |i| i.quantity)
    }

    #[instrument(skip(self, service), fields(service_id = %service.id))]
    pub fn add(&mut self, service: &Service) -> Result<(), ServiceError> {
        self.insert(service, None)
    }

    /// Like [`CartStore::add`]; the label is recorded only when the line is new.
    #[instrument(skip(self, service), fields(service_id = %service.id))]
    pub fn add_variation(&mut self, service: &Service, label: &str) -> Result<(), ServiceError> {
        self.insert(service, Some(label.to_string()))
    }

    pub fn remove(&mut self, service_id: &str) -> Result<(), ServiceError> {
        if !self.items.iter().any(|i| i.service_id == service_id) {
            return Ok(());
        }
        let next = self
            .items
            .iter()
            .filter(|i| i.service_id != service_id)
            .cloned()
            .collect();
        self.commit(next)
    }

    /// Overwrites the quantity of a line; zero removes it.
    pub fn set_quantity(&mut self, service_id: &str, quantity: u32) -> Result<(), ServiceError> {
        if quantity == 0 {
            return self.remove(service_id);
        }
        let Some(index) = self.items.iter().position(|i| i.service_id == service_id) else {
            return Ok(());
        };
        let mut next = self.items.clone();
        next[index].quantity = quantity;
        self.commit(next)
    }

    pub fn clear(&mut self) -> Result<(), ServiceError> {
        self.commit(Vec::new())
    }

    fn insert(&mut self, service: &Service, variation: Option<String>) -> Result<(), ServiceError> {
        let mut next = self.items.clone();
        match next.iter_mut().find(|i| i.service_id == service.id) {
            Some(line) => line.quantity = line.quantity.saturating_add(1),
            None => next.push(CartItem::from_service(service, variation)),
        }
        self.commit(next)
    }

    fn commit(&mut self, next: Vec<CartItem>) -> Result<(), ServiceError> {
        save_json(self.store.as_ref(), CART_KEY, &next)?;
        self.items = next;
        if let Some(events) = &self.events {
            events.send_or_log(Event::CartUpdated {
                item_count: self.item_count(),
                total: self.total(),
            });
        }
        Ok(())
    }
}
