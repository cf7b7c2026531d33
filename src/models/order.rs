use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::cart::CartItem;

/// Enum representing the possible statuses of an order.
///
/// Transitions only move forward: `Pending` can go anywhere, `InProgress`
/// can finish or be cancelled, `Completed` and `Cancelled` are terminal.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OrderStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "in_progress")]
    InProgress,
    #[sea_orm(string_value = "completed")]
    Completed,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

impl OrderStatus {
    fn rank(self) -> u8 {
        match self {
            OrderStatus::Pending => 0,
            OrderStatus::InProgress => 1,
            OrderStatus::Completed | OrderStatus::Cancelled => 2,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }

    /// Whether an admin may move an order from `self` to `next`.
    /// Re-applying the current status is allowed and is a no-op.
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        if self == next {
            return true;
        }
        !self.is_terminal() && next.rank() > self.rank()
    }

    /// Badge label shown next to an order.
    pub fn label(self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::InProgress => "in progress",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OrderPriority {
    #[default]
    #[sea_orm(string_value = "normal")]
    Normal,
    #[sea_orm(string_value = "urgent")]
    Urgent,
}

#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PaymentMethod {
    #[default]
    #[sea_orm(string_value = "credit_card")]
    CreditCard,
    #[sea_orm(string_value = "paypal")]
    Paypal,
}

/// Project details attached to an order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSpecifications {
    #[serde(default)]
    pub style: String,
    #[serde(default)]
    pub software: Vec<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default, rename = "budgetRange")]
    pub budget_range: String,
    /// Public references of uploaded attachments.
    #[serde(default)]
    pub files: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub service_id: String,
    pub service_name: String,
    pub price: Decimal,
    pub quantity: u32,
    #[serde(default, rename = "variations")]
    pub variation: Option<String>,
}

impl OrderItem {
    pub fn line_total(&self) -> Decimal {
        self.price * Decimal::from(self.quantity)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    pub user_email: String,
    pub user_name: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub items: Vec<OrderItem>,
    pub total: Decimal,
    pub status: OrderStatus,
    pub priority: OrderPriority,
    #[serde(default)]
    pub payment_method: Option<PaymentMethod>,
    #[serde(default)]
    pub specifications: OrderSpecifications,
    #[serde(default)]
    pub notes: Option<String>,
}

impl Order {
    pub fn items_total(&self) -> Decimal {
        self.items.iter().map(OrderItem::line_total).sum()
    }

    /// True when the stored total matches its line items.
    pub fn is_consistent(&self) -> bool {
        self.items_total() == self.total
    }
}

/// Order row as submitted to the backend, before it has an id.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrder {
    pub user_id: Uuid,
    pub user_email: String,
    pub user_name: String,
    pub total: Decimal,
    pub status: OrderStatus,
    pub priority: OrderPriority,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<PaymentMethod>,
    pub specifications: OrderSpecifications,
    pub notes: Option<String>,
}

/// Line item as submitted to the backend.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrderItem {
    pub order_id: Uuid,
    pub service_id: String,
    pub service_name: String,
    pub price: Decimal,
    pub quantity: u32,
    #[serde(rename = "variations")]
    pub variation: Option<String>,
}

impl NewOrderItem {
    pub fn from_cart_line(order_id: Uuid, line: &CartItem) -> Self {
        Self {
            order_id,
            service_id: line.service_id.clone(),
            service_name: line.service_name.clone(),
            price: line.price,
            quantity: line.quantity,
            variation: line.variation.clone(),
        }
    }

    pub fn into_item(self, id: Uuid) -> OrderItem {
        OrderItem {
            id,
            order_id: self.order_id,
            service_id: self.service_id,
            service_name: self.service_name,
            price: self.price,
            quantity: self.quantity,
            variation: self.variation,
        }
    }
}

/// Aggregate figures shown on the admin dashboard.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct OrderStats {
    pub revenue: Decimal,
    pub pending: usize,
    pub total_orders: usize,
}

impl OrderStats {
    pub fn from_orders(orders: &[Order]) -> Self {
        Self {
            revenue: orders
                .iter()
                .filter(|o| o.status == OrderStatus::Completed)
                .map(|o| o.total)
                .sum(),
            pending: orders
                .iter()
                .filter(|o| o.status == OrderStatus::Pending)
                .count(),
            total_orders: orders.len(),
        }
    }
}
