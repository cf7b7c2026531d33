use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::models::{Order, OrderItem, OrderPriority, OrderSpecifications, OrderStatus, PaymentMethod};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub user_id: Uuid,
    pub user_email: String,
    pub user_name: String,
    pub total: Decimal,
    pub status: OrderStatus,
    pub priority: OrderPriority,
    pub payment_method: Option<PaymentMethod>,
    #[sea_orm(column_type = "Json")]
    pub specifications: Json,
    #[sea_orm(column_type = "Text", nullable)]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::order_item::Entity")]
    OrderItem,
    #[sea_orm(
        belongs_to = "super::profile::Entity",
        from = "Column::UserId",
        to = "super::profile::Column::Id"
    )]
    Profile,
}

impl Related<super::order_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderItem.def()
    }
}

impl Related<super::profile::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Profile.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Assembles the domain order from this row and its item rows.
    pub fn into_order(self, items: Vec<OrderItem>) -> Result<Order, ServiceError> {
        let specifications: OrderSpecifications = serde_json::from_value(self.specifications)?;
        Ok(Order {
            id: self.id,
            user_id: self.user_id,
            user_email: self.user_email,
            user_name: self.user_name,
            created_at: self.created_at,
            items,
            total: self.total,
            status: self.status,
            priority: self.priority,
            payment_method: self.payment_method,
            specifications,
            notes: self.notes,
        })
    }
}
