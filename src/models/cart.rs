use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::service::Service;

/// A cart line. Name and price are snapshots taken when the service was added.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub service_id: String,
    pub service_name: String,
    pub price: Decimal,
    pub quantity: u32,
    #[serde(default, rename = "variations", skip_serializing_if = "Option::is_none")]
    pub variation: Option<String>,
}

impl CartItem {
    pub fn from_service(service: &Service, variation: Option<String>) -> Self {
        Self {
            service_id: service.id.clone(),
            service_name: service.name.clone(),
            price: service.price,
            quantity: 1,
            variation,
        }
    }

    pub fn line_total(&self) -> Decimal {
        self.price * Decimal::from(self.quantity)
    }
}
