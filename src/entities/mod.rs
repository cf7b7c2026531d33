// Tables of the self-hosted backend
pub mod order;
pub mod order_item;
pub mod profile;
