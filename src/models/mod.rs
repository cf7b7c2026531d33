// Domain models shared by the stores, flows and backends
pub mod cart;
pub mod order;
pub mod service;
pub mod user;

pub use cart::CartItem;
pub use order::{
    NewOrder, NewOrderItem, Order, OrderItem, OrderPriority, OrderSpecifications, OrderStats,
    OrderStatus, PaymentMethod,
};
pub use service::{default_catalog, Service, ServiceCategory};
pub use user::{AuthSession, Credentials, Profile, Registration, Role, User};
