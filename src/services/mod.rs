// Client-side stores
pub mod cart;
pub mod catalog;
pub mod consent;
pub mod notifications;
pub mod session;

// Backend-facing flows
pub mod admin;
pub mod checkout;
pub mod custom_request;
pub mod orders;

pub use admin::{AdminAccess, AdminDashboard};
pub use cart::CartStore;
pub use catalog::CatalogStore;
pub use checkout::{Attachment, Attachments, CheckoutForm, CheckoutService};
pub use consent::ConsentStore;
pub use custom_request::{CardDetails, CustomRequest, CustomRequestWizard, WizardStep};
pub use notifications::{Notification, NotificationKind, Notifier};
pub use orders::OrderService;
pub use session::SessionManager;
