pub mod catalog;
pub mod config;
pub mod errors;
pub mod events;
pub mod http;
pub mod metrics;
pub mod models;
pub mod orders;
pub mod payment;
pub mod service;
pub mod session;
pub mod shipping;
pub mod store;
pub mod tax;
pub mod validation;

pub use config::Config;
pub use errors::{ApiError, ServiceError};
pub use http::{router, AppState};
pub use service::CheckoutService;
pub use session::{CheckoutSession, SessionStatus};
