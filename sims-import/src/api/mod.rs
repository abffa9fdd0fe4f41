//! HTTP API handlers for sims-import

pub mod cors;
pub mod health;
pub mod import;
pub mod templates;

pub use health::health_routes;
pub use import::{bearer_token, import_users, import_users_csv};
pub use templates::template_routes;
