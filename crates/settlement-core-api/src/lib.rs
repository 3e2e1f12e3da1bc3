pub mod actor;
pub mod dto;
pub mod error;
pub mod handlers;
pub mod idempotency;
pub mod routes;
pub mod state;

pub use routes::router;
pub use state::{ApiConfig, AppState};
