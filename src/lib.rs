pub mod config;
pub mod core;
pub mod errors;
pub mod handlers;
pub mod routes;
pub mod session;
pub mod state;
pub mod telephony;
pub mod tools;

// Re-export commonly used items for convenience
pub use config::RelayConfig;
pub use errors::{AppError, AppResult, SessionError};
pub use state::AppState;
