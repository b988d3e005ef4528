pub mod config;
pub mod errors;
pub mod models;
pub mod services;
pub mod state;
pub mod utils;

// Re-export commonly used types
pub use config::ClientConfig;
pub use errors::{ClientError, ClientResult, ValidationError};
pub use state::AppState;
