pub mod auth;
pub mod config;
pub mod core;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod state;
pub mod store;
pub mod utils;

// Re-export commonly used items for convenience
pub use config::ServerConfig;
pub use core::*;
pub use errors::auth_error::{AuthError, AuthResult};
pub use errors::pipeline_error::{ErrorKind, PipelineError, PipelineResult};
pub use state::{AppState, Providers};
