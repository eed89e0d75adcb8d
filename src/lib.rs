// AC Server Manager - configuration core for Assetto Corsa dedicated servers
//
// This is the library crate containing the field schema, the file codecs and the
// session logic. The binary crate (main.rs) provides the shell entry point.

pub mod config;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod services;
pub mod state;
pub mod ui;

// Re-export commonly used types for convenience
pub use config::SettingsManager;
pub use models::{ConfigurationModel, SessionState, ToolSettings};
pub use state::{SessionChange, SessionManager};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
