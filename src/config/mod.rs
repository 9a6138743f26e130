//! Configuration management for the pug lobby service
//!
//! Configuration is loaded from an optional TOML file, then overridden by
//! environment variables, then validated.

pub mod app;
pub mod lobby;

// Re-export commonly used types
pub use app::{validate_config, AppConfig, ServiceSettings};
pub use lobby::LobbySettings;
