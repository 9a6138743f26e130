//! Service layer for the pug lobby coordinator
//!
//! Application state, health reporting and background task management for
//! the production service.

pub mod app;
pub mod context;
pub mod health;

pub use app::{AppState, ServiceError};
pub use context::ServiceContext;
pub use health::{HealthCheck, HealthStatus};
