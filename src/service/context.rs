//! Shared handles for health reporting
//!
//! The health server and health checks only need read access to the running
//! service, so they receive this context instead of the whole [`AppState`].
//!
//! [`AppState`]: crate::service::AppState

use crate::lobby::LobbyRegistry;
use crate::metrics::MetricsCollector;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

#[derive(Clone)]
pub struct ServiceContext {
    service_name: String,
    registry: LobbyRegistry,
    metrics: Arc<MetricsCollector>,
    is_running: Arc<RwLock<bool>>,
    started_at: Instant,
}

impl ServiceContext {
    pub fn new(
        service_name: impl Into<String>,
        registry: LobbyRegistry,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            service_name: service_name.into(),
            registry,
            metrics,
            is_running: Arc::new(RwLock::new(false)),
            started_at: Instant::now(),
        }
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub fn registry(&self) -> &LobbyRegistry {
        &self.registry
    }

    pub fn metrics(&self) -> Arc<MetricsCollector> {
        self.metrics.clone()
    }

    /// Check if service is running
    pub async fn is_running(&self) -> bool {
        *self.is_running.read().await
    }

    pub async fn set_running(&self, running: bool) {
        *self.is_running.write().await = running;
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }
}
