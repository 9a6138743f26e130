//! Main application state and service coordination
//!
//! [`AppState`] wires configuration, the lobby registry, the action
//! dispatcher, metrics and background tasks together. A transport layer
//! registers each verified connection with [`AppState::connect_client`] and
//! feeds its inbound frames to [`AppState::handle_frame`].

use crate::client::{ClientHandle, OutboundReceiver};
use crate::config::AppConfig;
use crate::dispatch::ActionDispatcher;
use crate::error::Result as LobbyResult;
use crate::lobby::{LobbyRegistry, StaticSlotProvider};
use crate::metrics::{HealthServer, HealthServerConfig, MetricsCollector, MetricsService};
use crate::service::context::ServiceContext;
use crate::service::health::HealthCheck;
use crate::types::SteamId;
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tracing::{debug, error, info, warn};

/// Service-level errors
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Service initialization error: {message}")]
    Initialization { message: String },

    #[error("Background task error: {message}")]
    BackgroundTask { message: String },
}

/// Main application state containing all service components
pub struct AppState {
    config: AppConfig,

    registry: LobbyRegistry,

    dispatcher: ActionDispatcher,

    /// Read-only view shared with health checks
    context: ServiceContext,

    /// Metrics service for monitoring and health checks
    metrics_service: Arc<MetricsService>,

    /// Background task handles
    background_tasks: Vec<JoinHandle<()>>,
}

impl AppState {
    /// Initialize the application with all dependencies
    pub async fn new(config: AppConfig) -> Result<Self, ServiceError> {
        info!("Initializing {} lobby service", config.service.name);
        info!(
            "Configuration: lobby_id_length={}, queue_capacity={}, action_timeout={}ms, single_lobby={}",
            config.lobby.lobby_id_length,
            config.lobby.outbound_queue_capacity,
            config.lobby.action_timeout_ms,
            config.lobby.single_lobby_per_client
        );

        crate::config::validate_config(&config).map_err(|e| ServiceError::Configuration {
            message: e.to_string(),
        })?;

        let metrics_collector =
            Arc::new(
                MetricsCollector::new().map_err(|e| ServiceError::Initialization {
                    message: format!("Failed to create metrics collector: {}", e),
                })?,
            );

        let registry = LobbyRegistry::new(
            Arc::new(StaticSlotProvider::new()),
            config.lobby.clone(),
            metrics_collector.clone(),
        );
        let dispatcher =
            ActionDispatcher::new(registry.clone(), &config.lobby, metrics_collector.clone());
        let context = ServiceContext::new(
            config.service.name.clone(),
            registry.clone(),
            metrics_collector.clone(),
        );

        let health_config = HealthServerConfig {
            port: config.service.health_port,
            host: "0.0.0.0".to_string(),
        };
        let health_server = Arc::new(
            HealthServer::new(health_config, metrics_collector.clone())
                .with_context(context.clone()),
        );
        let metrics_service = Arc::new(MetricsService::new(metrics_collector, health_server));

        Ok(Self {
            config,
            registry,
            dispatcher,
            context,
            metrics_service,
            background_tasks: Vec::new(),
        })
    }

    /// Start the health server and background tasks
    pub async fn start(&mut self) -> Result<(), ServiceError> {
        info!("Starting {} lobby service", self.config.service.name);

        self.context.set_running(true).await;

        self.start_metrics_service().await?;
        self.start_background_tasks().await?;

        info!("Lobby service started successfully");
        Ok(())
    }

    /// Perform graceful shutdown
    pub async fn shutdown(&mut self) -> Result<(), ServiceError> {
        info!("Starting graceful shutdown of {}", self.config.service.name);

        self.context.set_running(false).await;

        self.stop_background_tasks().await;

        info!("Stopping metrics service...");
        if let Err(e) = self.metrics_service.stop().await {
            warn!("Failed to stop metrics service: {}", e);
        } else {
            info!("Metrics service stopped");
        }

        let final_stats = self
            .registry
            .stats()
            .map_err(|e| ServiceError::BackgroundTask {
                message: format!("Failed to get final stats: {}", e),
            })?;

        info!("Final service statistics: {:?}", final_stats);
        info!("Lobby service shutdown completed");

        Ok(())
    }

    /// Register a verified connection and return its outbound queue receiver
    pub fn connect_client(
        &self,
        steam_id: SteamId,
        name: impl Into<String>,
    ) -> (Arc<ClientHandle>, OutboundReceiver) {
        let (client, receiver) =
            ClientHandle::new(steam_id, name, self.config.lobby.outbound_queue_capacity);
        info!(
            "Client {} connected ({})",
            client.steam_id(),
            client.connection_id()
        );
        (client, receiver)
    }

    /// Remove a closed connection from every lobby it was in
    pub fn disconnect_client(&self, client: &Arc<ClientHandle>) -> usize {
        self.registry.disconnect(client)
    }

    /// Handle one inbound frame from `client`
    pub async fn handle_frame(&self, client: &Arc<ClientHandle>, bytes: &[u8]) -> LobbyResult<()> {
        self.dispatcher.dispatch(client, bytes).await
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn registry(&self) -> &LobbyRegistry {
        &self.registry
    }

    pub fn dispatcher(&self) -> &ActionDispatcher {
        &self.dispatcher
    }

    pub fn context(&self) -> &ServiceContext {
        &self.context
    }

    /// Check if service is running
    pub async fn is_running(&self) -> bool {
        self.context.is_running().await
    }

    pub fn metrics_service(&self) -> Arc<MetricsService> {
        self.metrics_service.clone()
    }

    async fn start_metrics_service(&mut self) -> Result<(), ServiceError> {
        info!("Starting metrics and health endpoints");

        let metrics_service = self.metrics_service.clone();
        let port = self.config.service.health_port;

        let metrics_handle = tokio::spawn(async move {
            if let Err(e) = metrics_service.start().await {
                error!("Metrics service failed: {}", e);
            } else {
                info!("Metrics service task completed");
            }
        });

        self.background_tasks.push(metrics_handle);

        // Give the server a moment to bind
        tokio::time::sleep(Duration::from_millis(100)).await;

        info!("Metrics service started on port {}", port);
        Ok(())
    }

    async fn start_background_tasks(&mut self) -> Result<(), ServiceError> {
        let stats_interval = self.config.stats_interval();
        info!(
            "Starting stats reporter task ({}s interval)...",
            stats_interval.as_secs()
        );

        let stats_task = {
            let context = self.context.clone();

            tokio::spawn(async move {
                let mut interval = tokio::time::interval(stats_interval);
                info!("Stats reporter task started");

                while context.is_running().await {
                    interval.tick().await;

                    let metrics = context.metrics();
                    metrics.update_uptime(context.uptime());

                    match context.registry().stats() {
                        Ok(stats) => {
                            info!(
                                "Registry stats - active lobbies: {}, members: {}, created: {}, removed: {}",
                                stats.active_lobbies,
                                stats.connected_members,
                                stats.lobbies_created,
                                stats.lobbies_removed
                            );
                            metrics.update_from_registry_stats(&stats);
                        }
                        Err(e) => {
                            warn!("Failed to get registry stats for metrics update: {}", e);
                        }
                    }

                    // Refreshes the health gauges as a side effect
                    if let Err(e) = HealthCheck::check(&context).await {
                        warn!("Periodic health check failed: {}", e);
                    }
                }

                info!("Stats reporter task stopped");
            })
        };

        self.background_tasks.push(stats_task);
        info!("Background tasks started");
        Ok(())
    }

    async fn stop_background_tasks(&mut self) {
        let task_count = self.background_tasks.len();
        if task_count == 0 {
            info!("No background tasks to stop");
            return;
        }

        info!("Stopping {} background tasks...", task_count);

        for (i, task) in self.background_tasks.drain(..).enumerate() {
            debug!("Aborting background task {}/{}", i + 1, task_count);
            task.abort();
        }

        info!("All {} background tasks stopped", task_count);
    }
}
