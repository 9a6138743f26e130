//! Metrics collection using Prometheus
//!
//! Every collector owns its registry, so independent registries built in
//! tests never clash over metric names.

use crate::client::DeliveryReport;
use crate::lobby::registry::RegistryStats;
use crate::types::GameMode;
use anyhow::Result;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, IntGaugeVec, Opts,
    Registry, TextEncoder,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Main metrics collector for the lobby service
#[derive(Clone, Debug)]
pub struct MetricsCollector {
    /// Prometheus registry
    registry: Arc<Registry>,

    service_metrics: ServiceMetrics,
    lobby_metrics: LobbyMetrics,
    client_metrics: ClientMetrics,
    action_metrics: ActionMetrics,
}

/// Service-level metrics
#[derive(Clone, Debug)]
pub struct ServiceMetrics {
    /// Service uptime in seconds
    pub uptime_seconds: IntGauge,

    /// Health check status (0=unhealthy, 1=degraded, 2=healthy)
    pub health_status: IntGauge,

    /// Component health status
    pub component_health: IntGaugeVec,
}

/// Lobby-related metrics
#[derive(Clone, Debug)]
pub struct LobbyMetrics {
    /// Number of live lobbies
    pub active_lobbies: IntGauge,

    /// Total lobbies created, by game mode
    pub lobbies_created_total: IntCounterVec,

    /// Total lobbies removed, by game mode
    pub lobbies_removed_total: IntCounterVec,

    /// Roster entries across all lobbies
    pub lobby_members: IntGauge,

    /// Total chat messages posted
    pub chat_messages_total: IntCounter,

    /// Total slot claims, by game mode
    pub slot_claims_total: IntCounterVec,
}

/// Client delivery metrics
#[derive(Clone, Debug)]
pub struct ClientMetrics {
    /// Outbound messages by delivery status
    pub deliveries_total: IntCounterVec,
}

/// Per-action metrics
#[derive(Clone, Debug)]
pub struct ActionMetrics {
    /// Actions handled, by action and status
    pub actions_total: IntCounterVec,

    /// Action handling time
    pub action_duration_seconds: HistogramVec,
}

impl MetricsCollector {
    /// Create a new metrics collector with its own registry
    pub fn new() -> Result<Self> {
        Self::with_registry(Arc::new(Registry::new()))
    }

    /// Create a new metrics collector on a custom registry
    pub fn with_registry(registry: Arc<Registry>) -> Result<Self> {
        let service_metrics = ServiceMetrics::new(&registry)?;
        let lobby_metrics = LobbyMetrics::new(&registry)?;
        let client_metrics = ClientMetrics::new(&registry)?;
        let action_metrics = ActionMetrics::new(&registry)?;

        Ok(Self {
            registry,
            service_metrics,
            lobby_metrics,
            client_metrics,
            action_metrics,
        })
    }

    /// Get the Prometheus registry
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    pub fn service(&self) -> &ServiceMetrics {
        &self.service_metrics
    }

    pub fn lobby(&self) -> &LobbyMetrics {
        &self.lobby_metrics
    }

    pub fn client(&self) -> &ClientMetrics {
        &self.client_metrics
    }

    pub fn action(&self) -> &ActionMetrics {
        &self.action_metrics
    }

    /// Refresh the point-in-time gauges from registry stats
    pub fn update_from_registry_stats(&self, stats: &RegistryStats) {
        self.lobby_metrics
            .active_lobbies
            .set(stats.active_lobbies as i64);
        self.lobby_metrics
            .lobby_members
            .set(stats.connected_members as i64);
    }

    /// Record a lobby being created
    pub fn record_lobby_created(&self, game_mode: GameMode) {
        self.lobby_metrics
            .lobbies_created_total
            .with_label_values(&[game_mode.as_str()])
            .inc();
        self.lobby_metrics.active_lobbies.inc();
    }

    /// Record a lobby being removed from the registry
    pub fn record_lobby_removed(&self, game_mode: GameMode) {
        self.lobby_metrics
            .lobbies_removed_total
            .with_label_values(&[game_mode.as_str()])
            .inc();
        self.lobby_metrics.active_lobbies.dec();
    }

    pub fn record_slot_claim(&self, game_mode: GameMode) {
        self.lobby_metrics
            .slot_claims_total
            .with_label_values(&[game_mode.as_str()])
            .inc();
    }

    pub fn record_chat_message(&self) {
        self.lobby_metrics.chat_messages_total.inc();
    }

    /// Record the outcome of a fan-out
    pub fn record_delivery(&self, report: &DeliveryReport) {
        if report.delivered > 0 {
            self.client_metrics
                .deliveries_total
                .with_label_values(&["delivered"])
                .inc_by(report.delivered as u64);
        }
        if report.dropped > 0 {
            self.client_metrics
                .deliveries_total
                .with_label_values(&["dropped"])
                .inc_by(report.dropped as u64);
        }
    }

    /// Record an action being handled
    pub fn record_action(&self, action: &str, success: bool, duration: Duration) {
        let status = if success { "success" } else { "error" };

        self.action_metrics
            .actions_total
            .with_label_values(&[action, status])
            .inc();

        self.action_metrics
            .action_duration_seconds
            .with_label_values(&[action])
            .observe(duration.as_secs_f64());
    }

    /// Update health status
    pub fn update_health_status(&self, status: u8) {
        self.service_metrics.health_status.set(status as i64);
    }

    /// Update component health
    pub fn update_component_health(&self, component: &str, healthy: bool) {
        let status = if healthy { 1 } else { 0 };
        self.service_metrics
            .component_health
            .with_label_values(&[component])
            .set(status);
    }

    pub fn update_uptime(&self, uptime: Duration) {
        self.service_metrics
            .uptime_seconds
            .set(uptime.as_secs() as i64);
    }

    /// Render every registered metric in the Prometheus text format
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }

    /// Create a timer for measuring operation duration
    pub fn start_timer(&self) -> MetricsTimer {
        MetricsTimer::new()
    }
}

/// Timer for measuring operation durations
pub struct MetricsTimer {
    start: Instant,
}

impl MetricsTimer {
    fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Stop the timer and return the duration
    pub fn stop(self) -> Duration {
        self.elapsed()
    }
}

impl ServiceMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let uptime_seconds = IntGauge::new("pug_lobby_uptime_seconds", "Service uptime in seconds")?;
        registry.register(Box::new(uptime_seconds.clone()))?;

        let health_status = IntGauge::new(
            "pug_lobby_health_status",
            "Health status (0=unhealthy, 1=degraded, 2=healthy)",
        )?;
        registry.register(Box::new(health_status.clone()))?;

        let component_health = IntGaugeVec::new(
            Opts::new("pug_lobby_component_health", "Component health status"),
            &["component"],
        )?;
        registry.register(Box::new(component_health.clone()))?;

        Ok(Self {
            uptime_seconds,
            health_status,
            component_health,
        })
    }
}

impl LobbyMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let active_lobbies = IntGauge::new("pug_lobby_active_lobbies", "Number of live lobbies")?;
        registry.register(Box::new(active_lobbies.clone()))?;

        let lobbies_created_total = IntCounterVec::new(
            Opts::new("pug_lobby_lobbies_created_total", "Total lobbies created"),
            &["game_mode"],
        )?;
        registry.register(Box::new(lobbies_created_total.clone()))?;

        let lobbies_removed_total = IntCounterVec::new(
            Opts::new("pug_lobby_lobbies_removed_total", "Total lobbies removed"),
            &["game_mode"],
        )?;
        registry.register(Box::new(lobbies_removed_total.clone()))?;

        let lobby_members = IntGauge::new(
            "pug_lobby_members",
            "Roster entries across all lobbies",
        )?;
        registry.register(Box::new(lobby_members.clone()))?;

        let chat_messages_total =
            IntCounter::new("pug_lobby_chat_messages_total", "Total chat messages posted")?;
        registry.register(Box::new(chat_messages_total.clone()))?;

        let slot_claims_total = IntCounterVec::new(
            Opts::new("pug_lobby_slot_claims_total", "Total slot claims"),
            &["game_mode"],
        )?;
        registry.register(Box::new(slot_claims_total.clone()))?;

        Ok(Self {
            active_lobbies,
            lobbies_created_total,
            lobbies_removed_total,
            lobby_members,
            chat_messages_total,
            slot_claims_total,
        })
    }
}

impl ClientMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let deliveries_total = IntCounterVec::new(
            Opts::new(
                "pug_lobby_deliveries_total",
                "Outbound messages by delivery status",
            ),
            &["status"],
        )?;
        registry.register(Box::new(deliveries_total.clone()))?;

        Ok(Self { deliveries_total })
    }
}

impl ActionMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let actions_total = IntCounterVec::new(
            Opts::new("pug_lobby_actions_total", "Client actions handled"),
            &["action", "status"],
        )?;
        registry.register(Box::new(actions_total.clone()))?;

        let action_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "pug_lobby_action_duration_seconds",
                "Client action handling time",
            )
            .buckets(vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5]),
            &["action"],
        )?;
        registry.register(Box::new(action_duration_seconds.clone()))?;

        Ok(Self {
            actions_total,
            action_duration_seconds,
        })
    }
}
