//! Test fixtures shared by the integration tests
#![allow(dead_code)]

use pug_lobby::client::{ClientHandle, OutboundReceiver};
use pug_lobby::config::LobbySettings;
use pug_lobby::dispatch::ActionDispatcher;
use pug_lobby::lobby::{LobbyRegistry, StaticSlotProvider};
use pug_lobby::metrics::MetricsCollector;
use pug_lobby::types::{ServerEvent, ServerMessage, SteamId};
use std::sync::Arc;

/// Base for generated test identities, in the real SteamID64 range
pub const STEAM_ID_BASE: u64 = 76561198000000000;

/// A connected client together with the receiving end of its queue
pub struct TestClient {
    pub handle: Arc<ClientHandle>,
    pub receiver: OutboundReceiver,
}

impl TestClient {
    pub fn new(index: u64) -> Self {
        Self::with_capacity(index, 256)
    }

    pub fn with_capacity(index: u64, capacity: usize) -> Self {
        let (handle, receiver) = ClientHandle::new(
            SteamId::new(STEAM_ID_BASE + index),
            format!("player{}", index),
            capacity,
        );
        Self { handle, receiver }
    }

    pub fn steam_id(&self) -> SteamId {
        self.handle.steam_id()
    }

    /// Everything queued so far, oldest first
    pub fn drain(&mut self) -> Vec<Arc<ServerMessage>> {
        let mut messages = Vec::new();
        while let Ok(message) = self.receiver.try_recv() {
            messages.push(message);
        }
        messages
    }

    /// Event types queued so far, oldest first
    pub fn drain_types(&mut self) -> Vec<&'static str> {
        self.drain()
            .iter()
            .map(|message| message.event.msg_type())
            .collect()
    }

    pub fn next_event(&mut self) -> Option<ServerEvent> {
        self.receiver
            .try_recv()
            .ok()
            .map(|message| message.event.clone())
    }
}

pub fn create_test_metrics() -> Arc<MetricsCollector> {
    Arc::new(MetricsCollector::new().expect("Failed to create metrics collector"))
}

pub fn create_test_registry() -> LobbyRegistry {
    create_test_registry_with(LobbySettings::default())
}

pub fn create_test_registry_with(settings: LobbySettings) -> LobbyRegistry {
    LobbyRegistry::new(
        Arc::new(StaticSlotProvider::new()),
        settings,
        create_test_metrics(),
    )
}

/// Registry plus a dispatcher sharing its metrics
pub fn create_test_system(settings: LobbySettings) -> (LobbyRegistry, ActionDispatcher) {
    let registry = create_test_registry_with(settings.clone());
    let dispatcher = ActionDispatcher::new(registry.clone(), &settings, registry.metrics());
    (registry, dispatcher)
}

pub fn frame(msg_type: &str, payload: serde_json::Value) -> Vec<u8> {
    serde_json::to_vec(&serde_json::json!({
        "msg_type": msg_type,
        "payload": payload,
    }))
    .expect("frame serializes")
}
