//! Lobby configuration

use serde::{Deserialize, Serialize};

/// Lobby and dispatcher settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LobbySettings {
    /// Length of generated lobby codes
    pub lobby_id_length: usize,
    /// Per-client outbound queue capacity
    pub outbound_queue_capacity: usize,
    /// Upper bound on handling one inbound action, in milliseconds
    pub action_timeout_ms: u64,
    /// Reject create/join while the client is already in a lobby
    pub single_lobby_per_client: bool,
    /// Create slotless lobbies for unrecognised game modes instead of failing
    pub allow_unknown_game_modes: bool,
}

impl Default for LobbySettings {
    fn default() -> Self {
        Self {
            lobby_id_length: 6,
            outbound_queue_capacity: 256,
            action_timeout_ms: 5_000,
            single_lobby_per_client: true,
            allow_unknown_game_modes: false,
        }
    }
}
