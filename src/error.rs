//! Error types for the lobby coordinator
//!
//! Every core operation returns an explicit [`LobbyError`] on a business-rule
//! violation. The action dispatcher turns these into failure responses for the
//! initiating client; nothing here aborts the process.

use crate::types::SteamId;
use std::fmt;

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, LobbyError>;

/// Why a slot operation was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotRejection {
    /// The slot name is not part of the lobby's game mode vocabulary
    NotInVocabulary,
    /// Another client already holds the slot
    Occupied,
    /// The client tried to vacate a slot it does not hold
    NotHeld,
}

impl fmt::Display for SlotRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotRejection::NotInVocabulary => write!(f, "not a valid slot for this game mode"),
            SlotRejection::Occupied => write!(f, "slot is already taken"),
            SlotRejection::NotHeld => write!(f, "slot is not held by this client"),
        }
    }
}

/// Error kinds surfaced by the lobby core and the action dispatcher
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LobbyError {
    #[error("Lobby not found: {lobby_id}")]
    NotFound { lobby_id: String },

    #[error("Client {steam_id} is already a member of lobby {lobby_id}")]
    DuplicateClient { lobby_id: String, steam_id: SteamId },

    #[error("Client {steam_id} is not a member of lobby {lobby_id}")]
    UnknownClient { lobby_id: String, steam_id: SteamId },

    #[error("Invalid slot '{slot}' in lobby {lobby_id}: {reason}")]
    InvalidSlot {
        lobby_id: String,
        slot: String,
        reason: SlotRejection,
    },

    #[error("Failed to decode payload: {reason}")]
    Decode { reason: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Client {steam_id} is not in any lobby")]
    NotInLobby { steam_id: SteamId },

    #[error("Client {steam_id} is already in lobby {lobby_id}")]
    AlreadyInLobby { lobby_id: String, steam_id: SteamId },

    #[error("Action {action} timed out after {timeout_ms}ms")]
    Timeout { action: String, timeout_ms: u64 },

    #[error("Internal service error: {message}")]
    Internal { message: String },
}

impl LobbyError {
    /// Stable machine-readable code sent to clients alongside the message
    pub fn code(&self) -> &'static str {
        match self {
            LobbyError::NotFound { .. } => "lobby_not_found",
            LobbyError::DuplicateClient { .. } => "duplicate_client",
            LobbyError::UnknownClient { .. } => "unknown_client",
            LobbyError::InvalidSlot { .. } => "invalid_slot",
            LobbyError::Decode { .. } => "decode_error",
            LobbyError::Configuration { .. } => "configuration_error",
            LobbyError::NotInLobby { .. } => "not_in_lobby",
            LobbyError::AlreadyInLobby { .. } => "already_in_lobby",
            LobbyError::Timeout { .. } => "timeout",
            LobbyError::Internal { .. } => "internal_error",
        }
    }

    /// Error for a lock whose holder panicked
    pub(crate) fn lock_poisoned(what: &str) -> Self {
        LobbyError::Internal {
            message: format!("Failed to acquire {} lock", what),
        }
    }
}

impl From<serde_json::Error> for LobbyError {
    fn from(err: serde_json::Error) -> Self {
        LobbyError::Decode {
            reason: err.to_string(),
        }
    }
}
