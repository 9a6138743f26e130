//! Inbound action frames and their payloads

use crate::error::{LobbyError, Result};
use crate::types::LobbyId;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Client actions the dispatcher understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    CreateLobby,
    JoinLobby,
    JoinLobbySlot,
    LeaveLobbySlot,
    LeaveLobby,
    SendUserMessage,
    ListLobbies,
}

impl ActionType {
    pub const ALL: [ActionType; 7] = [
        ActionType::CreateLobby,
        ActionType::JoinLobby,
        ActionType::JoinLobbySlot,
        ActionType::LeaveLobbySlot,
        ActionType::LeaveLobby,
        ActionType::SendUserMessage,
        ActionType::ListLobbies,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::CreateLobby => "create_lobby",
            ActionType::JoinLobby => "join_lobby",
            ActionType::JoinLobbySlot => "join_lobby_slot",
            ActionType::LeaveLobbySlot => "leave_lobby_slot",
            ActionType::LeaveLobby => "leave_lobby",
            ActionType::SendUserMessage => "send_user_message",
            ActionType::ListLobbies => "list_lobbies",
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionType {
    type Err = LobbyError;

    fn from_str(s: &str) -> Result<Self> {
        ActionType::ALL
            .into_iter()
            .find(|action| action.as_str() == s)
            .ok_or_else(|| LobbyError::Decode {
                reason: format!("Unknown action: {}", s),
            })
    }
}

/// Raw inbound frame: `{ "msg_type": ..., "payload": {...} }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientFrame {
    pub msg_type: String,
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl ClientFrame {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| LobbyError::Decode {
            reason: format!("Malformed frame: {}", e),
        })
    }

    pub fn action(&self) -> Result<ActionType> {
        self.msg_type.parse()
    }

    /// Decode the payload; an absent payload reads as an empty object
    pub fn payload_as<T: DeserializeOwned>(&self) -> Result<T> {
        let payload = if self.payload.is_null() {
            serde_json::Value::Object(serde_json::Map::new())
        } else {
            self.payload.clone()
        };

        serde_json::from_value(payload).map_err(|e| LobbyError::Decode {
            reason: format!("Invalid {} payload: {}", self.msg_type, e),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinLobbyRequest {
    pub lobby_id: LobbyId,
}

/// Slot claim or release; defaults to the client's current lobby
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LobbySlotRequest {
    #[serde(default)]
    pub lobby_id: Option<LobbyId>,
    pub slot: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaveLobbyRequest {
    #[serde(default)]
    pub lobby_id: Option<LobbyId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserMessageRequest {
    #[serde(default)]
    pub lobby_id: Option<LobbyId>,
    pub message: String,
}
