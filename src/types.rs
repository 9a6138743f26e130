//! Common types used throughout the lobby coordinator

use crate::error::LobbyError;
use chrono::{DateTime, Utc};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Unique identifier for lobbies
pub type LobbyId = String;

/// 64-bit Steam identity of a connected user
///
/// Serialized as a decimal string so JavaScript clients do not lose precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SteamId(u64);

impl SteamId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SteamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SteamId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        s.trim().parse::<u64>().map(SteamId)
    }
}

impl Serialize for SteamId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for SteamId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct SteamIdVisitor;

        impl Visitor<'_> for SteamIdVisitor {
            type Value = SteamId;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a steam id as a number or decimal string")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<SteamId, E> {
                Ok(SteamId(v))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<SteamId, E> {
                v.parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_any(SteamIdVisitor)
    }
}

/// Game mode a lobby is created for; decides the slot vocabulary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameMode {
    Sixes,
    Highlander,
    Ultiduo,
    /// Any mode string this server does not recognise
    #[serde(other)]
    Unknown,
}

impl GameMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            GameMode::Sixes => "sixes",
            GameMode::Highlander => "highlander",
            GameMode::Ultiduo => "ultiduo",
            GameMode::Unknown => "unknown",
        }
    }
}

impl fmt::Display for GameMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Options supplied by the client that creates a lobby
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateLobbyOpts {
    pub game_mode: GameMode,
}

/// Public identity of a roster member
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LobbyMember {
    pub steam_id: SteamId,
    pub name: String,
}

/// One chat transcript record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub steam_id: SteamId,
    pub name: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

/// Full point-in-time view of a lobby, sent to its members
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LobbySnapshot {
    pub lobby_id: LobbyId,
    pub game_mode: GameMode,
    pub leader: Option<SteamId>,
    pub members: Vec<LobbyMember>,
    pub slots: BTreeMap<String, SteamId>,
    pub slot_keys: Vec<String>,
    pub messages: Vec<ChatMessage>,
}

/// Discovery view of a lobby; carries no roster or transcript
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LobbySummary {
    pub lobby_id: LobbyId,
    pub game_mode: GameMode,
    pub member_count: usize,
    pub leader: Option<SteamId>,
    pub slots_total: usize,
    pub slots_filled: usize,
    pub created_at: DateTime<Utc>,
}

/// Broadcast to existing members when someone joins
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberJoined {
    pub lobby_id: LobbyId,
    pub member: LobbyMember,
}

/// Broadcast to the roster (leaver included) when someone leaves
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberLeft {
    pub lobby_id: LobbyId,
    pub steam_id: SteamId,
    pub new_leader: Option<SteamId>,
    pub vacated_slots: Vec<String>,
}

/// Broadcast when a slot is claimed or vacated
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotChange {
    pub lobby_id: LobbyId,
    pub slot: String,
    pub steam_id: SteamId,
}

/// Response to a lobby listing request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LobbyList {
    pub lobbies: Vec<LobbySummary>,
}

/// Failure description sent to the initiating client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub action: Option<String>,
    pub code: String,
    pub message: String,
}

/// Union type for all outbound events
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "msg_type", content = "payload", rename_all = "snake_case")]
pub enum ServerEvent {
    CreateLobby(LobbySnapshot),
    JoinLobby(LobbySnapshot),
    MemberJoined(MemberJoined),
    LeaveLobby(MemberLeft),
    JoinLobbySlot(SlotChange),
    LeaveLobbySlot(SlotChange),
    UserMessage(ChatMessage),
    LobbyList(LobbyList),
    Error(ErrorPayload),
}

impl ServerEvent {
    pub fn msg_type(&self) -> &'static str {
        match self {
            ServerEvent::CreateLobby(_) => "create_lobby",
            ServerEvent::JoinLobby(_) => "join_lobby",
            ServerEvent::MemberJoined(_) => "member_joined",
            ServerEvent::LeaveLobby(_) => "leave_lobby",
            ServerEvent::JoinLobbySlot(_) => "join_lobby_slot",
            ServerEvent::LeaveLobbySlot(_) => "leave_lobby_slot",
            ServerEvent::UserMessage(_) => "user_message",
            ServerEvent::LobbyList(_) => "lobby_list",
            ServerEvent::Error(_) => "error",
        }
    }
}

/// Message queued to a client's outbound channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerMessage {
    pub status: bool,
    pub event: ServerEvent,
}

impl ServerMessage {
    pub fn ok(event: ServerEvent) -> Self {
        Self {
            status: true,
            event,
        }
    }

    /// Failure response for `action` carrying the error's code and text
    pub fn failure(action: Option<&str>, error: &LobbyError) -> Self {
        Self {
            status: false,
            event: ServerEvent::Error(ErrorPayload {
                action: action.map(str::to_string),
                code: error.code().to_string(),
                message: error.to_string(),
            }),
        }
    }

    pub fn to_json(&self) -> crate::error::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
