//! Pug Lobby - real-time coordinator for pick-up game lobbies
//!
//! This crate keeps a registry of ephemeral lobbies, each with a roster of
//! connected clients, a leader, a fixed set of class slots and a chat log.
//! Every state change is fanned out to the lobby's members over per-client
//! outbound queues.

pub mod client;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod lobby;
pub mod metrics;
pub mod service;
pub mod types;
pub mod utils;

// Re-export commonly used types and traits
pub use error::{LobbyError, Result};
pub use types::*;

// Re-export key components
pub use client::{ClientHandle, OutboundReceiver};
pub use dispatch::ActionDispatcher;
pub use lobby::{LobbyRegistry, PugLobby, SlotProvider, StaticSlotProvider};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
