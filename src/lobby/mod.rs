//! Pug lobbies and the registry that owns them
//!
//! A lobby tracks its roster, leader, slot assignments and chat history.
//! The registry creates lobbies, resolves them by id and removes them once
//! they are empty.

pub mod instance;
pub mod provider;
pub mod registry;

// Re-export commonly used types
pub use instance::{LeaveOutcome, LobbyPhase, PugLobby};
pub use provider::{SlotProvider, StaticSlotProvider};
pub use registry::{LobbyRegistry, RegistryLeave, RegistryStats};
