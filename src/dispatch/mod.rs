//! Inbound action dispatch
//!
//! The boundary between the transport and the lobby core: decodes action
//! frames, routes them through the registry and answers the initiator.

pub mod handlers;
pub mod messages;

pub use handlers::{ActionDispatcher, ActionHandler, LobbyActionHandler};
pub use messages::{
    ActionType, ClientFrame, JoinLobbyRequest, LeaveLobbyRequest, LobbySlotRequest,
    UserMessageRequest,
};
