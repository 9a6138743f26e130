//! Client handle implementation

use crate::lobby::instance::PugLobby;
use crate::lobby::registry::LobbyRegistry;
use crate::types::{LobbyId, LobbyMember, ServerMessage, SteamId};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Sending half of a client's outbound queue
pub type OutboundSender = mpsc::Sender<Arc<ServerMessage>>;

/// Receiving half of a client's outbound queue, drained by the transport
pub type OutboundReceiver = mpsc::Receiver<Arc<ServerMessage>>;

/// Outcome of a single best-effort send
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Delivered,
    /// The client is not draining its queue fast enough
    QueueFull,
    /// The transport side of the queue has gone away
    Disconnected,
}

impl Delivery {
    pub fn is_delivered(&self) -> bool {
        matches!(self, Delivery::Delivered)
    }
}

/// One connected user's session
#[derive(Debug)]
pub struct ClientHandle {
    connection_id: Uuid,
    steam_id: SteamId,
    name: String,
    sender: OutboundSender,
    /// Lobbies this client belongs to, resolved through the registry
    lobbies: Mutex<Vec<LobbyId>>,
    /// Held for the duration of one action from this client
    action_gate: tokio::sync::Mutex<()>,
}

impl ClientHandle {
    /// Create a handle together with the receiver the transport will drain
    pub fn new(
        steam_id: SteamId,
        name: impl Into<String>,
        queue_capacity: usize,
    ) -> (Arc<Self>, OutboundReceiver) {
        let (sender, receiver) = mpsc::channel(queue_capacity.max(1));
        (Self::with_sender(steam_id, name, sender), receiver)
    }

    /// Create a handle around an existing outbound sender
    pub fn with_sender(steam_id: SteamId, name: impl Into<String>, sender: OutboundSender) -> Arc<Self> {
        Arc::new(Self {
            connection_id: Uuid::new_v4(),
            steam_id,
            name: name.into(),
            sender,
            lobbies: Mutex::new(Vec::new()),
            action_gate: tokio::sync::Mutex::new(()),
        })
    }

    pub fn connection_id(&self) -> Uuid {
        self.connection_id
    }

    pub fn steam_id(&self) -> SteamId {
        self.steam_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn member(&self) -> LobbyMember {
        LobbyMember {
            steam_id: self.steam_id,
            name: self.name.clone(),
        }
    }

    pub fn is_connected(&self) -> bool {
        !self.sender.is_closed()
    }

    /// Queue a message for this client without waiting
    ///
    /// Failures are logged and reported to the caller as a [`Delivery`]; they
    /// are never errors, so one stalled client cannot fail a lobby operation.
    pub fn send(&self, message: Arc<ServerMessage>) -> Delivery {
        match self.sender.try_send(message) {
            Ok(()) => Delivery::Delivered,
            Err(mpsc::error::TrySendError::Full(message)) => {
                warn!(
                    "Outbound queue full, dropping '{}' for client {} ({})",
                    message.event.msg_type(),
                    self.steam_id,
                    self.connection_id
                );
                Delivery::QueueFull
            }
            Err(mpsc::error::TrySendError::Closed(message)) => {
                debug!(
                    "Client {} ({}) disconnected, dropping '{}'",
                    self.steam_id,
                    self.connection_id,
                    message.event.msg_type()
                );
                Delivery::Disconnected
            }
        }
    }

    /// Wait until no other action from this client is in flight
    ///
    /// Membership checks made while the guard is held stay valid until the
    /// action completes.
    pub(crate) async fn begin_action(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.action_gate.lock().await
    }

    /// Snapshot of the lobby ids this client belongs to, in join order
    pub fn lobbies(&self) -> Vec<LobbyId> {
        self.membership().clone()
    }

    pub fn is_in_lobby(&self, lobby_id: &str) -> bool {
        self.membership().iter().any(|id| id == lobby_id)
    }

    pub(crate) fn add_lobby(&self, lobby_id: &str) {
        let mut lobbies = self.membership();
        if !lobbies.iter().any(|id| id == lobby_id) {
            lobbies.push(lobby_id.to_string());
        }
    }

    /// Drop `lobby_id` from the membership set; returns whether it was present
    pub fn remove_lobby(&self, lobby_id: &str) -> bool {
        let mut lobbies = self.membership();
        let before = lobbies.len();
        lobbies.retain(|id| id != lobby_id);
        lobbies.len() != before
    }

    /// The pug lobby this client is currently in, if it still exists
    pub fn current_pug_lobby(&self, registry: &LobbyRegistry) -> Option<Arc<PugLobby>> {
        self.lobbies()
            .iter()
            .find_map(|id| registry.find_lobby(id).ok())
    }

    // Leaf lock: nothing else is acquired while it is held. A Vec of ids
    // cannot be left half-updated, so a poisoned guard is still usable.
    fn membership(&self) -> MutexGuard<'_, Vec<LobbyId>> {
        self.lobbies.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
