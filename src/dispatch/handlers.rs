//! Action handlers and the dispatcher that drives them
//!
//! The transport hands every inbound frame to [`ActionDispatcher::dispatch`].
//! Successful actions may produce a private response for the initiator;
//! failures always do.

use crate::client::{ClientHandle, DeliveryReport};
use crate::config::LobbySettings;
use crate::dispatch::messages::{
    ActionType, ClientFrame, JoinLobbyRequest, LeaveLobbyRequest, LobbySlotRequest,
    UserMessageRequest,
};
use crate::error::{LobbyError, Result};
use crate::lobby::{LobbyRegistry, PugLobby};
use crate::metrics::{MetricsCollector, MetricsTimer};
use crate::types::{CreateLobbyOpts, LobbyList, ServerEvent, ServerMessage};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Metrics label for frames whose action could not be determined
const UNKNOWN_ACTION: &str = "unknown";

/// Trait defining the interface for handling decoded client actions
#[async_trait]
pub trait ActionHandler: Send + Sync {
    /// Perform `action` for `client`; returns the private response, if any
    async fn handle(
        &self,
        client: &Arc<ClientHandle>,
        action: ActionType,
        frame: &ClientFrame,
    ) -> Result<Option<ServerEvent>>;
}

/// Handler that applies actions to a [`LobbyRegistry`]
pub struct LobbyActionHandler {
    registry: LobbyRegistry,
    single_lobby_per_client: bool,
}

impl LobbyActionHandler {
    pub fn new(registry: LobbyRegistry, single_lobby_per_client: bool) -> Self {
        Self {
            registry,
            single_lobby_per_client,
        }
    }

    fn create_lobby(
        &self,
        client: &Arc<ClientHandle>,
        options: CreateLobbyOpts,
    ) -> Result<Option<ServerEvent>> {
        if self.single_lobby_per_client {
            if let Some(current) = client.current_pug_lobby(&self.registry) {
                return Err(LobbyError::AlreadyInLobby {
                    lobby_id: current.id().to_string(),
                    steam_id: client.steam_id(),
                });
            }
        }

        let lobby = self.registry.create_lobby(client, options)?;
        Ok(Some(ServerEvent::CreateLobby(lobby.snapshot()?)))
    }

    fn join_lobby(
        &self,
        client: &Arc<ClientHandle>,
        request: JoinLobbyRequest,
    ) -> Result<Option<ServerEvent>> {
        if self.single_lobby_per_client {
            // Rejoining the current lobby falls through to DuplicateClient
            if let Some(current) = client.current_pug_lobby(&self.registry) {
                if current.id() != request.lobby_id {
                    return Err(LobbyError::AlreadyInLobby {
                        lobby_id: current.id().to_string(),
                        steam_id: client.steam_id(),
                    });
                }
            }
        }

        let lobby = self.registry.find_lobby(&request.lobby_id)?;
        lobby.join(client)?;
        // The joiner's snapshot was sent by the lobby itself
        Ok(None)
    }

    fn leave_lobby(
        &self,
        client: &Arc<ClientHandle>,
        request: LeaveLobbyRequest,
    ) -> Result<Option<ServerEvent>> {
        let lobby = self.resolve(client, request.lobby_id.as_deref())?;
        self.registry.leave_lobby(client, lobby.id())?;
        Ok(None)
    }

    fn send_user_message(
        &self,
        client: &Arc<ClientHandle>,
        request: UserMessageRequest,
    ) -> Result<Option<ServerEvent>> {
        if request.message.trim().is_empty() {
            return Err(LobbyError::Decode {
                reason: "Message cannot be empty".to_string(),
            });
        }

        let lobby = self.resolve(client, request.lobby_id.as_deref())?;
        lobby.post_message(client, request.message)?;
        Ok(None)
    }

    fn list_lobbies(&self) -> Result<Option<ServerEvent>> {
        let lobbies = self.registry.list_public_lobbies()?;
        Ok(Some(ServerEvent::LobbyList(LobbyList { lobbies })))
    }

    /// The named lobby, or the client's current one when none is named
    fn resolve(&self, client: &Arc<ClientHandle>, lobby_id: Option<&str>) -> Result<Arc<PugLobby>> {
        match lobby_id {
            Some(id) => self.registry.find_lobby(id),
            None => client
                .current_pug_lobby(&self.registry)
                .ok_or(LobbyError::NotInLobby {
                    steam_id: client.steam_id(),
                }),
        }
    }
}

#[async_trait]
impl ActionHandler for LobbyActionHandler {
    async fn handle(
        &self,
        client: &Arc<ClientHandle>,
        action: ActionType,
        frame: &ClientFrame,
    ) -> Result<Option<ServerEvent>> {
        match action {
            ActionType::CreateLobby => self.create_lobby(client, frame.payload_as()?),
            ActionType::JoinLobby => self.join_lobby(client, frame.payload_as()?),
            ActionType::JoinLobbySlot => {
                let request: LobbySlotRequest = frame.payload_as()?;
                let lobby = self.resolve(client, request.lobby_id.as_deref())?;
                lobby.claim_slot(client, &request.slot)?;
                Ok(None)
            }
            ActionType::LeaveLobbySlot => {
                let request: LobbySlotRequest = frame.payload_as()?;
                let lobby = self.resolve(client, request.lobby_id.as_deref())?;
                lobby.vacate_slot(client, &request.slot)?;
                Ok(None)
            }
            ActionType::LeaveLobby => self.leave_lobby(client, frame.payload_as()?),
            ActionType::SendUserMessage => self.send_user_message(client, frame.payload_as()?),
            ActionType::ListLobbies => self.list_lobbies(),
        }
    }
}

/// Decodes inbound frames, runs them under a timeout and answers failures
#[derive(Clone)]
pub struct ActionDispatcher {
    handler: Arc<dyn ActionHandler>,
    metrics: Arc<MetricsCollector>,
    action_timeout: Duration,
}

impl ActionDispatcher {
    /// Create a dispatcher over `registry` with the standard handler
    pub fn new(
        registry: LobbyRegistry,
        settings: &LobbySettings,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        let handler = LobbyActionHandler::new(registry, settings.single_lobby_per_client);
        Self::with_handler(
            Arc::new(handler),
            metrics,
            Duration::from_millis(settings.action_timeout_ms),
        )
    }

    pub fn with_handler(
        handler: Arc<dyn ActionHandler>,
        metrics: Arc<MetricsCollector>,
        action_timeout: Duration,
    ) -> Self {
        Self {
            handler,
            metrics,
            action_timeout,
        }
    }

    /// Handle one inbound frame from `client`
    ///
    /// Frames from the same client are handled one at a time; frames from
    /// different clients run concurrently. On failure the client is sent an
    /// error response and the error is also returned to the caller.
    pub async fn dispatch(&self, client: &Arc<ClientHandle>, bytes: &[u8]) -> Result<()> {
        let timer = self.metrics.start_timer();

        let frame = match ClientFrame::from_bytes(bytes) {
            Ok(frame) => frame,
            Err(e) => return Err(self.fail(client, None, UNKNOWN_ACTION, timer, e)),
        };
        let action = match frame.action() {
            Ok(action) => action,
            Err(e) => {
                let msg_type = Some(frame.msg_type.as_str());
                return Err(self.fail(client, msg_type, UNKNOWN_ACTION, timer, e));
            }
        };

        debug!("Dispatching {} for client {}", action, client.steam_id());

        // One action per client at a time
        let guarded = async {
            let _gate = client.begin_action().await;
            self.handler.handle(client, action, &frame).await
        };
        let result = match tokio::time::timeout(self.action_timeout, guarded).await {
            Ok(result) => result,
            Err(_) => Err(LobbyError::Timeout {
                action: action.to_string(),
                timeout_ms: self.action_timeout.as_millis() as u64,
            }),
        };

        match result {
            Ok(response) => {
                if let Some(event) = response {
                    let delivery = client.send(Arc::new(ServerMessage::ok(event)));
                    let mut report = DeliveryReport::default();
                    report.record(delivery);
                    self.metrics.record_delivery(&report);
                }

                let duration = timer.stop();
                self.metrics.record_action(action.as_str(), true, duration);
                debug!(
                    "Handled {} for client {} in {:.2}ms",
                    action,
                    client.steam_id(),
                    duration.as_secs_f64() * 1000.0
                );
                Ok(())
            }
            Err(e) => Err(self.fail(client, Some(action.as_str()), action.as_str(), timer, e)),
        }
    }

    fn fail(
        &self,
        client: &Arc<ClientHandle>,
        action: Option<&str>,
        label: &str,
        timer: MetricsTimer,
        error: LobbyError,
    ) -> LobbyError {
        match &error {
            LobbyError::Internal { .. } | LobbyError::Timeout { .. } => warn!(
                "Action {} from client {} failed: {}",
                action.unwrap_or(UNKNOWN_ACTION),
                client.steam_id(),
                error
            ),
            _ => debug!(
                "Action {} from client {} rejected: {}",
                action.unwrap_or(UNKNOWN_ACTION),
                client.steam_id(),
                error
            ),
        }

        client.send(Arc::new(ServerMessage::failure(action, &error)));
        self.metrics.record_action(label, false, timer.stop());
        error
    }
}
