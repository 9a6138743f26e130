//! Lobby registry for creating, finding and destroying lobbies
//!
//! The registry is an injectable value rather than a process global, so
//! tests build isolated instances. Lock ordering is fixed: the registry lock
//! may be held while a lobby lock is taken, never the reverse, and the
//! client membership lock is always innermost.

use crate::client::ClientHandle;
use crate::config::LobbySettings;
use crate::error::{LobbyError, Result};
use crate::lobby::instance::{LeaveOutcome, LobbyPhase, PugLobby};
use crate::lobby::provider::SlotProvider;
use crate::metrics::MetricsCollector;
use crate::types::{CreateLobbyOpts, LobbyId, LobbySummary};
use crate::utils::generate_lobby_id;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info, warn};

/// Attempts at finding an unused identifier before giving up
const MAX_ID_ATTEMPTS: usize = 64;

/// Statistics about registry operations
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryStats {
    /// Total number of lobbies created
    pub lobbies_created: u64,
    /// Total number of lobbies removed
    pub lobbies_removed: u64,
    /// Current number of live lobbies
    pub active_lobbies: usize,
    /// Current number of roster entries across all lobbies
    pub connected_members: usize,
}

/// Leave result as seen by the registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryLeave {
    pub lobby_id: LobbyId,
    pub outcome: LeaveOutcome,
    /// Whether the lobby was destroyed because it became empty
    pub lobby_removed: bool,
}

#[derive(Debug, Default)]
struct Counters {
    created: u64,
    removed: u64,
}

/// Keyed collection of live lobbies
#[derive(Clone)]
pub struct LobbyRegistry {
    lobbies: Arc<RwLock<HashMap<LobbyId, Arc<PugLobby>>>>,
    slot_provider: Arc<dyn SlotProvider>,
    settings: LobbySettings,
    counters: Arc<RwLock<Counters>>,
    metrics: Arc<MetricsCollector>,
}

impl LobbyRegistry {
    pub fn new(
        slot_provider: Arc<dyn SlotProvider>,
        settings: LobbySettings,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            lobbies: Arc::new(RwLock::new(HashMap::new())),
            slot_provider,
            settings,
            counters: Arc::new(RwLock::new(Counters::default())),
            metrics,
        }
    }

    pub fn settings(&self) -> &LobbySettings {
        &self.settings
    }

    pub fn metrics(&self) -> Arc<MetricsCollector> {
        self.metrics.clone()
    }

    /// Create a lobby with `creator` as its sole member and leader
    ///
    /// Identifier generation and insertion happen under one write lock, so
    /// concurrent creates never collide or overwrite each other.
    pub fn create_lobby(
        &self,
        creator: &Arc<ClientHandle>,
        options: CreateLobbyOpts,
    ) -> Result<Arc<PugLobby>> {
        let slot_keys = match self.slot_provider.slot_keys(options.game_mode) {
            Some(keys) => keys,
            None if self.settings.allow_unknown_game_modes => {
                warn!(
                    "Creating lobby for unrecognised game mode {} with no slots",
                    options.game_mode
                );
                Vec::new()
            }
            None => {
                return Err(LobbyError::Configuration {
                    message: format!("Unsupported game mode: {}", options.game_mode),
                })
            }
        };

        let lobby = {
            let mut lobbies = self.write_lobbies()?;

            let lobby_id = (0..MAX_ID_ATTEMPTS)
                .map(|_| generate_lobby_id(self.settings.lobby_id_length))
                .find(|candidate| !lobbies.contains_key(candidate))
                .ok_or_else(|| LobbyError::Internal {
                    message: "Failed to allocate a unique lobby id".to_string(),
                })?;

            let lobby = PugLobby::new(
                lobby_id.clone(),
                creator,
                options,
                slot_keys,
                self.metrics.clone(),
            );
            lobbies.insert(lobby_id, lobby.clone());
            lobby
        };

        self.write_counters()?.created += 1;
        self.metrics.record_lobby_created(options.game_mode);

        info!(
            "Created {} lobby {} for {} - slots: {}",
            options.game_mode,
            lobby.id(),
            creator.steam_id(),
            lobby.slot_keys().len()
        );
        Ok(lobby)
    }

    pub fn find_lobby(&self, lobby_id: &str) -> Result<Arc<PugLobby>> {
        self.read_lobbies()?
            .get(lobby_id)
            .cloned()
            .ok_or_else(|| LobbyError::NotFound {
                lobby_id: lobby_id.to_string(),
            })
    }

    /// Delete a lobby without checking its roster
    ///
    /// Handles already held by other callers stay usable for reads, but the
    /// lobby is closed to further joins.
    pub fn remove_lobby(&self, lobby_id: &str) -> Result<()> {
        let removed = self
            .write_lobbies()?
            .remove(lobby_id)
            .ok_or_else(|| LobbyError::NotFound {
                lobby_id: lobby_id.to_string(),
            })?;
        removed.close()?;

        self.record_removed(&removed)?;
        Ok(())
    }

    /// Delete a lobby only if its roster is empty
    ///
    /// The roster check and the delete happen while the registry write lock
    /// is held, so a lobby that gained a member concurrently is kept.
    pub fn remove_if_empty(&self, lobby_id: &str) -> Result<bool> {
        let removed = {
            let mut lobbies = self.write_lobbies()?;
            let lobby = lobbies
                .get(lobby_id)
                .cloned()
                .ok_or_else(|| LobbyError::NotFound {
                    lobby_id: lobby_id.to_string(),
                })?;

            if !lobby.close_if_empty()? {
                debug!("Lobby {} gained a member, keeping it", lobby_id);
                return Ok(false);
            }
            lobbies.remove(lobby_id);
            lobby
        };

        self.record_removed(&removed)?;
        Ok(true)
    }

    /// Leave `lobby_id` and destroy the lobby if that emptied it
    pub fn leave_lobby(&self, client: &Arc<ClientHandle>, lobby_id: &str) -> Result<RegistryLeave> {
        let lobby = self.find_lobby(lobby_id)?;
        let outcome = lobby.leave(client)?;

        let lobby_removed = if outcome.remaining == 0 {
            match self.remove_if_empty(lobby_id) {
                Ok(removed) => removed,
                // Someone else already removed it
                Err(LobbyError::NotFound { .. }) => false,
                Err(e) => return Err(e),
            }
        } else {
            false
        };

        Ok(RegistryLeave {
            lobby_id: lobby_id.to_string(),
            outcome,
            lobby_removed,
        })
    }

    /// Remove a disconnecting client from every lobby it belongs to
    ///
    /// Returns the number of lobbies left. Failures are logged, not returned,
    /// so one bad lobby does not keep the client in the others.
    pub fn disconnect(&self, client: &Arc<ClientHandle>) -> usize {
        let mut left = 0;
        for lobby_id in client.lobbies() {
            match self.leave_lobby(client, &lobby_id) {
                Ok(result) => {
                    left += 1;
                    debug!(
                        "Disconnected {} from lobby {} (removed: {})",
                        client.steam_id(),
                        lobby_id,
                        result.lobby_removed
                    );
                }
                Err(e) => {
                    // Stale membership entry; drop it so it does not linger
                    client.remove_lobby(&lobby_id);
                    debug!(
                        "Skipping lobby {} while disconnecting {}: {}",
                        lobby_id,
                        client.steam_id(),
                        e
                    );
                }
            }
        }

        info!(
            "Client {} disconnected - left {} lobbies",
            client.steam_id(),
            left
        );
        left
    }

    /// Discovery view of every lobby with members, oldest first
    pub fn list_public_lobbies(&self) -> Result<Vec<LobbySummary>> {
        let lobbies: Vec<Arc<PugLobby>> = self.read_lobbies()?.values().cloned().collect();

        let mut summaries = Vec::with_capacity(lobbies.len());
        for lobby in lobbies {
            // Empty lobbies are on their way out
            if lobby.phase()? != LobbyPhase::Active {
                continue;
            }
            summaries.push(lobby.summary()?);
        }
        summaries.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.lobby_id.cmp(&b.lobby_id))
        });
        Ok(summaries)
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.read_lobbies()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    pub fn stats(&self) -> Result<RegistryStats> {
        let lobbies: Vec<Arc<PugLobby>> = self.read_lobbies()?.values().cloned().collect();

        let mut connected_members = 0;
        for lobby in &lobbies {
            connected_members += lobby.member_count()?;
        }

        let counters = self
            .counters
            .read()
            .map_err(|_| LobbyError::lock_poisoned("registry stats"))?;

        Ok(RegistryStats {
            lobbies_created: counters.created,
            lobbies_removed: counters.removed,
            active_lobbies: lobbies.len(),
            connected_members,
        })
    }

    fn record_removed(&self, lobby: &PugLobby) -> Result<()> {
        self.write_counters()?.removed += 1;
        self.metrics.record_lobby_removed(lobby.game_mode());
        info!("Removed {} lobby {}", lobby.game_mode(), lobby.id());
        Ok(())
    }

    fn read_lobbies(&self) -> Result<RwLockReadGuard<'_, HashMap<LobbyId, Arc<PugLobby>>>> {
        self.lobbies
            .read()
            .map_err(|_| LobbyError::lock_poisoned("lobbies"))
    }

    fn write_lobbies(&self) -> Result<RwLockWriteGuard<'_, HashMap<LobbyId, Arc<PugLobby>>>> {
        self.lobbies
            .write()
            .map_err(|_| LobbyError::lock_poisoned("lobbies"))
    }

    fn write_counters(&self) -> Result<RwLockWriteGuard<'_, Counters>> {
        self.counters
            .write()
            .map_err(|_| LobbyError::lock_poisoned("registry stats"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::OutboundReceiver;
    use crate::lobby::provider::StaticSlotProvider;
    use crate::types::{GameMode, SteamId};
    use mockall::mock;
    use tokio_test::{assert_err, assert_ok};

    mock! {
        pub Slots {}
        impl SlotProvider for Slots {
            fn slot_keys(&self, game_mode: GameMode) -> Option<Vec<String>>;
            fn available_game_modes(&self) -> Vec<GameMode>;
        }
    }

    fn create_test_registry() -> LobbyRegistry {
        registry_with(LobbySettings::default())
    }

    fn registry_with(settings: LobbySettings) -> LobbyRegistry {
        LobbyRegistry::new(
            Arc::new(StaticSlotProvider::new()),
            settings,
            Arc::new(MetricsCollector::new().unwrap()),
        )
    }

    fn test_client(id: u64) -> (Arc<ClientHandle>, OutboundReceiver) {
        ClientHandle::new(SteamId::new(id), format!("player{}", id), 64)
    }

    fn opts(game_mode: GameMode) -> CreateLobbyOpts {
        CreateLobbyOpts { game_mode }
    }

    #[test]
    fn test_create_and_find_lobby() {
        let registry = create_test_registry();
        let (alice, _rx) = test_client(1);

        let lobby = registry.create_lobby(&alice, opts(GameMode::Sixes)).unwrap();
        assert_eq!(lobby.id().len(), LobbySettings::default().lobby_id_length);

        let found = registry.find_lobby(lobby.id()).unwrap();
        assert!(Arc::ptr_eq(&lobby, &found));
        assert_eq!(found.slot_keys().len(), 12);
        assert_eq!(registry.len().unwrap(), 1);
    }

    #[test]
    fn test_find_missing_lobby() {
        let registry = create_test_registry();
        let err = registry.find_lobby("NOPE").unwrap_err();
        assert_eq!(
            err,
            LobbyError::NotFound {
                lobby_id: "NOPE".to_string()
            }
        );
    }

    #[test]
    fn test_unknown_game_mode_rejected_by_default() {
        let registry = create_test_registry();
        let (alice, _rx) = test_client(1);

        let err = registry
            .create_lobby(&alice, opts(GameMode::Unknown))
            .unwrap_err();
        assert!(matches!(err, LobbyError::Configuration { .. }));
        assert!(registry.is_empty().unwrap());
        assert!(alice.lobbies().is_empty());
    }

    #[test]
    fn test_unknown_game_mode_allowed_when_configured() {
        let registry = registry_with(LobbySettings {
            allow_unknown_game_modes: true,
            ..LobbySettings::default()
        });
        let (alice, _rx) = test_client(1);

        let lobby = registry.create_lobby(&alice, opts(GameMode::Unknown)).unwrap();
        assert!(lobby.slot_keys().is_empty());
        assert!(lobby.claim_slot(&alice, "scout1").is_err());
    }

    #[test]
    fn test_slot_provider_is_consulted() {
        let mut provider = MockSlots::new();
        provider
            .expect_slot_keys()
            .withf(|mode| *mode == GameMode::Ultiduo)
            .times(1)
            .returning(|_| Some(vec!["only".to_string()]));

        let registry = LobbyRegistry::new(
            Arc::new(provider),
            LobbySettings::default(),
            Arc::new(MetricsCollector::new().unwrap()),
        );
        let (alice, _rx) = test_client(1);

        let lobby = registry.create_lobby(&alice, opts(GameMode::Ultiduo)).unwrap();
        assert_eq!(lobby.slot_keys(), &["only".to_string()]);
    }

    #[test]
    fn test_remove_lobby() {
        let registry = create_test_registry();
        let (alice, _rx) = test_client(1);
        let lobby = registry.create_lobby(&alice, opts(GameMode::Sixes)).unwrap();
        let id = lobby.id().to_string();

        assert_ok!(registry.remove_lobby(&id));
        assert_err!(registry.find_lobby(&id));
        assert_err!(registry.remove_lobby(&id));

        // The held handle still answers reads
        assert_eq!(lobby.member_count().unwrap(), 1);
        assert_eq!(lobby.phase().unwrap(), LobbyPhase::Closed);
    }

    #[test]
    fn test_remove_if_empty_keeps_populated_lobby() {
        let registry = create_test_registry();
        let (alice, _rx) = test_client(1);
        let lobby = registry.create_lobby(&alice, opts(GameMode::Sixes)).unwrap();

        assert!(!registry.remove_if_empty(lobby.id()).unwrap());
        assert_ok!(registry.find_lobby(lobby.id()));
    }

    #[test]
    fn test_leave_lobby_removes_when_empty() {
        let registry = create_test_registry();
        let (alice, _rx_a) = test_client(1);
        let (bob, _rx_b) = test_client(2);
        let lobby = registry.create_lobby(&alice, opts(GameMode::Highlander)).unwrap();
        let id = lobby.id().to_string();
        lobby.join(&bob).unwrap();

        let first = registry.leave_lobby(&alice, &id).unwrap();
        assert!(!first.lobby_removed);
        assert_eq!(first.outcome.remaining, 1);

        let second = registry.leave_lobby(&bob, &id).unwrap();
        assert!(second.lobby_removed);
        assert!(matches!(
            registry.find_lobby(&id),
            Err(LobbyError::NotFound { .. })
        ));

        let stats = registry.stats().unwrap();
        assert_eq!(stats.lobbies_created, 1);
        assert_eq!(stats.lobbies_removed, 1);
        assert_eq!(stats.active_lobbies, 0);
    }

    #[test]
    fn test_disconnect_leaves_every_lobby() {
        let registry = create_test_registry();
        let (alice, _rx_a) = test_client(1);
        let (bob, _rx_b) = test_client(2);

        let first = registry.create_lobby(&alice, opts(GameMode::Sixes)).unwrap();
        let second = registry.create_lobby(&bob, opts(GameMode::Ultiduo)).unwrap();
        second.join(&alice).unwrap();

        assert_eq!(registry.disconnect(&alice), 2);
        assert!(alice.lobbies().is_empty());
        assert_err!(registry.find_lobby(first.id()));
        assert_eq!(second.member_count().unwrap(), 1);
        assert_eq!(second.leader().unwrap(), Some(bob.steam_id()));
    }

    #[test]
    fn test_list_public_lobbies() {
        let registry = create_test_registry();
        let (alice, _rx_a) = test_client(1);
        let (bob, _rx_b) = test_client(2);
        registry.create_lobby(&alice, opts(GameMode::Sixes)).unwrap();
        let hl = registry.create_lobby(&bob, opts(GameMode::Highlander)).unwrap();
        hl.join(&alice).unwrap();

        let summaries = registry.list_public_lobbies().unwrap();
        assert_eq!(summaries.len(), 2);
        let hl_summary = summaries.iter().find(|s| s.lobby_id == hl.id()).unwrap();
        assert_eq!(hl_summary.member_count, 2);
        assert_eq!(hl_summary.game_mode, GameMode::Highlander);
        assert_eq!(hl_summary.leader, Some(bob.steam_id()));
    }

    #[test]
    fn test_list_skips_empty_lobbies() {
        let registry = create_test_registry();
        let (alice, _rx_a) = test_client(1);
        let (bob, _rx_b) = test_client(2);
        let emptied = registry.create_lobby(&alice, opts(GameMode::Sixes)).unwrap();
        let kept = registry.create_lobby(&bob, opts(GameMode::Sixes)).unwrap();

        // Left directly, so the registry has not removed it yet
        emptied.leave(&alice).unwrap();
        assert_eq!(emptied.phase().unwrap(), LobbyPhase::Empty);
        assert_ok!(registry.find_lobby(emptied.id()));

        let summaries = registry.list_public_lobbies().unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].lobby_id, kept.id());
    }

    #[test]
    fn test_leave_from_other_connection_of_same_user() {
        let registry = create_test_registry();
        let (tab1, _rx1) = test_client(7);
        let (tab2, _rx2) = test_client(7);
        let lobby = registry.create_lobby(&tab1, opts(GameMode::Highlander)).unwrap();
        let id = lobby.id().to_string();

        assert!(matches!(
            registry.leave_lobby(&tab2, &id),
            Err(LobbyError::UnknownClient { .. })
        ));
        assert_eq!(registry.disconnect(&tab2), 0);

        assert_ok!(registry.find_lobby(&id));
        assert_eq!(lobby.member_count().unwrap(), 1);
        assert!(tab1.is_in_lobby(&id));

        let left = registry.leave_lobby(&tab1, &id).unwrap();
        assert!(left.lobby_removed);
        assert!(tab1.lobbies().is_empty());
    }

    #[test]
    fn test_stats_count_members() {
        let registry = create_test_registry();
        let (alice, _rx_a) = test_client(1);
        let (bob, _rx_b) = test_client(2);
        let lobby = registry.create_lobby(&alice, opts(GameMode::Sixes)).unwrap();
        lobby.join(&bob).unwrap();

        let stats = registry.stats().unwrap();
        assert_eq!(stats.active_lobbies, 1);
        assert_eq!(stats.connected_members, 2);
    }
}
