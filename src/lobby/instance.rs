//! Lobby instance implementation and lifecycle management
//!
//! A [`PugLobby`] owns its roster, leader, slot map and chat transcript
//! behind a single `RwLock`. Every mutation takes the write half, so there is
//! a total order of mutations per lobby. Fan-out uses non-blocking sends and
//! therefore runs under the lock, which keeps each member's view of events
//! in the same order as the mutations that produced them.

use crate::client::{fan_out, ClientHandle, DeliveryReport};
use crate::error::{LobbyError, Result, SlotRejection};
use crate::metrics::MetricsCollector;
use crate::types::{
    ChatMessage, CreateLobbyOpts, GameMode, LobbyId, LobbyMember, LobbySnapshot, LobbySummary,
    MemberJoined, MemberLeft, ServerEvent, ServerMessage, SlotChange, SteamId,
};
use crate::utils::current_timestamp;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info};

/// Lifecycle phase of a lobby
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LobbyPhase {
    /// At least one member
    Active,
    /// Last member left; awaiting removal from the registry
    Empty,
    /// Removed from the registry (terminal)
    Closed,
}

/// Result of a successful leave
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaveOutcome {
    pub remaining: usize,
    /// Leader after the departure; changes only if the leaver was leader
    pub new_leader: Option<SteamId>,
    pub vacated_slots: Vec<String>,
}

#[derive(Debug)]
struct LobbyState {
    roster: Vec<Arc<ClientHandle>>,
    leader: Option<SteamId>,
    slots: BTreeMap<String, SteamId>,
    messages: Vec<ChatMessage>,
    closed: bool,
}

impl LobbyState {
    /// Roster index of this exact connection
    fn position(&self, client: &ClientHandle) -> Option<usize> {
        self.roster
            .iter()
            .position(|c| c.connection_id() == client.connection_id())
    }

    /// Whether any connection of `steam_id` is on the roster
    fn has_user(&self, steam_id: SteamId) -> bool {
        self.roster.iter().any(|c| c.steam_id() == steam_id)
    }
}

/// One pick-up game lobby
#[derive(Debug)]
pub struct PugLobby {
    id: LobbyId,
    options: CreateLobbyOpts,
    slot_keys: Vec<String>,
    created_at: DateTime<Utc>,
    state: RwLock<LobbyState>,
    metrics: Arc<MetricsCollector>,
}

impl PugLobby {
    /// Create a lobby whose sole member and leader is `creator`
    ///
    /// Records the lobby in the creator's membership set. Sends nothing; the
    /// caller answers the create request.
    pub fn new(
        id: LobbyId,
        creator: &Arc<ClientHandle>,
        options: CreateLobbyOpts,
        slot_keys: Vec<String>,
        metrics: Arc<MetricsCollector>,
    ) -> Arc<Self> {
        creator.add_lobby(&id);

        Arc::new(Self {
            options,
            slot_keys,
            created_at: current_timestamp(),
            state: RwLock::new(LobbyState {
                roster: vec![creator.clone()],
                leader: Some(creator.steam_id()),
                slots: BTreeMap::new(),
                messages: Vec::new(),
                closed: false,
            }),
            metrics,
            id,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn options(&self) -> CreateLobbyOpts {
        self.options
    }

    pub fn game_mode(&self) -> GameMode {
        self.options.game_mode
    }

    pub fn slot_keys(&self) -> &[String] {
        &self.slot_keys
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Add `client` to the roster
    ///
    /// The joiner gets a private snapshot; the existing members get a
    /// `MemberJoined` broadcast.
    pub fn join(&self, client: &Arc<ClientHandle>) -> Result<()> {
        let mut state = self.write_state()?;

        if state.closed {
            return Err(self.not_found());
        }
        if state.has_user(client.steam_id()) {
            return Err(LobbyError::DuplicateClient {
                lobby_id: self.id.clone(),
                steam_id: client.steam_id(),
            });
        }

        state.roster.push(client.clone());
        client.add_lobby(&self.id);

        let promoted = state.roster.len() == 1;
        if promoted {
            state.leader = Some(client.steam_id());
        }

        info!(
            "User {} joined lobby {} - members: {}, leader: {}",
            client.steam_id(),
            self.id,
            state.roster.len(),
            promoted
        );

        let snapshot = self.build_snapshot(&state);
        let mut report = DeliveryReport::default();
        report.record(client.send(Arc::new(ServerMessage::ok(ServerEvent::JoinLobby(snapshot)))));

        let others = state
            .roster
            .iter()
            .filter(|c| c.connection_id() != client.connection_id());
        let joined = fan_out(
            others,
            ServerMessage::ok(ServerEvent::MemberJoined(MemberJoined {
                lobby_id: self.id.clone(),
                member: client.member(),
            })),
        );
        report.delivered += joined.delivered;
        report.dropped += joined.dropped;
        self.metrics.record_delivery(&report);

        Ok(())
    }

    /// Remove `client` from the roster
    ///
    /// The `MemberLeft` event goes to the whole roster, leaver included,
    /// before the removal. Slots held by the leaver are vacated and, if the
    /// leaver was leader, the next-oldest member takes over.
    pub fn leave(&self, client: &Arc<ClientHandle>) -> Result<LeaveOutcome> {
        let mut state = self.write_state()?;

        let steam_id = client.steam_id();
        let position = state
            .position(client)
            .ok_or_else(|| LobbyError::UnknownClient {
                lobby_id: self.id.clone(),
                steam_id,
            })?;

        let vacated_slots: Vec<String> = state
            .slots
            .iter()
            .filter(|(_, holder)| **holder == steam_id)
            .map(|(slot, _)| slot.clone())
            .collect();

        let new_leader = if state.leader == Some(steam_id) {
            state
                .roster
                .iter()
                .map(|c| c.steam_id())
                .find(|id| *id != steam_id)
        } else {
            state.leader
        };

        let report = fan_out(
            state.roster.iter(),
            ServerMessage::ok(ServerEvent::LeaveLobby(MemberLeft {
                lobby_id: self.id.clone(),
                steam_id,
                new_leader,
                vacated_slots: vacated_slots.clone(),
            })),
        );
        self.metrics.record_delivery(&report);

        let removed = state.roster.remove(position);
        for slot in &vacated_slots {
            state.slots.remove(slot);
        }
        if new_leader != state.leader {
            info!(
                "Lobby {} leadership passed from {} to {:?}",
                self.id, steam_id, new_leader
            );
        }
        state.leader = new_leader;
        removed.remove_lobby(&self.id);

        info!(
            "User {} left lobby {} - remaining: {}, vacated slots: {:?}",
            steam_id,
            self.id,
            state.roster.len(),
            vacated_slots
        );

        Ok(LeaveOutcome {
            remaining: state.roster.len(),
            new_leader,
            vacated_slots,
        })
    }

    /// Make `client` the leader
    ///
    /// Does not check membership; callers only promote current members.
    pub fn promote(&self, client: &ClientHandle) -> Result<()> {
        let mut state = self.write_state()?;
        state.leader = Some(client.steam_id());
        debug!("Lobby {} leader set to {}", self.id, client.steam_id());
        Ok(())
    }

    /// Claim a free slot for `client`; the first claim wins
    pub fn claim_slot(&self, client: &Arc<ClientHandle>, slot: &str) -> Result<()> {
        let mut state = self.write_state()?;

        if !self.slot_keys.iter().any(|key| key == slot) {
            return Err(self.invalid_slot(slot, SlotRejection::NotInVocabulary));
        }
        self.ensure_member(&state, client)?;
        if state.slots.contains_key(slot) {
            return Err(self.invalid_slot(slot, SlotRejection::Occupied));
        }

        state.slots.insert(slot.to_string(), client.steam_id());
        self.metrics.record_slot_claim(self.game_mode());
        debug!("User {} claimed slot {} in lobby {}", client.steam_id(), slot, self.id);

        let report = fan_out(
            state.roster.iter(),
            ServerMessage::ok(ServerEvent::JoinLobbySlot(SlotChange {
                lobby_id: self.id.clone(),
                slot: slot.to_string(),
                steam_id: client.steam_id(),
            })),
        );
        self.metrics.record_delivery(&report);

        Ok(())
    }

    /// Release a slot held by `client`
    pub fn vacate_slot(&self, client: &Arc<ClientHandle>, slot: &str) -> Result<()> {
        let mut state = self.write_state()?;

        if !self.slot_keys.iter().any(|key| key == slot) {
            return Err(self.invalid_slot(slot, SlotRejection::NotInVocabulary));
        }
        self.ensure_member(&state, client)?;
        if state.slots.get(slot) != Some(&client.steam_id()) {
            return Err(self.invalid_slot(slot, SlotRejection::NotHeld));
        }

        state.slots.remove(slot);
        debug!("User {} vacated slot {} in lobby {}", client.steam_id(), slot, self.id);

        let report = fan_out(
            state.roster.iter(),
            ServerMessage::ok(ServerEvent::LeaveLobbySlot(SlotChange {
                lobby_id: self.id.clone(),
                slot: slot.to_string(),
                steam_id: client.steam_id(),
            })),
        );
        self.metrics.record_delivery(&report);

        Ok(())
    }

    /// Append a chat message and broadcast it to every member, sender included
    pub fn post_message(
        &self,
        client: &Arc<ClientHandle>,
        text: impl Into<String>,
    ) -> Result<ChatMessage> {
        let mut state = self.write_state()?;
        self.ensure_member(&state, client)?;

        let record = ChatMessage {
            steam_id: client.steam_id(),
            name: client.name().to_string(),
            message: text.into(),
            created_at: current_timestamp(),
        };
        state.messages.push(record.clone());
        self.metrics.record_chat_message();

        let report = fan_out(
            state.roster.iter(),
            ServerMessage::ok(ServerEvent::UserMessage(record.clone())),
        );
        self.metrics.record_delivery(&report);

        Ok(record)
    }

    /// Deliver `event` to every current member
    pub fn broadcast(&self, event: ServerEvent) -> Result<DeliveryReport> {
        let state = self.read_state()?;
        let report = fan_out(state.roster.iter(), ServerMessage::ok(event));
        self.metrics.record_delivery(&report);
        Ok(report)
    }

    pub fn snapshot(&self) -> Result<LobbySnapshot> {
        let state = self.read_state()?;
        Ok(self.build_snapshot(&state))
    }

    pub fn summary(&self) -> Result<LobbySummary> {
        let state = self.read_state()?;
        Ok(LobbySummary {
            lobby_id: self.id.clone(),
            game_mode: self.game_mode(),
            member_count: state.roster.len(),
            leader: state.leader,
            slots_total: self.slot_keys.len(),
            slots_filled: state.slots.len(),
            created_at: self.created_at,
        })
    }

    pub fn member_count(&self) -> Result<usize> {
        Ok(self.read_state()?.roster.len())
    }

    pub fn leader(&self) -> Result<Option<SteamId>> {
        Ok(self.read_state()?.leader)
    }

    pub fn members(&self) -> Result<Vec<LobbyMember>> {
        Ok(self.read_state()?.roster.iter().map(|c| c.member()).collect())
    }

    /// Whether any connection of `steam_id` is a member
    pub fn contains(&self, steam_id: SteamId) -> Result<bool> {
        Ok(self.read_state()?.has_user(steam_id))
    }

    /// Whether this exact connection is a member
    pub fn has_client(&self, client: &ClientHandle) -> Result<bool> {
        Ok(self.read_state()?.position(client).is_some())
    }

    pub fn phase(&self) -> Result<LobbyPhase> {
        let state = self.read_state()?;
        Ok(if state.closed {
            LobbyPhase::Closed
        } else if state.roster.is_empty() {
            LobbyPhase::Empty
        } else {
            LobbyPhase::Active
        })
    }

    /// Mark the lobby closed if nobody is in it
    ///
    /// Called by the registry while it holds its own write lock, so a join
    /// racing with removal either lands first (and the lobby stays) or sees
    /// the closed flag and fails.
    pub(crate) fn close_if_empty(&self) -> Result<bool> {
        let mut state = self.write_state()?;
        if state.roster.is_empty() {
            state.closed = true;
        }
        Ok(state.closed)
    }

    /// Mark the lobby closed regardless of membership
    pub(crate) fn close(&self) -> Result<()> {
        self.write_state()?.closed = true;
        Ok(())
    }

    fn build_snapshot(&self, state: &LobbyState) -> LobbySnapshot {
        LobbySnapshot {
            lobby_id: self.id.clone(),
            game_mode: self.game_mode(),
            leader: state.leader,
            members: state.roster.iter().map(|c| c.member()).collect(),
            slots: state.slots.clone(),
            slot_keys: self.slot_keys.clone(),
            messages: state.messages.clone(),
        }
    }

    fn ensure_member(&self, state: &LobbyState, client: &ClientHandle) -> Result<()> {
        if state.position(client).is_some() {
            Ok(())
        } else {
            Err(LobbyError::UnknownClient {
                lobby_id: self.id.clone(),
                steam_id: client.steam_id(),
            })
        }
    }

    fn invalid_slot(&self, slot: &str, reason: SlotRejection) -> LobbyError {
        LobbyError::InvalidSlot {
            lobby_id: self.id.clone(),
            slot: slot.to_string(),
            reason,
        }
    }

    fn not_found(&self) -> LobbyError {
        LobbyError::NotFound {
            lobby_id: self.id.clone(),
        }
    }

    fn read_state(&self) -> Result<RwLockReadGuard<'_, LobbyState>> {
        self.state
            .read()
            .map_err(|_| LobbyError::lock_poisoned("lobby state"))
    }

    fn write_state(&self) -> Result<RwLockWriteGuard<'_, LobbyState>> {
        self.state
            .write()
            .map_err(|_| LobbyError::lock_poisoned("lobby state"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::OutboundReceiver;
    use crate::lobby::provider::HIGHLANDER_SLOTS;

    fn test_metrics() -> Arc<MetricsCollector> {
        Arc::new(MetricsCollector::new().unwrap())
    }

    fn test_client(id: u64, name: &str) -> (Arc<ClientHandle>, OutboundReceiver) {
        ClientHandle::new(SteamId::new(id), name, 64)
    }

    fn highlander_lobby(creator: &Arc<ClientHandle>) -> Arc<PugLobby> {
        PugLobby::new(
            "TEST".to_string(),
            creator,
            CreateLobbyOpts {
                game_mode: GameMode::Highlander,
            },
            HIGHLANDER_SLOTS.iter().map(|s| s.to_string()).collect(),
            test_metrics(),
        )
    }

    fn drain(rx: &mut OutboundReceiver) -> Vec<Arc<ServerMessage>> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            out.push(msg);
        }
        out
    }

    #[test]
    fn test_lobby_creation() {
        let (alice, _rx) = test_client(1, "alice");
        let lobby = highlander_lobby(&alice);

        assert_eq!(lobby.member_count().unwrap(), 1);
        assert_eq!(lobby.leader().unwrap(), Some(alice.steam_id()));
        assert_eq!(lobby.phase().unwrap(), LobbyPhase::Active);
        assert_eq!(lobby.slot_keys().len(), 18);
        assert!(alice.is_in_lobby("TEST"));

        let snapshot = lobby.snapshot().unwrap();
        assert!(snapshot.slots.is_empty());
        assert!(snapshot.messages.is_empty());
    }

    #[test]
    fn test_join_keeps_leader_and_sends_snapshot() {
        let (alice, mut rx_a) = test_client(1, "alice");
        let (bob, mut rx_b) = test_client(2, "bob");
        let lobby = highlander_lobby(&alice);

        lobby.join(&bob).unwrap();

        assert_eq!(lobby.leader().unwrap(), Some(alice.steam_id()));
        let members: Vec<_> = lobby.members().unwrap().iter().map(|m| m.steam_id).collect();
        assert_eq!(members, vec![alice.steam_id(), bob.steam_id()]);
        assert!(bob.is_in_lobby("TEST"));

        let to_bob = drain(&mut rx_b);
        assert_eq!(to_bob.len(), 1);
        match &to_bob[0].event {
            ServerEvent::JoinLobby(snapshot) => assert_eq!(snapshot.members.len(), 2),
            other => panic!("unexpected event {:?}", other),
        }

        let to_alice = drain(&mut rx_a);
        assert_eq!(to_alice.len(), 1);
        assert!(matches!(to_alice[0].event, ServerEvent::MemberJoined(_)));
    }

    #[test]
    fn test_duplicate_join_rejected() {
        let (alice, _rx) = test_client(1, "alice");
        let lobby = highlander_lobby(&alice);

        let err = lobby.join(&alice).unwrap_err();
        assert!(matches!(err, LobbyError::DuplicateClient { .. }));
        assert_eq!(lobby.member_count().unwrap(), 1);
    }

    #[test]
    fn test_leave_unknown_client_rejected() {
        let (alice, _rx_a) = test_client(1, "alice");
        let (bob, _rx_b) = test_client(2, "bob");
        let lobby = highlander_lobby(&alice);

        let err = lobby.leave(&bob).unwrap_err();
        assert!(matches!(err, LobbyError::UnknownClient { .. }));
        assert_eq!(lobby.member_count().unwrap(), 1);
    }

    #[test]
    fn test_leader_leave_promotes_next_oldest() {
        let (alice, _rx_a) = test_client(1, "alice");
        let (bob, _rx_b) = test_client(2, "bob");
        let (carol, _rx_c) = test_client(3, "carol");
        let lobby = highlander_lobby(&alice);
        lobby.join(&bob).unwrap();
        lobby.join(&carol).unwrap();

        let outcome = lobby.leave(&alice).unwrap();
        assert_eq!(outcome.remaining, 2);
        assert_eq!(outcome.new_leader, Some(bob.steam_id()));
        assert_eq!(lobby.leader().unwrap(), Some(bob.steam_id()));
        assert!(!alice.is_in_lobby("TEST"));
    }

    #[test]
    fn test_non_leader_leave_keeps_leader() {
        let (alice, _rx_a) = test_client(1, "alice");
        let (bob, _rx_b) = test_client(2, "bob");
        let lobby = highlander_lobby(&alice);
        lobby.join(&bob).unwrap();

        let outcome = lobby.leave(&bob).unwrap();
        assert_eq!(outcome.new_leader, Some(alice.steam_id()));
        assert_eq!(lobby.leader().unwrap(), Some(alice.steam_id()));
    }

    #[test]
    fn test_leave_vacates_slots_and_notifies_leaver() {
        let (alice, mut rx_a) = test_client(1, "alice");
        let (bob, mut rx_b) = test_client(2, "bob");
        let lobby = highlander_lobby(&alice);
        lobby.join(&bob).unwrap();
        lobby.claim_slot(&bob, "medic2").unwrap();
        drain(&mut rx_a);
        drain(&mut rx_b);

        let outcome = lobby.leave(&bob).unwrap();
        assert_eq!(outcome.vacated_slots, vec!["medic2".to_string()]);
        assert!(lobby.snapshot().unwrap().slots.is_empty());

        for rx in [&mut rx_a, &mut rx_b] {
            let msgs = drain(rx);
            assert_eq!(msgs.len(), 1);
            match &msgs[0].event {
                ServerEvent::LeaveLobby(left) => {
                    assert_eq!(left.steam_id, bob.steam_id());
                    assert_eq!(left.vacated_slots, vec!["medic2".to_string()]);
                }
                other => panic!("unexpected event {:?}", other),
            }
        }
    }

    #[test]
    fn test_last_member_leaving_empties_lobby() {
        let (alice, _rx) = test_client(1, "alice");
        let lobby = highlander_lobby(&alice);

        let outcome = lobby.leave(&alice).unwrap();
        assert_eq!(outcome.remaining, 0);
        assert_eq!(outcome.new_leader, None);
        assert_eq!(lobby.phase().unwrap(), LobbyPhase::Empty);

        assert!(lobby.close_if_empty().unwrap());
        assert_eq!(lobby.phase().unwrap(), LobbyPhase::Closed);

        let (bob, _rx_b) = test_client(2, "bob");
        assert!(matches!(lobby.join(&bob), Err(LobbyError::NotFound { .. })));
    }

    #[test]
    fn test_rejoin_of_empty_lobby_promotes_joiner() {
        let (alice, _rx_a) = test_client(1, "alice");
        let (bob, _rx_b) = test_client(2, "bob");
        let lobby = highlander_lobby(&alice);
        lobby.leave(&alice).unwrap();

        lobby.join(&bob).unwrap();
        assert_eq!(lobby.leader().unwrap(), Some(bob.steam_id()));
    }

    #[test]
    fn test_promote() {
        let (alice, _rx_a) = test_client(1, "alice");
        let (bob, _rx_b) = test_client(2, "bob");
        let lobby = highlander_lobby(&alice);
        lobby.join(&bob).unwrap();

        lobby.promote(&bob).unwrap();
        assert_eq!(lobby.leader().unwrap(), Some(bob.steam_id()));
    }

    #[test]
    fn test_slot_exclusivity() {
        let (alice, _rx_a) = test_client(1, "alice");
        let (bob, _rx_b) = test_client(2, "bob");
        let lobby = highlander_lobby(&alice);
        lobby.join(&bob).unwrap();

        lobby.claim_slot(&alice, "scout1").unwrap();
        let err = lobby.claim_slot(&bob, "scout1").unwrap_err();
        assert_eq!(
            err,
            LobbyError::InvalidSlot {
                lobby_id: "TEST".to_string(),
                slot: "scout1".to_string(),
                reason: SlotRejection::Occupied,
            }
        );

        let snapshot = lobby.snapshot().unwrap();
        assert_eq!(snapshot.slots.get("scout1"), Some(&alice.steam_id()));
    }

    #[test]
    fn test_slot_outside_vocabulary_rejected() {
        let (alice, _rx) = test_client(1, "alice");
        let lobby = highlander_lobby(&alice);

        let err = lobby.claim_slot(&alice, "pocket1").unwrap_err();
        assert!(matches!(
            err,
            LobbyError::InvalidSlot {
                reason: SlotRejection::NotInVocabulary,
                ..
            }
        ));
    }

    #[test]
    fn test_non_member_cannot_claim() {
        let (alice, _rx_a) = test_client(1, "alice");
        let (bob, _rx_b) = test_client(2, "bob");
        let lobby = highlander_lobby(&alice);

        let err = lobby.claim_slot(&bob, "spy2").unwrap_err();
        assert!(matches!(err, LobbyError::UnknownClient { .. }));
    }

    #[test]
    fn test_vacate_slot() {
        let (alice, _rx_a) = test_client(1, "alice");
        let (bob, _rx_b) = test_client(2, "bob");
        let lobby = highlander_lobby(&alice);
        lobby.join(&bob).unwrap();
        lobby.claim_slot(&alice, "demo1").unwrap();

        let err = lobby.vacate_slot(&bob, "demo1").unwrap_err();
        assert!(matches!(
            err,
            LobbyError::InvalidSlot {
                reason: SlotRejection::NotHeld,
                ..
            }
        ));

        lobby.vacate_slot(&alice, "demo1").unwrap();
        lobby.claim_slot(&bob, "demo1").unwrap();
        assert_eq!(
            lobby.snapshot().unwrap().slots.get("demo1"),
            Some(&bob.steam_id())
        );
    }

    #[test]
    fn test_post_message_appends_and_broadcasts() {
        let (alice, mut rx_a) = test_client(1, "alice");
        let (bob, mut rx_b) = test_client(2, "bob");
        let lobby = highlander_lobby(&alice);
        lobby.join(&bob).unwrap();
        drain(&mut rx_a);
        drain(&mut rx_b);

        let first = lobby.post_message(&alice, "gl hf").unwrap();
        let second = lobby.post_message(&bob, "you too").unwrap();
        assert_eq!(first.steam_id, alice.steam_id());
        assert_eq!(first.message, "gl hf");

        let transcript = lobby.snapshot().unwrap().messages;
        assert_eq!(transcript, vec![first, second]);

        for rx in [&mut rx_a, &mut rx_b] {
            let texts: Vec<_> = drain(rx)
                .iter()
                .filter_map(|m| match &m.event {
                    ServerEvent::UserMessage(chat) => Some(chat.message.clone()),
                    _ => None,
                })
                .collect();
            assert_eq!(texts, vec!["gl hf".to_string(), "you too".to_string()]);
        }
    }

    #[test]
    fn test_non_member_cannot_post() {
        let (alice, _rx_a) = test_client(1, "alice");
        let (mallory, _rx_m) = test_client(9, "mallory");
        let lobby = highlander_lobby(&alice);

        assert!(matches!(
            lobby.post_message(&mallory, "hi"),
            Err(LobbyError::UnknownClient { .. })
        ));
        assert!(lobby.snapshot().unwrap().messages.is_empty());
    }

    #[test]
    fn test_broadcast_survives_disconnected_member() {
        let (alice, rx_a) = test_client(1, "alice");
        let (bob, mut rx_b) = test_client(2, "bob");
        let lobby = highlander_lobby(&alice);
        lobby.join(&bob).unwrap();
        drain(&mut rx_b);
        drop(rx_a);

        let record = lobby.post_message(&bob, "anyone?").unwrap();
        assert_eq!(record.message, "anyone?");
        assert_eq!(drain(&mut rx_b).len(), 1);
    }

    #[test]
    fn test_broadcast_reports_deliveries() {
        let (alice, mut rx_a) = test_client(1, "alice");
        let (bob, rx_b) = test_client(2, "bob");
        let (carol, mut rx_c) = test_client(3, "carol");
        let (_outsider, mut rx_out) = test_client(4, "dave");
        let lobby = highlander_lobby(&alice);
        lobby.join(&bob).unwrap();
        lobby.join(&carol).unwrap();
        drain(&mut rx_a);
        drain(&mut rx_c);
        drop(rx_b);

        let report = lobby
            .broadcast(ServerEvent::MemberJoined(MemberJoined {
                lobby_id: "TEST".to_string(),
                member: carol.member(),
            }))
            .unwrap();

        assert_eq!(report.delivered, 2);
        assert_eq!(report.dropped, 1);
        assert_eq!(report.total(), 3);
        for rx in [&mut rx_a, &mut rx_c] {
            let received = drain(rx);
            assert_eq!(received.len(), 1);
            assert_eq!(received[0].event.msg_type(), "member_joined");
        }
        assert!(drain(&mut rx_out).is_empty());
    }

    #[test]
    fn test_second_connection_of_member_is_not_a_member() {
        let (tab1, _rx1) = test_client(7, "alice");
        let (tab2, _rx2) = test_client(7, "alice");
        let lobby = highlander_lobby(&tab1);

        assert!(matches!(
            lobby.leave(&tab2),
            Err(LobbyError::UnknownClient { .. })
        ));
        assert!(matches!(
            lobby.claim_slot(&tab2, "medic1"),
            Err(LobbyError::UnknownClient { .. })
        ));
        assert!(matches!(
            lobby.post_message(&tab2, "hi"),
            Err(LobbyError::UnknownClient { .. })
        ));
        assert!(matches!(
            lobby.join(&tab2),
            Err(LobbyError::DuplicateClient { .. })
        ));

        assert_eq!(lobby.member_count().unwrap(), 1);
        assert!(lobby.has_client(&tab1).unwrap());
        assert!(!lobby.has_client(&tab2).unwrap());
        assert!(tab1.is_in_lobby("TEST"));
        assert!(!tab2.is_in_lobby("TEST"));

        lobby.leave(&tab1).unwrap();
        assert!(!tab1.is_in_lobby("TEST"));
        assert_eq!(lobby.phase().unwrap(), LobbyPhase::Empty);
    }

    #[test]
    fn test_summary_hides_roster() {
        let (alice, _rx) = test_client(1, "alice");
        let lobby = highlander_lobby(&alice);
        lobby.claim_slot(&alice, "sniper1").unwrap();

        let summary = lobby.summary().unwrap();
        assert_eq!(summary.member_count, 1);
        assert_eq!(summary.slots_total, 18);
        assert_eq!(summary.slots_filled, 1);
        assert_eq!(summary.leader, Some(alice.steam_id()));
    }
}
