//! Slot vocabulary providers
//!
//! Each game mode has a fixed, ordered list of slot names. Two teams are
//! always present; the digit suffix names the team.

use crate::error::{LobbyError, Result};
use crate::types::GameMode;
use std::collections::HashSet;

/// Sixes: per team two scouts, pocket and roamer soldiers, demo and medic
pub const SIXES_SLOTS: &[&str] = &[
    "scout1", "flank1", "pocket1", "roamer1", "demo1", "medic1", "scout2", "flank2", "pocket2",
    "roamer2", "demo2", "medic2",
];

/// Highlander: one of each class per team
pub const HIGHLANDER_SLOTS: &[&str] = &[
    "scout1", "soldier1", "pyro1", "demo1", "heavy1", "engineer1", "medic1", "sniper1", "spy1",
    "scout2", "soldier2", "pyro2", "demo2", "heavy2", "engineer2", "medic2", "sniper2", "spy2",
];

/// Ultiduo: soldier and medic per team
pub const ULTIDUO_SLOTS: &[&str] = &["soldier1", "medic1", "soldier2", "medic2"];

/// Trait for resolving a game mode to its slot vocabulary
pub trait SlotProvider: Send + Sync {
    /// Ordered slot names for `game_mode`, or `None` if the mode is not served
    fn slot_keys(&self, game_mode: GameMode) -> Option<Vec<String>>;

    /// Game modes this provider can create lobbies for
    fn available_game_modes(&self) -> Vec<GameMode>;
}

/// Static slot provider with the built-in vocabularies
#[derive(Debug, Clone)]
pub struct StaticSlotProvider {
    sixes: Vec<String>,
    highlander: Vec<String>,
    ultiduo: Vec<String>,
}

impl StaticSlotProvider {
    pub fn new() -> Self {
        Self {
            sixes: to_owned(SIXES_SLOTS),
            highlander: to_owned(HIGHLANDER_SLOTS),
            ultiduo: to_owned(ULTIDUO_SLOTS),
        }
    }

    /// Create with custom vocabularies
    pub fn with_vocabularies(
        sixes: Vec<String>,
        highlander: Vec<String>,
        ultiduo: Vec<String>,
    ) -> Result<Self> {
        validate_vocabulary(GameMode::Sixes, &sixes)?;
        validate_vocabulary(GameMode::Highlander, &highlander)?;
        validate_vocabulary(GameMode::Ultiduo, &ultiduo)?;

        Ok(Self {
            sixes,
            highlander,
            ultiduo,
        })
    }
}

impl Default for StaticSlotProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl SlotProvider for StaticSlotProvider {
    fn slot_keys(&self, game_mode: GameMode) -> Option<Vec<String>> {
        match game_mode {
            GameMode::Sixes => Some(self.sixes.clone()),
            GameMode::Highlander => Some(self.highlander.clone()),
            GameMode::Ultiduo => Some(self.ultiduo.clone()),
            GameMode::Unknown => None,
        }
    }

    fn available_game_modes(&self) -> Vec<GameMode> {
        vec![GameMode::Sixes, GameMode::Highlander, GameMode::Ultiduo]
    }
}

/// A vocabulary must be non-empty with unique, non-blank names
pub fn validate_vocabulary(game_mode: GameMode, slots: &[String]) -> Result<()> {
    if slots.is_empty() {
        return Err(LobbyError::Configuration {
            message: format!("Slot vocabulary for {} cannot be empty", game_mode),
        });
    }

    let mut seen = HashSet::new();
    for slot in slots {
        if slot.trim().is_empty() {
            return Err(LobbyError::Configuration {
                message: format!("Slot vocabulary for {} contains a blank name", game_mode),
            });
        }
        if !seen.insert(slot.as_str()) {
            return Err(LobbyError::Configuration {
                message: format!("Duplicate slot '{}' in {} vocabulary", slot, game_mode),
            });
        }
    }

    Ok(())
}

fn to_owned(slots: &[&str]) -> Vec<String> {
    slots.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_vocabulary_sizes() {
        let provider = StaticSlotProvider::new();
        assert_eq!(provider.slot_keys(GameMode::Sixes).unwrap().len(), 12);
        assert_eq!(provider.slot_keys(GameMode::Highlander).unwrap().len(), 18);
        assert_eq!(provider.slot_keys(GameMode::Ultiduo).unwrap().len(), 4);
        assert!(provider.slot_keys(GameMode::Unknown).is_none());
    }

    #[test]
    fn test_builtin_vocabularies_are_valid() {
        let provider = StaticSlotProvider::new();
        for mode in provider.available_game_modes() {
            let slots = provider.slot_keys(mode).unwrap();
            assert!(validate_vocabulary(mode, &slots).is_ok(), "{} invalid", mode);
        }
    }

    #[test]
    fn test_highlander_has_scout_for_each_team() {
        let slots = StaticSlotProvider::new()
            .slot_keys(GameMode::Highlander)
            .unwrap();
        assert!(slots.contains(&"scout1".to_string()));
        assert!(slots.contains(&"scout2".to_string()));
    }

    #[test]
    fn test_custom_vocabularies_are_validated() {
        let ok = StaticSlotProvider::with_vocabularies(
            vec!["a".into()],
            vec!["b".into()],
            vec!["c".into()],
        );
        assert!(ok.is_ok());

        let empty = StaticSlotProvider::with_vocabularies(vec![], vec!["b".into()], vec!["c".into()]);
        assert!(empty.is_err());

        let dup = StaticSlotProvider::with_vocabularies(
            vec!["a".into(), "a".into()],
            vec!["b".into()],
            vec!["c".into()],
        );
        assert!(matches!(dup, Err(LobbyError::Configuration { .. })));
    }
}
