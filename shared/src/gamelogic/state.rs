use std::collections::HashMap;

use crate::model::Player;

/// One player's view of the game.
///
/// `others` holds the last snapshot received for every other player seen so
/// far. It is only ever updated from inbound events and is never
/// authoritative.
#[derive(Debug, Clone)]
pub struct GameState {
    pub(crate) player: Player,
    pub(crate) others: HashMap<String, Player>,
    pub(crate) paused: bool,
}

/// Read-only copy of a `GameState` for status display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameView {
    pub player: Player,
    pub others: Vec<Player>,
    pub paused: bool,
}

impl GameState {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            player: Player::new(username),
            others: HashMap::new(),
            paused: true,
        }
    }

    pub fn username(&self) -> &str {
        &self.player.username
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn player(&self) -> &Player {
        &self.player
    }

    /// Deep copy of the local player, safe to embed in outbound events.
    pub fn snapshot(&self) -> Player {
        self.player.clone()
    }

    pub fn known_player(&self, username: &str) -> Option<&Player> {
        self.others.get(username)
    }

    /// Username of whoever holds `territory` as far as this player knows.
    pub fn owner_of(&self, territory: &str) -> Option<&str> {
        if self.player.owns(territory) {
            return Some(self.username());
        }
        let mut owners: Vec<&Player> = self
            .others
            .values()
            .filter(|other| other.owns(territory))
            .collect();
        owners.sort_by(|a, b| a.username.cmp(&b.username));
        owners.first().map(|owner| owner.username.as_str())
    }

    pub fn view(&self) -> GameView {
        let mut others: Vec<Player> = self.others.values().cloned().collect();
        others.sort_by(|a, b| a.username.cmp(&b.username));
        GameView {
            player: self.snapshot(),
            others,
            paused: self.paused,
        }
    }

    pub(crate) fn remember(&mut self, player: Player) {
        if player.username != self.player.username {
            self.others.insert(player.username.clone(), player);
        }
    }
}
