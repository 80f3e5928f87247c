use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Strength tier of a single army unit. Ordering is combat strength.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitRank {
    Infantry,
    Cavalry,
    Artillery,
}

impl UnitRank {
    pub const ALL: [UnitRank; 3] = [UnitRank::Infantry, UnitRank::Cavalry, UnitRank::Artillery];

    pub const fn as_str(self) -> &'static str {
        match self {
            UnitRank::Infantry => "infantry",
            UnitRank::Cavalry => "cavalry",
            UnitRank::Artillery => "artillery",
        }
    }

    /// Case-insensitive lookup by rank name.
    pub fn from_name(name: &str) -> Option<Self> {
        let normalized = name.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|rank| rank.as_str() == normalized)
    }
}

impl fmt::Display for UnitRank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named location and the stack of units standing on it.
///
/// `units` is kept sorted strongest-first so two stacks holding the same
/// multiset compare and encode identically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Territory {
    pub name: String,
    pub units: Vec<UnitRank>,
}

impl Territory {
    pub fn new(name: impl Into<String>, units: impl IntoIterator<Item = UnitRank>) -> Self {
        let mut territory = Self {
            name: name.into(),
            units: units.into_iter().collect(),
        };
        territory.normalize();
        territory
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn count(&self, rank: UnitRank) -> usize {
        self.units.iter().filter(|unit| **unit == rank).count()
    }

    pub fn add(&mut self, rank: UnitRank) {
        self.units.push(rank);
        self.normalize();
    }

    pub fn merge(&mut self, units: &[UnitRank]) {
        self.units.extend_from_slice(units);
        self.normalize();
    }

    /// True when every unit in `units` (counted with multiplicity) is present.
    pub fn contains_all(&self, units: &[UnitRank]) -> bool {
        UnitRank::ALL.into_iter().all(|rank| {
            let wanted = units.iter().filter(|unit| **unit == rank).count();
            wanted <= self.count(rank)
        })
    }

    /// Removes `units` from the stack. Leaves the stack untouched and returns
    /// false if any of them is missing.
    pub fn remove_units(&mut self, units: &[UnitRank]) -> bool {
        if !self.contains_all(units) {
            return false;
        }
        for rank in units {
            if let Some(idx) = self.units.iter().position(|unit| unit == rank) {
                self.units.remove(idx);
            }
        }
        true
    }

    fn normalize(&mut self) {
        self.units.sort_unstable_by(|a, b| b.cmp(a));
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub username: String,
    pub locations: Vec<Territory>,
}

impl Player {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            locations: Vec::new(),
        }
    }

    pub fn owns(&self, territory: &str) -> bool {
        self.territory(territory).is_some()
    }

    pub fn territory(&self, name: &str) -> Option<&Territory> {
        self.locations.iter().find(|t| t.name == name)
    }

    pub fn territory_mut(&mut self, name: &str) -> Option<&mut Territory> {
        self.locations.iter_mut().find(|t| t.name == name)
    }

    pub fn remove_territory(&mut self, name: &str) -> Option<Territory> {
        let idx = self.locations.iter().position(|t| t.name == name)?;
        Some(self.locations.remove(idx))
    }

    /// Adds `units` to the named territory, claiming it if not yet held.
    pub fn reinforce(&mut self, name: &str, units: &[UnitRank]) {
        match self.territory_mut(name) {
            Some(territory) => territory.merge(units),
            None => self
                .locations
                .push(Territory::new(name, units.iter().copied())),
        }
    }

    /// Replaces the stack on `name`, dropping the territory when `units` is empty.
    pub fn set_units(&mut self, name: &str, units: Vec<UnitRank>) {
        if units.is_empty() {
            self.remove_territory(name);
            return;
        }
        let replacement = Territory::new(name, units);
        match self.territory_mut(name) {
            Some(territory) => *territory = replacement,
            None => self.locations.push(replacement),
        }
    }

    pub fn unit_count(&self) -> usize {
        self.locations.iter().map(|t| t.units.len()).sum()
    }
}

/// A stack of units leaving one of `player`'s territories for `territory.name`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArmyMove {
    pub player: Player,
    pub territory: Territory,
}

/// Both sides of a conflict, frozen at the moment war was declared.
///
/// `territory` is the destination of the move that started the war; the
/// battle is fought there even when the two players share other territories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecognitionOfWar {
    pub attacker: Player,
    pub defender: Player,
    pub territory: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameLog {
    pub username: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl GameLog {
    pub fn new(username: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayingState {
    pub is_paused: bool,
}
