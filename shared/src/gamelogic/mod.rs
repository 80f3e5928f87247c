//! Deterministic per-player game state machine.
//!
//! Every transition is a plain function over `&mut GameState`; none of them
//! touch the network or the clock, so callers decide what to publish and how
//! to acknowledge the event that triggered them.

pub mod map;
pub mod movement;
pub mod pause;
pub mod spawn;
pub mod state;
pub mod war;

use std::fmt;

pub use movement::{MoveOutcome, apply_move_command, handle_move, parse_units};
pub use pause::apply_pause;
pub use spawn::apply_spawn;
pub use state::{GameState, GameView};
pub use war::{WarOutcome, handle_war};

/// A local command that failed validation. State is unchanged when returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameError {
    InvalidSpawn(String),
    InvalidMove(String),
}

impl fmt::Display for GameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameError::InvalidSpawn(reason) => write!(f, "invalid spawn: {reason}"),
            GameError::InvalidMove(reason) => write!(f, "invalid move: {reason}"),
        }
    }
}

impl std::error::Error for GameError {}
