pub mod codec;
pub mod gamelogic;
pub mod model;
pub mod routing;

pub use codec::{CodecError, Encoding};
pub use gamelogic::{GameError, GameState, GameView, MoveOutcome, WarOutcome};
pub use model::*;
