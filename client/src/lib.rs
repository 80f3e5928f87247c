//! Player sessions and the game server role, built on the delivery layer.

pub mod config;
pub mod console;
pub mod error;
pub mod handlers;
pub mod server;
pub mod session;

pub use console::Console;
pub use error::SessionError;
pub use handlers::{SharedState, handler_log, handler_move, handler_pause, handler_war};
pub use server::{GameServer, declare_game_exchanges};
pub use session::Session;
