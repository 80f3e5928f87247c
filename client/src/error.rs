use std::fmt;

use peril_pubsub::PubSubError;
use peril_shared::GameError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Usernames become routing-key words, so they must be a single word.
    InvalidUsername(String),
    /// Queues or exchanges for the session could not be set up.
    Topology(PubSubError),
    /// The command was rejected by the game rules.
    Game(GameError),
    /// The command was valid but its event could not be published.
    Publish(PubSubError),
    /// Armies cannot move while the game is paused.
    Paused,
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::InvalidUsername(name) => write!(f, "invalid username '{name}'"),
            SessionError::Topology(e) => write!(f, "session setup failed: {e}"),
            SessionError::Game(e) => write!(f, "{e}"),
            SessionError::Publish(e) => write!(f, "{e}"),
            SessionError::Paused => write!(f, "the game is paused"),
        }
    }
}

impl std::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SessionError::Topology(e) | SessionError::Publish(e) => Some(e),
            SessionError::Game(e) => Some(e),
            SessionError::InvalidUsername(_) | SessionError::Paused => None,
        }
    }
}

impl From<GameError> for SessionError {
    fn from(e: GameError) -> Self {
        SessionError::Game(e)
    }
}
