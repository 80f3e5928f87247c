//! A player's connection to the game.
//!
//! `Session::start` subscribes the player to pause signals, everyone's army
//! moves, and the shared war queue, then exposes the local commands.

use std::sync::Arc;

use peril_pubsub::{Channel, Connection, Durability, publish, subscribe};
use peril_shared::gamelogic::{apply_move_command, apply_spawn, parse_units};
use peril_shared::routing::{
    ARMY_MOVES_PREFIX, EXCHANGE_PERIL_DIRECT, EXCHANGE_PERIL_TOPIC, GAME_LOG_SLUG, PAUSE_KEY,
    WAR_RECOGNITIONS_PREFIX, any_player_pattern, player_key,
};
use peril_shared::{ArmyMove, Encoding, GameLog, GameState, GameView};
use rand::seq::IndexedRandom;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::spam_max;
use crate::error::SessionError;
use crate::handlers::{SharedState, handler_move, handler_pause, handler_war};
use crate::server::declare_game_exchanges;

const MALICIOUS_LOGS: &[&str] = &[
    "Never interrupt your enemy when he is making a mistake.",
    "The hardest thing of all for a soldier is to retreat.",
    "A soldier will fight long and hard for a bit of colored ribbon.",
    "It is well that war is so terrible, otherwise we should grow too fond of it.",
    "The art of war is simple enough. Find out where your enemy is. Get at him as soon as you can.",
    "All warfare is based on deception.",
];

pub struct Session {
    username: String,
    state: SharedState,
    connection: Connection,
    channel: Channel,
}

fn validate_username(username: &str) -> Result<(), SessionError> {
    let valid = !username.is_empty()
        && username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(SessionError::InvalidUsername(username.to_string()))
    }
}

impl Session {
    /// Joins the game as `username` over `connection`. The session owns the
    /// connection from here on; it is closed again if joining fails.
    pub async fn start(connection: Connection, username: &str) -> Result<Self, SessionError> {
        match Self::attach(&connection, username).await {
            Ok((state, channel)) => {
                info!(player = username, "player joined");
                Ok(Self {
                    username: username.to_string(),
                    state,
                    connection,
                    channel,
                })
            }
            Err(e) => {
                connection.close().await;
                Err(e)
            }
        }
    }

    async fn attach(
        connection: &Connection,
        username: &str,
    ) -> Result<(SharedState, Channel), SessionError> {
        validate_username(username)?;
        let channel = connection
            .create_channel()
            .await
            .map_err(SessionError::Topology)?;
        declare_game_exchanges(&channel)
            .await
            .map_err(SessionError::Topology)?;
        let state: SharedState = Arc::new(Mutex::new(GameState::new(username)));

        subscribe(
            connection,
            EXCHANGE_PERIL_DIRECT,
            &player_key(PAUSE_KEY, username),
            PAUSE_KEY,
            Durability::Transient,
            Encoding::Json,
            handler_pause(Arc::clone(&state)),
        )
        .await
        .map_err(SessionError::Topology)?;
        subscribe(
            connection,
            EXCHANGE_PERIL_TOPIC,
            &player_key(ARMY_MOVES_PREFIX, username),
            &any_player_pattern(ARMY_MOVES_PREFIX),
            Durability::Transient,
            Encoding::Json,
            handler_move(Arc::clone(&state), channel.clone()),
        )
        .await
        .map_err(SessionError::Topology)?;
        subscribe(
            connection,
            EXCHANGE_PERIL_TOPIC,
            WAR_RECOGNITIONS_PREFIX,
            &any_player_pattern(WAR_RECOGNITIONS_PREFIX),
            Durability::Durable,
            Encoding::Json,
            handler_war(Arc::clone(&state), channel.clone()),
        )
        .await
        .map_err(SessionError::Topology)?;

        Ok((state, channel))
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub async fn spawn(&self, territory: &str, rank: &str) -> Result<(), SessionError> {
        let mut state = self.state.lock().await;
        apply_spawn(&mut state, territory, rank)?;
        info!(player = %self.username, territory, rank, "unit spawned");
        Ok(())
    }

    /// Moves units locally, then announces the move and waits for the broker
    /// to confirm it.
    pub async fn move_units<S: AsRef<str>>(
        &self,
        from: &str,
        to: &str,
        units: &[S],
    ) -> Result<ArmyMove, SessionError> {
        let army_move = {
            let mut state = self.state.lock().await;
            if state.is_paused() {
                return Err(SessionError::Paused);
            }
            let units = parse_units(units)?;
            apply_move_command(&mut state, from, to, &units)?
        };

        let key = player_key(ARMY_MOVES_PREFIX, &self.username);
        publish(&self.channel, EXCHANGE_PERIL_TOPIC, &key, &army_move, Encoding::Json)
            .await
            .map_err(SessionError::Publish)?;
        info!(
            player = %self.username,
            from,
            to,
            units = army_move.territory.units.len(),
            "army moved"
        );
        Ok(army_move)
    }

    pub async fn status(&self) -> GameView {
        self.state.lock().await.view()
    }

    /// Floods the game log with `count` random lines, capped by `PERIL_SPAM_MAX`.
    /// Publishes are not awaited; each failure is logged by its own task.
    /// Returns how many were sent.
    pub fn spam(&self, count: usize) -> usize {
        let count = count.min(spam_max());
        let key = player_key(GAME_LOG_SLUG, &self.username);
        let lines: Vec<&'static str> = {
            let mut rng = rand::rng();
            (0..count)
                .filter_map(|_| MALICIOUS_LOGS.choose(&mut rng).copied())
                .collect()
        };
        for line in &lines {
            let channel = self.channel.clone();
            let key = key.clone();
            let log = GameLog::new(self.username.as_str(), *line);
            tokio::spawn(async move {
                if let Err(e) =
                    publish(&channel, EXCHANGE_PERIL_TOPIC, &key, &log, Encoding::Binary).await
                {
                    warn!(key = %key, error = %e, "spam publish failed");
                }
            });
        }
        debug!(player = %self.username, count = lines.len(), "spam scheduled");
        lines.len()
    }

    pub async fn close(&self) {
        self.connection.close().await;
        info!(player = %self.username, "player left");
    }
}
