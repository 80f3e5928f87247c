//! The game server role: owns the pause switch and reads the game log.

use peril_pubsub::{Channel, Connection, Durability, ExchangeKind, PubSubError, publish, subscribe};
use peril_shared::routing::{
    EXCHANGE_PERIL_DIRECT, EXCHANGE_PERIL_TOPIC, GAME_LOG_SLUG, PAUSE_KEY, any_player_pattern,
};
use peril_shared::{Encoding, PlayingState};
use tracing::info;

use crate::handlers::handler_log;

/// Declares the two game exchanges. Safe to call from every participant.
pub async fn declare_game_exchanges(channel: &Channel) -> Result<(), PubSubError> {
    channel
        .exchange_declare(EXCHANGE_PERIL_DIRECT, ExchangeKind::Direct)
        .await?;
    channel
        .exchange_declare(EXCHANGE_PERIL_TOPIC, ExchangeKind::Topic)
        .await
}

pub struct GameServer {
    connection: Connection,
    channel: Channel,
}

impl GameServer {
    /// Declares the game topology on `connection` and starts consuming the
    /// shared game log queue.
    pub async fn start(connection: Connection) -> Result<Self, PubSubError> {
        let channel = connection.create_channel().await?;
        declare_game_exchanges(&channel).await?;
        subscribe(
            &connection,
            EXCHANGE_PERIL_TOPIC,
            GAME_LOG_SLUG,
            &any_player_pattern(GAME_LOG_SLUG),
            Durability::Durable,
            Encoding::Binary,
            handler_log(),
        )
        .await?;
        info!("game server started");
        Ok(Self { connection, channel })
    }

    pub async fn pause(&self) -> Result<(), PubSubError> {
        self.broadcast(PlayingState { is_paused: true }).await
    }

    pub async fn resume(&self) -> Result<(), PubSubError> {
        self.broadcast(PlayingState { is_paused: false }).await
    }

    async fn broadcast(&self, signal: PlayingState) -> Result<(), PubSubError> {
        publish(&self.channel, EXCHANGE_PERIL_DIRECT, PAUSE_KEY, &signal, Encoding::Json).await?;
        info!(paused = signal.is_paused, "pause signal sent");
        Ok(())
    }

    pub async fn close(&self) {
        self.connection.close().await;
        info!("game server stopped");
    }
}
