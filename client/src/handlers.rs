//! Adapters from inbound events to state-machine transitions.
//!
//! Each factory returns the closure a subscription runs per delivery. The
//! closure holds the state lock only for the pure transition, then publishes
//! any follow-up event and decides how the delivery is settled.

use std::sync::Arc;

use futures::future::BoxFuture;
use peril_pubsub::{AckType, Channel, publish};
use peril_shared::gamelogic::{apply_pause, handle_move, handle_war};
use peril_shared::routing::{
    EXCHANGE_PERIL_TOPIC, GAME_LOG_SLUG, WAR_RECOGNITIONS_PREFIX, player_key,
};
use peril_shared::{
    ArmyMove, Encoding, GameLog, GameState, MoveOutcome, PlayingState, RecognitionOfWar, WarOutcome,
};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

pub type SharedState = Arc<Mutex<GameState>>;

pub fn handler_pause(
    state: SharedState,
) -> impl Fn(PlayingState) -> BoxFuture<'static, AckType> + Send + Sync + 'static {
    move |signal: PlayingState| -> BoxFuture<'static, AckType> {
        let state = Arc::clone(&state);
        Box::pin(async move {
            let mut state = state.lock().await;
            apply_pause(&mut state, signal);
            info!(player = %state.username(), paused = signal.is_paused, "pause signal applied");
            AckType::Ack
        })
    }
}

pub fn handler_move(
    state: SharedState,
    channel: Channel,
) -> impl Fn(ArmyMove) -> BoxFuture<'static, AckType> + Send + Sync + 'static {
    move |army_move: ArmyMove| -> BoxFuture<'static, AckType> {
        let state = Arc::clone(&state);
        let channel = channel.clone();
        Box::pin(async move {
            let (outcome, username, defender) = {
                let mut state = state.lock().await;
                let outcome = handle_move(&mut state, &army_move);
                (outcome, state.username().to_string(), state.snapshot())
            };
            debug!(
                player = %username,
                mover = %army_move.player.username,
                territory = %army_move.territory.name,
                outcome = ?outcome,
                "army move handled"
            );

            match outcome {
                MoveOutcome::Safe | MoveOutcome::SamePlayer => AckType::Ack,
                MoveOutcome::MakeWar => {
                    let recognition = RecognitionOfWar {
                        attacker: army_move.player,
                        defender,
                        territory: army_move.territory.name,
                    };
                    let key = player_key(WAR_RECOGNITIONS_PREFIX, &username);
                    let published =
                        publish(&channel, EXCHANGE_PERIL_TOPIC, &key, &recognition, Encoding::Json)
                            .await;
                    match published {
                        Ok(()) => {
                            info!(
                                attacker = %recognition.attacker.username,
                                defender = %username,
                                territory = %recognition.territory,
                                "war declared"
                            );
                            AckType::Ack
                        }
                        Err(e) => {
                            warn!(player = %username, error = %e, "failed to publish war recognition");
                            AckType::NackRequeue
                        }
                    }
                }
            }
        })
    }
}

pub fn handler_war(
    state: SharedState,
    channel: Channel,
) -> impl Fn(RecognitionOfWar) -> BoxFuture<'static, AckType> + Send + Sync + 'static {
    move |war: RecognitionOfWar| -> BoxFuture<'static, AckType> {
        let state = Arc::clone(&state);
        let channel = channel.clone();
        Box::pin(async move {
            let (outcome, username) = {
                let mut state = state.lock().await;
                (handle_war(&mut state, &war), state.username().to_string())
            };

            let message = match outcome {
                WarOutcome::NotInvolved => return AckType::NackRequeue,
                WarOutcome::NoUnits => return AckType::NackDiscard,
                WarOutcome::YouWon { winner, loser } | WarOutcome::OpponentWon { winner, loser } => {
                    format!("{winner} won a war against {loser}")
                }
                WarOutcome::Draw { attacker, defender } => {
                    format!("A war between {attacker} and {defender} resulted in a draw")
                }
            };
            info!(player = %username, "{message}");

            let log = GameLog::new(username.as_str(), message);
            let key = player_key(GAME_LOG_SLUG, &username);
            match publish(&channel, EXCHANGE_PERIL_TOPIC, &key, &log, Encoding::Binary).await {
                Ok(()) => AckType::Ack,
                Err(e) => {
                    warn!(player = %username, error = %e, "failed to publish war log");
                    AckType::NackRequeue
                }
            }
        })
    }
}

/// Consumer for the shared game log queue.
pub fn handler_log() -> impl Fn(GameLog) -> BoxFuture<'static, AckType> + Send + Sync + 'static {
    |log: GameLog| -> BoxFuture<'static, AckType> {
        Box::pin(async move {
            info!(
                username = %log.username,
                at = %log.timestamp.to_rfc3339(),
                "{}",
                log.message
            );
            AckType::Ack
        })
    }
}
