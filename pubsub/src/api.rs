use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use peril_shared::{CodecError, Encoding};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, error, warn};

use crate::config::{DEAD_LETTER_EXCHANGE, DEAD_LETTER_QUEUE, prefetch_count};
use crate::error::PubSubError;
use crate::transport::{
    Channel, Connection, DeadLetter, Delivery, Durability, ExchangeKind, QueueInfo, QueueOptions,
};

/// Settlement decision a subscription handler returns for each delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckType {
    Ack,
    /// Reject permanently; the message is dead-lettered.
    NackDiscard,
    /// Reject and redeliver at the head of the queue.
    NackRequeue,
}

async fn declare_dead_letter_topology(channel: &Channel) -> Result<(), PubSubError> {
    channel
        .exchange_declare(DEAD_LETTER_EXCHANGE, ExchangeKind::Topic)
        .await?;
    channel
        .queue_declare(
            DEAD_LETTER_QUEUE,
            QueueOptions {
                durability: Durability::Durable,
                dead_letter: None,
            },
        )
        .await?;
    channel
        .queue_bind(DEAD_LETTER_QUEUE, DEAD_LETTER_EXCHANGE, "#")
        .await
}

/// Declares `queue` (or re-attaches to it) and binds it to `exchange` under
/// `routing_key`. Rejected messages from the queue are routed to the
/// dead-letter exchange keyed by the queue name.
pub async fn declare_and_bind(
    connection: &Connection,
    exchange: &str,
    queue: &str,
    routing_key: &str,
    durability: Durability,
) -> Result<(Channel, QueueInfo), PubSubError> {
    let channel = connection
        .create_channel()
        .await
        .map_err(|e| PubSubError::Topology(e.to_string()))?;
    declare_dead_letter_topology(&channel).await?;

    let info = channel
        .queue_declare(
            queue,
            QueueOptions {
                durability,
                dead_letter: Some(DeadLetter {
                    exchange: DEAD_LETTER_EXCHANGE.to_string(),
                    routing_key: queue.to_string(),
                }),
            },
        )
        .await?;
    channel.queue_bind(queue, exchange, routing_key).await?;
    debug!(
        exchange,
        queue,
        routing_key,
        durability = ?durability,
        "queue bound"
    );
    Ok((channel, info))
}

/// Encodes `value` and publishes it, resolving once the broker confirms.
pub async fn publish<T: Serialize>(
    channel: &Channel,
    exchange: &str,
    routing_key: &str,
    value: &T,
    encoding: Encoding,
) -> Result<(), PubSubError> {
    let body = encoding
        .encode(value)
        .map_err(|e| PubSubError::Publish(e.to_string()))?;
    channel
        .publish(exchange, routing_key, encoding.content_type(), body)
        .await
}

fn decode_delivery<T: DeserializeOwned>(
    delivery: &Delivery,
    encoding: Encoding,
) -> Result<T, CodecError> {
    let content_type = delivery.content_type().unwrap_or_default();
    if content_type != encoding.content_type() {
        return Err(CodecError::MalformedPayload(format!(
            "expected content type {}, got {content_type:?}",
            encoding.content_type(),
        )));
    }
    encoding.decode(delivery.payload())
}

fn panic_reason(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(reason) = payload.downcast_ref::<&str>() {
        reason.to_string()
    } else if let Some(reason) = payload.downcast_ref::<String>() {
        reason.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Declares and binds `queue`, then consumes it on a background task owned
/// by `connection`. Each delivery is decoded, passed to `handler`, and
/// settled according to the returned `AckType`. Undecodable deliveries and
/// deliveries whose handler panics are dead-lettered.
pub async fn subscribe<T, F, Fut>(
    connection: &Connection,
    exchange: &str,
    queue: &str,
    routing_key: &str,
    durability: Durability,
    encoding: Encoding,
    handler: F,
) -> Result<(), PubSubError>
where
    T: DeserializeOwned + Send + 'static,
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = AckType> + Send + 'static,
{
    let (channel, _) =
        declare_and_bind(connection, exchange, queue, routing_key, durability).await?;
    let mut consumer = channel.consume(queue, prefetch_count()).await?;
    let mut shutdown = connection.shutdown_signal();
    let queue = queue.to_string();

    let task = tokio::spawn(async move {
        loop {
            let next = tokio::select! {
                _ = shutdown.changed() => break,
                next = consumer.next() => next,
            };
            let delivery = match next {
                Some(Ok(delivery)) => delivery,
                Some(Err(e)) => {
                    warn!(queue = %queue, error = %e, "consumer failed");
                    break;
                }
                None => break,
            };
            let tag = delivery.delivery_tag();

            let ack = match decode_delivery::<T>(&delivery, encoding) {
                Ok(value) => match AssertUnwindSafe(handler(value)).catch_unwind().await {
                    Ok(ack) => ack,
                    Err(payload) => {
                        let fault = PubSubError::HandlerFault(panic_reason(payload));
                        error!(queue = %queue, tag, error = %fault, "handler failed");
                        AckType::NackDiscard
                    }
                },
                Err(e) => {
                    warn!(queue = %queue, tag, error = %e, "discarding undecodable delivery");
                    AckType::NackDiscard
                }
            };

            debug!(queue = %queue, tag, ack = ?ack, redelivered = delivery.redelivered(), "settling delivery");
            if let Err(e) = delivery.settle(ack).await {
                warn!(queue = %queue, tag, error = %e, "failed to settle delivery");
            }
        }
        debug!(queue = %queue, "consumer stopped");
    });
    connection.track(task);
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use peril_shared::{Encoding, GameLog, PlayingState};
    use tokio::sync::mpsc;

    use super::{AckType, declare_and_bind, publish, subscribe};
    use crate::config::DEAD_LETTER_QUEUE;
    use crate::error::PubSubError;
    use crate::memory::Broker;
    use crate::transport::{Connection, Durability, ExchangeKind};

    const TOPIC: &str = "peril_topic";

    async fn broker_with_topic() -> (Broker, Connection) {
        let broker = Broker::new();
        let connection = Connection::in_memory(&broker);
        connection
            .create_channel()
            .await
            .expect("channel")
            .exchange_declare(TOPIC, ExchangeKind::Topic)
            .await
            .expect("exchange");
        (broker, connection)
    }

    async fn wait_for_depth(broker: &Broker, queue: &str, depth: usize) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while broker.queue_depth(queue) != Some(depth) {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("queue reached expected depth");
    }

    #[tokio::test]
    async fn declare_and_bind_requires_known_exchange() {
        let broker = Broker::new();
        let connection = Connection::in_memory(&broker);

        let err = declare_and_bind(&connection, "missing", "war", "war.*", Durability::Durable)
            .await
            .expect_err("unknown exchange");
        assert!(matches!(err, PubSubError::Topology(_)));
    }

    #[tokio::test]
    async fn declare_and_bind_is_idempotent_and_reports_depth() {
        let (_broker, connection) = broker_with_topic().await;
        let (channel, info) =
            declare_and_bind(&connection, TOPIC, "game_logs", "game_logs.*", Durability::Durable)
                .await
                .expect("first declare");
        assert_eq!(info.message_count, 0);

        let log = GameLog::new("alice", "hello");
        publish(&channel, TOPIC, "game_logs.alice", &log, Encoding::Binary)
            .await
            .expect("confirmed");

        let (_, info) =
            declare_and_bind(&connection, TOPIC, "game_logs", "game_logs.*", Durability::Durable)
                .await
                .expect("second declare");
        assert_eq!(info.name, "game_logs");
        assert_eq!(info.message_count, 1);
    }

    #[tokio::test]
    async fn handler_receives_decoded_values() {
        let (_broker, connection) = broker_with_topic().await;
        let (tx, mut rx) = mpsc::unbounded_channel();
        subscribe(
            &connection,
            TOPIC,
            "pause.alice",
            "pause.*",
            Durability::Transient,
            Encoding::Json,
            move |state: PlayingState| {
                let tx = tx.clone();
                async move {
                    tx.send(state).expect("test receiver alive");
                    AckType::Ack
                }
            },
        )
        .await
        .expect("subscribe");

        let channel = connection.create_channel().await.expect("channel");
        publish(&channel, TOPIC, "pause.server", &PlayingState { is_paused: false }, Encoding::Json)
            .await
            .expect("confirmed");

        let received = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("delivery within timeout")
            .expect("value");
        assert_eq!(received, PlayingState { is_paused: false });
    }

    #[tokio::test]
    async fn malformed_payload_is_dead_lettered_once() {
        let (broker, connection) = broker_with_topic().await;
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        subscribe(
            &connection,
            TOPIC,
            "game_logs",
            "game_logs.*",
            Durability::Durable,
            Encoding::Binary,
            move |_: GameLog| {
                seen.fetch_add(1, Ordering::SeqCst);
                async { AckType::Ack }
            },
        )
        .await
        .expect("subscribe");

        let channel = connection.create_channel().await.expect("channel");
        channel
            .publish(
                TOPIC,
                "game_logs.mallory",
                Encoding::Binary.content_type(),
                b"\x00\x01garbage".to_vec(),
            )
            .await
            .expect("confirmed");

        wait_for_depth(&broker, DEAD_LETTER_QUEUE, 1).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        let dead = broker.drain(DEAD_LETTER_QUEUE);
        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].dead_lettered_from.as_deref(), Some("game_logs"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn content_type_mismatch_is_discarded() {
        let (broker, connection) = broker_with_topic().await;
        subscribe(
            &connection,
            TOPIC,
            "game_logs",
            "game_logs.*",
            Durability::Durable,
            Encoding::Binary,
            |_: GameLog| async { AckType::Ack },
        )
        .await
        .expect("subscribe");

        let channel = connection.create_channel().await.expect("channel");
        publish(&channel, TOPIC, "game_logs.alice", &GameLog::new("alice", "hi"), Encoding::Json)
            .await
            .expect("confirmed");

        wait_for_depth(&broker, DEAD_LETTER_QUEUE, 1).await;
    }

    #[tokio::test]
    async fn requeued_messages_are_redelivered_until_acked() {
        let (broker, connection) = broker_with_topic().await;
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&attempts);
        subscribe(
            &connection,
            TOPIC,
            "war",
            "war.*",
            Durability::Durable,
            Encoding::Json,
            move |_: PlayingState| {
                let attempt = counter.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt < 2 {
                        AckType::NackRequeue
                    } else {
                        AckType::Ack
                    }
                }
            },
        )
        .await
        .expect("subscribe");

        let channel = connection.create_channel().await.expect("channel");
        publish(&channel, TOPIC, "war.alice", &PlayingState { is_paused: true }, Encoding::Json)
            .await
            .expect("confirmed");

        tokio::time::timeout(Duration::from_secs(2), async {
            while attempts.load(Ordering::SeqCst) < 3 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("three attempts");
        wait_for_depth(&broker, "war", 0).await;
        assert_eq!(broker.queue_depth(DEAD_LETTER_QUEUE), Some(0));
    }

    fn explode(_: PlayingState) -> AckType {
        panic!("handler blew up")
    }

    #[tokio::test]
    async fn panicking_handler_discards_delivery() {
        let (broker, connection) = broker_with_topic().await;
        subscribe(
            &connection,
            TOPIC,
            "war",
            "war.*",
            Durability::Durable,
            Encoding::Json,
            |state: PlayingState| async move { explode(state) },
        )
        .await
        .expect("subscribe");

        let channel = connection.create_channel().await.expect("channel");
        publish(&channel, TOPIC, "war.alice", &PlayingState { is_paused: true }, Encoding::Json)
            .await
            .expect("confirmed");

        wait_for_depth(&broker, DEAD_LETTER_QUEUE, 1).await;
        assert_eq!(broker.queue_depth("war"), Some(0));
    }

    #[tokio::test]
    async fn close_stops_subscriptions_and_drops_transient_queues() {
        let (broker, connection) = broker_with_topic().await;
        subscribe(
            &connection,
            TOPIC,
            "army_moves.alice",
            "army_moves.*",
            Durability::Transient,
            Encoding::Json,
            |_: PlayingState| async { AckType::Ack },
        )
        .await
        .expect("subscribe");
        assert_eq!(broker.queue_depth("army_moves.alice"), Some(0));

        connection.close().await;

        assert_eq!(broker.queue_depth("army_moves.alice"), None);
        let err = subscribe(
            &connection,
            TOPIC,
            "army_moves.alice",
            "army_moves.*",
            Durability::Transient,
            Encoding::Json,
            |_: PlayingState| async { AckType::Ack },
        )
        .await
        .expect_err("closed connection");
        assert!(matches!(err, PubSubError::Topology(_)));
    }
}
