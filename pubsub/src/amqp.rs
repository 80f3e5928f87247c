//! AMQP 0-9-1 plumbing on top of `lapin`.

use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicPublishOptions, BasicQosOptions,
    ConfirmSelectOptions, ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions,
};
use lapin::types::{AMQPValue, FieldTable, LongString, ShortString};
use lapin::{BasicProperties, ConnectionProperties};
use tracing::{debug, info};

use crate::api::AckType;
use crate::error::PubSubError;
use crate::transport::{Durability, ExchangeKind, QueueInfo, QueueOptions};

const DEAD_LETTER_EXCHANGE_ARG: &str = "x-dead-letter-exchange";
const DEAD_LETTER_ROUTING_KEY_ARG: &str = "x-dead-letter-routing-key";

fn topology(e: lapin::Error) -> PubSubError {
    PubSubError::Topology(e.to_string())
}

fn publish_failed(e: lapin::Error) -> PubSubError {
    PubSubError::Publish(e.to_string())
}

pub(crate) async fn connect(url: &str) -> Result<lapin::Connection, PubSubError> {
    let connection = lapin::Connection::connect(url, ConnectionProperties::default())
        .await
        .map_err(|e| PubSubError::Connection(e.to_string()))?;
    info!("connected to AMQP broker");
    Ok(connection)
}

/// Opens a channel with publisher confirms enabled.
pub(crate) async fn open_channel(
    connection: &lapin::Connection,
) -> Result<lapin::Channel, PubSubError> {
    let channel = connection
        .create_channel()
        .await
        .map_err(|e| PubSubError::Connection(e.to_string()))?;
    channel
        .confirm_select(ConfirmSelectOptions::default())
        .await
        .map_err(|e| PubSubError::Connection(e.to_string()))?;
    debug!(channel = channel.id(), "channel opened in confirm mode");
    Ok(channel)
}

fn exchange_kind(kind: ExchangeKind) -> lapin::ExchangeKind {
    match kind {
        ExchangeKind::Direct => lapin::ExchangeKind::Direct,
        ExchangeKind::Topic => lapin::ExchangeKind::Topic,
    }
}

pub(crate) async fn declare_exchange(
    channel: &lapin::Channel,
    name: &str,
    kind: ExchangeKind,
) -> Result<(), PubSubError> {
    channel
        .exchange_declare(
            name,
            exchange_kind(kind),
            ExchangeDeclareOptions {
                durable: true,
                ..ExchangeDeclareOptions::default()
            },
            FieldTable::default(),
        )
        .await
        .map_err(topology)
}

/// Durable queues are shared and survive restarts; transient queues are
/// exclusive to the declaring connection and go away with it.
fn queue_declare_options(durability: Durability) -> QueueDeclareOptions {
    let transient = durability == Durability::Transient;
    QueueDeclareOptions {
        durable: !transient,
        exclusive: transient,
        auto_delete: transient,
        ..QueueDeclareOptions::default()
    }
}

fn queue_arguments(options: &QueueOptions) -> FieldTable {
    let mut arguments = FieldTable::default();
    if let Some(dead_letter) = &options.dead_letter {
        arguments.insert(
            ShortString::from(DEAD_LETTER_EXCHANGE_ARG),
            AMQPValue::LongString(LongString::from(dead_letter.exchange.as_str())),
        );
        arguments.insert(
            ShortString::from(DEAD_LETTER_ROUTING_KEY_ARG),
            AMQPValue::LongString(LongString::from(dead_letter.routing_key.as_str())),
        );
    }
    arguments
}

pub(crate) async fn declare_queue(
    channel: &lapin::Channel,
    name: &str,
    options: &QueueOptions,
) -> Result<QueueInfo, PubSubError> {
    let queue = channel
        .queue_declare(
            name,
            queue_declare_options(options.durability),
            queue_arguments(options),
        )
        .await
        .map_err(topology)?;
    Ok(QueueInfo {
        name: queue.name().as_str().to_string(),
        message_count: queue.message_count() as usize,
    })
}

pub(crate) async fn bind(
    channel: &lapin::Channel,
    queue: &str,
    exchange: &str,
    pattern: &str,
) -> Result<(), PubSubError> {
    channel
        .queue_bind(
            queue,
            exchange,
            pattern,
            QueueBindOptions::default(),
            FieldTable::default(),
        )
        .await
        .map_err(topology)
}

pub(crate) async fn publish(
    channel: &lapin::Channel,
    exchange: &str,
    routing_key: &str,
    content_type: &str,
    payload: &[u8],
) -> Result<(), PubSubError> {
    let properties = BasicProperties::default().with_content_type(ShortString::from(content_type));
    let confirmation = channel
        .basic_publish(
            exchange,
            routing_key,
            BasicPublishOptions::default(),
            payload,
            properties,
        )
        .await
        .map_err(publish_failed)?
        .await
        .map_err(publish_failed)?;
    if confirmation.is_nack() {
        return Err(PubSubError::Publish(format!(
            "broker nacked message for {exchange}/{routing_key}"
        )));
    }
    Ok(())
}

pub(crate) async fn consume(
    channel: &lapin::Channel,
    queue: &str,
    prefetch: u16,
) -> Result<lapin::Consumer, PubSubError> {
    channel
        .basic_qos(prefetch, BasicQosOptions::default())
        .await
        .map_err(topology)?;
    // An empty tag lets the broker generate one.
    channel
        .basic_consume(
            queue,
            "",
            BasicConsumeOptions::default(),
            FieldTable::default(),
        )
        .await
        .map_err(topology)
}

fn nack_options(requeue: bool) -> BasicNackOptions {
    BasicNackOptions {
        requeue,
        multiple: false,
    }
}

pub(crate) async fn settle(
    delivery: &lapin::message::Delivery,
    ack: AckType,
) -> Result<(), PubSubError> {
    let settled = match ack {
        AckType::Ack => delivery.acker.ack(BasicAckOptions::default()).await,
        AckType::NackRequeue => delivery.acker.nack(nack_options(true)).await,
        AckType::NackDiscard => delivery.acker.nack(nack_options(false)).await,
    };
    settled.map_err(|e| PubSubError::Connection(e.to_string()))
}
