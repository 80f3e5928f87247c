//! Publish/subscribe delivery layer for Peril.
//!
//! `transport` holds the connection and channel handles, backed by an AMQP
//! broker through `lapin` (or, for tests, the in-memory broker in `memory`).
//! `api` layers typed encoding, subscription loops and the ack contract on top.

mod amqp;
pub mod api;
pub mod config;
pub mod error;
#[cfg(any(test, feature = "memory"))]
pub mod memory;
pub mod topic;
pub mod transport;

pub use api::{AckType, declare_and_bind, publish, subscribe};
pub use config::{DEAD_LETTER_EXCHANGE, DEAD_LETTER_QUEUE, amqp_url};
pub use error::PubSubError;
#[cfg(any(test, feature = "memory"))]
pub use memory::{Broker, Message};
pub use transport::{
    Channel, Connection, Consumer, DeadLetter, Delivery, Durability, ExchangeKind, QueueInfo,
    QueueOptions,
};
