//! In-memory broker used as a stand-in for the AMQP broker in tests.
//!
//! Models the slice of AMQP the game relies on: direct and topic exchanges,
//! durable and exclusive queues, bindings, publisher confirms, prefetch-bounded
//! consumers, and dead-letter routing for rejected messages. Production
//! connections never reach this module; `crate::Connection::in_memory` wraps a
//! connection to it behind the same handles the AMQP backend uses.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use bytes::Bytes;
use dashmap::DashMap;
use tokio::sync::{Notify, OwnedSemaphorePermit, Semaphore, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::PubSubError;
use crate::topic::topic_matches;
use crate::transport::{Durability, ExchangeKind, QueueInfo, QueueOptions};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub exchange: String,
    pub routing_key: String,
    pub content_type: String,
    pub payload: Bytes,
    pub redelivered: bool,
    /// Queue that rejected this message, set once it has been dead-lettered.
    pub dead_lettered_from: Option<String>,
}

#[derive(Debug)]
struct Binding {
    exchange: String,
    queue: String,
    pattern: String,
}

#[derive(Debug)]
struct QueueState {
    name: String,
    options: QueueOptions,
    owner: Option<u64>,
    messages: Mutex<VecDeque<Message>>,
    available: Notify,
    deleted: AtomicBool,
}

impl QueueState {
    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<Message>> {
        self.messages.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn push_back(&self, message: Message) {
        self.lock().push_back(message);
        self.available.notify_one();
    }

    fn push_front(&self, message: Message) {
        self.lock().push_front(message);
        self.available.notify_one();
    }

    fn len(&self) -> usize {
        self.lock().len()
    }

    /// Waits for the next message. Returns `None` once the queue is deleted.
    async fn pop(&self) -> Option<Message> {
        loop {
            let notified = self.available.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.deleted.load(Ordering::Acquire) {
                return None;
            }
            if let Some(message) = self.lock().pop_front() {
                return Some(message);
            }
            notified.await;
        }
    }

    fn delete(&self) {
        self.deleted.store(true, Ordering::Release);
        self.available.notify_waiters();
    }
}

#[derive(Debug, Default)]
struct BrokerInner {
    exchanges: DashMap<String, ExchangeKind>,
    queues: DashMap<String, Arc<QueueState>>,
    bindings: RwLock<Vec<Binding>>,
    next_connection_id: AtomicU64,
    next_delivery_tag: AtomicU64,
}

#[derive(Debug, Clone, Default)]
pub struct Broker {
    inner: Arc<BrokerInner>,
}

impl Broker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connect(&self) -> Connection {
        let id = self.inner.next_connection_id.fetch_add(1, Ordering::Relaxed) + 1;
        let (shutdown, _) = watch::channel(false);
        debug!(connection = id, "connection opened");
        Connection {
            inner: Arc::new(ConnectionInner {
                id,
                broker: self.clone(),
                closed: AtomicBool::new(false),
                shutdown,
                tasks: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Number of messages waiting in `queue`, or `None` if it does not exist.
    pub fn queue_depth(&self, queue: &str) -> Option<usize> {
        self.inner.queues.get(queue).map(|state| state.len())
    }

    /// Removes and returns every waiting message in `queue` without going
    /// through a consumer.
    pub fn drain(&self, queue: &str) -> Vec<Message> {
        let Some(state) = self.queue(queue) else {
            return Vec::new();
        };
        state.lock().drain(..).collect()
    }

    fn queue(&self, name: &str) -> Option<Arc<QueueState>> {
        self.inner.queues.get(name).map(|state| Arc::clone(&state))
    }

    fn declare_exchange(&self, name: &str, kind: ExchangeKind) -> Result<(), PubSubError> {
        let existing = *self
            .inner
            .exchanges
            .entry(name.to_string())
            .or_insert(kind);
        if existing != kind {
            return Err(PubSubError::Topology(format!(
                "exchange '{name}' already declared as {existing:?}"
            )));
        }
        Ok(())
    }

    fn declare_queue(
        &self,
        connection: u64,
        name: &str,
        options: QueueOptions,
    ) -> Result<QueueInfo, PubSubError> {
        let owner = match options.durability {
            Durability::Durable => None,
            Durability::Transient => Some(connection),
        };
        let state = Arc::clone(
            &self
                .inner
                .queues
                .entry(name.to_string())
                .or_insert_with(|| {
                    debug!(queue = name, durability = ?options.durability, "queue declared");
                    Arc::new(QueueState {
                        name: name.to_string(),
                        options: options.clone(),
                        owner,
                        messages: Mutex::new(VecDeque::new()),
                        available: Notify::new(),
                        deleted: AtomicBool::new(false),
                    })
                }),
        );

        if let Some(holder) = state.owner
            && holder != connection
        {
            return Err(PubSubError::Topology(format!(
                "queue '{name}' is exclusive to another connection"
            )));
        }
        if state.options != options {
            return Err(PubSubError::Topology(format!(
                "queue '{name}' already declared with different arguments ({:?})",
                state.options
            )));
        }
        Ok(QueueInfo {
            name: state.name.clone(),
            message_count: state.len(),
        })
    }

    fn bind(&self, queue: &str, exchange: &str, pattern: &str) -> Result<(), PubSubError> {
        if !self.inner.exchanges.contains_key(exchange) {
            return Err(PubSubError::Topology(format!(
                "cannot bind to unknown exchange '{exchange}'"
            )));
        }
        if !self.inner.queues.contains_key(queue) {
            return Err(PubSubError::Topology(format!(
                "cannot bind unknown queue '{queue}'"
            )));
        }
        let mut bindings = self
            .inner
            .bindings
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let already_bound = bindings
            .iter()
            .any(|b| b.exchange == exchange && b.queue == queue && b.pattern == pattern);
        if !already_bound {
            bindings.push(Binding {
                exchange: exchange.to_string(),
                queue: queue.to_string(),
                pattern: pattern.to_string(),
            });
        }
        Ok(())
    }

    /// Delivers `message` to every queue bound to `exchange` whose pattern
    /// matches `routing_key`. Returns the number of queues reached.
    fn route(
        &self,
        exchange: &str,
        routing_key: &str,
        message: Message,
    ) -> Result<usize, PubSubError> {
        let Some(kind) = self.inner.exchanges.get(exchange).map(|kind| *kind) else {
            return Err(PubSubError::Publish(format!("unknown exchange '{exchange}'")));
        };
        let mut targets: Vec<String> = {
            let bindings = self
                .inner
                .bindings
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            bindings
                .iter()
                .filter(|b| b.exchange == exchange)
                .filter(|b| match kind {
                    ExchangeKind::Direct => b.pattern == routing_key,
                    ExchangeKind::Topic => topic_matches(&b.pattern, routing_key),
                })
                .map(|b| b.queue.clone())
                .collect()
        };
        targets.sort();
        targets.dedup();

        let mut delivered = 0;
        for name in &targets {
            if let Some(queue) = self.queue(name) {
                queue.push_back(message.clone());
                delivered += 1;
            }
        }
        Ok(delivered)
    }

    fn dead_letter(&self, queue: &QueueState, mut message: Message) {
        let Some(target) = queue.options.dead_letter.as_ref() else {
            warn!(queue = %queue.name, "rejected message dropped: queue has no dead-letter route");
            return;
        };
        message.redelivered = false;
        message.dead_lettered_from = Some(queue.name.clone());
        match self.route(&target.exchange, &target.routing_key, message) {
            Ok(0) => warn!(
                queue = %queue.name,
                exchange = %target.exchange,
                "dead-lettered message matched no queue"
            ),
            Ok(_) => warn!(
                queue = %queue.name,
                exchange = %target.exchange,
                routing_key = %target.routing_key,
                "message dead-lettered"
            ),
            Err(e) => warn!(queue = %queue.name, error = %e, "failed to dead-letter message"),
        }
    }

    fn delete_queue(&self, name: &str) {
        if let Some((_, state)) = self.inner.queues.remove(name) {
            state.delete();
        }
        self.inner
            .bindings
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|b| b.queue != name);
        debug!(queue = name, "queue deleted");
    }

    fn delete_exclusive_queues(&self, connection: u64) {
        let owned: Vec<String> = self
            .inner
            .queues
            .iter()
            .filter(|entry| entry.value().owner == Some(connection))
            .map(|entry| entry.key().clone())
            .collect();
        for name in owned {
            self.delete_queue(&name);
        }
    }
}

#[derive(Debug)]
struct ConnectionInner {
    id: u64,
    broker: Broker,
    closed: AtomicBool,
    shutdown: watch::Sender<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

/// A client's session with the in-memory broker. Cloning shares the session.
#[derive(Debug, Clone)]
pub struct Connection {
    inner: Arc<ConnectionInner>,
}

impl Connection {
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn broker(&self) -> &Broker {
        &self.inner.broker
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    pub fn create_channel(&self) -> Result<Channel, PubSubError> {
        if self.is_closed() {
            return Err(PubSubError::Closed);
        }
        Ok(Channel {
            connection: self.clone(),
            publish_order: Arc::new(tokio::sync::Mutex::new(())),
        })
    }

    /// Registers a task that must stop before `close` returns.
    fn track(&self, task: JoinHandle<()>) {
        self.inner
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(task);
    }

    /// Stops every consumer on this connection and deletes its exclusive queues.
    pub async fn close(&self) {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.inner.shutdown.send_replace(true);
        let tasks: Vec<JoinHandle<()>> = self
            .inner
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        for task in tasks {
            if let Err(e) = task.await {
                warn!(connection = self.inner.id, error = %e, "consumer task ended abnormally");
            }
        }
        self.inner.broker.delete_exclusive_queues(self.inner.id);
        debug!(connection = self.inner.id, "connection closed");
    }

    fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.inner.shutdown.subscribe()
    }
}

/// A publish/consume lane on a connection. Publishes through one channel (and
/// its clones) are routed in submission order.
#[derive(Debug, Clone)]
pub struct Channel {
    connection: Connection,
    publish_order: Arc<tokio::sync::Mutex<()>>,
}

impl Channel {
    fn broker(&self) -> Result<&Broker, PubSubError> {
        if self.connection.is_closed() {
            return Err(PubSubError::Closed);
        }
        Ok(self.connection.broker())
    }

    pub fn exchange_declare(&self, name: &str, kind: ExchangeKind) -> Result<(), PubSubError> {
        self.broker()
            .map_err(|e| PubSubError::Topology(e.to_string()))?
            .declare_exchange(name, kind)
    }

    pub fn queue_declare(
        &self,
        name: &str,
        options: QueueOptions,
    ) -> Result<QueueInfo, PubSubError> {
        self.broker()
            .map_err(|e| PubSubError::Topology(e.to_string()))?
            .declare_queue(self.connection.id(), name, options)
    }

    pub fn queue_bind(&self, queue: &str, exchange: &str, pattern: &str) -> Result<(), PubSubError> {
        self.broker()
            .map_err(|e| PubSubError::Topology(e.to_string()))?
            .bind(queue, exchange, pattern)
    }

    /// Routes `payload` and resolves once the broker has accepted it.
    pub async fn basic_publish(
        &self,
        exchange: &str,
        routing_key: &str,
        content_type: &str,
        payload: Bytes,
    ) -> Result<(), PubSubError> {
        let _order = self.publish_order.lock().await;
        let broker = self.broker()?;
        let message = Message {
            exchange: exchange.to_string(),
            routing_key: routing_key.to_string(),
            content_type: content_type.to_string(),
            payload,
            redelivered: false,
            dead_lettered_from: None,
        };
        let delivered = broker.route(exchange, routing_key, message)?;
        if delivered == 0 {
            debug!(exchange, routing_key, "published message matched no queue");
        }
        Ok(())
    }

    /// Starts consuming `queue`, holding at most `prefetch` unsettled deliveries.
    pub fn basic_consume(&self, queue: &str, prefetch: usize) -> Result<Consumer, PubSubError> {
        let broker = self.broker()?.clone();
        let Some(state) = broker.queue(queue) else {
            return Err(PubSubError::Topology(format!(
                "cannot consume unknown queue '{queue}'"
            )));
        };
        if let Some(holder) = state.owner
            && holder != self.connection.id()
        {
            return Err(PubSubError::Topology(format!(
                "queue '{queue}' is exclusive to another connection"
            )));
        }

        let prefetch = prefetch.max(1);
        let (tx, rx) = mpsc::channel(prefetch);
        let in_flight = Arc::new(Semaphore::new(prefetch));
        let mut shutdown = self.connection.shutdown_signal();

        let dispatcher = tokio::spawn(async move {
            loop {
                let permit = tokio::select! {
                    _ = shutdown.changed() => break,
                    permit = Arc::clone(&in_flight).acquire_owned() => match permit {
                        Ok(permit) => permit,
                        Err(_) => break,
                    },
                };
                let message = tokio::select! {
                    _ = shutdown.changed() => break,
                    message = state.pop() => match message {
                        Some(message) => message,
                        None => break,
                    },
                };
                let delivery = Delivery {
                    delivery_tag: broker.inner.next_delivery_tag.fetch_add(1, Ordering::Relaxed) + 1,
                    message,
                    settled: false,
                    queue: Arc::clone(&state),
                    broker: broker.clone(),
                    _permit: permit,
                };
                if tx.send(delivery).await.is_err() {
                    break;
                }
            }
        });
        self.connection.track(dispatcher);

        Ok(Consumer { receiver: rx })
    }
}

pub struct Consumer {
    receiver: mpsc::Receiver<Delivery>,
}

impl Consumer {
    /// Next delivery, or `None` once the connection closes or the queue is deleted.
    pub async fn next(&mut self) -> Option<Delivery> {
        self.receiver.recv().await
    }
}

/// A message handed to a consumer. It occupies one prefetch slot until it is
/// acked or nacked; dropping it unsettled puts it back at the head of its queue.
#[derive(Debug)]
pub struct Delivery {
    pub delivery_tag: u64,
    message: Message,
    settled: bool,
    queue: Arc<QueueState>,
    broker: Broker,
    _permit: OwnedSemaphorePermit,
}

impl Delivery {
    pub fn message(&self) -> &Message {
        &self.message
    }

    pub fn queue_name(&self) -> &str {
        &self.queue.name
    }

    pub fn ack(mut self) {
        self.settled = true;
    }

    /// Rejects the delivery. With `requeue` it goes back to the head of the
    /// queue; otherwise it is dead-lettered.
    pub fn nack(mut self, requeue: bool) {
        self.settled = true;
        let mut message = self.message.clone();
        if requeue {
            message.redelivered = true;
            self.queue.push_front(message);
        } else {
            self.broker.dead_letter(&self.queue, message);
        }
    }
}

impl Drop for Delivery {
    fn drop(&mut self) {
        if !self.settled {
            let mut message = self.message.clone();
            message.redelivered = true;
            self.queue.push_front(message);
        }
    }
}
