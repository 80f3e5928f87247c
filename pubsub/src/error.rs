use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PubSubError {
    /// The broker could not be reached, or the link to it dropped.
    Connection(String),
    /// The broker refused an exchange, queue, or binding declaration.
    Topology(String),
    /// A publish could not be confirmed.
    Publish(String),
    /// The connection or channel has been closed.
    Closed,
    /// A subscription handler panicked while processing a delivery.
    HandlerFault(String),
}

impl fmt::Display for PubSubError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PubSubError::Connection(reason) => write!(f, "broker connection failed: {reason}"),
            PubSubError::Topology(reason) => write!(f, "topology error: {reason}"),
            PubSubError::Publish(reason) => write!(f, "publish failed: {reason}"),
            PubSubError::Closed => write!(f, "connection closed"),
            PubSubError::HandlerFault(reason) => write!(f, "handler fault: {reason}"),
        }
    }
}

impl std::error::Error for PubSubError {}
