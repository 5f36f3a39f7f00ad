//! Broker client trait definitions
//!
//! Defines the interface that every broker client must implement. Handles
//! form a hierarchy: factory -> connection -> session -> producer, consumer
//! or browser. Every handle is a [`Resource`] and must be closed by whoever
//! created it.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use mqweb_types::{ClientError, Destination, Message, ReceivedMessage};

/// Result type returned by broker client calls
pub type ClientResult<T> = std::result::Result<T, ClientError>;

/// What kind of handle a [`Resource`] is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Factory,
    Connection,
    Session,
    Producer,
    Consumer,
    Browser,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Factory => "connection factory",
            ResourceKind::Connection => "connection",
            ResourceKind::Session => "session",
            ResourceKind::Producer => "producer",
            ResourceKind::Consumer => "consumer",
            ResourceKind::Browser => "browser",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Acknowledgement mode of a non-transacted session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcknowledgeMode {
    Auto,
    Client,
    DupsOk,
}

/// Everything needed to reach a broker
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionSettings {
    pub address: String,
    pub username: String,
    pub password: String,
    /// How many messages a queue browser may fetch ahead
    pub browser_prefetch: u32,
}

impl ConnectionSettings {
    pub fn new(
        address: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            address: address.into(),
            username: username.into(),
            password: password.into(),
            browser_prefetch: 1,
        }
    }

    pub fn with_browser_prefetch(mut self, prefetch: u32) -> Self {
        self.browser_prefetch = prefetch;
        self
    }
}

impl fmt::Debug for ConnectionSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionSettings")
            .field("address", &self.address)
            .field("username", &self.username)
            .field("password", &"***")
            .field("browser_prefetch", &self.browser_prefetch)
            .finish()
    }
}

/// A closeable broker handle
#[async_trait]
pub trait Resource: Send + Sync {
    fn kind(&self) -> ResourceKind;

    /// Release the handle
    async fn close(&self) -> ClientResult<()>;
}

/// Entry point of a broker client implementation
pub trait BrokerClient: Send + Sync {
    /// Build a connection factory for the given settings (no network I/O)
    fn connection_factory(&self, settings: ConnectionSettings)
        -> ClientResult<Arc<dyn ConnectionFactory>>;
}

/// Creates connections to a single broker
#[async_trait]
pub trait ConnectionFactory: Resource {
    fn broker_address(&self) -> &str;

    /// Open a new connection; credentials are checked here
    async fn create_connection(&self) -> ClientResult<Arc<dyn BrokerConnection>>;
}

#[async_trait]
pub trait BrokerConnection: Resource {
    /// Start message delivery
    async fn start(&self) -> ClientResult<()>;

    /// All destinations currently known to the broker
    async fn destinations(&self) -> ClientResult<Vec<Destination>>;

    /// Open a non-transacted session
    async fn create_session(&self, mode: AcknowledgeMode) -> ClientResult<Arc<dyn BrokerSession>>;
}

#[async_trait]
pub trait BrokerSession: Resource {
    /// Open a consumer on a queue; registers the queue with the broker
    async fn create_consumer(&self, queue: &str) -> ClientResult<Arc<dyn MessageConsumer>>;

    /// Open a non-destructive browser on a queue
    async fn create_browser(&self, queue: &str) -> ClientResult<Arc<dyn QueueBrowser>>;

    /// Open a point-to-point sender
    async fn create_sender(&self, queue: &str) -> ClientResult<Arc<dyn MessageProducer>>;

    /// Open a topic publisher
    async fn create_publisher(&self, topic: &str) -> ClientResult<Arc<dyn MessageProducer>>;
}

#[async_trait]
pub trait MessageProducer: Resource {
    fn destination(&self) -> &Destination;

    /// Send a message, returning it with the headers the broker assigned
    async fn send(&self, message: Message) -> ClientResult<Message>;
}

pub trait MessageConsumer: Resource {}

#[async_trait]
pub trait QueueBrowser: Resource {
    /// Next visible message in delivery order, or None when exhausted
    async fn next_message(&self) -> ClientResult<Option<ReceivedMessage>>;
}
