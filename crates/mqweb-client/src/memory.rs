//! In-memory broker
//!
//! Fast, non-persistent broker for development and testing. All data is
//! lost when the process exits. Each broker address gets its own store, so
//! `memory://a` and `memory://b` never see each other's queues. Queues are
//! created on first send or first consumer, topics on first publish. Topic
//! messages are counted and dropped since nothing subscribes through this
//! client.
//!
//! Every handle opened against the broker is tracked. A broker built with
//! [`MemoryBroker::recording`] also appends every lifecycle step to an event
//! log, so tests can check in which order things were released and whether
//! the broker was touched at all. One-shot failures can be injected with
//! [`MemoryBroker::fail_next`].

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use dashmap::DashMap;
use mqweb_types::{
    ClientError, Destination, Message, MessageHeaders, MessageId, ReceivedMessage,
};
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::traits::{
    AcknowledgeMode, BrokerClient, BrokerConnection, BrokerSession, ClientResult,
    ConnectionFactory, ConnectionSettings, MessageConsumer, MessageProducer, QueueBrowser,
    Resource, ResourceKind,
};

/// Broker call that can be made to fail once
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultPoint {
    CreateConnection,
    StartConnection,
    ListDestinations,
    CreateSession,
    CreateConsumer,
    CreateBrowser,
    Browse,
    CreateProducer,
    Send,
    Close(ResourceKind),
}

/// Something that happened on the broker
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrokerEvent {
    FactoryCreated(String),
    ConnectionOpened,
    ConnectionStarted,
    DestinationsListed,
    SessionOpened(AcknowledgeMode),
    ConsumerOpened(String),
    BrowserOpened { queue: String, prefetch: u32 },
    ProducerOpened(Destination),
    Sent(Destination),
    Closed(ResourceKind),
}

/// Internal queue data structure
#[derive(Default)]
struct QueueData {
    messages: VecDeque<ReceivedMessage>,
}

/// Destinations held by one broker address
#[derive(Default)]
struct BrokerStore {
    /// Queues stored by name
    queues: DashMap<String, QueueData>,
    /// Publish counts per topic
    topics: DashMap<String, u64>,
}

struct BrokerState {
    /// One store per broker address
    stores: DashMap<String, Arc<BrokerStore>>,
    /// Required username and password, if any
    credentials: Option<(String, String)>,
    faults: Mutex<Vec<FaultPoint>>,
    /// Lifecycle log, only kept by recording brokers
    events: Option<Mutex<Vec<BrokerEvent>>>,
    open: Mutex<HashMap<ResourceKind, usize>>,
}

impl BrokerState {
    fn record(&self, event: BrokerEvent) {
        if let Some(events) = &self.events {
            events.lock().push(event);
        }
    }

    /// Store for `address`, created on first use
    fn store(&self, address: &str) -> Arc<BrokerStore> {
        Arc::clone(self.stores.entry(address.trim().to_string()).or_default().value())
    }

    /// Store for `address` if anything ever connected to it
    fn existing_store(&self, address: &str) -> Option<Arc<BrokerStore>> {
        self.stores
            .get(address.trim())
            .map(|store| Arc::clone(store.value()))
    }

    /// Fail if a fault was armed for this point, disarming it
    fn trip(&self, point: FaultPoint) -> ClientResult<()> {
        let mut faults = self.faults.lock();
        match faults.iter().position(|armed| *armed == point) {
            Some(index) => {
                faults.remove(index);
                Err(ClientError::Transport(format!("injected failure at {point:?}")))
            }
            None => Ok(()),
        }
    }

    fn opened(&self, kind: ResourceKind) {
        *self.open.lock().entry(kind).or_insert(0) += 1;
    }

    fn close(&self, kind: ResourceKind, closed: &AtomicBool) -> ClientResult<()> {
        if closed.load(Ordering::SeqCst) {
            return Ok(());
        }
        self.trip(FaultPoint::Close(kind))?;
        closed.store(true, Ordering::SeqCst);
        if let Some(count) = self.open.lock().get_mut(&kind) {
            *count = count.saturating_sub(1);
        }
        self.record(BrokerEvent::Closed(kind));
        Ok(())
    }
}

fn ensure_open(kind: ResourceKind, closed: &AtomicBool) -> ClientResult<()> {
    if closed.load(Ordering::SeqCst) {
        Err(ClientError::Closed(kind.as_str()))
    } else {
        Ok(())
    }
}

/// In-memory broker implementation
#[derive(Clone)]
pub struct MemoryBroker {
    state: Arc<BrokerState>,
}

impl MemoryBroker {
    /// Create a broker that accepts any credentials
    pub fn new() -> Self {
        info!("Initializing in-memory broker");
        Self::build(None, false)
    }

    /// Create a broker that only accepts the given credentials
    pub fn with_credentials(username: impl Into<String>, password: impl Into<String>) -> Self {
        info!("Initializing in-memory broker with authentication");
        Self::build(Some((username.into(), password.into())), false)
    }

    /// Create a broker that keeps a log of every lifecycle step
    pub fn recording() -> Self {
        info!("Initializing in-memory broker with event recording");
        Self::build(None, true)
    }

    fn build(credentials: Option<(String, String)>, recording: bool) -> Self {
        Self {
            state: Arc::new(BrokerState {
                stores: DashMap::new(),
                credentials,
                faults: Mutex::new(Vec::new()),
                events: recording.then(|| Mutex::new(Vec::new())),
                open: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Make the next call at `point` fail
    pub fn fail_next(&self, point: FaultPoint) {
        self.state.faults.lock().push(point);
    }

    /// Everything that happened so far, oldest first. Always empty unless
    /// the broker was built with [`MemoryBroker::recording`]
    pub fn events(&self) -> Vec<BrokerEvent> {
        self.state
            .events
            .as_ref()
            .map(|events| events.lock().clone())
            .unwrap_or_default()
    }

    pub fn clear_events(&self) {
        if let Some(events) = &self.state.events {
            events.lock().clear();
        }
    }

    /// Number of handles of `kind` opened and not yet closed
    pub fn open_count(&self, kind: ResourceKind) -> usize {
        self.state.open.lock().get(&kind).copied().unwrap_or(0)
    }

    /// Number of messages waiting on a queue at `address`, or None if it
    /// does not exist
    pub fn queue_depth(&self, address: &str, queue: &str) -> Option<usize> {
        self.state
            .existing_store(address)?
            .queues
            .get(queue)
            .map(|q| q.messages.len())
    }

    /// Number of messages published to a topic at `address`
    pub fn published_count(&self, address: &str, topic: &str) -> u64 {
        self.state
            .existing_store(address)
            .and_then(|store| store.topics.get(topic).map(|c| *c))
            .unwrap_or(0)
    }

    /// Put a non-text message on a queue at `address`
    pub fn enqueue_bytes(&self, address: &str, queue: &str, body: impl Into<Bytes>) -> MessageId {
        let message_id = MessageId::new();
        let headers = MessageHeaders {
            destination: Some(Destination::queue(queue)),
            message_id: Some(message_id.clone()),
            timestamp: Some(Utc::now()),
            broker_in_time: Some(Utc::now()),
            ..Default::default()
        };
        self.state
            .store(address)
            .queues
            .entry(queue.to_string())
            .or_default()
            .messages
            .push_back(ReceivedMessage::Bytes {
                headers,
                body: body.into(),
            });
        message_id
    }
}

impl Default for MemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl BrokerClient for MemoryBroker {
    fn connection_factory(
        &self,
        settings: ConnectionSettings,
    ) -> ClientResult<Arc<dyn ConnectionFactory>> {
        if settings.address.trim().is_empty() {
            return Err(ClientError::ConnectionRefused("<empty address>".to_string()));
        }

        self.state.opened(ResourceKind::Factory);
        self.state
            .record(BrokerEvent::FactoryCreated(settings.address.clone()));

        Ok(Arc::new(MemoryFactory {
            state: Arc::clone(&self.state),
            store: self.state.store(&settings.address),
            settings,
            closed: AtomicBool::new(false),
        }))
    }
}

struct MemoryFactory {
    state: Arc<BrokerState>,
    store: Arc<BrokerStore>,
    settings: ConnectionSettings,
    closed: AtomicBool,
}

#[async_trait]
impl Resource for MemoryFactory {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Factory
    }

    async fn close(&self) -> ClientResult<()> {
        self.state.close(ResourceKind::Factory, &self.closed)
    }
}

#[async_trait]
impl ConnectionFactory for MemoryFactory {
    fn broker_address(&self) -> &str {
        &self.settings.address
    }

    async fn create_connection(&self) -> ClientResult<Arc<dyn BrokerConnection>> {
        ensure_open(ResourceKind::Factory, &self.closed)?;
        self.state.trip(FaultPoint::CreateConnection)?;

        if let Some((username, password)) = &self.state.credentials {
            if *username != self.settings.username || *password != self.settings.password {
                return Err(ClientError::AuthenticationFailed(
                    self.settings.username.clone(),
                ));
            }
        }

        self.state.opened(ResourceKind::Connection);
        self.state.record(BrokerEvent::ConnectionOpened);
        debug!(address = %self.settings.address, "Connection opened");

        Ok(Arc::new(MemoryConnection {
            state: Arc::clone(&self.state),
            store: Arc::clone(&self.store),
            browser_prefetch: self.settings.browser_prefetch,
            closed: AtomicBool::new(false),
        }))
    }
}

struct MemoryConnection {
    state: Arc<BrokerState>,
    store: Arc<BrokerStore>,
    browser_prefetch: u32,
    closed: AtomicBool,
}

#[async_trait]
impl Resource for MemoryConnection {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Connection
    }

    async fn close(&self) -> ClientResult<()> {
        self.state.close(ResourceKind::Connection, &self.closed)
    }
}

#[async_trait]
impl BrokerConnection for MemoryConnection {
    async fn start(&self) -> ClientResult<()> {
        ensure_open(ResourceKind::Connection, &self.closed)?;
        self.state.trip(FaultPoint::StartConnection)?;
        self.state.record(BrokerEvent::ConnectionStarted);
        Ok(())
    }

    async fn destinations(&self) -> ClientResult<Vec<Destination>> {
        ensure_open(ResourceKind::Connection, &self.closed)?;
        self.state.trip(FaultPoint::ListDestinations)?;
        self.state.record(BrokerEvent::DestinationsListed);

        let mut queues: Vec<String> = self.store.queues.iter().map(|q| q.key().clone()).collect();
        let mut topics: Vec<String> = self.store.topics.iter().map(|t| t.key().clone()).collect();
        queues.sort();
        topics.sort();

        Ok(queues
            .into_iter()
            .map(Destination::Queue)
            .chain(topics.into_iter().map(Destination::Topic))
            .collect())
    }

    async fn create_session(&self, mode: AcknowledgeMode) -> ClientResult<Arc<dyn BrokerSession>> {
        ensure_open(ResourceKind::Connection, &self.closed)?;
        self.state.trip(FaultPoint::CreateSession)?;
        self.state.opened(ResourceKind::Session);
        self.state.record(BrokerEvent::SessionOpened(mode));

        Ok(Arc::new(MemorySession {
            state: Arc::clone(&self.state),
            store: Arc::clone(&self.store),
            browser_prefetch: self.browser_prefetch,
            closed: AtomicBool::new(false),
        }))
    }
}

struct MemorySession {
    state: Arc<BrokerState>,
    store: Arc<BrokerStore>,
    browser_prefetch: u32,
    closed: AtomicBool,
}

impl MemorySession {
    fn producer(&self, destination: Destination) -> ClientResult<Arc<dyn MessageProducer>> {
        ensure_open(ResourceKind::Session, &self.closed)?;
        self.state.trip(FaultPoint::CreateProducer)?;
        self.state.opened(ResourceKind::Producer);
        self.state
            .record(BrokerEvent::ProducerOpened(destination.clone()));

        Ok(Arc::new(MemoryProducer {
            state: Arc::clone(&self.state),
            store: Arc::clone(&self.store),
            destination,
            closed: AtomicBool::new(false),
        }))
    }
}

#[async_trait]
impl Resource for MemorySession {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Session
    }

    async fn close(&self) -> ClientResult<()> {
        self.state.close(ResourceKind::Session, &self.closed)
    }
}

#[async_trait]
impl BrokerSession for MemorySession {
    async fn create_consumer(&self, queue: &str) -> ClientResult<Arc<dyn MessageConsumer>> {
        ensure_open(ResourceKind::Session, &self.closed)?;
        self.state.trip(FaultPoint::CreateConsumer)?;

        if !self.store.queues.contains_key(queue) {
            self.store.queues.insert(queue.to_string(), QueueData::default());
            info!(queue = %queue, "Queue created");
        }

        self.state.opened(ResourceKind::Consumer);
        self.state
            .record(BrokerEvent::ConsumerOpened(queue.to_string()));

        Ok(Arc::new(MemoryConsumer {
            state: Arc::clone(&self.state),
            closed: AtomicBool::new(false),
        }))
    }

    async fn create_browser(&self, queue: &str) -> ClientResult<Arc<dyn QueueBrowser>> {
        ensure_open(ResourceKind::Session, &self.closed)?;
        self.state.trip(FaultPoint::CreateBrowser)?;
        self.state.opened(ResourceKind::Browser);
        self.state.record(BrokerEvent::BrowserOpened {
            queue: queue.to_string(),
            prefetch: self.browser_prefetch,
        });

        Ok(Arc::new(MemoryBrowser {
            state: Arc::clone(&self.state),
            store: Arc::clone(&self.store),
            queue: queue.to_string(),
            prefetch: self.browser_prefetch.max(1) as usize,
            cursor: Mutex::new(BrowseCursor::default()),
            closed: AtomicBool::new(false),
        }))
    }

    async fn create_sender(&self, queue: &str) -> ClientResult<Arc<dyn MessageProducer>> {
        self.producer(Destination::queue(queue))
    }

    async fn create_publisher(&self, topic: &str) -> ClientResult<Arc<dyn MessageProducer>> {
        self.producer(Destination::topic(topic))
    }
}

struct MemoryProducer {
    state: Arc<BrokerState>,
    store: Arc<BrokerStore>,
    destination: Destination,
    closed: AtomicBool,
}

#[async_trait]
impl Resource for MemoryProducer {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Producer
    }

    async fn close(&self) -> ClientResult<()> {
        self.state.close(ResourceKind::Producer, &self.closed)
    }
}

#[async_trait]
impl MessageProducer for MemoryProducer {
    fn destination(&self) -> &Destination {
        &self.destination
    }

    async fn send(&self, mut message: Message) -> ClientResult<Message> {
        ensure_open(ResourceKind::Producer, &self.closed)?;
        self.state.trip(FaultPoint::Send)?;

        let now = Utc::now();
        let message_id = MessageId::new();
        message.headers.message_id = Some(message_id.clone());
        message.headers.destination = Some(self.destination.clone());
        message.headers.timestamp = Some(now);
        message.headers.broker_in_time = Some(now);
        message.headers.redelivered = false;

        match &self.destination {
            Destination::Queue(name) => {
                self.store
                    .queues
                    .entry(name.clone())
                    .or_default()
                    .messages
                    .push_back(ReceivedMessage::Text(message.clone()));
            }
            Destination::Topic(name) => {
                *self.store.topics.entry(name.clone()).or_insert(0) += 1;
            }
        }

        self.state.record(BrokerEvent::Sent(self.destination.clone()));
        debug!(
            destination = %self.destination,
            message_id = %message_id,
            "Message sent"
        );

        Ok(message)
    }
}

struct MemoryConsumer {
    state: Arc<BrokerState>,
    closed: AtomicBool,
}

#[async_trait]
impl Resource for MemoryConsumer {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Consumer
    }

    async fn close(&self) -> ClientResult<()> {
        self.state.close(ResourceKind::Consumer, &self.closed)
    }
}

impl MessageConsumer for MemoryConsumer {}

/// Position of a browser in its queue plus the messages fetched ahead
#[derive(Default)]
struct BrowseCursor {
    position: usize,
    buffer: VecDeque<ReceivedMessage>,
}

struct MemoryBrowser {
    state: Arc<BrokerState>,
    store: Arc<BrokerStore>,
    queue: String,
    prefetch: usize,
    cursor: Mutex<BrowseCursor>,
    closed: AtomicBool,
}

impl MemoryBrowser {
    /// Copy up to `prefetch` messages following the cursor into its buffer
    fn fill(&self, cursor: &mut BrowseCursor) {
        let Some(queue) = self.store.queues.get(&self.queue) else {
            return;
        };

        let now = Utc::now();
        for received in queue
            .messages
            .iter()
            .skip(cursor.position)
            .take(self.prefetch)
        {
            let mut received = received.clone();
            match &mut received {
                ReceivedMessage::Text(message) => message.headers.broker_out_time = Some(now),
                ReceivedMessage::Bytes { headers, .. } => headers.broker_out_time = Some(now),
            }
            cursor.buffer.push_back(received);
            cursor.position += 1;
        }
    }
}

#[async_trait]
impl Resource for MemoryBrowser {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Browser
    }

    async fn close(&self) -> ClientResult<()> {
        self.state.close(ResourceKind::Browser, &self.closed)
    }
}

#[async_trait]
impl QueueBrowser for MemoryBrowser {
    async fn next_message(&self) -> ClientResult<Option<ReceivedMessage>> {
        ensure_open(ResourceKind::Browser, &self.closed)?;
        self.state.trip(FaultPoint::Browse)?;

        let mut cursor = self.cursor.lock();
        if cursor.buffer.is_empty() {
            self.fill(&mut cursor);
        }
        Ok(cursor.buffer.pop_front())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_ADDRESS: &str = "memory://test";

    async fn open_session(broker: &MemoryBroker) -> Arc<dyn BrokerSession> {
        open_session_at(broker, TEST_ADDRESS).await
    }

    async fn open_session_at(broker: &MemoryBroker, address: &str) -> Arc<dyn BrokerSession> {
        let factory = broker
            .connection_factory(ConnectionSettings::new(address, "u", "p"))
            .unwrap();
        let connection = factory.create_connection().await.unwrap();
        connection.start().await.unwrap();
        connection.create_session(AcknowledgeMode::Client).await.unwrap()
    }

    #[tokio::test]
    async fn test_send_and_browse() {
        let broker = MemoryBroker::new();
        let session = open_session(&broker).await;

        let sender = session.create_sender("orders").await.unwrap();
        let sent = sender.send(Message::new("Hello!")).await.unwrap();
        assert!(sent.message_id().is_some());
        assert_eq!(sent.headers.destination, Some(Destination::queue("orders")));

        let browser = session.create_browser("orders").await.unwrap();
        let first = browser.next_message().await.unwrap().unwrap();
        assert_eq!(first.into_text().unwrap().body, "Hello!");
        assert!(browser.next_message().await.unwrap().is_none());

        // Browsing never removes
        assert_eq!(broker.queue_depth(TEST_ADDRESS, "orders"), Some(1));
    }

    #[tokio::test]
    async fn test_browser_respects_prefetch() {
        let broker = MemoryBroker::recording();
        let session = open_session(&broker).await;
        let sender = session.create_sender("q").await.unwrap();
        for i in 0..3 {
            sender.send(Message::new(format!("m{i}"))).await.unwrap();
        }

        let browser = session.create_browser("q").await.unwrap();
        let mut bodies = Vec::new();
        while let Some(received) = browser.next_message().await.unwrap() {
            bodies.push(received.into_text().unwrap().body);
        }
        assert_eq!(bodies, vec!["m0", "m1", "m2"]);
        assert!(broker.events().contains(&BrokerEvent::BrowserOpened {
            queue: "q".to_string(),
            prefetch: 1,
        }));
    }

    #[tokio::test]
    async fn test_topic_publish_is_counted() {
        let broker = MemoryBroker::new();
        let session = open_session(&broker).await;

        let publisher = session.create_publisher("prices").await.unwrap();
        publisher.send(Message::new("1.0")).await.unwrap();

        assert_eq!(broker.published_count(TEST_ADDRESS, "prices"), 1);
        assert_eq!(broker.queue_depth(TEST_ADDRESS, "prices"), None);
    }

    #[tokio::test]
    async fn test_consumer_declares_queue() {
        let broker = MemoryBroker::new();
        let session = open_session(&broker).await;

        let consumer = session.create_consumer("fresh").await.unwrap();
        consumer.close().await.unwrap();

        assert_eq!(broker.queue_depth(TEST_ADDRESS, "fresh"), Some(0));
    }

    #[tokio::test]
    async fn test_wrong_credentials_fail_on_connect() {
        let broker = MemoryBroker::with_credentials("admin", "admin");
        let factory = broker
            .connection_factory(ConnectionSettings::new("memory://test", "admin", "nope"))
            .unwrap();

        let err = factory.create_connection().await.err().unwrap();
        assert_eq!(err, ClientError::AuthenticationFailed("admin".to_string()));
    }

    #[tokio::test]
    async fn test_injected_fault_fires_once() {
        let broker = MemoryBroker::new();
        let session = open_session(&broker).await;
        broker.fail_next(FaultPoint::CreateProducer);

        assert!(session.create_sender("q").await.is_err());
        assert!(session.create_sender("q").await.is_ok());
    }

    #[tokio::test]
    async fn test_closed_factory_refuses_connections() {
        let broker = MemoryBroker::new();
        let factory = broker
            .connection_factory(ConnectionSettings::new("memory://test", "u", "p"))
            .unwrap();
        assert_eq!(broker.open_count(ResourceKind::Factory), 1);

        factory.close().await.unwrap();
        assert_eq!(broker.open_count(ResourceKind::Factory), 0);
        assert!(matches!(
            factory.create_connection().await,
            Err(ClientError::Closed(_))
        ));
    }

    #[test]
    fn test_empty_address_is_refused() {
        let broker = MemoryBroker::new();
        assert!(broker
            .connection_factory(ConnectionSettings::new("", "u", "p"))
            .is_err());
    }

    #[tokio::test]
    async fn test_addresses_do_not_share_queues() {
        let broker = MemoryBroker::new();
        let prod = open_session_at(&broker, "tcp://prod:61616").await;
        let sender = prod.create_sender("orders").await.unwrap();
        sender.send(Message::new("prod-only")).await.unwrap();

        let staging = open_session_at(&broker, "tcp://staging:61616").await;
        let browser = staging.create_browser("orders").await.unwrap();
        assert!(browser.next_message().await.unwrap().is_none());

        let factory = broker
            .connection_factory(ConnectionSettings::new("tcp://staging:61616", "u", "p"))
            .unwrap();
        let connection = factory.create_connection().await.unwrap();
        assert!(connection.destinations().await.unwrap().is_empty());

        assert_eq!(broker.queue_depth("tcp://prod:61616", "orders"), Some(1));
        assert_eq!(broker.queue_depth("tcp://staging:61616", "orders"), None);
    }

    #[tokio::test]
    async fn test_same_address_shares_queues() {
        let broker = MemoryBroker::new();
        let first = open_session(&broker).await;
        first
            .create_sender("orders")
            .await
            .unwrap()
            .send(Message::new("kept"))
            .await
            .unwrap();

        let second = open_session(&broker).await;
        let browser = second.create_browser("orders").await.unwrap();
        let received = browser.next_message().await.unwrap().unwrap();
        assert_eq!(received.into_text().unwrap().body, "kept");
    }

    #[tokio::test]
    async fn test_events_are_only_kept_when_recording() {
        let quiet = MemoryBroker::new();
        for _ in 0..100 {
            let session = open_session(&quiet).await;
            session.close().await.unwrap();
        }
        assert!(quiet.events().is_empty());
        assert_eq!(quiet.open_count(ResourceKind::Session), 0);

        let recording = MemoryBroker::recording();
        open_session(&recording).await;
        assert_eq!(
            recording.events(),
            vec![
                BrokerEvent::FactoryCreated(TEST_ADDRESS.to_string()),
                BrokerEvent::ConnectionOpened,
                BrokerEvent::ConnectionStarted,
                BrokerEvent::SessionOpened(AcknowledgeMode::Client),
            ]
        );
    }
}
