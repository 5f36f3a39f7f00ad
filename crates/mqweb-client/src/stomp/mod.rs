//! STOMP broker client
//!
//! Talks STOMP 1.2 over TCP to a broker's STOMP connector (ActiveMQ listens
//! on port 61613 by default). The protocol has no sessions or producers, so
//! those handles are local bookkeeping over the connection they came from:
//!
//! - a consumer is a client-acknowledged subscription, unsubscribed on close
//! - a queue browser is an ActiveMQ `browser: true` subscription, which
//!   delivers every message on the queue and then one `browser: end` marker
//! - destinations are read from the ActiveMQ advisory topics
//! - a send waits for the broker's receipt
//!
//! The factory opens nothing; each connection dials the broker and
//! authenticates with its own CONNECT frame.

pub mod codec;
pub mod frame;
mod mapping;

use std::collections::BTreeSet;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use futures::{SinkExt, StreamExt};
use mqweb_types::{ClientError, Destination, Message, ReceivedMessage};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::{timeout, timeout_at, Instant};
use tokio_util::codec::Framed;
use tracing::{debug, info, warn};

pub use codec::{StompCodec, StompItem};
pub use frame::Frame;

use crate::traits::{
    AcknowledgeMode, BrokerClient, BrokerConnection, BrokerSession, ClientResult,
    ConnectionFactory, ConnectionSettings, MessageConsumer, MessageProducer, QueueBrowser,
    Resource, ResourceKind,
};
use mapping::{
    destination_header, parse_advisory, received_message, send_frame, Advisory, QUEUE_ADVISORY,
    TOPIC_ADVISORY,
};

/// Port used when the address names none
pub const DEFAULT_STOMP_PORT: u16 = 61613;

const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_ADVISORY_IDLE: Duration = Duration::from_millis(500);
const ADVISORY_PREFIX: &str = "ActiveMQ.Advisory.";

type Transport = Framed<TcpStream, StompCodec>;

/// `host:port` for a broker address such as `stomp://host:61613`,
/// `tcp://host:61613?opts` or a bare `host`
pub fn socket_address(address: &str) -> Option<String> {
    let address = address.trim();
    let rest = address
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(address);
    let authority = rest.split(['/', '?']).next().unwrap_or_default();
    if authority.is_empty() {
        return None;
    }

    let has_port = authority
        .rsplit_once(':')
        .is_some_and(|(host, port)| !host.is_empty() && port.parse::<u16>().is_ok());
    if has_port {
        Some(authority.to_string())
    } else {
        Some(format!("{authority}:{DEFAULT_STOMP_PORT}"))
    }
}

fn io_failure(e: io::Error) -> ClientError {
    ClientError::Transport(e.to_string())
}

fn error_frame(frame: &Frame) -> ClientError {
    let message = frame.get_header("message").unwrap_or("broker sent ERROR");
    ClientError::Transport(message.to_string())
}

/// ERROR in reply to CONNECT; ActiveMQ reports bad credentials this way
fn connect_error(frame: &Frame, username: &str) -> ClientError {
    let message = frame
        .get_header("message")
        .unwrap_or_default()
        .to_ascii_lowercase();
    if message.contains("password")
        || message.contains("auth")
        || message.contains("credential")
        || message.contains("login")
    {
        ClientError::AuthenticationFailed(username.to_string())
    } else {
        error_frame(frame)
    }
}

/// Next frame within `wait`, skipping heart-beats; None when `wait` elapses
async fn read_frame(transport: &mut Transport, wait: Duration) -> ClientResult<Option<Frame>> {
    let deadline = Instant::now() + wait;
    loop {
        match timeout_at(deadline, transport.next()).await {
            Err(_) => return Ok(None),
            Ok(None) => {
                return Err(ClientError::Transport(
                    "broker closed the connection".to_string(),
                ))
            }
            Ok(Some(Err(e))) => return Err(io_failure(e)),
            Ok(Some(Ok(StompItem::Heartbeat))) => continue,
            Ok(Some(Ok(StompItem::Frame(frame)))) => return Ok(Some(frame)),
        }
    }
}

fn ensure_open(kind: ResourceKind, closed: &AtomicBool) -> ClientResult<()> {
    if closed.load(Ordering::SeqCst) {
        Err(ClientError::Closed(kind.as_str()))
    } else {
        Ok(())
    }
}

/// STOMP broker client
#[derive(Debug, Clone)]
pub struct StompClient {
    io_timeout: Duration,
    advisory_idle: Duration,
}

impl StompClient {
    pub fn new() -> Self {
        Self {
            io_timeout: DEFAULT_IO_TIMEOUT,
            advisory_idle: DEFAULT_ADVISORY_IDLE,
        }
    }

    /// Longest wait for the broker to answer a frame
    pub fn with_io_timeout(mut self, io_timeout: Duration) -> Self {
        self.io_timeout = io_timeout;
        self
    }

    /// Quiet period that ends a destination listing
    pub fn with_advisory_idle(mut self, advisory_idle: Duration) -> Self {
        self.advisory_idle = advisory_idle;
        self
    }
}

impl Default for StompClient {
    fn default() -> Self {
        Self::new()
    }
}

impl BrokerClient for StompClient {
    fn connection_factory(
        &self,
        settings: ConnectionSettings,
    ) -> ClientResult<Arc<dyn ConnectionFactory>> {
        let socket = socket_address(&settings.address)
            .ok_or_else(|| ClientError::ConnectionRefused(settings.address.clone()))?;
        debug!(address = %settings.address, socket = %socket, "STOMP connection factory created");

        Ok(Arc::new(StompFactory {
            client: self.clone(),
            socket,
            settings,
            closed: AtomicBool::new(false),
        }))
    }
}

struct StompFactory {
    client: StompClient,
    socket: String,
    settings: ConnectionSettings,
    closed: AtomicBool,
}

impl StompFactory {
    async fn handshake(&self, transport: &mut Transport) -> ClientResult<()> {
        let host = self
            .socket
            .rsplit_once(':')
            .map(|(host, _)| host)
            .unwrap_or(&self.socket);
        let connect = Frame::new("CONNECT")
            .header("accept-version", "1.2")
            .header("host", host)
            .header("login", self.settings.username.as_str())
            .header("passcode", self.settings.password.as_str())
            .header("heart-beat", "0,0");

        timeout(self.client.io_timeout, transport.send(connect))
            .await
            .map_err(|_| ClientError::Transport("timed out sending CONNECT".to_string()))?
            .map_err(io_failure)?;

        match read_frame(transport, self.client.io_timeout).await? {
            Some(frame) if frame.is("CONNECTED") => {
                debug!(
                    version = frame.get_header("version").unwrap_or("1.0"),
                    server = frame.get_header("server").unwrap_or("unknown"),
                    "STOMP session established"
                );
                Ok(())
            }
            Some(frame) if frame.is("ERROR") => {
                Err(connect_error(&frame, &self.settings.username))
            }
            Some(frame) => Err(ClientError::Transport(format!(
                "unexpected {} frame in reply to CONNECT",
                frame.command
            ))),
            None => Err(ClientError::Transport(
                "timed out waiting for CONNECTED".to_string(),
            )),
        }
    }
}

#[async_trait]
impl Resource for StompFactory {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Factory
    }

    async fn close(&self) -> ClientResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl ConnectionFactory for StompFactory {
    fn broker_address(&self) -> &str {
        &self.settings.address
    }

    async fn create_connection(&self) -> ClientResult<Arc<dyn BrokerConnection>> {
        ensure_open(ResourceKind::Factory, &self.closed)?;

        let stream = timeout(self.client.io_timeout, TcpStream::connect(&self.socket))
            .await
            .map_err(|_| ClientError::ConnectionRefused(format!("{} (timed out)", self.socket)))?
            .map_err(|e| ClientError::ConnectionRefused(format!("{}: {e}", self.socket)))?;
        let mut transport = Framed::new(stream, StompCodec);
        self.handshake(&mut transport).await?;
        info!(address = %self.settings.address, "STOMP connection opened");

        Ok(Arc::new(StompConnection {
            link: Arc::new(Link {
                transport: Mutex::new(transport),
                next_id: AtomicU64::new(1),
                io_timeout: self.client.io_timeout,
            }),
            browser_prefetch: self.settings.browser_prefetch.max(1),
            advisory_idle: self.client.advisory_idle,
            closed: AtomicBool::new(false),
        }))
    }
}

/// The socket shared by a connection and every handle created from it
struct Link {
    transport: Mutex<Transport>,
    next_id: AtomicU64,
    io_timeout: Duration,
}

impl Link {
    fn next_id(&self) -> String {
        self.next_id.fetch_add(1, Ordering::SeqCst).to_string()
    }

    async fn send_on(&self, transport: &mut Transport, frame: Frame) -> ClientResult<()> {
        let command = frame.command.clone();
        timeout(self.io_timeout, transport.send(frame))
            .await
            .map_err(|_| ClientError::Transport(format!("timed out sending {command}")))?
            .map_err(io_failure)
    }

    /// Send without waiting for the broker
    async fn send(&self, frame: Frame) -> ClientResult<()> {
        let mut transport = self.transport.lock().await;
        self.send_on(&mut transport, frame).await
    }

    /// Send with a receipt request and wait for the receipt
    ///
    /// Frames for other subscriptions that arrive first are dropped.
    async fn request(&self, frame: Frame) -> ClientResult<()> {
        let receipt = format!("rcpt-{}", self.next_id());
        let frame = frame.header("receipt", receipt.as_str());
        let mut transport = self.transport.lock().await;
        self.send_on(&mut transport, frame).await?;

        loop {
            match read_frame(&mut transport, self.io_timeout).await? {
                Some(frame) if frame.is("RECEIPT") => {
                    if frame.get_header("receipt-id") == Some(receipt.as_str()) {
                        return Ok(());
                    }
                }
                Some(frame) if frame.is("ERROR") => return Err(error_frame(&frame)),
                Some(frame) => {
                    debug!(command = %frame.command, "Dropping frame while waiting for receipt")
                }
                None => {
                    return Err(ClientError::Transport(format!(
                        "timed out waiting for receipt {receipt}"
                    )))
                }
            }
        }
    }
}

struct StompConnection {
    link: Arc<Link>,
    browser_prefetch: u32,
    advisory_idle: Duration,
    closed: AtomicBool,
}

impl StompConnection {
    /// Destination names announced on an advisory topic
    async fn advertised(&self, advisory: &str) -> ClientResult<BTreeSet<String>> {
        let id = self.link.next_id();
        self.link
            .send(
                Frame::new("SUBSCRIBE")
                    .header("id", id.as_str())
                    .header("destination", advisory)
                    .header("ack", "auto")
                    .header("transformation", "jms-advisory-json"),
            )
            .await?;

        let mut names = BTreeSet::new();
        {
            let mut transport = self.link.transport.lock().await;
            while let Some(frame) = read_frame(&mut transport, self.advisory_idle).await? {
                if frame.is("ERROR") {
                    return Err(error_frame(&frame));
                }
                if !frame.is("MESSAGE") || frame.get_header("subscription") != Some(id.as_str()) {
                    continue;
                }
                match parse_advisory(&frame.body) {
                    Some(Advisory::Added(name)) => {
                        names.insert(name);
                    }
                    Some(Advisory::Removed(name)) => {
                        names.remove(&name);
                    }
                    None => warn!(advisory = %advisory, "Unreadable advisory message"),
                }
            }
        }

        self.link
            .request(Frame::new("UNSUBSCRIBE").header("id", id.as_str()))
            .await?;
        names.retain(|name| !name.starts_with(ADVISORY_PREFIX));
        Ok(names)
    }
}

#[async_trait]
impl Resource for StompConnection {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Connection
    }

    async fn close(&self) -> ClientResult<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let outcome = self.link.request(Frame::new("DISCONNECT")).await;
        let mut transport = self.link.transport.lock().await;
        if let Err(e) = transport.get_mut().shutdown().await {
            debug!(error = %e, "Socket shutdown failed");
        }
        outcome
    }
}

#[async_trait]
impl BrokerConnection for StompConnection {
    async fn start(&self) -> ClientResult<()> {
        ensure_open(ResourceKind::Connection, &self.closed)
    }

    async fn destinations(&self) -> ClientResult<Vec<Destination>> {
        ensure_open(ResourceKind::Connection, &self.closed)?;
        let queues = self.advertised(QUEUE_ADVISORY).await?;
        let topics = self.advertised(TOPIC_ADVISORY).await?;

        Ok(queues
            .into_iter()
            .map(Destination::Queue)
            .chain(topics.into_iter().map(Destination::Topic))
            .collect())
    }

    async fn create_session(&self, mode: AcknowledgeMode) -> ClientResult<Arc<dyn BrokerSession>> {
        ensure_open(ResourceKind::Connection, &self.closed)?;
        Ok(Arc::new(StompSession {
            link: Arc::clone(&self.link),
            mode,
            browser_prefetch: self.browser_prefetch,
            closed: AtomicBool::new(false),
        }))
    }
}

struct StompSession {
    link: Arc<Link>,
    mode: AcknowledgeMode,
    browser_prefetch: u32,
    closed: AtomicBool,
}

impl StompSession {
    fn ack_header(&self) -> &'static str {
        match self.mode {
            AcknowledgeMode::Client => "client",
            AcknowledgeMode::Auto | AcknowledgeMode::DupsOk => "auto",
        }
    }

    fn producer(&self, destination: Destination) -> ClientResult<Arc<dyn MessageProducer>> {
        ensure_open(ResourceKind::Session, &self.closed)?;
        Ok(Arc::new(StompProducer {
            link: Arc::clone(&self.link),
            destination,
            closed: AtomicBool::new(false),
        }))
    }
}

#[async_trait]
impl Resource for StompSession {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Session
    }

    async fn close(&self) -> ClientResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl BrokerSession for StompSession {
    async fn create_consumer(&self, queue: &str) -> ClientResult<Arc<dyn MessageConsumer>> {
        ensure_open(ResourceKind::Session, &self.closed)?;
        let id = self.link.next_id();
        self.link
            .request(
                Frame::new("SUBSCRIBE")
                    .header("id", id.as_str())
                    .header("destination", destination_header(&Destination::queue(queue)))
                    .header("ack", self.ack_header())
                    .header("activemq.prefetchSize", "1"),
            )
            .await?;

        Ok(Arc::new(StompConsumer {
            link: Arc::clone(&self.link),
            id,
            closed: AtomicBool::new(false),
        }))
    }

    async fn create_browser(&self, queue: &str) -> ClientResult<Arc<dyn QueueBrowser>> {
        ensure_open(ResourceKind::Session, &self.closed)?;
        let id = self.link.next_id();
        self.link
            .send(
                Frame::new("SUBSCRIBE")
                    .header("id", id.as_str())
                    .header("destination", destination_header(&Destination::queue(queue)))
                    .header("ack", "auto")
                    .header("browser", "true")
                    .header("activemq.prefetchSize", self.browser_prefetch.to_string()),
            )
            .await?;

        Ok(Arc::new(StompBrowser {
            link: Arc::clone(&self.link),
            id,
            queue: queue.to_string(),
            exhausted: AtomicBool::new(false),
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

struct StompProducer {
    link: Arc<Link>,
    destination: Destination,
    closed: AtomicBool,
}

#[async_trait]
impl Resource for StompProducer {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Producer
    }

    async fn close(&self) -> ClientResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl MessageProducer for StompProducer {
    fn destination(&self) -> &Destination {
        &self.destination
    }

    async fn send(&self, mut message: Message) -> ClientResult<Message> {
        ensure_open(ResourceKind::Producer, &self.closed)?;
        self.link
            .request(send_frame(&self.destination, &message))
            .await?;

        message.headers.destination = Some(self.destination.clone());
        message.headers.timestamp = Some(Utc::now());
        message.headers.redelivered = false;
        debug!(destination = %self.destination, "Message sent");
        Ok(message)
    }
}

struct StompConsumer {
    link: Arc<Link>,
    id: String,
    closed: AtomicBool,
}

#[async_trait]
impl Resource for StompConsumer {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Consumer
    }

    async fn close(&self) -> ClientResult<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.link
            .request(Frame::new("UNSUBSCRIBE").header("id", self.id.as_str()))
            .await
    }
}

impl MessageConsumer for StompConsumer {}

struct StompBrowser {
    link: Arc<Link>,
    id: String,
    queue: String,
    /// Set once the `browser: end` marker arrived
    exhausted: AtomicBool,
    closed: AtomicBool,
}

#[async_trait]
impl Resource for StompBrowser {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Browser
    }

    async fn close(&self) -> ClientResult<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        // The broker ends an exhausted browse subscription itself
        if self.exhausted.load(Ordering::SeqCst) {
            return Ok(());
        }
        self.link
            .request(Frame::new("UNSUBSCRIBE").header("id", self.id.as_str()))
            .await
    }
}

#[async_trait]
impl QueueBrowser for StompBrowser {
    async fn next_message(&self) -> ClientResult<Option<ReceivedMessage>> {
        ensure_open(ResourceKind::Browser, &self.closed)?;
        if self.exhausted.load(Ordering::SeqCst) {
            return Ok(None);
        }

        let mut transport = self.link.transport.lock().await;
        loop {
            let Some(frame) = read_frame(&mut transport, self.link.io_timeout).await? else {
                return Err(ClientError::Transport(format!(
                    "timed out browsing {}",
                    self.queue
                )));
            };
            if frame.is("ERROR") {
                return Err(error_frame(&frame));
            }
            if !frame.is("MESSAGE") || frame.get_header("subscription") != Some(self.id.as_str()) {
                debug!(command = %frame.command, "Ignoring frame while browsing");
                continue;
            }
            if frame.get_header("browser") == Some("end") {
                self.exhausted.store(true, Ordering::SeqCst);
                return Ok(None);
            }
            return Ok(Some(received_message(&frame)));
        }
    }
}
