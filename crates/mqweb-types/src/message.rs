//! Message types for mqweb
//!
//! A `Message` is a text message: broker headers, string properties and a
//! string body. Messages are built by the caller, stamped by the broker on
//! send, and returned unchanged afterwards.

use std::collections::HashMap;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::destination::Destination;

/// Default priority assigned by the broker when none is requested
pub const DEFAULT_PRIORITY: u8 = 4;

/// Broker-assigned message identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub struct MessageId(pub String);

impl MessageId {
    /// Create a new random MessageId
    pub fn new() -> Self {
        Self(format!("ID:{}", Uuid::new_v4()))
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Delivery mode of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMode {
    NonPersistent,
    #[default]
    Persistent,
}

/// Message headers
///
/// Everything except `correlation_id`, `reply_to` and `message_type` is
/// assigned by the broker.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct MessageHeaders {
    /// Destination the message was sent to
    #[schema(value_type = Option<String>)]
    pub destination: Option<Destination>,

    /// Where replies should be sent
    #[schema(value_type = Option<String>)]
    pub reply_to: Option<Destination>,

    /// Application-defined message type
    pub message_type: Option<String>,

    pub delivery_mode: DeliveryMode,

    /// Priority (0-9)
    pub priority: u8,

    /// Broker-assigned identifier
    pub message_id: Option<MessageId>,

    /// When the message was handed to the broker
    pub timestamp: Option<DateTime<Utc>>,

    /// Correlation id used for request/response
    pub correlation_id: Option<String>,

    /// When the message expires (None = never)
    pub expiration: Option<DateTime<Utc>>,

    /// Whether the broker delivered this message before
    pub redelivered: bool,

    /// When the broker received the message
    pub broker_in_time: Option<DateTime<Utc>>,

    /// When the broker dispatched the message
    pub broker_out_time: Option<DateTime<Utc>>,
}

/// A text message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Message {
    pub headers: MessageHeaders,

    /// String properties (keys unique)
    #[serde(default)]
    pub properties: HashMap<String, String>,

    pub body: String,
}

impl Message {
    /// Create a new message with the given body
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            headers: MessageHeaders {
                priority: DEFAULT_PRIORITY,
                ..Default::default()
            },
            properties: HashMap::new(),
            body: body.into(),
        }
    }

    /// Set the correlation id
    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.headers.correlation_id = Some(correlation_id.into());
        self
    }

    /// Set the reply-to destination
    pub fn with_reply_to(mut self, reply_to: Destination) -> Self {
        self.headers.reply_to = Some(reply_to);
        self
    }

    /// Set a string property; a later value for the same key replaces the earlier one
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Set every property in order
    pub fn with_properties<K, V>(mut self, properties: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        for (key, value) in properties {
            self.properties.insert(key.into(), value.into());
        }
        self
    }

    pub fn message_id(&self) -> Option<&MessageId> {
        self.headers.message_id.as_ref()
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }
}

/// A message as handed out by a queue browser
///
/// Only text messages are understood by the console; anything else is
/// reported as `Bytes` so callers can skip it.
#[derive(Debug, Clone, PartialEq)]
pub enum ReceivedMessage {
    Text(Message),
    Bytes { headers: MessageHeaders, body: Bytes },
}

impl ReceivedMessage {
    pub fn headers(&self) -> &MessageHeaders {
        match self {
            ReceivedMessage::Text(message) => &message.headers,
            ReceivedMessage::Bytes { headers, .. } => headers,
        }
    }

    /// The text message, if this is one
    pub fn into_text(self) -> Option<Message> {
        match self {
            ReceivedMessage::Text(message) => Some(message),
            ReceivedMessage::Bytes { .. } => None,
        }
    }
}
