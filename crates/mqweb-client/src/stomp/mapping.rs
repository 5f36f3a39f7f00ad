//! Translation between STOMP frames and mqweb messages
//!
//! ActiveMQ delivers a JMS text message as a MESSAGE frame without a
//! `content-length` header and a bytes message with one. JMS headers travel
//! as STOMP headers; every other header is a message property.

use chrono::{DateTime, TimeZone, Utc};
use mqweb_types::message::DEFAULT_PRIORITY;
use mqweb_types::{
    DeliveryMode, Destination, Message, MessageHeaders, MessageId, ReceivedMessage,
};
use serde_json::Value;

use super::frame::Frame;

const QUEUE_PREFIX: &str = "/queue/";
const TOPIC_PREFIX: &str = "/topic/";
const TEMP_QUEUE_PREFIX: &str = "/temp-queue/";
const TEMP_TOPIC_PREFIX: &str = "/temp-topic/";

/// Advisory topic announcing queues
pub const QUEUE_ADVISORY: &str = "/topic/ActiveMQ.Advisory.Queue";
/// Advisory topic announcing topics
pub const TOPIC_ADVISORY: &str = "/topic/ActiveMQ.Advisory.Topic";

/// Headers that carry JMS headers or STOMP plumbing rather than properties
const RESERVED_HEADERS: &[&str] = &[
    "destination",
    "message-id",
    "subscription",
    "ack",
    "receipt",
    "content-length",
    "content-type",
    "correlation-id",
    "reply-to",
    "type",
    "persistent",
    "priority",
    "timestamp",
    "expires",
    "redelivered",
    "brokerInTime",
    "brokerOutTime",
    "transformation",
    "browser",
];

/// STOMP destination header for a destination
pub fn destination_header(destination: &Destination) -> String {
    match destination {
        Destination::Queue(name) => format!("{QUEUE_PREFIX}{name}"),
        Destination::Topic(name) => format!("{TOPIC_PREFIX}{name}"),
    }
}

/// Destination named by a STOMP destination header
pub fn parse_destination_header(header: &str) -> Option<Destination> {
    if let Some(name) = header
        .strip_prefix(QUEUE_PREFIX)
        .or_else(|| header.strip_prefix(TEMP_QUEUE_PREFIX))
    {
        Some(Destination::queue(name))
    } else {
        header
            .strip_prefix(TOPIC_PREFIX)
            .or_else(|| header.strip_prefix(TEMP_TOPIC_PREFIX))
            .map(Destination::topic)
    }
}

fn millis(value: &str) -> Option<DateTime<Utc>> {
    let millis = value.trim().parse::<i64>().ok()?;
    if millis <= 0 {
        return None;
    }
    Utc.timestamp_millis_opt(millis).single()
}

/// SEND frame for `message`
///
/// No `content-length` is set for bodies without a NUL byte, so the broker
/// stores a text message.
pub fn send_frame(destination: &Destination, message: &Message) -> Frame {
    let headers = &message.headers;
    let mut frame = Frame::new("SEND")
        .header("destination", destination_header(destination))
        .header(
            "persistent",
            (headers.delivery_mode == DeliveryMode::Persistent).to_string(),
        )
        .header("priority", headers.priority.to_string());

    if let Some(correlation_id) = &headers.correlation_id {
        frame = frame.header("correlation-id", correlation_id.as_str());
    }
    if let Some(reply_to) = &headers.reply_to {
        frame = frame.header("reply-to", destination_header(reply_to));
    }
    if let Some(message_type) = &headers.message_type {
        frame = frame.header("type", message_type.as_str());
    }
    for (key, value) in &message.properties {
        if !RESERVED_HEADERS.contains(&key.as_str()) {
            frame = frame.header(key.as_str(), value.as_str());
        }
    }
    if message.body.contains('\0') {
        frame = frame.header("content-length", message.body.len().to_string());
    }
    frame.set_body(message.body.clone())
}

/// Message carried by a MESSAGE frame
pub fn received_message(frame: &Frame) -> ReceivedMessage {
    let header = |name: &str| frame.get_header(name);
    let headers = MessageHeaders {
        destination: header("destination").and_then(parse_destination_header),
        reply_to: header("reply-to").and_then(parse_destination_header),
        message_type: header("type").map(str::to_string),
        delivery_mode: match header("persistent") {
            Some("true") => DeliveryMode::Persistent,
            _ => DeliveryMode::NonPersistent,
        },
        priority: header("priority")
            .and_then(|p| p.trim().parse().ok())
            .unwrap_or(DEFAULT_PRIORITY),
        message_id: header("message-id").map(|id| MessageId(id.to_string())),
        timestamp: header("timestamp").and_then(millis),
        correlation_id: header("correlation-id").map(str::to_string),
        expiration: header("expires").and_then(millis),
        redelivered: header("redelivered") == Some("true"),
        broker_in_time: header("brokerInTime").and_then(millis),
        broker_out_time: header("brokerOutTime").and_then(millis),
    };

    if frame.get_header("content-length").is_some() {
        return ReceivedMessage::Bytes {
            headers,
            body: frame.body.clone(),
        };
    }
    let Ok(body) = std::str::from_utf8(&frame.body) else {
        return ReceivedMessage::Bytes {
            headers,
            body: frame.body.clone(),
        };
    };

    let mut message = Message {
        headers,
        properties: Default::default(),
        body: body.to_string(),
    };
    for (key, value) in &frame.headers {
        if !RESERVED_HEADERS.contains(&key.as_str()) {
            message
                .properties
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }
    }
    ReceivedMessage::Text(message)
}

/// Change announced by one advisory message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advisory {
    Added(String),
    Removed(String),
}

/// Read a `jms-advisory-json` DestinationInfo body
pub fn parse_advisory(body: &[u8]) -> Option<Advisory> {
    let value: Value = serde_json::from_slice(body).ok()?;
    let info = value.get("DestinationInfo")?;
    let destination = info.get("destination")?;
    let name = match destination {
        Value::String(name) => name.clone(),
        other => other
            .get("physicalName")
            .or_else(|| other.get("string"))
            .and_then(Value::as_str)?
            .to_string(),
    };

    match info.get("operationType").and_then(Value::as_i64) {
        Some(1) => Some(Advisory::Removed(name)),
        _ => Some(Advisory::Added(name)),
    }
}
