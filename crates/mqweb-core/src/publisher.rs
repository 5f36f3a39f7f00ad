//! Message publishing
//!
//! Queue destinations are sent through a sender, topic destinations through
//! a publisher. The producer is closed before its session.

use std::collections::HashMap;

use mqweb_types::{Destination, Error, Message, Result};
use tracing::info;

use crate::connection::ConnectionManager;
use crate::scope::scoped;

/// A message to publish
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SendRequest {
    pub body: String,
    pub properties: HashMap<String, String>,
    /// Destination string, e.g. `orders` or `topic://prices`
    pub destination: String,
    pub correlation_id: Option<String>,
    /// Reply-to destination string
    pub reply_to: Option<String>,
}

impl SendRequest {
    pub fn new(body: impl Into<String>, destination: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            destination: destination.into(),
            ..Default::default()
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    pub fn with_reply_to(mut self, reply_to: impl Into<String>) -> Self {
        self.reply_to = Some(reply_to.into());
        self
    }
}

/// Send a text message and return it as stamped by the broker
pub async fn send(connections: &ConnectionManager, request: SendRequest) -> Result<Message> {
    let destination = Destination::resolve(&request.destination)?;
    let reply_to = request
        .reply_to
        .as_deref()
        .map(Destination::resolve)
        .transpose()?;

    let mut message = Message::new(request.body).with_properties(request.properties);
    if let Some(correlation_id) = request.correlation_id {
        message = message.with_correlation_id(correlation_id);
    }
    if let Some(reply_to) = reply_to {
        message = message.with_reply_to(reply_to);
    }

    connections
        .with_session(|session| async move {
            let producer = match &destination {
                Destination::Topic(topic) => session.create_publisher(topic).await,
                Destination::Queue(queue) => session.create_sender(queue).await,
            }
            .map_err(|e| Error::broker("create producer", destination.to_string(), e))?;

            scoped(producer, |producer| async move {
                let sent = producer
                    .send(message)
                    .await
                    .map_err(|e| Error::broker("send", destination.to_string(), e))?;

                info!(
                    destination = %destination,
                    message_id = ?sent.message_id(),
                    "Message sent"
                );
                Ok(sent)
            })
            .await
        })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ConnectionCatalog;
    use crate::queues::browse_messages;
    use mqweb_client::{BrokerEvent, FaultPoint, MemoryBroker, ResourceKind};
    use std::sync::Arc;

    const TEST_ADDRESS: &str = "memory://test";

    async fn connected(broker: &MemoryBroker) -> ConnectionManager {
        let manager = ConnectionManager::new(
            Arc::new(broker.clone()),
            Arc::new(ConnectionCatalog::empty()),
        );
        manager.connect(TEST_ADDRESS, "u", "p").await.unwrap();
        manager
    }

    #[tokio::test]
    async fn test_send_then_browse_round_trip() {
        let broker = MemoryBroker::new();
        let manager = connected(&broker).await;

        let sent = send(&manager, SendRequest::new("hello", "q1").with_property("k", "v"))
            .await
            .unwrap();
        assert!(sent.message_id().is_some());
        assert!(sent.headers.timestamp.is_some());

        let browsed = browse_messages(&manager, "q1").await.unwrap();
        assert_eq!(browsed.len(), 1);
        assert_eq!(browsed[0].body, "hello");
        assert_eq!(browsed[0].property("k"), Some("v"));
        assert_eq!(browsed[0].message_id(), sent.message_id());
    }

    #[tokio::test]
    async fn test_topic_destination_uses_publisher() {
        let broker = MemoryBroker::recording();
        let manager = connected(&broker).await;

        let sent = send(&manager, SendRequest::new("x", "topic:t1")).await.unwrap();

        assert_eq!(sent.headers.destination, Some(Destination::topic("t1")));
        assert!(broker
            .events()
            .contains(&BrokerEvent::ProducerOpened(Destination::topic("t1"))));
        assert_eq!(broker.published_count(TEST_ADDRESS, "t1"), 1);
        assert_eq!(broker.queue_depth(TEST_ADDRESS, "t1"), None);
    }

    #[tokio::test]
    async fn test_headers_and_reply_to() {
        let broker = MemoryBroker::new();
        let manager = connected(&broker).await;

        let sent = send(
            &manager,
            SendRequest::new("ping", "requests")
                .with_correlation_id("abc-123")
                .with_reply_to("topic://replies"),
        )
        .await
        .unwrap();

        assert_eq!(sent.headers.correlation_id.as_deref(), Some("abc-123"));
        assert_eq!(sent.headers.reply_to, Some(Destination::topic("replies")));
        assert_eq!(sent.headers.destination, Some(Destination::queue("requests")));
    }

    #[tokio::test]
    async fn test_invalid_destination_touches_nothing() {
        let broker = MemoryBroker::recording();
        let manager = connected(&broker).await;
        broker.clear_events();

        let err = send(&manager, SendRequest::new("x", "topic://")).await.unwrap_err();
        assert!(matches!(err, Error::InvalidDestination(_)));

        let err = send(&manager, SendRequest::new("x", "q").with_reply_to(""))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidDestination(_)));

        assert!(broker.events().is_empty());
    }

    #[tokio::test]
    async fn test_send_requires_connection() {
        let broker = MemoryBroker::recording();
        let manager = ConnectionManager::new(
            Arc::new(broker.clone()),
            Arc::new(ConnectionCatalog::empty()),
        );

        let err = send(&manager, SendRequest::new("x", "q")).await.unwrap_err();
        assert!(matches!(err, Error::NotConnected));
        assert!(broker.events().is_empty());
    }

    #[tokio::test]
    async fn test_producer_closed_before_session() {
        let broker = MemoryBroker::recording();
        let manager = connected(&broker).await;
        broker.clear_events();

        send(&manager, SendRequest::new("x", "q")).await.unwrap();

        let closes: Vec<BrokerEvent> = broker
            .events()
            .into_iter()
            .filter(|e| matches!(e, BrokerEvent::Closed(_)))
            .collect();
        assert_eq!(
            closes,
            vec![
                BrokerEvent::Closed(ResourceKind::Producer),
                BrokerEvent::Closed(ResourceKind::Session),
                BrokerEvent::Closed(ResourceKind::Connection),
            ]
        );
    }

    #[tokio::test]
    async fn test_send_failure_releases_everything() {
        let broker = MemoryBroker::new();
        let manager = connected(&broker).await;
        broker.fail_next(FaultPoint::Send);

        let err = send(&manager, SendRequest::new("x", "q")).await.unwrap_err();

        assert!(matches!(err, Error::BrokerOperationFailed { operation: "send", .. }));
        assert!(err.to_string().contains("queue://q"));
        assert_eq!(broker.open_count(ResourceKind::Producer), 0);
        assert_eq!(broker.open_count(ResourceKind::Session), 0);
        assert_eq!(broker.open_count(ResourceKind::Connection), 0);
        assert_eq!(broker.queue_depth(TEST_ADDRESS, "q"), None);
    }
}
