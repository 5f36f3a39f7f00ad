//! Queue listing, creation and browsing

use mqweb_client::QueueBrowser;
use mqweb_types::{Destination, Error, Message, ReceivedMessage, Result};
use tracing::{debug, info, warn};

use crate::connection::ConnectionManager;
use crate::scope::scoped;

/// Names of every queue the broker knows about
pub async fn list_queues(connections: &ConnectionManager) -> Result<Vec<String>> {
    connections
        .connection_scope(|address, connection| async move {
            let destinations = connection
                .destinations()
                .await
                .map_err(|e| Error::broker("list queues", address, e))?;

            Ok(destinations
                .into_iter()
                .filter_map(|destination| match destination {
                    Destination::Queue(name) => Some(name),
                    Destination::Topic(_) => None,
                })
                .collect())
        })
        .await
}

/// Register a queue with the broker by opening a consumer on it
///
/// No message is read.
pub async fn create_queue(connections: &ConnectionManager, name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::InvalidDestination(name.to_string()));
    }
    let name = name.to_string();

    connections
        .with_session(|session| async move {
            let consumer = session
                .create_consumer(&name)
                .await
                .map_err(|e| Error::broker("create queue", name.as_str(), e))?;
            scoped(consumer, |_| async { Ok(()) }).await?;

            info!(queue = %name, "Queue created");
            Ok(())
        })
        .await
}

/// Every message currently on a queue, in delivery order, without removing any
///
/// Messages that are not text messages are skipped.
pub async fn browse_messages(connections: &ConnectionManager, queue: &str) -> Result<Vec<Message>> {
    if queue.trim().is_empty() {
        return Err(Error::InvalidDestination(queue.to_string()));
    }
    let queue = queue.to_string();

    connections
        .with_session(|session| async move {
            debug!(queue = %queue, "Getting messages for queue");
            let browser = session
                .create_browser(&queue)
                .await
                .map_err(|e| Error::broker("create browser", queue.as_str(), e))?;

            scoped(browser, |browser| async move {
                drain(browser.as_ref(), &queue).await
            })
            .await
        })
        .await
}

async fn drain(browser: &dyn QueueBrowser, queue: &str) -> Result<Vec<Message>> {
    let mut messages = Vec::new();

    while let Some(received) = browser
        .next_message()
        .await
        .map_err(|e| Error::broker("browse messages", queue, e))?
    {
        match received {
            ReceivedMessage::Text(message) => messages.push(message),
            other => {
                warn!(
                    queue = %queue,
                    message_id = ?other.headers().message_id,
                    "Not possible to read message as a text message, skipping"
                );
            }
        }
    }

    debug!(queue = %queue, count = messages.len(), "Browsed queue");
    Ok(messages)
}
