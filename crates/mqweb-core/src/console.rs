//! Console - entry point for every broker operation
//!
//! The Console owns the connection manager and exposes the operations the
//! request layer calls.

use std::sync::Arc;

use mqweb_client::BrokerClient;
use mqweb_types::{Message, Result};
use tracing::info;

use crate::catalog::ConnectionCatalog;
use crate::connection::ConnectionManager;
use crate::publisher::{self, SendRequest};
use crate::queues;

/// Broker console
pub struct Console {
    connections: ConnectionManager,
}

impl Console {
    /// Create a console over the given broker client
    pub fn new(client: impl BrokerClient + 'static, catalog: ConnectionCatalog) -> Self {
        Self::with_client(Arc::new(client), catalog)
    }

    /// Create a console with a shared broker client
    pub fn with_client(client: Arc<dyn BrokerClient>, catalog: ConnectionCatalog) -> Self {
        info!("Initializing broker console");
        Self {
            connections: ConnectionManager::new(client, Arc::new(catalog)),
        }
    }

    pub fn connections(&self) -> &ConnectionManager {
        &self.connections
    }

    // ==================== Connection ====================

    pub async fn connect(&self, address: &str, username: &str, password: &str) -> Result<()> {
        self.connections.connect(address, username, password).await
    }

    /// Connect using a named profile and return its broker address
    pub async fn connect_by_name(&self, name: &str) -> Result<String> {
        self.connections.connect_by_name(name).await
    }

    pub async fn disconnect(&self) {
        self.connections.disconnect().await
    }

    pub fn is_connected(&self) -> bool {
        self.connections.is_connected()
    }

    pub fn current_broker_address(&self) -> Result<String> {
        self.connections.current_broker_address()
    }

    /// Names of the configured connection profiles
    pub fn list_connection_names(&self) -> Vec<String> {
        self.connections.catalog().names()
    }

    // ==================== Queues ====================

    pub async fn list_queues(&self) -> Result<Vec<String>> {
        queues::list_queues(&self.connections).await
    }

    pub async fn create_queue(&self, name: &str) -> Result<()> {
        queues::create_queue(&self.connections, name).await
    }

    pub async fn browse_messages(&self, queue: &str) -> Result<Vec<Message>> {
        queues::browse_messages(&self.connections, queue).await
    }

    // ==================== Messages ====================

    pub async fn send(&self, request: SendRequest) -> Result<Message> {
        publisher::send(&self.connections, request).await
    }
}
