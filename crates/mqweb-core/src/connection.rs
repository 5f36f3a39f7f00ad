//! Connection lifecycle
//!
//! The `ConnectionManager` holds at most one active connection factory.
//! `connect` swaps a new factory in and closes the one it replaced.
//! Operations never use the active factory's connections directly: each call
//! to [`ConnectionManager::with_connection`] or
//! [`ConnectionManager::with_session`] opens its own connection, and closes
//! it (and its session) before returning.

use std::future::Future;
use std::sync::Arc;

use mqweb_client::{
    AcknowledgeMode, BrokerClient, BrokerConnection, BrokerSession, ConnectionFactory,
    ConnectionSettings,
};
use mqweb_types::{Error, Result};
use parking_lot::RwLock;
use tracing::{debug, info};

use crate::catalog::ConnectionCatalog;
use crate::scope::{release, scoped};

/// Look-ahead granted to queue browsers
pub const BROWSER_PREFETCH: u32 = 1;

/// The connection currently in use
#[derive(Clone)]
pub struct ActiveConnection {
    factory: Arc<dyn ConnectionFactory>,
}

impl ActiveConnection {
    pub fn broker_address(&self) -> &str {
        self.factory.broker_address()
    }
}

/// Holder for the active connection
#[derive(Default)]
pub struct ConnectionSlot {
    current: RwLock<Option<ActiveConnection>>,
}

impl ConnectionSlot {
    /// Install `next` and hand back what it replaced
    pub fn replace(&self, next: Option<ActiveConnection>) -> Option<ActiveConnection> {
        std::mem::replace(&mut *self.current.write(), next)
    }

    pub fn current(&self) -> Option<ActiveConnection> {
        self.current.read().clone()
    }

    pub fn is_occupied(&self) -> bool {
        self.current.read().is_some()
    }
}

/// Owns the active broker connection and scopes per-operation resources
pub struct ConnectionManager {
    client: Arc<dyn BrokerClient>,
    catalog: Arc<ConnectionCatalog>,
    slot: ConnectionSlot,
}

impl ConnectionManager {
    pub fn new(client: Arc<dyn BrokerClient>, catalog: Arc<ConnectionCatalog>) -> Self {
        Self {
            client,
            catalog,
            slot: ConnectionSlot::default(),
        }
    }

    pub fn catalog(&self) -> &ConnectionCatalog {
        &self.catalog
    }

    /// Connect to a broker, replacing the current connection
    pub async fn connect(&self, address: &str, username: &str, password: &str) -> Result<()> {
        info!(address = %address, "Connecting to broker");

        let settings = ConnectionSettings::new(address, username, password)
            .with_browser_prefetch(BROWSER_PREFETCH);
        let factory = self
            .client
            .connection_factory(settings)
            .map_err(|e| Error::broker("connect", address, e))?;

        if let Some(previous) = self.slot.replace(Some(ActiveConnection { factory })) {
            debug!(address = %previous.broker_address(), "Closing superseded connection");
            release(previous.factory.as_ref()).await;
        }

        info!(address = %address, "Connection successful");
        Ok(())
    }

    /// Connect using a named profile; returns the broker address
    ///
    /// An unknown name leaves the current connection in place.
    pub async fn connect_by_name(&self, name: &str) -> Result<String> {
        let profile = self.catalog.lookup(name)?;
        self.connect(&profile.address, &profile.username, &profile.password)
            .await?;
        Ok(profile.address)
    }

    /// Drop the current connection; a no-op when not connected
    pub async fn disconnect(&self) {
        if let Some(previous) = self.slot.replace(None) {
            info!(address = %previous.broker_address(), "Disconnecting from broker");
            release(previous.factory.as_ref()).await;
        }
    }

    pub fn is_connected(&self) -> bool {
        self.slot.is_occupied()
    }

    pub fn current_broker_address(&self) -> Result<String> {
        self.slot
            .current()
            .map(|active| active.broker_address().to_string())
            .ok_or(Error::NotConnected)
    }

    /// Run `operation` on a fresh, started connection that is closed afterwards
    pub async fn with_connection<T, F, Fut>(&self, operation: F) -> Result<T>
    where
        F: FnOnce(Arc<dyn BrokerConnection>) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.connection_scope(|_, connection| operation(connection))
            .await
    }

    /// Run `operation` in a client-acknowledged, non-transacted session
    ///
    /// The session is closed before its connection.
    pub async fn with_session<T, F, Fut>(&self, operation: F) -> Result<T>
    where
        F: FnOnce(Arc<dyn BrokerSession>) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.connection_scope(|address, connection| async move {
            let session = connection
                .create_session(AcknowledgeMode::Client)
                .await
                .map_err(|e| Error::broker("create session", address, e))?;
            scoped(session, operation).await
        })
        .await
    }

    /// Like [`ConnectionManager::with_connection`], also handing `operation`
    /// the broker address for error context
    pub(crate) async fn connection_scope<T, F, Fut>(&self, operation: F) -> Result<T>
    where
        F: FnOnce(String, Arc<dyn BrokerConnection>) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let active = self.slot.current().ok_or(Error::NotConnected)?;
        let address = active.broker_address().to_string();

        let connection = active
            .factory
            .create_connection()
            .await
            .map_err(|e| Error::broker("create connection", address.as_str(), e))?;

        scoped(connection, |connection| async move {
            connection
                .start()
                .await
                .map_err(|e| Error::broker("start connection", address.as_str(), e))?;
            operation(address, connection).await
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mqweb_client::{BrokerEvent, FaultPoint, MemoryBroker, ResourceKind};
    use std::time::Duration;

    fn manager_with(broker: &MemoryBroker, catalog: ConnectionCatalog) -> ConnectionManager {
        ConnectionManager::new(Arc::new(broker.clone()), Arc::new(catalog))
    }

    fn manager(broker: &MemoryBroker) -> ConnectionManager {
        manager_with(
            broker,
            ConnectionCatalog::from_entries([
                ("local.address", "memory://local"),
                ("local.username", "admin"),
                ("local.password", "admin"),
            ]),
        )
    }

    #[tokio::test]
    async fn test_connect_and_status() {
        let broker = MemoryBroker::new();
        let manager = manager(&broker);
        assert!(!manager.is_connected());
        assert!(matches!(
            manager.current_broker_address(),
            Err(Error::NotConnected)
        ));

        manager.connect("addr", "u", "p").await.unwrap();
        assert!(manager.is_connected());
        assert_eq!(manager.current_broker_address().unwrap(), "addr");
    }

    #[tokio::test]
    async fn test_connect_by_name_matches_lookup() {
        let broker = MemoryBroker::new();
        let manager = manager(&broker);

        let address = manager.connect_by_name("local").await.unwrap();
        assert_eq!(address, manager.catalog().lookup("local").unwrap().address);
        assert_eq!(manager.current_broker_address().unwrap(), address);
    }

    #[tokio::test]
    async fn test_unknown_name_keeps_prior_connection() {
        let broker = MemoryBroker::new();
        let manager = manager(&broker);
        manager.connect("memory://first", "u", "p").await.unwrap();

        let err = manager.connect_by_name("missing").await.unwrap_err();
        assert!(matches!(err, Error::ConnectionProfileNotFound(name) if name == "missing"));
        assert_eq!(
            manager.current_broker_address().unwrap(),
            "memory://first"
        );
    }

    #[tokio::test]
    async fn test_reconnect_closes_superseded_factory() {
        let broker = MemoryBroker::new();
        let manager = manager(&broker);

        manager.connect("memory://one", "u", "p").await.unwrap();
        manager.connect("memory://two", "u", "p").await.unwrap();

        assert_eq!(broker.open_count(ResourceKind::Factory), 1);
        assert_eq!(manager.current_broker_address().unwrap(), "memory://two");
    }

    #[tokio::test]
    async fn test_failed_connect_keeps_prior_connection() {
        let broker = MemoryBroker::new();
        let manager = manager(&broker);
        manager.connect("memory://one", "u", "p").await.unwrap();

        let err = manager.connect("", "u", "p").await.unwrap_err();
        assert!(matches!(err, Error::BrokerOperationFailed { operation: "connect", .. }));
        assert_eq!(manager.current_broker_address().unwrap(), "memory://one");
    }

    #[tokio::test]
    async fn test_disconnect_is_idempotent() {
        let broker = MemoryBroker::new();
        let manager = manager(&broker);
        manager.connect("addr", "u", "p").await.unwrap();

        manager.disconnect().await;
        manager.disconnect().await;

        assert!(!manager.is_connected());
        assert_eq!(broker.open_count(ResourceKind::Factory), 0);
    }

    #[tokio::test]
    async fn test_with_connection_requires_connection() {
        let broker = MemoryBroker::recording();
        let manager = manager(&broker);

        let outcome = manager.with_connection(|_| async { Ok(()) }).await;
        assert!(matches!(outcome, Err(Error::NotConnected)));
        assert!(broker.events().is_empty());
    }

    #[tokio::test]
    async fn test_session_released_before_connection() {
        let broker = MemoryBroker::recording();
        let manager = manager(&broker);
        manager.connect("addr", "u", "p").await.unwrap();
        broker.clear_events();

        manager.with_session(|_| async { Ok(()) }).await.unwrap();

        assert_eq!(
            broker.events(),
            vec![
                BrokerEvent::ConnectionOpened,
                BrokerEvent::ConnectionStarted,
                BrokerEvent::SessionOpened(AcknowledgeMode::Client),
                BrokerEvent::Closed(ResourceKind::Session),
                BrokerEvent::Closed(ResourceKind::Connection),
            ]
        );
        // The long-lived factory survives the operation
        assert_eq!(broker.open_count(ResourceKind::Factory), 1);
    }

    #[tokio::test]
    async fn test_resources_released_when_operation_fails() {
        let broker = MemoryBroker::new();
        let manager = manager(&broker);
        manager.connect("addr", "u", "p").await.unwrap();

        let outcome: Result<()> = manager
            .with_session(|_| async { Err(Error::InvalidDestination("x".to_string())) })
            .await;

        assert!(matches!(outcome, Err(Error::InvalidDestination(_))));
        assert_eq!(broker.open_count(ResourceKind::Session), 0);
        assert_eq!(broker.open_count(ResourceKind::Connection), 0);
    }

    #[tokio::test]
    async fn test_connection_closed_when_start_fails() {
        let broker = MemoryBroker::new();
        let manager = manager(&broker);
        manager.connect("addr", "u", "p").await.unwrap();
        broker.fail_next(FaultPoint::StartConnection);

        let outcome = manager.with_connection(|_| async { Ok(()) }).await;

        assert!(matches!(
            outcome,
            Err(Error::BrokerOperationFailed { operation: "start connection", .. })
        ));
        assert_eq!(broker.open_count(ResourceKind::Connection), 0);
    }

    #[tokio::test]
    async fn test_connection_closed_when_session_fails() {
        let broker = MemoryBroker::new();
        let manager = manager(&broker);
        manager.connect("addr", "u", "p").await.unwrap();
        broker.fail_next(FaultPoint::CreateSession);

        let outcome = manager.with_session(|_| async { Ok(()) }).await;

        assert!(matches!(
            outcome,
            Err(Error::BrokerOperationFailed { operation: "create session", .. })
        ));
        assert_eq!(broker.open_count(ResourceKind::Connection), 0);
    }

    #[tokio::test]
    async fn test_abandoned_operation_still_releases() {
        let broker = MemoryBroker::new();
        let manager = manager(&broker);
        manager.connect("addr", "u", "p").await.unwrap();

        let outcome = tokio::time::timeout(
            Duration::from_millis(20),
            manager.with_session(|_| std::future::pending::<Result<()>>()),
        )
        .await;
        assert!(outcome.is_err());

        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(broker.open_count(ResourceKind::Session), 0);
        assert_eq!(broker.open_count(ResourceKind::Connection), 0);
        assert_eq!(broker.open_count(ResourceKind::Factory), 1);
    }

    #[tokio::test]
    async fn test_close_failure_does_not_mask_result() {
        let broker = MemoryBroker::new();
        let manager = manager(&broker);
        manager.connect("addr", "u", "p").await.unwrap();
        broker.fail_next(FaultPoint::Close(ResourceKind::Session));

        let value = manager.with_session(|_| async { Ok(42) }).await.unwrap();

        assert_eq!(value, 42);
        // The connection is still released after the session close failed
        assert_eq!(broker.open_count(ResourceKind::Connection), 0);
    }

    #[tokio::test]
    async fn test_bad_credentials_surface_on_first_operation() {
        let broker = MemoryBroker::with_credentials("admin", "admin");
        let manager = manager(&broker);

        manager.connect("addr", "admin", "wrong").await.unwrap();
        let outcome = manager.with_connection(|_| async { Ok(()) }).await;

        assert!(matches!(
            outcome,
            Err(Error::BrokerOperationFailed { operation: "create connection", .. })
        ));
    }
}
