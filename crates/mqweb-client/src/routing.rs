//! Broker client selection by address scheme
//!
//! `memory://dev` and `stomp://mq:61613` can be served by different clients
//! behind one [`BrokerClient`]. Schemes match case-insensitively.

use std::sync::Arc;

use mqweb_types::ClientError;
use tracing::debug;

use crate::traits::{BrokerClient, ClientResult, ConnectionFactory, ConnectionSettings};

/// Scheme of a broker address, if it has one
pub fn scheme_of(address: &str) -> Option<&str> {
    address
        .trim()
        .split_once("://")
        .map(|(scheme, _)| scheme)
        .filter(|scheme| !scheme.is_empty())
}

/// Dispatches to the client registered for an address's scheme
#[derive(Clone, Default)]
pub struct RoutingClient {
    routes: Vec<(String, Arc<dyn BrokerClient>)>,
}

impl RoutingClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve addresses starting with `scheme://` with `client`
    pub fn route(self, scheme: impl Into<String>, client: impl BrokerClient + 'static) -> Self {
        self.route_shared(scheme, Arc::new(client))
    }

    pub fn route_shared(mut self, scheme: impl Into<String>, client: Arc<dyn BrokerClient>) -> Self {
        self.routes.push((scheme.into().to_ascii_lowercase(), client));
        self
    }

    /// Registered schemes in registration order
    pub fn schemes(&self) -> Vec<&str> {
        self.routes.iter().map(|(scheme, _)| scheme.as_str()).collect()
    }

    fn client_for(&self, address: &str) -> Option<&Arc<dyn BrokerClient>> {
        let scheme = scheme_of(address)?;
        self.routes
            .iter()
            .find(|(registered, _)| registered.eq_ignore_ascii_case(scheme))
            .map(|(_, client)| client)
    }
}

impl BrokerClient for RoutingClient {
    fn connection_factory(
        &self,
        settings: ConnectionSettings,
    ) -> ClientResult<Arc<dyn ConnectionFactory>> {
        let Some(client) = self.client_for(&settings.address) else {
            return Err(ClientError::ConnectionRefused(format!(
                "{} (supported schemes: {})",
                settings.address,
                self.schemes().join(", ")
            )));
        };
        debug!(address = %settings.address, "Routing broker address");
        client.connection_factory(settings)
    }
}
