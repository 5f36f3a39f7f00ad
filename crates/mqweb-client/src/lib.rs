//! mqweb Client - Broker client interface for the console
//!
//! This crate defines the handle hierarchy the console drives and provides
//! pluggable implementations. Currently supports:
//! - In-memory broker (default, for development/testing)
//! - STOMP over TCP, for ActiveMQ (`stomp` feature)
//!
//! [`RoutingClient`] picks one of them by the scheme of the broker address.

pub mod routing;
pub mod traits;

#[cfg(feature = "memory")]
pub mod memory;

#[cfg(feature = "stomp")]
pub mod stomp;

// Re-exports
pub use routing::RoutingClient;
pub use traits::{
    AcknowledgeMode, BrokerClient, BrokerConnection, BrokerSession, ClientResult,
    ConnectionFactory, ConnectionSettings, MessageConsumer, MessageProducer, QueueBrowser,
    Resource, ResourceKind,
};

#[cfg(feature = "memory")]
pub use memory::{BrokerEvent, FaultPoint, MemoryBroker};

#[cfg(feature = "stomp")]
pub use stomp::StompClient;
