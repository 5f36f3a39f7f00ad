//! mqweb Core - Connection lifecycle and broker operations
//!
//! This crate contains:
//! - Console: entry point used by the request layer
//! - Named connection profiles
//! - Connection management with scoped per-operation sessions
//! - Queue browsing and message publishing

pub mod catalog;
pub mod connection;
pub mod console;
pub mod publisher;
pub mod queues;
pub mod scope;

// Re-exports
pub use catalog::{ConnectionCatalog, ConnectionProfile};
pub use connection::{ConnectionManager, BROWSER_PREFETCH};
pub use console::Console;
pub use publisher::SendRequest;
