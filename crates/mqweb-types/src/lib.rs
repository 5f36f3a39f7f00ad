//! mqweb Types - Core domain types for the broker console
//!
//! This crate contains all shared types used across mqweb components.

pub mod destination;
pub mod error;
pub mod message;

// Re-export commonly used types
pub use destination::{Destination, DestinationKind};
pub use error::{ClientError, Error, Result};
pub use message::{DeliveryMode, Message, MessageHeaders, MessageId, ReceivedMessage};
