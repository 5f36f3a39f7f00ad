//! Error types for mqweb
//!
//! `ClientError` is raised by broker-client implementations; `Error` is what
//! the console surfaces to its callers.

use thiserror::Error;

/// Failure reported by a broker client
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// The broker could not be reached or refused the connection
    #[error("connection refused by {0}")]
    ConnectionRefused(String),

    /// The broker rejected the supplied credentials
    #[error("authentication failed for user '{0}'")]
    AuthenticationFailed(String),

    /// The handle was already closed
    #[error("{0} is closed")]
    Closed(&'static str),

    /// The broker cannot serve the requested destination
    #[error("unsupported destination: {0}")]
    UnsupportedDestination(String),

    /// Any other transport-level failure
    #[error("transport error: {0}")]
    Transport(String),
}

/// Main error type for mqweb operations
#[derive(Error, Debug)]
pub enum Error {
    /// An operation needing a broker connection ran while none was active
    #[error("No broker connection was configured")]
    NotConnected,

    /// No named connection profile matched
    #[error("Connection profile not found: {0}")]
    ConnectionProfileNotFound(String),

    /// A destination string could not be resolved
    #[error("Invalid destination: '{0}'")]
    InvalidDestination(String),

    /// The broker client failed while serving an operation
    #[error("Broker operation '{operation}' failed ({context}): {source}")]
    BrokerOperationFailed {
        operation: &'static str,
        context: String,
        #[source]
        source: ClientError,
    },

    /// Configuration file could not be read or parsed
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Wrap a client failure with the operation and context it happened in
    pub fn broker(operation: &'static str, context: impl Into<String>, source: ClientError) -> Self {
        Self::BrokerOperationFailed {
            operation,
            context: context.into(),
            source,
        }
    }
}

/// Result type alias for mqweb operations
pub type Result<T> = std::result::Result<T, Error>;
