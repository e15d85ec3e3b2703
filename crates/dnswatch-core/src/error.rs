//! Error types for dnswatch
//!
//! This module defines all error types used throughout the crate.

use thiserror::Error;

/// Result type alias for dnswatch operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for dnswatch
#[derive(Error, Debug)]
pub enum Error {
    /// The domain/record API failed at transport level or returned a
    /// non-success application status
    #[error("Provider error ({provider}): {message}")]
    Provider {
        /// Provider name
        provider: String,
        /// Error message (surfaced from the provider when available)
        message: String,
    },

    /// Reading or writing the stored snapshot failed
    #[error("Snapshot store error ({store}): {message}")]
    Store {
        /// Store name
        store: String,
        /// Error message
        message: String,
    },

    /// The rendered snapshot kept changing between attempts
    #[error("Snapshot did not stabilize: {0}")]
    Unstable(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP client errors (from adapter crates)
    #[error("HTTP error: {0}")]
    Http(String),

    /// Local I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a provider error
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create a snapshot store error
    pub fn store(store: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Store {
            store: store.into(),
            message: message.into(),
        }
    }

    /// Create an "unstable snapshot" error
    pub fn unstable(msg: impl Into<String>) -> Self {
        Self::Unstable(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an HTTP error
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    /// Whether this error came from the snapshot store
    pub fn is_store(&self) -> bool {
        matches!(self, Self::Store { .. })
    }

    /// Whether this error came from the DNS provider
    pub fn is_provider(&self) -> bool {
        matches!(self, Self::Provider { .. })
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
