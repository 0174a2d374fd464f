//! Error types for the Compute Engine REST client.

use thiserror::Error;

use crate::compute::ScopeError;
use crate::config::ConfigError;

/// Errors raised by [`super::GceClient`].
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ComputeError {
    /// Raised when the client configuration is incomplete.
    #[error("configuration error: {0}")]
    Config(String),
    /// Raised when the HTTP client cannot be constructed.
    #[error("failed to build HTTP client: {0}")]
    Client(String),
    /// Raised when the request never produced a response (DNS, TLS,
    /// connection reset, timeout).
    #[error("request to {url} failed: {message}")]
    Transport {
        /// Request URL.
        url: String,
        /// Transport error message.
        message: String,
    },
    /// Raised when the API answered with a non-success status.
    #[error("compute API returned HTTP {status} for {url}: {message}")]
    Api {
        /// Request URL.
        url: String,
        /// HTTP status code.
        status: u16,
        /// Message from the Google error envelope, or the raw body.
        message: String,
    },
    /// Raised when a success response cannot be decoded.
    #[error("failed to decode response from {url}: {message}")]
    Decode {
        /// Request URL.
        url: String,
        /// Decoder error message.
        message: String,
    },
}

impl From<ConfigError> for ComputeError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value.to_string())
    }
}

impl From<ScopeError> for ComputeError {
    fn from(value: ScopeError) -> Self {
        Self::Config(value.to_string())
    }
}
