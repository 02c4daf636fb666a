//! Error types for talking to SMRT Link servers.

use thiserror::Error;

/// Failure of a single HTTP round trip.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Timeout waiting for response.
    #[error("Request timed out")]
    Timeout,

    /// Server answered with a non-2xx status.
    #[error("HTTP {code} {status_text}")]
    HttpStatus { code: u16, status_text: String },

    /// Connection could not be established.
    #[error("Network unreachable: {0}")]
    NetworkUnreachable(String),

    /// Any other request failure.
    #[error("HTTP request failed: {0}")]
    Request(String),

    /// 2xx response whose body is not JSON.
    #[error("Invalid response body: {0}")]
    InvalidBody(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout
        } else if err.is_connect() {
            TransportError::NetworkUnreachable(err.to_string())
        } else if err.is_decode() {
            TransportError::InvalidBody(err.to_string())
        } else {
            TransportError::Request(err.to_string())
        }
    }
}

/// A JSON payload could not be turned into a domain entity.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Failed to map field '{field}': {reason}")]
pub struct MappingError {
    pub field: String,
    pub reason: String,
}

impl MappingError {
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Errors surfaced by [`SystemStatusClient`](crate::client::SystemStatusClient).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Mapping(#[from] MappingError),

    /// One leg of a fail-fast composition failed.
    #[error("{leg} failed: {source}")]
    Composition {
        leg: &'static str,
        #[source]
        source: Box<ClientError>,
    },
}

impl ClientError {
    /// The innermost error, looking through composition wrappers.
    pub fn root(&self) -> &ClientError {
        match self {
            ClientError::Composition { source, .. } => source.root(),
            other => other,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self.root(), ClientError::Transport(TransportError::Timeout))
    }
}
