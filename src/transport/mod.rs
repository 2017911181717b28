//! HTTP transport: a single call primitive with retry around transient failures.

pub mod http;
pub mod retry;

pub use http::{HttpTransport, TransportOptions};
pub use retry::RetryPolicy;

use crate::protocol::EndpointConfig;
use crate::Result;
use async_trait::async_trait;
use serde_json::Value;

/// The one operation the job client needs from the network.
///
/// Implementations own their retry policy: a returned error is final for this
/// call.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn call(&self, endpoint: &EndpointConfig, body: Option<&Value>) -> Result<Value>;
}

/// A single failed attempt.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Undecodable response body: {0}")]
    Decode(String),

    #[error("Transport error: {0}")]
    Other(String),
}

impl TransportError {
    /// Whether another attempt may succeed.
    ///
    /// Network errors, undecodable bodies and 5xx are always transient. 4xx is
    /// transient only when `retry_client_errors` is set.
    pub fn is_transient(&self, retry_client_errors: bool) -> bool {
        match self {
            TransportError::Http(_) | TransportError::Decode(_) => true,
            TransportError::Status { status, .. } => {
                !(400..500).contains(status) || retry_client_errors
            }
            TransportError::Other(_) => false,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Status { status, .. } => Some(*status),
            TransportError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(code: u16) -> TransportError {
        TransportError::Status {
            status: code,
            body: String::new(),
        }
    }

    #[test]
    fn server_errors_are_always_transient() {
        assert!(status(500).is_transient(false));
        assert!(status(503).is_transient(true));
        assert!(TransportError::Decode("eof".into()).is_transient(false));
    }

    #[test]
    fn client_errors_follow_the_flag() {
        assert!(status(401).is_transient(true));
        assert!(!status(401).is_transient(false));
        assert!(!status(404).is_transient(false));
        assert_eq!(status(404).status(), Some(404));
    }

    #[test]
    fn other_errors_are_final() {
        assert!(!TransportError::Other("bad url".into()).is_transient(true));
    }
}
