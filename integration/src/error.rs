use thiserror::Error;

/// Shared transport error vocabulary (spec.md §7 "Transport" category):
/// socket reset, DNS failure, HTTP 5xx/429. Always recoverable by retrying.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SocketError {
    #[error("websocket connection closed: {0}")]
    ConnectionClosed(String),

    #[error("websocket receive timed out")]
    ReceiveTimeout,

    #[error("failed to subscribe to {0}")]
    Subscribe(String),

    #[error("failed to deserialize message: {0}")]
    Deserialize(String),

    #[error("http transport error: {0}")]
    Http(String),
}

impl crate::Unrecoverable for SocketError {
    fn is_unrecoverable(&self) -> bool {
        // Every SocketError variant is, by construction, a transport failure:
        // spec.md §7 says these never leave their component and are always
        // retried rather than propagated as fatal.
        false
    }
}
