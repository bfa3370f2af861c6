//! Top-level error type aggregating every subsystem's error enum, mirroring
//! the teacher's `ToucanError` aggregation pattern in `core/src/error.rs`.

use thiserror::Error;

/// Central error type for process-level wiring. Propagation policy (spec.md
/// §7): startup errors halt the process with a nonzero exit; runtime errors
/// inside a strategy callback are caught and logged at their origin and never
/// reach this type.
#[derive(Debug, Error)]
pub enum KestrelError {
    #[error("execution error: {0}")]
    Execution(#[from] kestrel_execution::error::ExecutionError),

    #[error("trader error: {0}")]
    Trader(#[from] kestrel_trader::error::TraderError),

    #[error("store error: {0}")]
    Store(#[from] kestrel_store::StoreError),

    #[error("socket error: {0}")]
    Socket(#[from] kestrel_integration::error::SocketError),

    #[error("config error: {0}")]
    Config(String),

    #[error("document store backend error: {0}")]
    Mongo(#[from] mongodb::error::Error),

    #[error("join error: {0}")]
    Join(String),
}

impl From<crate::system::config::ConfigError> for KestrelError {
    fn from(value: crate::system::config::ConfigError) -> Self {
        Self::Config(value.to_string())
    }
}

impl From<tokio::task::JoinError> for KestrelError {
    fn from(value: tokio::task::JoinError) -> Self {
        Self::Join(value.to_string())
    }
}
