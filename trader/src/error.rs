use thiserror::Error;

/// Errors a [`crate::strategy::Strategy`] can surface (spec.md §7).
#[derive(Debug, Error)]
pub enum TraderError {
    #[error("execution error: {0}")]
    Execution(#[from] kestrel_execution::error::ExecutionError),

    #[error("store error: {0}")]
    Store(#[from] kestrel_store::StoreError),

    /// spec.md §7 "Operation failed": hedge-mode/leverage changes during
    /// startup raised this; startup aborts.
    #[error("startup operation failed: {0}")]
    StartupFailed(String),
}
