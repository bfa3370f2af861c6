use thiserror::Error;

/// spec.md §7 error taxonomy, the subset a venue adapter call can surface.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ExecutionError {
    /// Transport: socket reset, DNS failure, HTTP 5xx/429. Always retried,
    /// never fatal (spec.md §7 "Transport").
    #[error("transport error: {0}")]
    Transport(String),

    /// Bad request: HTTP 400/401. Not retried; caller treats as no-op
    /// (spec.md §7 "Bad request").
    #[error("bad request ({code}): {message}")]
    BadRequest { code: u16, message: String },

    /// Operation failed: the venue returned a structurally empty/`false`
    /// success for an operation expected to succeed (spec.md §7 "Operation
    /// failed"). Startup aborts on this.
    #[error("operation failed: {0}")]
    OperationFailed(String),

    /// Business rule: insufficient balance / invalid quantity, whether
    /// caught pre-trade or via venue rejection (spec.md §7).
    #[error("rejected: {0}")]
    Rejected(String),
}

impl kestrel_integration::Unrecoverable for ExecutionError {
    fn is_unrecoverable(&self) -> bool {
        matches!(self, ExecutionError::OperationFailed(_))
    }
}
