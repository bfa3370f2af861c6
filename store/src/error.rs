use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("document not found")]
    NotFound,

    #[error("backing store transport error: {0}")]
    Transport(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl StoreError {
    /// Transient failures the "Mongo proxy" retry wrapper (spec.md §9) should
    /// retry transparently: `NotMaster` / `ServerSelectionTimeout` in the
    /// original's terms.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Transport(_))
    }
}
