//! Infrastructure-level errors (collaborator failures)

use thiserror::Error;

use crate::domain::entities::CardId;

/// Collaborator failure crossing a boundary trait. Propagates unchanged;
/// this engine performs no retries and owns no persistent state to recover.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("card not found: {0}")]
    CardNotFound(CardId),

    #[error("backend failure: {0}")]
    Backend(String),
}

/// Result type for boundary operations.
pub type StoreResult<T> = Result<T, StoreError>;
