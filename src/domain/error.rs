//! Domain-level errors (no external dependencies)

use thiserror::Error;

use crate::domain::entities::{CardId, CardTypeId};

/// Domain errors represent data-integrity defects surfaced during assembly.
/// These are independent of infrastructure concerns.
#[derive(Error, Debug)]
pub enum DomainError {
    #[error("card type {0} is mapped to more than one tree level")]
    AmbiguousTypeMapping(CardTypeId),

    #[error("cycle detected in relationship values at card {0}")]
    CycleDetected(CardId),

    #[error("candidate set contains card {0} more than once")]
    DuplicateCandidate(CardId),

    #[error("grouped-count row has {got} slots, tree has {expected} levels")]
    MalformedCountRow { expected: usize, got: usize },
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;
