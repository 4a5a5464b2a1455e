//! Application-level errors (wraps domain and boundary errors)

use thiserror::Error;

use crate::domain::entities::{CardId, ColumnName, TreeId};
use crate::domain::error::DomainError;
use crate::infrastructure::error::StoreError;

/// Application errors wrap domain errors and add service-level context.
#[derive(Error, Debug)]
pub enum ApplicationError {
    #[error("{0}")]
    Domain(#[from] DomainError),

    #[error("{0}")]
    Store(#[from] StoreError),

    #[error("cascading update for {tree} cannot be derived: {reason}")]
    CascadeConflict { tree: TreeId, reason: String },

    #[error("relationship {column} on card {card} references missing card {parent}")]
    UnresolvableParent {
        card: CardId,
        column: ColumnName,
        parent: CardId,
    },

    #[error("tree {tree} has {count} unresolvable ancestor references")]
    UnresolvedReferences { tree: TreeId, count: usize },

    #[error("config error: {message}")]
    Config { message: String },
}

/// Result type for application layer operations.
pub type ApplicationResult<T> = Result<T, ApplicationError>;
