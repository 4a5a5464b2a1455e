//! Domain layer: entities and tree logic
//!
//! This layer is independent of external concerns (no I/O, no config
//! loading); assembly runs over snapshotted in-memory inputs only.

pub mod arena;
pub mod assembler;
pub mod entities;
pub mod error;
pub mod ordering;
pub mod render;

pub use arena::{NodeData, NodePayload, TreeArena, TreeNode};
pub use assembler::{CardIndex, GroupedCounts, Tree, UnresolvedRef};
pub use entities::{
    AggregateDef, Card, CardId, CardTypeId, ColumnName, Relationship, RelationshipEdit,
    TreeConfiguration, TreeId,
};
pub use error::{DomainError, DomainResult};
pub use ordering::TreeOrdering;
pub use render::TreeConvert;
