//! cardtree: tree hierarchy engine
//!
//! Assembles, queries, and keeps consistent multi-level parent/child
//! hierarchies of cards. The storage model is flat — one relationship column
//! per tree level on every card row — and the engine reconstructs a rooted
//! tree over an arbitrarily filtered subset of cards, resolving each card's
//! nearest available ancestor when intermediate levels are excluded.
//!
//! Three components:
//! - relationship ordering ([`domain::TreeOrdering`]): the card-type
//!   sequence implied by a tree configuration and level-indexed lookups;
//! - tree assembly ([`domain::Tree`]): pure, per-request reconstruction of
//!   the hierarchy with partial/full child counts;
//! - consistency maintenance ([`application::ConsistencyService`]):
//!   change detection, cascading relationship updates, and
//!   aggregate-recompute enumeration, run inside the caller's write
//!   transaction.
//!
//! External collaborators (query layer, card store, structural repair,
//! aggregate catalog) sit behind the traits in [`infrastructure::traits`].

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod util;

pub use application::{
    ApplicationError, ApplicationResult, ConsistencyService, PendingAggregate, TreeService,
};
pub use config::Settings;
pub use domain::{
    Card, CardId, CardIndex, CardTypeId, ColumnName, DomainError, DomainResult, GroupedCounts,
    Relationship, RelationshipEdit, Tree, TreeConfiguration, TreeId, TreeOrdering,
};
pub use infrastructure::di::EngineContainer;
pub use infrastructure::{StoreError, StoreResult};
