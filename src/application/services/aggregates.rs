//! Aggregate-recompute enumeration
//!
//! Identifies which aggregate property definitions must be recomputed after
//! a card save; the recomputation itself is external.

use std::sync::Arc;

use itertools::Itertools;
use tracing::debug;

use crate::application::error::ApplicationResult;
use crate::domain::entities::{AggregateDef, Card, TreeConfiguration};
use crate::domain::ordering::TreeOrdering;
use crate::infrastructure::traits::{AggregateCatalog, CardStore};

/// One aggregate that must be recomputed for one card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingAggregate {
    pub card: Card,
    pub aggregate: AggregateDef,
}

/// Enumerates aggregates invalidated by a card change.
pub struct AggregateService {
    store: Arc<dyn CardStore>,
    catalog: Arc<dyn AggregateCatalog>,
}

impl AggregateService {
    pub fn new(store: Arc<dyn CardStore>, catalog: Arc<dyn AggregateCatalog>) -> Self {
        Self { store, catalog }
    }

    /// Aggregates to recompute for a saved card within one tree.
    ///
    /// Candidate nodes are the card plus every ancestor obtainable — by
    /// direct lookup of relationship values, without re-validating the
    /// hierarchy — from both the current and the previous version, so a card
    /// that moved out of a subtree still invalidates its old ancestors.
    /// Yields only aggregates anchored to the given tree configuration.
    pub fn aggregates_to_compute(
        &self,
        card: &Card,
        previous: Option<&Card>,
        config: &TreeConfiguration,
    ) -> ApplicationResult<Vec<PendingAggregate>> {
        let ordering = TreeOrdering::new(config)?;

        let ancestor_ids = ordering
            .parent_ids(card)
            .into_iter()
            .chain(
                previous
                    .map(|p| ordering.parent_ids(p))
                    .unwrap_or_default(),
            )
            .unique();

        let mut nodes = vec![card.clone()];
        for id in ancestor_ids {
            if id == card.id {
                continue;
            }
            match self.store.card(id)? {
                Some(ancestor) => nodes.push(ancestor),
                // A deleted ancestor has no aggregates left to invalidate.
                None => debug!(ancestor = %id, "ancestor no longer exists, skipping"),
            }
        }

        let mut pending = Vec::new();
        for node in nodes {
            for aggregate in self.catalog.aggregates_for(node.card_type) {
                if aggregate.belongs_to(config.id) {
                    pending.push(PendingAggregate {
                        card: node.clone(),
                        aggregate,
                    });
                }
            }
        }
        Ok(pending)
    }
}
