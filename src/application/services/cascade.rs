//! Cascading relationship updates
//!
//! When an edit sets a relationship at one level of a tree, the other levels
//! of the same tree must be derived in the same edit so the flat columns
//! never hold contradictory parent/child values.

use std::collections::BTreeMap;
use std::sync::Arc;

use itertools::Itertools;
use tracing::debug;

use crate::application::error::{ApplicationError, ApplicationResult};
use crate::domain::entities::{Card, CardId, RelationshipEdit, TreeConfiguration};
use crate::domain::ordering::TreeOrdering;
use crate::infrastructure::traits::CardStore;

/// Where a value in the derivation table came from.
///
/// A deeper-level clear is a weak default: a later, more specific edit may
/// override it. Explicit and chain-derived values are binding; disagreement
/// between them is a genuine conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    /// Set directly by one of the incoming edits.
    Explicit,
    /// Derived by walking upward the chain of a card that was set.
    Chain,
    /// Cleared because a shallower level was set (no descendants implied).
    Cleared,
}

/// Derives consistent relationship values across the levels of a tree.
pub struct CascadeService {
    store: Arc<dyn CardStore>,
}

impl CascadeService {
    pub fn new(store: Arc<dyn CardStore>) -> Self {
        Self { store }
    }

    /// Derive the full set of relationship values implied for one tree by a
    /// set of property edits against `card`.
    ///
    /// Setting level k to parent P clears every deeper level and derives
    /// every shallower level from P's own relationship chain. Setting level
    /// k to null clears deeper levels and leaves shallower ones untouched.
    /// Edits are processed in relationship declaration order; a
    /// contradictory derivation is a validation failure on the card, never
    /// silently dropped.
    ///
    /// Returns an empty vector when no edit touches this tree.
    pub fn derive_tree_edits(
        &self,
        config: &TreeConfiguration,
        card: &Card,
        edits: &[RelationshipEdit],
    ) -> ApplicationResult<Vec<RelationshipEdit>> {
        let ordering = TreeOrdering::new(config)?;
        let card_level = match ordering.level_of(card.card_type) {
            Some(level) => level,
            None => {
                debug!(card = %card.id, tree = %config.name, "card not in tree, no cascade");
                return Ok(Vec::new());
            }
        };

        // Edits touching this tree, in declaration (position) order.
        let touched: Vec<(usize, Option<CardId>)> = edits
            .iter()
            .filter_map(|edit| {
                config
                    .relationship_for_column(&edit.column)
                    .map(|r| (r.position, edit.value))
            })
            .sorted_by_key(|(position, _)| *position)
            .collect();
        if touched.is_empty() {
            return Ok(Vec::new());
        }

        let mut table: BTreeMap<usize, (Option<CardId>, Source)> = BTreeMap::new();

        for (position, value) in touched {
            if position >= card_level {
                return Err(ApplicationError::CascadeConflict {
                    tree: config.id,
                    reason: format!(
                        "relationship at level {} does not apply to a level-{} card",
                        position, card_level
                    ),
                });
            }

            self.set_explicit(config, &mut table, position, value)?;

            if let Some(parent_id) = value {
                let relationship = &config.relationships[position];
                let parent = self.store.card(parent_id)?.ok_or_else(|| {
                    ApplicationError::UnresolvableParent {
                        card: card.id,
                        column: relationship.column.clone(),
                        parent: parent_id,
                    }
                })?;
                if parent.card_type != relationship.valid_card_type {
                    return Err(ApplicationError::CascadeConflict {
                        tree: config.id,
                        reason: format!(
                            "card {} is a {}, not a valid parent for {}",
                            parent.id, parent.card_type, relationship.name
                        ),
                    });
                }

                // Walk upward the parent's own chain for shallower levels.
                for shallower in ordering.relationships_before(parent.card_type) {
                    self.set_chain(
                        config,
                        &mut table,
                        shallower.position,
                        parent.value_of(&shallower.column),
                    )?;
                }
            }

            // No descendants implied below the level that was set or cleared.
            for deeper in position + 1..card_level {
                table.entry(deeper).or_insert((None, Source::Cleared));
            }
        }

        Ok(table
            .into_iter()
            .map(|(position, (value, _))| RelationshipEdit {
                column: config.relationships[position].column.clone(),
                value,
            })
            .collect())
    }

    fn set_explicit(
        &self,
        config: &TreeConfiguration,
        table: &mut BTreeMap<usize, (Option<CardId>, Source)>,
        position: usize,
        value: Option<CardId>,
    ) -> ApplicationResult<()> {
        match table.get(&position) {
            Some((existing, Source::Explicit)) if *existing != value => {
                Err(ApplicationError::CascadeConflict {
                    tree: config.id,
                    reason: format!(
                        "edits disagree on {}: {:?} vs {:?}",
                        config.relationships[position].name, existing, value
                    ),
                })
            }
            // Overrides a weak clear from a shallower edit; its own upward
            // walk re-checks consistency against bound values.
            _ => {
                table.insert(position, (value, Source::Explicit));
                Ok(())
            }
        }
    }

    fn set_chain(
        &self,
        config: &TreeConfiguration,
        table: &mut BTreeMap<usize, (Option<CardId>, Source)>,
        position: usize,
        value: Option<CardId>,
    ) -> ApplicationResult<()> {
        match table.get(&position) {
            Some((existing, Source::Explicit | Source::Chain)) if *existing != value => {
                Err(ApplicationError::CascadeConflict {
                    tree: config.id,
                    reason: format!(
                        "relationship chains disagree on {}: {:?} vs {:?}",
                        config.relationships[position].name, existing, value
                    ),
                })
            }
            Some((_, Source::Explicit | Source::Chain)) => Ok(()),
            _ => {
                table.insert(position, (value, Source::Chain));
                Ok(())
            }
        }
    }
}
