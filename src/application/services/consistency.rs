//! Consistency maintenance
//!
//! Reacts to card-level events: relationship-value changes, card-type
//! changes, and relationship edits. Runs inside the caller's write
//! transaction; derived values and repair markers are computed so they can
//! be persisted atomically with the triggering card update.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, instrument};

use crate::application::error::{ApplicationError, ApplicationResult};
use crate::application::services::aggregates::{AggregateService, PendingAggregate};
use crate::application::services::cascade::CascadeService;
use crate::domain::entities::{Card, CardId, ColumnName, RelationshipEdit, TreeConfiguration};
use crate::domain::ordering::TreeOrdering;
use crate::infrastructure::traits::{AggregateCatalog, CardStore, StructuralRepair};

/// Watches card saves and keeps every configured tree consistent.
///
/// Holds the pre-loaded tree-configuration catalog, immutable for the
/// duration of an operation.
pub struct ConsistencyService {
    trees: Vec<TreeConfiguration>,
    store: Arc<dyn CardStore>,
    repair: Arc<dyn StructuralRepair>,
    cascade: CascadeService,
    aggregates: AggregateService,
}

impl ConsistencyService {
    pub fn new(
        trees: Vec<TreeConfiguration>,
        store: Arc<dyn CardStore>,
        repair: Arc<dyn StructuralRepair>,
        catalog: Arc<dyn AggregateCatalog>,
    ) -> Self {
        let cascade = CascadeService::new(store.clone());
        let aggregates = AggregateService::new(store.clone(), catalog);
        Self {
            trees,
            store,
            repair,
            cascade,
            aggregates,
        }
    }

    pub fn trees(&self) -> &[TreeConfiguration] {
        &self.trees
    }

    /// A card was saved; detect relationship-value changes per tree.
    ///
    /// For every tree whose relationship set includes a changed column, the
    /// tree's structure is marked for external repair and the aggregates of
    /// the affected node and its current and previous ancestors are
    /// collected for recomputation.
    #[instrument(level = "debug", skip_all, fields(card = %card.id))]
    pub fn relationship_values_changed(
        &self,
        card: &Card,
        previous: &Card,
    ) -> ApplicationResult<Vec<PendingAggregate>> {
        let mut pending = Vec::new();
        for config in &self.trees {
            let mut tree_changed = false;
            for relationship in &config.relationships {
                let old = previous.value_of(&relationship.column);
                let new = card.value_of(&relationship.column);
                if old != new {
                    debug!(tree = %config.name, column = %relationship.column,
                        "relationship value changed");
                    self.repair
                        .mark_structure_changed(config, card, relationship, old, new)?;
                    tree_changed = true;
                }
            }
            if tree_changed {
                pending.extend(
                    self.aggregates
                        .aggregates_to_compute(card, Some(previous), config)?,
                );
            }
        }
        Ok(pending)
    }

    /// A card's type changed; eject it from every tree whose level sequence
    /// no longer admits the new type, once per affected tree.
    #[instrument(level = "debug", skip_all, fields(card = %card.id))]
    pub fn card_type_changed(&self, card: &Card, previous: &Card) -> ApplicationResult<()> {
        if card.card_type == previous.card_type {
            return Ok(());
        }
        for config in &self.trees {
            let ordering = TreeOrdering::new(config)?;
            if ordering.contains_type(previous.card_type) && !ordering.contains_type(card.card_type)
            {
                debug!(tree = %config.name, "type left the tree, ejecting card");
                self.repair.eject_card(config, card)?;
            }
        }
        Ok(())
    }

    /// Whether the card can acquire children under this tree: tree
    /// membership, and the card's type not being the tree's leaf type.
    pub fn can_have_children(
        &self,
        config: &TreeConfiguration,
        card: &Card,
    ) -> ApplicationResult<bool> {
        let ordering = TreeOrdering::new(config)?;
        Ok(ordering
            .level_of(card.card_type)
            .is_some_and(|level| level < ordering.leaf_level()))
    }

    /// Whether any card's relationship value at this card's own level equals
    /// the card's id.
    pub fn has_children(&self, config: &TreeConfiguration, card: &Card) -> ApplicationResult<bool> {
        let ordering = TreeOrdering::new(config)?;
        match ordering.relationship_for_card_type(card.card_type) {
            Some(relationship) => Ok(self
                .store
                .any_card_with_value(&relationship.column, card.id)?),
            None => Ok(false),
        }
    }

    /// Apply a set of relationship edits to a card: cascade each touched
    /// tree, inject the derived values, persist the changed columns, and
    /// return the updated card.
    #[instrument(level = "debug", skip_all, fields(card = %card.id))]
    pub fn apply_relationship_edits(
        &self,
        card: &Card,
        edits: &[RelationshipEdit],
    ) -> ApplicationResult<Card> {
        let mut merged: BTreeMap<ColumnName, Option<CardId>> = BTreeMap::new();

        // Columns not governed by any tree pass through unchanged.
        for edit in edits {
            let governed = self
                .trees
                .iter()
                .any(|config| config.relationship_for_column(&edit.column).is_some());
            if !governed {
                merged.insert(edit.column.clone(), edit.value);
            }
        }

        for config in &self.trees {
            for derived in self.cascade.derive_tree_edits(config, card, edits)? {
                if let Some(existing) = merged.get(&derived.column) {
                    if *existing != derived.value {
                        return Err(ApplicationError::CascadeConflict {
                            tree: config.id,
                            reason: format!(
                                "trees disagree on {}: {:?} vs {:?}",
                                derived.column, existing, derived.value
                            ),
                        });
                    }
                }
                merged.insert(derived.column, derived.value);
            }
        }

        let mut updated = card.clone();
        let mut changes = Vec::new();
        for (column, value) in merged {
            if card.value_of(&column) != value {
                updated.set_value(&column, value);
                changes.push(RelationshipEdit { column, value });
            }
        }

        if !changes.is_empty() {
            self.store.save_relationship_values(card.id, &changes)?;
        }
        Ok(updated)
    }
}
