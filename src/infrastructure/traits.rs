//! Boundary traits for external collaborators
//!
//! These traits abstract the query layer, the card store, structural repair,
//! and the aggregate catalog, allowing services to be tested with in-memory
//! implementations. No particular query language or storage backend is
//! assumed.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, RwLock};

use crate::domain::entities::{
    AggregateDef, Card, CardId, CardTypeId, ColumnName, Relationship, RelationshipEdit,
    TreeConfiguration,
};
use crate::infrastructure::error::{StoreError, StoreResult};

/// Scope of a grouped-count query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountScope {
    /// The unrestricted tree.
    Full,
    /// The active filtered candidate set.
    Candidates,
}

/// One grouped-count row: the combination of relationship-column values
/// (one slot per level, shallowest first) and the cards in that group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupRow {
    pub key: Vec<Option<CardId>>,
    pub count: u64,
}

/// Query layer supplying candidate card sets and grouped counts for tree
/// assembly. Black box.
pub trait TreeQueries: Send + Sync {
    /// Ordered card set for a scope; `Candidates` applies the active filter.
    fn cards(&self, config: &TreeConfiguration, scope: CountScope) -> StoreResult<Vec<Card>>;

    /// Grouped counts keyed by relationship-column-value combinations.
    fn grouped_counts(
        &self,
        config: &TreeConfiguration,
        scope: CountScope,
    ) -> StoreResult<Vec<GroupRow>>;
}

/// Card store boundary. Read access to relationship-column values and card
/// types; write access is used only by consistency maintenance to clear and
/// derive relationship values.
pub trait CardStore: Send + Sync {
    fn card(&self, id: CardId) -> StoreResult<Option<Card>>;

    /// Whether any card holds `value` in `column`.
    fn any_card_with_value(&self, column: &ColumnName, value: CardId) -> StoreResult<bool>;

    /// Persist derived relationship-column changes for a card, atomically
    /// with the triggering card update (caller's transaction).
    fn save_relationship_values(
        &self,
        card_id: CardId,
        changes: &[RelationshipEdit],
    ) -> StoreResult<()>;
}

/// Externally implemented structural repair operations, invoked but never
/// implemented by consistency maintenance.
pub trait StructuralRepair: Send + Sync {
    /// A relationship value changed; the tree's structure needs repair.
    fn mark_structure_changed(
        &self,
        config: &TreeConfiguration,
        card: &Card,
        relationship: &Relationship,
        old: Option<CardId>,
        new: Option<CardId>,
    ) -> StoreResult<()>;

    /// The card's new type no longer appears in the tree's level sequence.
    fn eject_card(&self, config: &TreeConfiguration, card: &Card) -> StoreResult<()>;
}

/// Aggregate property definitions, enumerable per card type.
pub trait AggregateCatalog: Send + Sync {
    fn aggregates_for(&self, card_type: CardTypeId) -> Vec<AggregateDef>;
}

// ---------------------------------------------------------------------------
// In-memory implementations, for in-process embedding and tests.
// ---------------------------------------------------------------------------

/// Card store over an in-memory map.
#[derive(Debug, Default)]
pub struct InMemoryCardStore {
    cards: RwLock<BTreeMap<CardId, Card>>,
}

impl InMemoryCardStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cards(cards: impl IntoIterator<Item = Card>) -> Self {
        let store = Self::new();
        for card in cards {
            store.insert(card);
        }
        store
    }

    pub fn insert(&self, card: Card) {
        self.cards.write().unwrap().insert(card.id, card);
    }

    /// Snapshot of all cards, in id order.
    pub fn all_cards(&self) -> Vec<Card> {
        self.cards.read().unwrap().values().cloned().collect()
    }
}

impl CardStore for InMemoryCardStore {
    fn card(&self, id: CardId) -> StoreResult<Option<Card>> {
        Ok(self.cards.read().unwrap().get(&id).cloned())
    }

    fn any_card_with_value(&self, column: &ColumnName, value: CardId) -> StoreResult<bool> {
        Ok(self
            .cards
            .read()
            .unwrap()
            .values()
            .any(|card| card.value_of(column) == Some(value)))
    }

    fn save_relationship_values(
        &self,
        card_id: CardId,
        changes: &[RelationshipEdit],
    ) -> StoreResult<()> {
        let mut cards = self.cards.write().unwrap();
        let card = cards
            .get_mut(&card_id)
            .ok_or(StoreError::CardNotFound(card_id))?;
        for change in changes {
            card.set_value(&change.column, change.value);
        }
        Ok(())
    }
}

/// Query layer over an [`InMemoryCardStore`], with an optional candidate
/// filter standing in for the external restriction criteria.
pub struct InMemoryQueries {
    store: Arc<InMemoryCardStore>,
    candidate_filter: Option<HashSet<CardId>>,
}

impl InMemoryQueries {
    pub fn new(store: Arc<InMemoryCardStore>) -> Self {
        Self {
            store,
            candidate_filter: None,
        }
    }

    /// Restrict the candidate scope to the given cards.
    pub fn with_candidate_filter(mut self, ids: impl IntoIterator<Item = CardId>) -> Self {
        self.candidate_filter = Some(ids.into_iter().collect());
        self
    }

    fn member_cards(&self, config: &TreeConfiguration, scope: CountScope) -> Vec<Card> {
        let tree_types: HashSet<CardTypeId> = config
            .relationships
            .iter()
            .map(|r| r.valid_card_type)
            .chain(config.leaf_card_types.iter().copied())
            .collect();
        self.store
            .all_cards()
            .into_iter()
            .filter(|card| tree_types.contains(&card.card_type))
            .filter(|card| match (scope, &self.candidate_filter) {
                (CountScope::Candidates, Some(filter)) => filter.contains(&card.id),
                _ => true,
            })
            .collect()
    }
}

impl TreeQueries for InMemoryQueries {
    fn cards(&self, config: &TreeConfiguration, scope: CountScope) -> StoreResult<Vec<Card>> {
        Ok(self.member_cards(config, scope))
    }

    fn grouped_counts(
        &self,
        config: &TreeConfiguration,
        scope: CountScope,
    ) -> StoreResult<Vec<GroupRow>> {
        let mut groups: HashMap<Vec<Option<CardId>>, u64> = HashMap::new();
        for card in self.member_cards(config, scope) {
            let key: Vec<Option<CardId>> = config
                .relationships
                .iter()
                .map(|r| card.value_of(&r.column))
                .collect();
            *groups.entry(key).or_insert(0) += 1;
        }
        Ok(groups
            .into_iter()
            .map(|(key, count)| GroupRow { key, count })
            .collect())
    }
}

/// A structural repair action observed by [`RecordingRepair`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepairAction {
    StructureChanged {
        tree: String,
        card: CardId,
        column: ColumnName,
        old: Option<CardId>,
        new: Option<CardId>,
    },
    Ejected {
        tree: String,
        card: CardId,
    },
}

/// Repair boundary that records invocations instead of repairing; the
/// default for in-process embedding where repair lives elsewhere.
#[derive(Debug, Default)]
pub struct RecordingRepair {
    actions: Mutex<Vec<RepairAction>>,
}

impl RecordingRepair {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn actions(&self) -> Vec<RepairAction> {
        self.actions.lock().unwrap().clone()
    }
}

impl StructuralRepair for RecordingRepair {
    fn mark_structure_changed(
        &self,
        config: &TreeConfiguration,
        card: &Card,
        relationship: &Relationship,
        old: Option<CardId>,
        new: Option<CardId>,
    ) -> StoreResult<()> {
        self.actions.lock().unwrap().push(RepairAction::StructureChanged {
            tree: config.name.clone(),
            card: card.id,
            column: relationship.column.clone(),
            old,
            new,
        });
        Ok(())
    }

    fn eject_card(&self, config: &TreeConfiguration, card: &Card) -> StoreResult<()> {
        self.actions.lock().unwrap().push(RepairAction::Ejected {
            tree: config.name.clone(),
            card: card.id,
        });
        Ok(())
    }
}

/// Aggregate catalog backed by a static list.
#[derive(Debug, Default)]
pub struct StaticAggregateCatalog {
    defs: Vec<AggregateDef>,
}

impl StaticAggregateCatalog {
    pub fn new(defs: Vec<AggregateDef>) -> Self {
        Self { defs }
    }
}

impl AggregateCatalog for StaticAggregateCatalog {
    fn aggregates_for(&self, card_type: CardTypeId) -> Vec<AggregateDef> {
        self.defs
            .iter()
            .filter(|def| def.card_type == card_type)
            .cloned()
            .collect()
    }
}
