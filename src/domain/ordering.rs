//! Relationship ordering: the card-type sequence implied by a tree
//! configuration and level-indexed lookups over it.
//!
//! All lookups are O(depth) over the configuration-sized list; no I/O.

use std::collections::HashMap;

use crate::domain::entities::{Card, CardId, CardTypeId, Relationship, TreeConfiguration};
use crate::domain::error::{DomainError, DomainResult};

/// Level-indexed view over a tree configuration's relationships.
///
/// Construction validates the type mapping: a card type appearing at more
/// than one level (or both as a relationship type and a leaf type) is a
/// data-integrity defect upstream and fails fast.
#[derive(Debug)]
pub struct TreeOrdering<'a> {
    config: &'a TreeConfiguration,
    level_by_type: HashMap<CardTypeId, usize>,
}

impl<'a> TreeOrdering<'a> {
    pub fn new(config: &'a TreeConfiguration) -> DomainResult<Self> {
        let mut level_by_type = HashMap::new();
        for (level, relationship) in config.relationships.iter().enumerate() {
            if level_by_type
                .insert(relationship.valid_card_type, level)
                .is_some()
            {
                return Err(DomainError::AmbiguousTypeMapping(
                    relationship.valid_card_type,
                ));
            }
        }
        let leaf_level = config.relationships.len();
        for leaf_type in &config.leaf_card_types {
            if level_by_type.insert(*leaf_type, leaf_level).is_some() {
                return Err(DomainError::AmbiguousTypeMapping(*leaf_type));
            }
        }
        Ok(Self {
            config,
            level_by_type,
        })
    }

    pub fn config(&self) -> &TreeConfiguration {
        self.config
    }

    /// Level index of the leaf (final) level.
    pub fn leaf_level(&self) -> usize {
        self.config.relationships.len()
    }

    /// Ordered card types: one per relationship level plus the leaf types.
    /// Empty if no relationships exist.
    pub fn card_types(&self) -> Vec<CardTypeId> {
        if self.config.relationships.is_empty() {
            return Vec::new();
        }
        self.config
            .relationships
            .iter()
            .map(|r| r.valid_card_type)
            .chain(self.config.leaf_card_types.iter().copied())
            .collect()
    }

    /// Hierarchy level of a card type; None when the type is not in the tree.
    pub fn level_of(&self, card_type: CardTypeId) -> Option<usize> {
        self.level_by_type.get(&card_type).copied()
    }

    /// Whether cards of this type participate in the tree at all.
    pub fn contains_type(&self, card_type: CardTypeId) -> bool {
        self.level_by_type.contains_key(&card_type)
    }

    /// The relationship at a given level.
    pub fn relationship_at(&self, level: usize) -> Option<&Relationship> {
        self.config.relationships.get(level)
    }

    /// The relationship whose valid type equals `card_type`, or None (leaf
    /// types are referenced by no relationship).
    pub fn relationship_for_card_type(&self, card_type: CardTypeId) -> Option<&Relationship> {
        self.level_of(card_type)
            .and_then(|level| self.config.relationships.get(level))
    }

    /// The relationship one level shallower than `card_type`; None at the
    /// root level or for types outside the tree.
    pub fn relationship_to_parent(&self, card_type: CardTypeId) -> Option<&Relationship> {
        match self.level_of(card_type) {
            Some(level) if level > 0 => self.config.relationships.get(level - 1),
            _ => None,
        }
    }

    /// Ordered non-null relationship values found at levels shallower than
    /// the card's own level: ancestor candidates, furthest first / nearest
    /// last.
    pub fn parent_ids(&self, card: &Card) -> Vec<CardId> {
        let level = match self.level_of(card.card_type) {
            Some(level) => level,
            None => return Vec::new(),
        };
        self.config.relationships[..level]
            .iter()
            .filter_map(|r| card.value_of(&r.column))
            .collect()
    }

    /// Relationships strictly shallower than the type's level, in level
    /// order.
    pub fn relationships_before(
        &self,
        card_type: CardTypeId,
    ) -> impl Iterator<Item = &Relationship> {
        let level = self.level_of(card_type).unwrap_or(0);
        self.config.relationships[..level].iter()
    }

    /// Relationships strictly deeper than the type's level, in level order.
    pub fn relationships_after(
        &self,
        card_type: CardTypeId,
    ) -> impl Iterator<Item = &Relationship> {
        let start = match self.level_of(card_type) {
            Some(level) => (level + 1).min(self.config.relationships.len()),
            None => self.config.relationships.len(),
        };
        self.config.relationships[start..].iter()
    }
}
