//! Domain entities: cards, card types, tree configurations, relationships

use std::collections::BTreeMap;
use std::fmt;

/// Identifier of a card record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CardId(pub u64);

impl fmt::Display for CardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identifier of a card type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CardTypeId(pub u32);

impl fmt::Display for CardTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "type:{}", self.0)
    }
}

/// Identifier of a tree configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TreeId(pub u32);

impl fmt::Display for TreeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tree:{}", self.0)
    }
}

/// Storage column holding one relationship value on a card row.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ColumnName(pub String);

impl ColumnName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
}

impl fmt::Display for ColumnName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A unit of trackable work with a type and relationship values.
///
/// Relationship values are stored flat: one column per tree level. An absent
/// key means null (no parent at that level).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Card {
    pub id: CardId,
    pub number: u64,
    pub name: String,
    pub card_type: CardTypeId,
    pub relationship_values: BTreeMap<ColumnName, CardId>,
}

impl Card {
    pub fn new(id: CardId, number: u64, name: impl Into<String>, card_type: CardTypeId) -> Self {
        Self {
            id,
            number,
            name: name.into(),
            card_type,
            relationship_values: BTreeMap::new(),
        }
    }

    /// Builder-style helper to set a relationship column value.
    pub fn with_value(mut self, column: &ColumnName, value: CardId) -> Self {
        self.relationship_values.insert(column.clone(), value);
        self
    }

    /// Value stored in a relationship column, None when null.
    pub fn value_of(&self, column: &ColumnName) -> Option<CardId> {
        self.relationship_values.get(column).copied()
    }

    pub fn set_value(&mut self, column: &ColumnName, value: Option<CardId>) {
        match value {
            Some(id) => {
                self.relationship_values.insert(column.clone(), id);
            }
            None => {
                self.relationship_values.remove(column);
            }
        }
    }
}

/// A typed property whose value references a parent card, bound to one tree
/// level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub name: String,
    /// Level index within the owning tree configuration.
    pub position: usize,
    /// Column used to read/write the value on a card record.
    pub column: ColumnName,
    /// Card type of the parents this relationship references.
    pub valid_card_type: CardTypeId,
}

impl Relationship {
    pub fn new(
        name: impl Into<String>,
        position: usize,
        column: ColumnName,
        valid_card_type: CardTypeId,
    ) -> Self {
        Self {
            name: name.into(),
            position,
            column,
            valid_card_type,
        }
    }
}

/// Named definition of a hierarchy as an ordered list of relationships.
///
/// Read-only input: assumed pre-loaded and immutable for the duration of an
/// operation. The final level may admit several leaf card types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeConfiguration {
    pub id: TreeId,
    pub name: String,
    pub relationships: Vec<Relationship>,
    pub leaf_card_types: Vec<CardTypeId>,
}

impl TreeConfiguration {
    pub fn new(
        id: TreeId,
        name: impl Into<String>,
        relationships: Vec<Relationship>,
        leaf_card_types: Vec<CardTypeId>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            relationships,
            leaf_card_types,
        }
    }

    /// The relationship stored in a given column, if it belongs to this tree.
    pub fn relationship_for_column(&self, column: &ColumnName) -> Option<&Relationship> {
        self.relationships.iter().find(|r| &r.column == column)
    }
}

/// A computed property summarizing a node's descendants within one tree.
///
/// Only the identity and scoping live here; computation is external.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateDef {
    pub id: u32,
    pub name: String,
    /// Card type the aggregate is defined on.
    pub card_type: CardTypeId,
    /// Tree configuration the aggregate is anchored to.
    pub tree_id: TreeId,
}

impl AggregateDef {
    pub fn belongs_to(&self, tree: TreeId) -> bool {
        self.tree_id == tree
    }
}

/// One property edit against a card's relationship column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationshipEdit {
    pub column: ColumnName,
    /// New value; None clears the column.
    pub value: Option<CardId>,
}

impl RelationshipEdit {
    pub fn set(column: &ColumnName, value: CardId) -> Self {
        Self {
            column: column.clone(),
            value: Some(value),
        }
    }

    pub fn clear(column: &ColumnName) -> Self {
        Self {
            column: column.clone(),
            value: None,
        }
    }
}
