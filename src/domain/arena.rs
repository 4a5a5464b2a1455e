//! Arena-backed tree nodes for assembled card hierarchies.

use generational_arena::{Arena, Index};
use std::fmt;
use tracing::instrument;

use crate::domain::entities::{Card, CardId};

/// What a node wraps: the synthetic Root or an actual card.
#[derive(Debug, Clone)]
pub enum NodePayload {
    /// Synthetic root, named after the tree configuration.
    Root { tree_name: String },
    Card(Card),
}

impl NodePayload {
    pub fn card(&self) -> Option<&Card> {
        match self {
            NodePayload::Card(card) => Some(card),
            NodePayload::Root { .. } => None,
        }
    }

    pub fn card_id(&self) -> Option<CardId> {
        self.card().map(|c| c.id)
    }
}

impl fmt::Display for NodePayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodePayload::Root { tree_name } => write!(f, "{}", tree_name),
            NodePayload::Card(card) => write!(f, "{} {}", card.id, card.name),
        }
    }
}

/// Data payload for tree nodes.
///
/// Child counts are derived values read from grouped-count query results,
/// never authoritative.
#[derive(Debug, Clone)]
pub struct NodeData {
    pub payload: NodePayload,
    /// Scan-order index of the card in the candidate set; 0 for Root.
    pub sibling_index: usize,
    /// Cards below this node within the active filtered query.
    pub partial_count: u64,
    /// Cards below this node across the entire tree, regardless of filter.
    pub full_count: u64,
}

/// Tree node in the arena-based hierarchy structure.
#[derive(Debug)]
pub struct TreeNode {
    pub data: NodeData,
    /// Index of parent node in the arena, None for the root node.
    pub parent: Option<Index>,
    /// Indices of child nodes, in attach order.
    pub children: Vec<Index>,
}

/// Arena-based tree structure for efficient hierarchy management.
///
/// Uses generational arena for memory-safe node references and O(1) lookups.
/// Each arena holds one assembled tree; no node has more than one parent.
#[derive(Debug, Default)]
pub struct TreeArena {
    arena: Arena<TreeNode>,
    root: Option<Index>,
}

impl TreeArena {
    pub fn new() -> Self {
        Self {
            arena: Arena::new(),
            root: None,
        }
    }

    #[instrument(level = "trace", skip(self, data))]
    pub fn insert_node(&mut self, data: NodeData, parent: Option<Index>) -> Index {
        let node = TreeNode {
            data,
            parent,
            children: Vec::new(),
        };
        let node_idx = self.arena.insert(node);

        if let Some(parent_idx) = parent {
            if let Some(parent) = self.arena.get_mut(parent_idx) {
                parent.children.push(node_idx);
            }
        } else {
            self.root = Some(node_idx);
        }

        node_idx
    }

    pub fn get_node(&self, idx: Index) -> Option<&TreeNode> {
        self.arena.get(idx)
    }

    pub fn get_node_mut(&mut self, idx: Index) -> Option<&mut TreeNode> {
        self.arena.get_mut(idx)
    }

    pub fn root(&self) -> Option<Index> {
        self.root
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    /// Replace the root with its sole child, dropping the old root node.
    ///
    /// Used when the synthetic root turns out to be covered by the actual
    /// level-0 card. No-op unless the root has exactly one child.
    pub fn promote_single_child_root(&mut self) -> Option<Index> {
        let root_idx = self.root?;
        let child_idx = {
            let root = self.arena.get(root_idx)?;
            if root.children.len() != 1 {
                return None;
            }
            root.children[0]
        };
        if let Some(child) = self.arena.get_mut(child_idx) {
            child.parent = None;
        }
        let _ = self.arena.remove(root_idx);
        self.root = Some(child_idx);
        Some(child_idx)
    }

    /// Number of strictly shallower ancestors plus one; 0 for the root.
    pub fn level_of(&self, idx: Index) -> usize {
        let mut level = 0;
        let mut current = idx;
        while let Some(parent_idx) = self.arena.get(current).and_then(|n| n.parent) {
            level += 1;
            current = parent_idx;
        }
        level
    }

    /// Depth-first pre-order traversal, root included.
    pub fn iter(&self) -> TreeIterator<'_> {
        TreeIterator::new(self)
    }

    #[instrument(level = "debug", skip(self))]
    pub fn depth(&self) -> usize {
        self.iter()
            .map(|(idx, _)| self.level_of(idx) + 1)
            .max()
            .unwrap_or(0)
    }
}

/// Pre-order iterator over the arena, children in attach order.
pub struct TreeIterator<'a> {
    arena: &'a TreeArena,
    stack: Vec<Index>,
}

impl<'a> TreeIterator<'a> {
    fn new(arena: &'a TreeArena) -> Self {
        let mut stack = Vec::new();
        if let Some(root) = arena.root() {
            stack.push(root);
        }
        Self { arena, stack }
    }
}

impl<'a> Iterator for TreeIterator<'a> {
    type Item = (Index, &'a TreeNode);

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(current_idx) = self.stack.pop() {
            if let Some(node) = self.arena.get_node(current_idx) {
                // Push children in reverse order for left-to-right traversal
                for &child in node.children.iter().rev() {
                    self.stack.push(child);
                }
                return Some((current_idx, node));
            }
        }
        None
    }
}
