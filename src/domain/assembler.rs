//! Tree assembly: reconstructs a rooted hierarchy from a (possibly partial)
//! candidate set of cards and flat relationship-column values.
//!
//! Assembly is pure, synchronous computation over snapshotted inputs: the
//! candidate set, an optional full-scope card index for out-of-band ancestor
//! lookups, and two grouped-count results. No I/O happens here.

use std::collections::{HashMap, HashSet};

use generational_arena::Index;
use tracing::{debug, instrument, warn};

use crate::domain::arena::{NodeData, NodePayload, TreeArena, TreeIterator, TreeNode};
use crate::domain::entities::{Card, CardId, TreeConfiguration};
use crate::domain::error::{DomainError, DomainResult};
use crate::domain::ordering::TreeOrdering;

/// Ordered, id-addressable card set. Scan order is preserved and drives
/// sibling order in the assembled tree.
#[derive(Debug, Clone, Default)]
pub struct CardIndex {
    by_id: HashMap<CardId, Card>,
    order: Vec<CardId>,
}

impl CardIndex {
    pub fn from_cards(cards: impl IntoIterator<Item = Card>) -> DomainResult<Self> {
        let mut index = Self::default();
        for card in cards {
            let id = card.id;
            if index.by_id.insert(id, card).is_some() {
                return Err(DomainError::DuplicateCandidate(id));
            }
            index.order.push(id);
        }
        Ok(index)
    }

    pub fn get(&self, id: CardId) -> Option<&Card> {
        self.by_id.get(&id)
    }

    pub fn contains(&self, id: CardId) -> bool {
        self.by_id.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Card ids in scan order.
    pub fn ids(&self) -> &[CardId] {
        &self.order
    }
}

/// Grouped card counts keyed by relationship-column value combinations,
/// collapsed per level slot.
///
/// One result is built over the filtered candidate scope, another over the
/// unrestricted tree; nodes read their partial/full child counts from them.
#[derive(Debug, Clone, Default)]
pub struct GroupedCounts {
    per_level: HashMap<(usize, CardId), u64>,
    total: u64,
}

impl GroupedCounts {
    /// Build from grouped-count rows. Each row carries the combination of
    /// relationship-column values (one slot per level, shallowest first;
    /// trailing nulls may be omitted) and the number of cards in that group.
    pub fn from_rows(
        levels: usize,
        rows: impl IntoIterator<Item = (Vec<Option<CardId>>, u64)>,
    ) -> DomainResult<Self> {
        let mut counts = Self::default();
        for (key, count) in rows {
            if key.len() > levels {
                return Err(DomainError::MalformedCountRow {
                    expected: levels,
                    got: key.len(),
                });
            }
            for (level, slot) in key.iter().enumerate() {
                if let Some(id) = slot {
                    *counts.per_level.entry((level, *id)).or_insert(0) += count;
                }
            }
            counts.total += count;
        }
        Ok(counts)
    }

    /// Cards whose relationship value at `level` references `id`.
    pub fn count_for(&self, level: usize, id: CardId) -> u64 {
        self.per_level.get(&(level, id)).copied().unwrap_or(0)
    }

    /// All grouped cards; the Root's count.
    pub fn total(&self) -> u64 {
        self.total
    }
}

/// A relationship value that referenced a card found in neither the
/// candidate set nor the full-scope index (e.g. after a partial delete).
/// Recoverable degradation, observable by callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnresolvedRef {
    pub card: CardId,
    pub missing: CardId,
}

/// An assembled tree: arena nodes, its own Root, lookup maps, and the
/// unresolvable references observed during assembly.
///
/// Built lazily for one query/request and discarded afterwards; always
/// recomputed from flat relationship columns and the current candidate set.
#[derive(Debug)]
pub struct Tree {
    config: TreeConfiguration,
    arena: TreeArena,
    root_idx: Index,
    virtual_root: bool,
    nodes_by_card: HashMap<CardId, Index>,
    nodes_by_number: HashMap<u64, Index>,
    nodes_by_name: HashMap<String, Index>,
    unresolved: Vec<UnresolvedRef>,
}

impl Tree {
    /// Assemble a tree over the candidate set.
    ///
    /// `full_scope` is the unrestricted card index used to resolve ancestors
    /// that the filter excluded; pass the candidate cards again when the view
    /// is unfiltered.
    #[instrument(level = "debug", skip_all, fields(tree = %config.name, candidates = candidates.len()))]
    pub fn assemble(
        config: &TreeConfiguration,
        candidates: &CardIndex,
        full_scope: &CardIndex,
        partial_counts: &GroupedCounts,
        full_counts: &GroupedCounts,
    ) -> DomainResult<Self> {
        Assembler::new(config, candidates, full_scope, partial_counts, full_counts)?.build()
    }

    /// Discard all resolved state and rerun assembly against the current
    /// candidate set and counts.
    pub fn reload(
        &mut self,
        candidates: &CardIndex,
        full_scope: &CardIndex,
        partial_counts: &GroupedCounts,
        full_counts: &GroupedCounts,
    ) -> DomainResult<()> {
        *self = Self::assemble(
            &self.config,
            candidates,
            full_scope,
            partial_counts,
            full_counts,
        )?;
        Ok(())
    }

    pub fn config(&self) -> &TreeConfiguration {
        &self.config
    }

    pub fn root(&self) -> Index {
        self.root_idx
    }

    /// Whether the root is synthetic rather than an actual level-0 card.
    pub fn has_virtual_root(&self) -> bool {
        self.virtual_root
    }

    pub fn node(&self, idx: Index) -> Option<&TreeNode> {
        self.arena.get_node(idx)
    }

    /// Node wrapping the given card, if the card is in the tree.
    pub fn node_for_card(&self, id: CardId) -> Option<&TreeNode> {
        self.nodes_by_card
            .get(&id)
            .and_then(|idx| self.arena.get_node(*idx))
    }

    pub fn find_node_by_number(&self, number: u64) -> Option<&TreeNode> {
        self.nodes_by_number
            .get(&number)
            .and_then(|idx| self.arena.get_node(*idx))
    }

    pub fn find_node_by_name(&self, name: &str) -> Option<&TreeNode> {
        self.nodes_by_name
            .get(name)
            .and_then(|idx| self.arena.get_node(*idx))
    }

    /// Count of strictly shallower visible ancestors plus one; 0 for Root.
    pub fn card_level(&self, id: CardId) -> Option<usize> {
        self.nodes_by_card
            .get(&id)
            .map(|idx| self.arena.level_of(*idx))
    }

    /// Depth-first pre-order traversal, root included.
    pub fn iter(&self) -> TreeIterator<'_> {
        self.arena.iter()
    }

    /// Depth-first pre-order traversal over cards only (synthetic root
    /// excluded).
    pub fn iter_cards(&self) -> impl Iterator<Item = &Card> {
        self.arena.iter().filter_map(|(_, node)| node.data.payload.card())
    }

    pub fn card_count(&self) -> usize {
        self.nodes_by_card.len()
    }

    pub fn depth(&self) -> usize {
        self.arena.depth()
    }

    pub fn arena(&self) -> &TreeArena {
        &self.arena
    }

    /// Relationship values that resolved to no known card during assembly.
    pub fn unresolved_refs(&self) -> &[UnresolvedRef] {
        &self.unresolved
    }
}

/// Per-card resolution marker: a candidate starts pending and ends resolved;
/// cards absent from the map were never seen.
#[derive(Debug, Clone, Copy)]
enum ResolveState {
    Pending,
    Resolved(Index),
}

/// Working state for one assembly run.
///
/// Resolution replaces recursion with an explicit work-stack, and replaces
/// destructive iteration over a shared card set with the per-card marker
/// table: every card is resolved exactly once and memoized by id.
struct Assembler<'a> {
    ordering: TreeOrdering<'a>,
    candidates: &'a CardIndex,
    full_scope: &'a CardIndex,
    partial_counts: &'a GroupedCounts,
    full_counts: &'a GroupedCounts,
    arena: TreeArena,
    root_idx: Index,
    states: HashMap<CardId, ResolveState>,
    on_stack: HashSet<CardId>,
    scan_pos: HashMap<CardId, usize>,
    nodes_by_card: HashMap<CardId, Index>,
    nodes_by_number: HashMap<u64, Index>,
    nodes_by_name: HashMap<String, Index>,
    unresolved: Vec<UnresolvedRef>,
}

impl<'a> Assembler<'a> {
    fn new(
        config: &'a TreeConfiguration,
        candidates: &'a CardIndex,
        full_scope: &'a CardIndex,
        partial_counts: &'a GroupedCounts,
        full_counts: &'a GroupedCounts,
    ) -> DomainResult<Self> {
        let ordering = TreeOrdering::new(config)?;

        let mut arena = TreeArena::new();
        let root_idx = arena.insert_node(
            NodeData {
                payload: NodePayload::Root {
                    tree_name: config.name.clone(),
                },
                sibling_index: 0,
                partial_count: partial_counts.total(),
                full_count: full_counts.total(),
            },
            None,
        );

        let states = candidates
            .ids()
            .iter()
            .map(|id| (*id, ResolveState::Pending))
            .collect();
        let scan_pos = candidates
            .ids()
            .iter()
            .enumerate()
            .map(|(pos, id)| (*id, pos))
            .collect();

        Ok(Self {
            ordering,
            candidates,
            full_scope,
            partial_counts,
            full_counts,
            arena,
            root_idx,
            states,
            on_stack: HashSet::new(),
            scan_pos,
            nodes_by_card: HashMap::new(),
            nodes_by_number: HashMap::new(),
            nodes_by_name: HashMap::new(),
            unresolved: Vec::new(),
        })
    }

    fn build(mut self) -> DomainResult<Tree> {
        for &id in self.candidates.ids() {
            if matches!(self.states.get(&id), Some(ResolveState::Resolved(_))) {
                continue;
            }
            self.resolve(id)?;
        }

        // Promote the actual level-0 card to Root when it covers everything;
        // otherwise the synthetic Root stays (e.g. the filter excluded the
        // level-0 parents).
        let mut root_idx = self.root_idx;
        let mut virtual_root = true;
        if let Some(promoted) = self.promotable_root_child() {
            root_idx = self
                .arena
                .promote_single_child_root()
                .unwrap_or(self.root_idx);
            debug_assert_eq!(root_idx, promoted);
            virtual_root = false;
        }

        Ok(Tree {
            config: self.ordering.config().clone(),
            arena: self.arena,
            root_idx,
            virtual_root,
            nodes_by_card: self.nodes_by_card,
            nodes_by_number: self.nodes_by_number,
            nodes_by_name: self.nodes_by_name,
            unresolved: self.unresolved,
        })
    }

    fn promotable_root_child(&self) -> Option<Index> {
        let root = self.arena.get_node(self.root_idx)?;
        if root.children.len() != 1 {
            return None;
        }
        let child_idx = root.children[0];
        let child = self.arena.get_node(child_idx)?;
        let card = child.data.payload.card()?;
        match self.ordering.level_of(card.card_type) {
            Some(0) => Some(child_idx),
            _ => None,
        }
    }

    /// Resolve one card and every ancestor it needs, nearest first.
    fn resolve(&mut self, id: CardId) -> DomainResult<()> {
        let mut stack = vec![id];
        self.on_stack.insert(id);

        while let Some(&top) = stack.last() {
            if matches!(self.states.get(&top), Some(ResolveState::Resolved(_))) {
                stack.pop();
                self.on_stack.remove(&top);
                continue;
            }

            let card = self
                .candidates
                .get(top)
                .or_else(|| self.full_scope.get(top))
                .expect("only known cards are pushed onto the resolve stack");

            let parent_ids = self.ordering.parent_ids(card);
            let mut anchor: Option<Index> = None;
            let mut deferred = false;

            // Nearest ancestor first, falling back level by level.
            for &pid in parent_ids.iter().rev() {
                match self.states.get(&pid) {
                    Some(ResolveState::Resolved(idx)) => {
                        anchor = Some(*idx);
                        break;
                    }
                    Some(ResolveState::Pending) => {
                        if self.on_stack.contains(&pid) {
                            return Err(DomainError::CycleDetected(pid));
                        }
                        stack.push(pid);
                        self.on_stack.insert(pid);
                        deferred = true;
                        break;
                    }
                    None => {
                        if self.full_scope.contains(pid) {
                            // Ancestor outside the candidate set: resolve it
                            // out-of-band, exactly once.
                            self.states.insert(pid, ResolveState::Pending);
                            stack.push(pid);
                            self.on_stack.insert(pid);
                            deferred = true;
                            break;
                        }
                        // A deferred card re-scans its ancestors once its
                        // parent resolves; record each dangling ref once.
                        let dangling = UnresolvedRef {
                            card: top,
                            missing: pid,
                        };
                        if !self.unresolved.contains(&dangling) {
                            warn!(card = %top, missing = %pid, "relationship references unknown card");
                            self.unresolved.push(dangling);
                        }
                        // Fall through to the next-shallower ancestor id.
                    }
                }
            }

            if deferred {
                continue;
            }

            let parent_idx = anchor.unwrap_or(self.root_idx);
            let resolution = if self.candidates.contains(top) {
                let node_idx = self.insert_card_node(card.clone(), parent_idx);
                ResolveState::Resolved(node_idx)
            } else {
                // Out-of-band ancestor: no node of its own, it anchors its
                // descendants at its own nearest resolvable ancestor.
                debug!(card = %top, "ancestor outside candidate set, anchoring through it");
                ResolveState::Resolved(parent_idx)
            };
            self.states.insert(top, resolution);
            stack.pop();
            self.on_stack.remove(&top);
        }

        Ok(())
    }

    // Counts are keyed by the level whose column references this card.
    fn insert_card_node(&mut self, card: Card, parent_idx: Index) -> Index {
        let level = self.ordering.level_of(card.card_type);
        if level.is_none() {
            debug!(card = %card.id, card_type = %card.card_type,
                "card type not assigned to any tree level, attaching to root");
        }
        let (partial_count, full_count) = match level {
            Some(level) => (
                self.partial_counts.count_for(level, card.id),
                self.full_counts.count_for(level, card.id),
            ),
            None => (0, 0),
        };

        let id = card.id;
        let number = card.number;
        let name = card.name.clone();
        let sibling_index = self.scan_pos.get(&id).copied().unwrap_or(0);

        let node_idx = self.arena.insert_node(
            NodeData {
                payload: NodePayload::Card(card),
                sibling_index,
                partial_count,
                full_count,
            },
            Some(parent_idx),
        );
        self.nodes_by_card.insert(id, node_idx);
        self.nodes_by_number.entry(number).or_insert(node_idx);
        self.nodes_by_name.entry(name).or_insert(node_idx);
        node_idx
    }
}
