//! Tests for tree assembly

use std::collections::HashMap;

use cardtree::domain::{
    Card, CardId, CardIndex, CardTypeId, ColumnName, DomainError, GroupedCounts, Relationship,
    Tree, TreeConfiguration, TreeId,
};
use cardtree::util::testing::init_test_setup;

const RELEASE: CardTypeId = CardTypeId(10);
const ITERATION: CardTypeId = CardTypeId(20);
const STORY: CardTypeId = CardTypeId(30);

fn rel_release() -> ColumnName {
    ColumnName::new("rel_release")
}

fn rel_iteration() -> ColumnName {
    ColumnName::new("rel_iteration")
}

fn planning_tree() -> TreeConfiguration {
    TreeConfiguration::new(
        TreeId(1),
        "planning",
        vec![
            Relationship::new("release", 0, rel_release(), RELEASE),
            Relationship::new("iteration", 1, rel_iteration(), ITERATION),
        ],
        vec![STORY],
    )
}

/// Group cards by their relationship-column value combination, the way the
/// external query layer would.
fn counts_for(config: &TreeConfiguration, cards: &[Card]) -> GroupedCounts {
    let mut groups: HashMap<Vec<Option<CardId>>, u64> = HashMap::new();
    for card in cards {
        let key = config
            .relationships
            .iter()
            .map(|r| card.value_of(&r.column))
            .collect();
        *groups.entry(key).or_insert(0) += 1;
    }
    GroupedCounts::from_rows(config.relationships.len(), groups).unwrap()
}

fn assemble(config: &TreeConfiguration, candidates: Vec<Card>, full: Vec<Card>) -> Tree {
    let candidate_index = CardIndex::from_cards(candidates.clone()).unwrap();
    let full_index = CardIndex::from_cards(full.clone()).unwrap();
    Tree::assemble(
        config,
        &candidate_index,
        &full_index,
        &counts_for(config, &candidates),
        &counts_for(config, &full),
    )
    .unwrap()
}

fn release_card(id: u64, name: &str) -> Card {
    Card::new(CardId(id), id, name, RELEASE)
}

fn iteration_card(id: u64, name: &str, release: u64) -> Card {
    Card::new(CardId(id), id, name, ITERATION).with_value(&rel_release(), CardId(release))
}

fn story_card(id: u64, name: &str, release: u64, iteration: u64) -> Card {
    Card::new(CardId(id), id, name, STORY)
        .with_value(&rel_release(), CardId(release))
        .with_value(&rel_iteration(), CardId(iteration))
}

#[test]
fn given_full_candidate_set_when_assembling_then_level0_card_becomes_root() {
    // Arrange
    init_test_setup();
    let config = planning_tree();
    let cards = vec![
        release_card(1, "release one"),
        iteration_card(2, "sprint", 1),
        story_card(3, "login", 1, 2),
        story_card(4, "logout", 1, 2),
    ];

    // Act
    let tree = assemble(&config, cards.clone(), cards);

    // Assert
    assert!(!tree.has_virtual_root());
    let root = tree.node(tree.root()).unwrap();
    assert_eq!(root.data.payload.card_id(), Some(CardId(1)));
    assert_eq!(tree.card_count(), 4);
    assert_eq!(tree.depth(), 3);
}

#[test]
fn given_assembled_tree_when_asking_levels_then_each_hop_adds_one() {
    // Arrange
    let config = planning_tree();
    let cards = vec![
        release_card(1, "release one"),
        iteration_card(2, "sprint", 1),
        story_card(3, "login", 1, 2),
    ];

    // Act
    let tree = assemble(&config, cards.clone(), cards);

    // Assert
    assert_eq!(tree.card_level(CardId(1)), Some(0));
    assert_eq!(tree.card_level(CardId(2)), Some(1));
    assert_eq!(tree.card_level(CardId(3)), Some(2));
}

#[test]
fn given_excluded_middle_levels_when_assembling_then_deepest_available_ancestor_wins() {
    // Arrange: full hierarchy A -> B -> C, candidates exclude B
    let config = planning_tree();
    let full = vec![
        release_card(1, "a"),
        iteration_card(2, "b", 1),
        story_card(3, "c", 1, 2),
    ];
    let candidates = vec![full[0].clone(), full[2].clone()];

    // Act
    let tree = assemble(&config, candidates, full);

    // Assert: C is a direct child of A, B got no node
    assert_eq!(tree.card_count(), 2);
    assert!(tree.node_for_card(CardId(2)).is_none());
    let c = tree.node_for_card(CardId(3)).unwrap();
    let parent = tree.node(c.parent.unwrap()).unwrap();
    assert_eq!(parent.data.payload.card_id(), Some(CardId(1)));
    assert_eq!(tree.card_level(CardId(3)), Some(1));
}

#[test]
fn given_shared_out_of_band_ancestor_when_assembling_then_resolved_exactly_once() {
    // Arrange: two stories under the same excluded iteration
    let config = planning_tree();
    let full = vec![
        release_card(1, "a"),
        iteration_card(2, "b", 1),
        story_card(3, "c", 1, 2),
        story_card(4, "d", 1, 2),
    ];
    let candidates = vec![full[0].clone(), full[2].clone(), full[3].clone()];

    // Act
    let tree = assemble(&config, candidates, full);

    // Assert: both stories anchor at the release
    for id in [CardId(3), CardId(4)] {
        let node = tree.node_for_card(id).unwrap();
        let parent = tree.node(node.parent.unwrap()).unwrap();
        assert_eq!(parent.data.payload.card_id(), Some(CardId(1)));
    }
    assert!(tree.unresolved_refs().is_empty());
}

#[test]
fn given_filtered_scope_when_assembling_then_partial_and_full_counts_differ() {
    // Arrange: two stories share an iteration, the filter hides one story
    let config = planning_tree();
    let full = vec![
        release_card(1, "release one"),
        iteration_card(2, "sprint", 1),
        story_card(3, "login", 1, 2),
        story_card(4, "logout", 1, 2),
    ];
    let candidates = vec![full[0].clone(), full[1].clone(), full[2].clone()];

    // Act
    let tree = assemble(&config, candidates, full);

    // Assert
    let iteration = tree.node_for_card(CardId(2)).unwrap();
    assert_eq!(iteration.data.partial_count, 1);
    assert_eq!(iteration.data.full_count, 2);
    let release = tree.node_for_card(CardId(1)).unwrap();
    assert_eq!(release.data.partial_count, 2);
    assert_eq!(release.data.full_count, 3);
}

#[test]
fn given_no_level0_candidate_when_assembling_then_virtual_root_stays() {
    // Arrange: the filter excludes the release
    let config = planning_tree();
    let full = vec![
        release_card(1, "release one"),
        iteration_card(2, "sprint", 1),
        story_card(3, "login", 1, 2),
    ];
    let candidates = vec![full[1].clone(), full[2].clone()];

    // Act
    let tree = assemble(&config, candidates, full);

    // Assert: iteration hangs off the synthetic root, story below it
    assert!(tree.has_virtual_root());
    let root = tree.node(tree.root()).unwrap();
    assert_eq!(root.children.len(), 1);
    assert_eq!(tree.card_level(CardId(2)), Some(1));
    assert_eq!(tree.card_level(CardId(3)), Some(2));
}

#[test]
fn given_identical_inputs_when_reloading_then_tree_is_structurally_identical() {
    // Arrange
    let config = planning_tree();
    let cards = vec![
        release_card(1, "release one"),
        iteration_card(2, "sprint", 1),
        story_card(3, "login", 1, 2),
        story_card(4, "logout", 1, 2),
    ];
    let candidate_index = CardIndex::from_cards(cards.clone()).unwrap();
    let counts = counts_for(&config, &cards);
    let mut tree =
        Tree::assemble(&config, &candidate_index, &candidate_index, &counts, &counts).unwrap();

    let edges_of = |tree: &Tree| -> Vec<(Option<CardId>, Option<CardId>, u64, u64)> {
        tree.iter()
            .map(|(idx, node)| {
                let parent = node
                    .parent
                    .and_then(|p| tree.node(p))
                    .and_then(|p| p.data.payload.card_id());
                (
                    node.data.payload.card_id(),
                    parent,
                    node.data.partial_count,
                    node.data.full_count,
                )
            })
            .collect()
    };
    let before = edges_of(&tree);

    // Act
    tree.reload(&candidate_index, &candidate_index, &counts, &counts)
        .unwrap();

    // Assert: same edges, same counts
    assert_eq!(edges_of(&tree), before);
}

#[test]
fn given_mutually_referencing_cards_when_assembling_then_cycle_detected() {
    // Arrange: malformed data, each card names the other as ancestor
    let config = planning_tree();
    let x = Card::new(CardId(1), 1, "x", ITERATION).with_value(&rel_release(), CardId(2));
    let y = Card::new(CardId(2), 2, "y", STORY)
        .with_value(&rel_release(), CardId(99))
        .with_value(&rel_iteration(), CardId(1));
    let cards = vec![x, y];
    let index = CardIndex::from_cards(cards.clone()).unwrap();
    let counts = counts_for(&config, &cards);

    // Act
    let result = Tree::assemble(&config, &index, &index, &counts, &counts);

    // Assert
    assert!(matches!(result, Err(DomainError::CycleDetected(_))));
}

#[test]
fn given_dangling_relationship_value_when_assembling_then_degrades_and_records() {
    // Arrange: the iteration reference points at a deleted card
    let config = planning_tree();
    let cards = vec![
        release_card(1, "release one"),
        story_card(3, "login", 1, 99),
    ];

    // Act
    let tree = assemble(&config, cards.clone(), cards);

    // Assert: story attaches to the release, the dangling ref is observable
    let story = tree.node_for_card(CardId(3)).unwrap();
    let parent = tree.node(story.parent.unwrap()).unwrap();
    assert_eq!(parent.data.payload.card_id(), Some(CardId(1)));
    assert_eq!(tree.unresolved_refs().len(), 1);
    assert_eq!(tree.unresolved_refs()[0].missing, CardId(99));
}

#[test]
fn given_card_type_outside_tree_when_assembling_then_attaches_to_root() {
    // Arrange
    let config = planning_tree();
    let cards = vec![
        release_card(1, "release one"),
        Card::new(CardId(5), 5, "stray", CardTypeId(99)),
    ];

    // Act
    let tree = assemble(&config, cards.clone(), cards);

    // Assert: two root children means the synthetic root stays
    assert!(tree.has_virtual_root());
    let stray = tree.node_for_card(CardId(5)).unwrap();
    assert_eq!(stray.parent, Some(tree.root()));
}

#[test]
fn given_candidate_scan_order_when_assembling_then_sibling_order_preserved() {
    // Arrange
    let config = planning_tree();
    // Stories sit directly under the release; numbers descend on purpose
    let cards = vec![
        release_card(1, "release one"),
        Card::new(CardId(4), 4, "zulu", STORY).with_value(&rel_release(), CardId(1)),
        Card::new(CardId(3), 3, "alpha", STORY).with_value(&rel_release(), CardId(1)),
    ];

    // Act
    let tree = assemble(&config, cards.clone(), cards);

    // Assert: children in scan order, not re-sorted by number or name
    let root = tree.node(tree.root()).unwrap();
    let names: Vec<_> = root
        .children
        .iter()
        .map(|&idx| tree.node(idx).unwrap().data.payload.to_string())
        .collect();
    assert_eq!(names, vec!["#4 zulu", "#3 alpha"]);
}

#[test]
fn given_assembled_tree_when_looking_up_by_name_or_number_then_node_found() {
    // Arrange
    let config = planning_tree();
    let cards = vec![
        release_card(1, "release one"),
        iteration_card(2, "sprint", 1),
    ];

    // Act
    let tree = assemble(&config, cards.clone(), cards);

    // Assert
    assert_eq!(
        tree.find_node_by_name("sprint")
            .and_then(|n| n.data.payload.card_id()),
        Some(CardId(2))
    );
    assert_eq!(
        tree.find_node_by_number(1)
            .and_then(|n| n.data.payload.card_id()),
        Some(CardId(1))
    );
    assert!(tree.find_node_by_name("missing").is_none());
}

#[test]
fn given_ambiguous_type_mapping_when_assembling_then_fatal_config_error() {
    // Arrange: leaf type collides with a relationship type
    let config = TreeConfiguration::new(
        TreeId(2),
        "broken",
        vec![Relationship::new("release", 0, rel_release(), RELEASE)],
        vec![RELEASE],
    );
    let index = CardIndex::from_cards(vec![]).unwrap();
    let counts = GroupedCounts::from_rows(1, vec![]).unwrap();

    // Act
    let result = Tree::assemble(&config, &index, &index, &counts, &counts);

    // Assert
    assert!(matches!(
        result,
        Err(DomainError::AmbiguousTypeMapping(_))
    ));
}

#[test]
fn given_empty_candidate_set_when_assembling_then_root_only() {
    // Arrange
    let config = planning_tree();

    // Act
    let tree = assemble(&config, vec![], vec![]);

    // Assert
    assert!(tree.has_virtual_root());
    assert_eq!(tree.card_count(), 0);
    assert_eq!(tree.depth(), 1);
    assert_eq!(tree.iter_cards().count(), 0);
}
