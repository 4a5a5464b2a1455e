//! termtree conversion for assembled trees, for debug display and logging.

use generational_arena::Index;
use termtree::Tree as DisplayTree;

use crate::domain::assembler::Tree;

pub trait TreeConvert {
    fn to_tree_string(&self) -> DisplayTree<String>;
}

impl TreeConvert for Tree {
    fn to_tree_string(&self) -> DisplayTree<String> {
        fn label(tree: &Tree, idx: Index) -> String {
            let node = match tree.node(idx) {
                Some(node) => node,
                None => return "<missing>".to_string(),
            };
            format!(
                "{} ({}/{})",
                node.data.payload, node.data.partial_count, node.data.full_count
            )
        }

        fn build(tree: &Tree, idx: Index, parent: &mut DisplayTree<String>) {
            if let Some(node) = tree.node(idx) {
                for &child_idx in &node.children {
                    let mut child_tree = DisplayTree::new(label(tree, child_idx));
                    build(tree, child_idx, &mut child_tree);
                    parent.push(child_tree);
                }
            }
        }

        let root_idx = self.root();
        let mut display = DisplayTree::new(label(self, root_idx));
        build(self, root_idx, &mut display);
        display
    }
}
