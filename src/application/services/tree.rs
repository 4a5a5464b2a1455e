//! Tree building service
//!
//! Snapshots the candidate set and both grouped counts through the query
//! boundary, then hands off to pure assembly. Snapshotting happens once per
//! build; assembly itself performs no I/O.

use std::sync::Arc;

use tracing::{debug, instrument, warn};

use crate::application::error::{ApplicationError, ApplicationResult};
use crate::config::Settings;
use crate::domain::assembler::{CardIndex, GroupedCounts, Tree};
use crate::domain::entities::TreeConfiguration;
use crate::domain::render::TreeConvert;
use crate::infrastructure::traits::{CountScope, TreeQueries};

/// Builds trees from query-layer snapshots.
pub struct TreeService {
    settings: Arc<Settings>,
    queries: Arc<dyn TreeQueries>,
}

impl TreeService {
    pub fn new(settings: Arc<Settings>, queries: Arc<dyn TreeQueries>) -> Self {
        Self { settings, queries }
    }

    /// Snapshot the candidate cards and both grouped counts, then assemble.
    ///
    /// With `strict_unresolved` set, dangling ancestor references fail the
    /// build; otherwise they degrade (the node attaches higher) and stay
    /// observable via [`Tree::unresolved_refs`].
    #[instrument(level = "debug", skip_all, fields(tree = %config.name))]
    pub fn build_tree(&self, config: &TreeConfiguration) -> ApplicationResult<Tree> {
        let (candidates, full_scope, partial_counts, full_counts) = self.snapshot(config)?;

        let tree = Tree::assemble(config, &candidates, &full_scope, &partial_counts, &full_counts)?;

        if !tree.unresolved_refs().is_empty() {
            if self.settings.strict_unresolved {
                return Err(ApplicationError::UnresolvedReferences {
                    tree: config.id,
                    count: tree.unresolved_refs().len(),
                });
            }
            warn!(tree = %config.name, count = tree.unresolved_refs().len(),
                "assembled with unresolvable ancestor references");
        }

        debug!("assembled:\n{}", tree.to_tree_string());
        Ok(tree)
    }

    /// Re-snapshot and reassemble an existing tree in place.
    pub fn reload_tree(&self, tree: &mut Tree) -> ApplicationResult<()> {
        let config = tree.config().clone();
        let (candidates, full_scope, partial_counts, full_counts) = self.snapshot(&config)?;
        tree.reload(&candidates, &full_scope, &partial_counts, &full_counts)?;
        Ok(())
    }

    fn snapshot(
        &self,
        config: &TreeConfiguration,
    ) -> ApplicationResult<(CardIndex, CardIndex, GroupedCounts, GroupedCounts)> {
        let levels = config.relationships.len();

        let candidates =
            CardIndex::from_cards(self.queries.cards(config, CountScope::Candidates)?)?;
        let full_scope = CardIndex::from_cards(self.queries.cards(config, CountScope::Full)?)?;

        let partial_rows = self.queries.grouped_counts(config, CountScope::Candidates)?;
        let full_rows = self.queries.grouped_counts(config, CountScope::Full)?;
        let partial_counts =
            GroupedCounts::from_rows(levels, partial_rows.into_iter().map(|r| (r.key, r.count)))?;
        let full_counts =
            GroupedCounts::from_rows(levels, full_rows.into_iter().map(|r| (r.key, r.count)))?;

        Ok((candidates, full_scope, partial_counts, full_counts))
    }
}
