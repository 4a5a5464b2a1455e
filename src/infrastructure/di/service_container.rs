//! Service container for dependency injection
//!
//! Wires up all services with their dependencies.

use std::sync::Arc;

use crate::application::services::{ConsistencyService, TreeService};
use crate::config::Settings;
use crate::domain::entities::TreeConfiguration;
use crate::infrastructure::traits::{AggregateCatalog, CardStore, StructuralRepair, TreeQueries};

/// Container holding the engine's collaborators and settings.
///
/// Services are cheap to construct; the container hands out fresh instances
/// sharing the same boundary implementations.
pub struct EngineContainer {
    /// Engine settings
    pub settings: Arc<Settings>,

    /// Pre-loaded tree configurations, immutable per operation
    pub trees: Vec<TreeConfiguration>,

    /// Card store boundary
    pub store: Arc<dyn CardStore>,

    /// Query layer boundary
    pub queries: Arc<dyn TreeQueries>,

    /// Structural repair boundary
    pub repair: Arc<dyn StructuralRepair>,

    /// Aggregate catalog boundary
    pub catalog: Arc<dyn AggregateCatalog>,
}

impl EngineContainer {
    /// Create a container with custom dependencies (also used in tests).
    pub fn with_deps(
        settings: Settings,
        trees: Vec<TreeConfiguration>,
        store: Arc<dyn CardStore>,
        queries: Arc<dyn TreeQueries>,
        repair: Arc<dyn StructuralRepair>,
        catalog: Arc<dyn AggregateCatalog>,
    ) -> Self {
        Self {
            settings: Arc::new(settings),
            trees,
            store,
            queries,
            repair,
            catalog,
        }
    }

    pub fn tree_service(&self) -> TreeService {
        TreeService::new(self.settings.clone(), self.queries.clone())
    }

    pub fn consistency_service(&self) -> ConsistencyService {
        ConsistencyService::new(
            self.trees.clone(),
            self.store.clone(),
            self.repair.clone(),
            self.catalog.clone(),
        )
    }
}
