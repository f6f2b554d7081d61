//! Process-scoped achievement registry.
//!
//! Holds the current [`CatalogSnapshot`] (achievements, dependency graph and
//! trigger index) behind an `Arc` swap. Readers clone the `Arc` and always see
//! a complete snapshot; [`AchievementRegistry::rebuild`] builds a new one from
//! storage and replaces it in a single write.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use podium_core::achievement::Achievement;
use podium_core::dependency_graph::DependencyGraph;
use podium_core::error::CoreError;
use podium_core::store::CatalogStore;
use podium_core::trigger_index::TriggerIndex;
use podium_core::types::DbId;

/// Immutable view of the catalog.
#[derive(Debug, Default)]
pub struct CatalogSnapshot {
    pub achievements: HashMap<DbId, Achievement>,
    pub graph: DependencyGraph,
    pub index: TriggerIndex,
}

impl CatalogSnapshot {
    /// Build a snapshot from stored rows. Stored edges that would close a
    /// cycle or name unknown achievements are skipped with an error log.
    pub fn build(
        achievements: Vec<Achievement>,
        edges: Vec<podium_core::achievement::AchievementDependency>,
    ) -> Self {
        let index = TriggerIndex::build(&achievements);
        let achievements: HashMap<DbId, Achievement> =
            achievements.into_iter().map(|a| (a.id, a)).collect();

        let mut graph = DependencyGraph::new();
        for edge in edges {
            if !achievements.contains_key(&edge.achievement_id)
                || !achievements.contains_key(&edge.prerequisite_id)
            {
                tracing::error!(
                    achievement_id = edge.achievement_id,
                    prerequisite_id = edge.prerequisite_id,
                    "Skipping dependency on unknown achievement"
                );
                continue;
            }
            if let Err(e) = graph.add_edge(edge) {
                tracing::error!(error = %e, "Skipping stored dependency");
            }
        }

        Self {
            achievements,
            graph,
            index,
        }
    }

    pub fn achievement(&self, id: DbId) -> Option<&Achievement> {
        self.achievements.get(&id)
    }

    pub fn by_key(&self, key: &str) -> Option<&Achievement> {
        self.achievements.values().find(|a| a.key == key)
    }

    /// Achievements ordered by id.
    pub fn sorted(&self) -> Vec<&Achievement> {
        let mut list: Vec<&Achievement> = self.achievements.values().collect();
        list.sort_by_key(|a| a.id);
        list
    }
}

/// Shared handle to the current catalog snapshot.
#[derive(Debug, Default)]
pub struct AchievementRegistry {
    current: RwLock<Arc<CatalogSnapshot>>,
    /// Serializes catalog mutations so a cycle check and its insert are not
    /// interleaved with another edit.
    edit_lock: tokio::sync::Mutex<()>,
}

impl AchievementRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The current snapshot.
    pub fn snapshot(&self) -> Arc<CatalogSnapshot> {
        match self.current.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Swap in a new snapshot.
    pub fn replace(&self, snapshot: CatalogSnapshot) -> Arc<CatalogSnapshot> {
        let snapshot = Arc::new(snapshot);
        match self.current.write() {
            Ok(mut guard) => *guard = snapshot.clone(),
            Err(poisoned) => *poisoned.into_inner() = snapshot.clone(),
        }
        snapshot
    }

    /// Reload achievements and edges from storage and swap the result in.
    pub async fn rebuild(&self, store: &dyn CatalogStore) -> Result<Arc<CatalogSnapshot>, CoreError> {
        let achievements = store.list_achievements().await?;
        let edges = store.list_dependencies().await?;
        let snapshot = self.replace(CatalogSnapshot::build(achievements, edges));
        tracing::info!(
            achievements = snapshot.achievements.len(),
            dependencies = snapshot.graph.edge_count(),
            triggers = snapshot.index.len(),
            "Achievement registry rebuilt"
        );
        Ok(snapshot)
    }

    /// Hold while mutating the catalog.
    pub async fn lock_edits(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.edit_lock.lock().await
    }
}
