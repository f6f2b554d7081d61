//! Prerequisite graph between achievements.
//!
//! Edges point from a dependent achievement to its prerequisite. The graph
//! never contains a cycle: [`DependencyGraph::add_edge`] refuses any edge
//! whose prerequisite can already reach the dependent.

use std::collections::{HashMap, HashSet, VecDeque};

use serde::Serialize;

use crate::achievement::{AchievementDependency, DependencyKind};
use crate::error::CoreError;
use crate::types::DbId;

/// In-memory adjacency sets, indexed both ways.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    /// achievement -> edges naming its prerequisites
    prerequisites: HashMap<DbId, HashSet<AchievementDependency>>,
    /// prerequisite -> edges naming its dependents
    dependents: HashMap<DbId, HashSet<AchievementDependency>>,
}

/// One node of a player's dependency tree, rooted at an achievement and
/// expanding through its prerequisites.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependencyNode {
    pub achievement_id: DbId,
    /// Kind of the edge leading to this node; `None` for the root.
    pub kind: Option<DependencyKind>,
    pub achieved: bool,
    pub prerequisites: Vec<DependencyNode>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from stored edges, rejecting the first edge that would
    /// close a cycle.
    pub fn from_edges(
        edges: impl IntoIterator<Item = AchievementDependency>,
    ) -> Result<Self, CoreError> {
        let mut graph = Self::new();
        for edge in edges {
            graph.add_edge(edge)?;
        }
        Ok(graph)
    }

    /// Whether `prerequisite_id` already depends, directly or transitively,
    /// on `achievement_id` (or is the same achievement).
    pub fn would_create_cycle(&self, achievement_id: DbId, prerequisite_id: DbId) -> bool {
        if achievement_id == prerequisite_id {
            return true;
        }

        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([prerequisite_id]);
        while let Some(current) = queue.pop_front() {
            if !seen.insert(current) {
                continue;
            }
            for edge in self.prerequisites.get(&current).into_iter().flatten() {
                if edge.prerequisite_id == achievement_id {
                    return true;
                }
                queue.push_back(edge.prerequisite_id);
            }
        }
        false
    }

    /// Insert an edge.
    ///
    /// Returns `Ok(false)` if the identical edge already exists and
    /// [`CoreError::Cycle`] if it would close a cycle.
    pub fn add_edge(&mut self, edge: AchievementDependency) -> Result<bool, CoreError> {
        if self.contains(&edge) {
            return Ok(false);
        }
        if self.would_create_cycle(edge.achievement_id, edge.prerequisite_id) {
            return Err(CoreError::Cycle {
                achievement_id: edge.achievement_id,
                prerequisite_id: edge.prerequisite_id,
            });
        }
        self.prerequisites
            .entry(edge.achievement_id)
            .or_default()
            .insert(edge);
        self.dependents
            .entry(edge.prerequisite_id)
            .or_default()
            .insert(edge);
        Ok(true)
    }

    /// Remove an edge. Returns whether it was present.
    pub fn remove_edge(&mut self, edge: &AchievementDependency) -> bool {
        let removed = self
            .prerequisites
            .get_mut(&edge.achievement_id)
            .is_some_and(|set| set.remove(edge));
        if removed {
            if let Some(set) = self.dependents.get_mut(&edge.prerequisite_id) {
                set.remove(edge);
            }
        }
        removed
    }

    /// Drop every edge touching `achievement_id`.
    pub fn remove_achievement(&mut self, achievement_id: DbId) {
        let touching: Vec<AchievementDependency> = self
            .prerequisites
            .get(&achievement_id)
            .into_iter()
            .chain(self.dependents.get(&achievement_id))
            .flatten()
            .copied()
            .collect();
        for edge in touching {
            self.remove_edge(&edge);
        }
    }

    pub fn contains(&self, edge: &AchievementDependency) -> bool {
        self.prerequisites
            .get(&edge.achievement_id)
            .is_some_and(|set| set.contains(edge))
    }

    /// Prerequisite edges of `achievement_id`, optionally filtered by kind.
    pub fn prerequisites_of(
        &self,
        achievement_id: DbId,
        kind: Option<DependencyKind>,
    ) -> HashSet<AchievementDependency> {
        self.prerequisites
            .get(&achievement_id)
            .into_iter()
            .flatten()
            .filter(|edge| kind.map_or(true, |k| edge.kind == k))
            .copied()
            .collect()
    }

    /// Edges whose prerequisite is `prerequisite_id`.
    pub fn dependents_of(&self, prerequisite_id: DbId) -> HashSet<AchievementDependency> {
        self.dependents
            .get(&prerequisite_id)
            .cloned()
            .unwrap_or_default()
    }

    /// True iff every REQUIRED prerequisite is in `achieved`.
    pub fn is_eligible(&self, achievement_id: DbId, achieved: &HashSet<DbId>) -> bool {
        self.prerequisites
            .get(&achievement_id)
            .into_iter()
            .flatten()
            .filter(|edge| edge.kind == DependencyKind::Required)
            .all(|edge| achieved.contains(&edge.prerequisite_id))
    }

    /// True when there are no UNLOCKS edges, or at least one UNLOCKS
    /// prerequisite is in `achieved`.
    pub fn is_visible(&self, achievement_id: DbId, achieved: &HashSet<DbId>) -> bool {
        let mut unlocks = self
            .prerequisites
            .get(&achievement_id)
            .into_iter()
            .flatten()
            .filter(|edge| edge.kind == DependencyKind::Unlocks)
            .peekable();
        if unlocks.peek().is_none() {
            return true;
        }
        unlocks.any(|edge| achieved.contains(&edge.prerequisite_id))
    }

    /// All edges, sorted for stable output.
    pub fn edges(&self) -> Vec<AchievementDependency> {
        let mut edges: Vec<_> = self.prerequisites.values().flatten().copied().collect();
        edges.sort();
        edges
    }

    pub fn edge_count(&self) -> usize {
        self.prerequisites.values().map(HashSet::len).sum()
    }

    /// Expand `root` through its prerequisites for display.
    ///
    /// Children are sorted by achievement id. The graph is acyclic, but a
    /// shared prerequisite may appear under several parents.
    pub fn tree(&self, root: DbId, achieved: &HashSet<DbId>) -> DependencyNode {
        self.subtree(root, None, achieved)
    }

    fn subtree(
        &self,
        achievement_id: DbId,
        kind: Option<DependencyKind>,
        achieved: &HashSet<DbId>,
    ) -> DependencyNode {
        let mut edges: Vec<_> = self.prerequisites_of(achievement_id, None).into_iter().collect();
        edges.sort();
        DependencyNode {
            achievement_id,
            kind,
            achieved: achieved.contains(&achievement_id),
            prerequisites: edges
                .into_iter()
                .map(|edge| self.subtree(edge.prerequisite_id, Some(edge.kind), achieved))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn edge(a: DbId, p: DbId, kind: DependencyKind) -> AchievementDependency {
        AchievementDependency::new(a, p, kind)
    }

    fn set(ids: &[DbId]) -> HashSet<DbId> {
        ids.iter().copied().collect()
    }

    #[test]
    fn no_required_edges_is_always_eligible() {
        let mut graph = DependencyGraph::new();
        graph.add_edge(edge(1, 2, DependencyKind::Unlocks)).unwrap();
        graph.add_edge(edge(1, 3, DependencyKind::Suggested)).unwrap();

        assert!(graph.is_eligible(1, &set(&[])));
        assert!(graph.is_eligible(42, &set(&[])));
    }

    #[test]
    fn reverse_edge_is_a_cycle() {
        let mut graph = DependencyGraph::new();
        graph.add_edge(edge(1, 2, DependencyKind::Required)).unwrap();

        assert_matches!(
            graph.add_edge(edge(2, 1, DependencyKind::Required)),
            Err(CoreError::Cycle {
                achievement_id: 2,
                prerequisite_id: 1
            })
        );
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn transitive_cycle_is_rejected() {
        let mut graph = DependencyGraph::new();
        graph.add_edge(edge(1, 2, DependencyKind::Required)).unwrap();
        graph.add_edge(edge(2, 3, DependencyKind::Unlocks)).unwrap();

        assert!(graph.would_create_cycle(3, 1));
        assert_matches!(
            graph.add_edge(edge(3, 1, DependencyKind::Suggested)),
            Err(CoreError::Cycle { .. })
        );
    }

    #[test]
    fn self_edge_is_a_cycle() {
        let mut graph = DependencyGraph::new();
        assert_matches!(
            graph.add_edge(edge(5, 5, DependencyKind::Required)),
            Err(CoreError::Cycle { .. })
        );
    }

    #[test]
    fn diamond_is_not_a_cycle() {
        let mut graph = DependencyGraph::new();
        graph.add_edge(edge(4, 2, DependencyKind::Required)).unwrap();
        graph.add_edge(edge(4, 3, DependencyKind::Required)).unwrap();
        graph.add_edge(edge(2, 1, DependencyKind::Required)).unwrap();
        graph.add_edge(edge(3, 1, DependencyKind::Required)).unwrap();
        assert_eq!(graph.edge_count(), 4);
    }

    #[test]
    fn duplicate_edge_is_a_noop() {
        let mut graph = DependencyGraph::new();
        assert!(graph.add_edge(edge(1, 2, DependencyKind::Required)).unwrap());
        assert!(!graph.add_edge(edge(1, 2, DependencyKind::Required)).unwrap());
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn eligibility_needs_every_required_prerequisite() {
        let mut graph = DependencyGraph::new();
        graph.add_edge(edge(10, 1, DependencyKind::Required)).unwrap();
        graph.add_edge(edge(10, 2, DependencyKind::Required)).unwrap();

        assert!(!graph.is_eligible(10, &set(&[1])));
        assert!(graph.is_eligible(10, &set(&[1, 2])));
    }

    #[test]
    fn visibility_uses_or_semantics() {
        let mut graph = DependencyGraph::new();
        graph.add_edge(edge(10, 1, DependencyKind::Unlocks)).unwrap();
        graph.add_edge(edge(10, 2, DependencyKind::Unlocks)).unwrap();

        assert!(!graph.is_visible(10, &set(&[])));
        assert!(graph.is_visible(10, &set(&[2])));
        assert!(graph.is_visible(11, &set(&[])));
    }

    #[test]
    fn visible_but_not_eligible() {
        let mut graph = DependencyGraph::new();
        graph.add_edge(edge(10, 1, DependencyKind::Unlocks)).unwrap();
        graph.add_edge(edge(10, 2, DependencyKind::Required)).unwrap();

        let achieved = set(&[1]);
        assert!(graph.is_visible(10, &achieved));
        assert!(!graph.is_eligible(10, &achieved));
    }

    #[test]
    fn queries_filter_by_kind_and_direction() {
        let mut graph = DependencyGraph::new();
        graph.add_edge(edge(10, 1, DependencyKind::Required)).unwrap();
        graph.add_edge(edge(10, 2, DependencyKind::Unlocks)).unwrap();
        graph.add_edge(edge(11, 1, DependencyKind::Suggested)).unwrap();

        assert_eq!(graph.prerequisites_of(10, None).len(), 2);
        assert_eq!(
            graph.prerequisites_of(10, Some(DependencyKind::Unlocks)),
            HashSet::from([edge(10, 2, DependencyKind::Unlocks)])
        );
        let dependents: HashSet<DbId> = graph
            .dependents_of(1)
            .into_iter()
            .map(|e| e.achievement_id)
            .collect();
        assert_eq!(dependents, set(&[10, 11]));
    }

    #[test]
    fn remove_edge_updates_both_indexes() {
        let mut graph = DependencyGraph::new();
        let e = edge(10, 1, DependencyKind::Required);
        graph.add_edge(e).unwrap();

        assert!(graph.remove_edge(&e));
        assert!(!graph.remove_edge(&e));
        assert!(graph.dependents_of(1).is_empty());
        assert!(graph.is_eligible(10, &set(&[])));
        // The reverse edge is legal once the original is gone.
        graph.add_edge(edge(1, 10, DependencyKind::Required)).unwrap();
    }

    #[test]
    fn remove_achievement_drops_touching_edges() {
        let mut graph = DependencyGraph::new();
        graph.add_edge(edge(10, 1, DependencyKind::Required)).unwrap();
        graph.add_edge(edge(20, 10, DependencyKind::Unlocks)).unwrap();
        graph.add_edge(edge(30, 1, DependencyKind::Required)).unwrap();

        graph.remove_achievement(10);
        assert_eq!(graph.edges(), vec![edge(30, 1, DependencyKind::Required)]);
    }

    #[test]
    fn from_edges_rejects_cyclic_input() {
        let result = DependencyGraph::from_edges([
            edge(1, 2, DependencyKind::Required),
            edge(2, 3, DependencyKind::Required),
            edge(3, 1, DependencyKind::Required),
        ]);
        assert_matches!(result, Err(CoreError::Cycle { .. }));
    }

    #[test]
    fn tree_expands_prerequisites() {
        let mut graph = DependencyGraph::new();
        graph.add_edge(edge(3, 2, DependencyKind::Required)).unwrap();
        graph.add_edge(edge(2, 1, DependencyKind::Unlocks)).unwrap();

        let tree = graph.tree(3, &set(&[1]));
        assert_eq!(tree.achievement_id, 3);
        assert!(tree.kind.is_none());
        assert!(!tree.achieved);
        assert_eq!(tree.prerequisites.len(), 1);

        let child = &tree.prerequisites[0];
        assert_eq!(child.achievement_id, 2);
        assert_eq!(child.kind, Some(DependencyKind::Required));

        let leaf = &child.prerequisites[0];
        assert_eq!(leaf.achievement_id, 1);
        assert_eq!(leaf.kind, Some(DependencyKind::Unlocks));
        assert!(leaf.achieved);
        assert!(leaf.prerequisites.is_empty());
    }
}
