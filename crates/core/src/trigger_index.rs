//! Relevance filter from (event type, game type) to candidate achievements.
//!
//! The index is derived from achievement criteria and can be rebuilt at any
//! time. It may over-select (a candidate whose rule then yields zero) but must
//! never miss an achievement whose rule could advance.

use std::collections::{BTreeSet, HashMap};

use serde::Serialize;

use crate::achievement::Achievement;
use crate::criteria::TriggerEventType;
use crate::types::DbId;

/// One derived index entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Trigger {
    pub achievement_id: DbId,
    pub event_type: TriggerEventType,
    /// `None` is the universal scope.
    pub game_type: Option<String>,
}

impl Trigger {
    pub fn for_achievement(achievement: &Achievement) -> Self {
        Self {
            achievement_id: achievement.id,
            event_type: achievement.criteria.category.event_type(),
            game_type: crate::criteria::normalize_game_type(
                achievement.criteria.game_type.as_deref(),
            ),
        }
    }
}

#[derive(Debug, Clone, Default)]
struct Bucket {
    universal: BTreeSet<DbId>,
    scoped: HashMap<String, BTreeSet<DbId>>,
}

/// Immutable trigger index. Rebuild by constructing a new one.
#[derive(Debug, Clone, Default)]
pub struct TriggerIndex {
    buckets: HashMap<TriggerEventType, Bucket>,
    triggers: Vec<Trigger>,
}

impl TriggerIndex {
    /// Classify every achievement into its event bucket and scope.
    pub fn build<'a>(achievements: impl IntoIterator<Item = &'a Achievement>) -> Self {
        let mut index = Self::default();
        for achievement in achievements {
            let trigger = Trigger::for_achievement(achievement);
            let bucket = index.buckets.entry(trigger.event_type).or_default();
            match &trigger.game_type {
                None => {
                    bucket.universal.insert(trigger.achievement_id);
                }
                Some(scope) => {
                    bucket
                        .scoped
                        .entry(scope.clone())
                        .or_default()
                        .insert(trigger.achievement_id);
                }
            }
            index.triggers.push(trigger);
        }
        index.triggers.sort_by_key(|t| t.achievement_id);
        index
    }

    /// Achievements scoped to `game_type` under `event_type`, plus the
    /// universal ones, deduplicated and in ascending id order.
    ///
    /// An event without a game type only reaches universal achievements.
    pub fn candidates_for(&self, event_type: TriggerEventType, game_type: Option<&str>) -> Vec<DbId> {
        let Some(bucket) = self.buckets.get(&event_type) else {
            return Vec::new();
        };

        let mut ids = bucket.universal.clone();
        if let Some(scope) = crate::criteria::normalize_game_type(game_type) {
            if let Some(scoped) = bucket.scoped.get(&scope) {
                ids.extend(scoped.iter().copied());
            }
        }
        ids.into_iter().collect()
    }

    /// All derived entries, ordered by achievement id.
    pub fn triggers(&self) -> &[Trigger] {
        &self.triggers
    }

    pub fn len(&self) -> usize {
        self.triggers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triggers.is_empty()
    }
}
