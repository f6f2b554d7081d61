//! Storage traits.
//!
//! The engine only talks to storage through these traits. `podium-db`
//! implements them over PostgreSQL; `podium-events` ships an in-process
//! implementation for tests and development.

use std::collections::HashSet;

use async_trait::async_trait;

use crate::achievement::{Achievement, AchievementDependency};
use crate::catalog_config::AchievementDefinition;
use crate::context::PlayerSnapshot;
use crate::error::CoreError;
use crate::notification::{NewNotification, Notification, NotificationStats, RetryPolicy};
use crate::progress::{ProgressRecord, ProgressUpdate, TransitionOutcome};
use crate::types::{DbId, Timestamp};

pub type StoreResult<T> = Result<T, CoreError>;

/// Filter for the raw progress read used by analytics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressQuery {
    pub achievement_id: Option<DbId>,
    pub limit: i64,
    pub offset: i64,
}

/// Achievements and dependency edges.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn list_achievements(&self) -> StoreResult<Vec<Achievement>>;

    async fn find_achievement(&self, id: DbId) -> StoreResult<Option<Achievement>>;

    async fn find_achievement_by_key(&self, key: &str) -> StoreResult<Option<Achievement>>;

    /// Insert by key, or update the existing achievement keeping its id.
    async fn upsert_achievement(&self, definition: &AchievementDefinition)
        -> StoreResult<Achievement>;

    async fn list_dependencies(&self) -> StoreResult<Vec<AchievementDependency>>;

    /// Returns `false` if the edge already existed. Cycle checks are the
    /// caller's job.
    async fn insert_dependency(&self, edge: &AchievementDependency) -> StoreResult<bool>;

    /// Returns `false` if the edge did not exist.
    async fn delete_dependency(&self, edge: &AchievementDependency) -> StoreResult<bool>;
}

/// Per-(player, achievement) progress records.
#[async_trait]
pub trait ProgressStore: Send + Sync {
    async fn find_progress(
        &self,
        player_id: DbId,
        achievement_id: DbId,
    ) -> StoreResult<Option<ProgressRecord>>;

    async fn list_player_progress(&self, player_id: DbId) -> StoreResult<Vec<ProgressRecord>>;

    /// Ids of every achievement the player has achieved.
    async fn achieved_ids(&self, player_id: DbId) -> StoreResult<HashSet<DbId>> {
        Ok(self
            .list_player_progress(player_id)
            .await?
            .into_iter()
            .filter(|r| r.achieved)
            .map(|r| r.achievement_id)
            .collect())
    }

    /// Read-modify-write one record through
    /// [`apply_update`](crate::progress::apply_update), creating it lazily.
    ///
    /// Implementations hold the record exclusively for the whole call.
    async fn apply_progress(
        &self,
        player_id: DbId,
        achievement_id: DbId,
        update: &ProgressUpdate,
    ) -> StoreResult<(ProgressRecord, TransitionOutcome)>;

    /// Every player with at least one progress record.
    async fn players_with_progress(&self) -> StoreResult<Vec<DbId>>;

    /// Raw progress rows ordered by (player, achievement).
    async fn list_progress(&self, query: ProgressQuery) -> StoreResult<Vec<ProgressRecord>>;

    /// Delete every progress record. Returns the number removed.
    async fn reset_all_progress(&self) -> StoreResult<u64>;
}

/// Unlock notifications.
#[async_trait]
pub trait NotificationStore: Send + Sync {
    /// Create a `PENDING` notification. Returns `None` when the
    /// (player, achievement, channel) triple already exists.
    async fn create_notification(
        &self,
        new: &NewNotification,
    ) -> StoreResult<Option<Notification>>;

    /// Claim up to `limit` pending notifications, oldest first, until
    /// `lease_until`. Rows under an unexpired lease are skipped; a claimed
    /// row is returned to exactly one caller.
    async fn claim_pending(
        &self,
        limit: i64,
        now: Timestamp,
        lease_until: Timestamp,
    ) -> StoreResult<Vec<Notification>>;

    /// Mark sent and release the lease.
    async fn mark_sent(&self, id: DbId, sent_at: Timestamp) -> StoreResult<()>;

    /// Mark failed, increment `retry_count`, record the reason and release
    /// the lease.
    async fn mark_failed(&self, id: DbId, reason: &str) -> StoreResult<()>;

    /// Move every retryable failed notification back to unclaimed
    /// `PENDING` and return them.
    async fn requeue_retryable(
        &self,
        policy: &RetryPolicy,
        now: Timestamp,
    ) -> StoreResult<Vec<Notification>>;

    /// Delete notifications created before `cutoff`, any status.
    async fn delete_created_before(&self, cutoff: Timestamp) -> StoreResult<u64>;

    async fn list_player_notifications(&self, player_id: DbId) -> StoreResult<Vec<Notification>>;

    /// Counts by status for notifications created in the last `window_hours`.
    async fn notification_stats(
        &self,
        window_hours: i64,
        policy: &RetryPolicy,
        now: Timestamp,
    ) -> StoreResult<NotificationStats>;

    /// Delete every notification. Used by the administrative reset.
    async fn delete_all_notifications(&self) -> StoreResult<u64>;
}

/// Read-only player snapshots owned by the player subsystem.
#[async_trait]
pub trait PlayerDirectory: Send + Sync {
    async fn find_player(&self, player_id: DbId) -> StoreResult<Option<PlayerSnapshot>>;
}
