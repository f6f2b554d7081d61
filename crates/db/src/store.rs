//! [`PgStore`]: the core storage traits over PostgreSQL.

use async_trait::async_trait;
use chrono::Duration;
use podium_core::achievement::{Achievement, AchievementDependency};
use podium_core::catalog_config::AchievementDefinition;
use podium_core::context::PlayerSnapshot;
use podium_core::error::CoreError;
use podium_core::notification::{NewNotification, Notification, NotificationStats, RetryPolicy};
use podium_core::progress::{ProgressRecord, ProgressUpdate, TransitionOutcome};
use podium_core::store::{
    CatalogStore, NotificationStore, PlayerDirectory, ProgressQuery, ProgressStore, StoreResult,
};
use podium_core::types::{DbId, Timestamp};

use crate::repositories::{
    AchievementRepo, DependencyRepo, NotificationRepo, PlayerRepo, ProgressRepo,
};
use crate::DbPool;

fn storage(e: sqlx::Error) -> CoreError {
    CoreError::Storage(e.to_string())
}

/// All engine storage backed by one connection pool.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

#[async_trait]
impl CatalogStore for PgStore {
    async fn list_achievements(&self) -> StoreResult<Vec<Achievement>> {
        AchievementRepo::list(&self.pool)
            .await
            .map_err(storage)?
            .into_iter()
            .map(Achievement::try_from)
            .collect()
    }

    async fn find_achievement(&self, id: DbId) -> StoreResult<Option<Achievement>> {
        AchievementRepo::find_by_id(&self.pool, id)
            .await
            .map_err(storage)?
            .map(Achievement::try_from)
            .transpose()
    }

    async fn find_achievement_by_key(&self, key: &str) -> StoreResult<Option<Achievement>> {
        AchievementRepo::find_by_key(&self.pool, key)
            .await
            .map_err(storage)?
            .map(Achievement::try_from)
            .transpose()
    }

    async fn upsert_achievement(
        &self,
        definition: &AchievementDefinition,
    ) -> StoreResult<Achievement> {
        let row = AchievementRepo::upsert(&self.pool, definition)
            .await
            .map_err(storage)?;
        Achievement::try_from(row)
    }

    async fn list_dependencies(&self) -> StoreResult<Vec<AchievementDependency>> {
        DependencyRepo::list(&self.pool)
            .await
            .map_err(storage)?
            .into_iter()
            .map(AchievementDependency::try_from)
            .collect()
    }

    async fn insert_dependency(&self, edge: &AchievementDependency) -> StoreResult<bool> {
        DependencyRepo::insert(&self.pool, edge)
            .await
            .map_err(storage)
    }

    async fn delete_dependency(&self, edge: &AchievementDependency) -> StoreResult<bool> {
        DependencyRepo::delete(&self.pool, edge)
            .await
            .map_err(storage)
    }
}

#[async_trait]
impl ProgressStore for PgStore {
    async fn find_progress(
        &self,
        player_id: DbId,
        achievement_id: DbId,
    ) -> StoreResult<Option<ProgressRecord>> {
        Ok(ProgressRepo::find(&self.pool, player_id, achievement_id)
            .await
            .map_err(storage)?
            .map(ProgressRecord::from))
    }

    async fn list_player_progress(&self, player_id: DbId) -> StoreResult<Vec<ProgressRecord>> {
        Ok(ProgressRepo::list_for_player(&self.pool, player_id)
            .await
            .map_err(storage)?
            .into_iter()
            .map(ProgressRecord::from)
            .collect())
    }

    async fn apply_progress(
        &self,
        player_id: DbId,
        achievement_id: DbId,
        update: &ProgressUpdate,
    ) -> StoreResult<(ProgressRecord, TransitionOutcome)> {
        ProgressRepo::apply(&self.pool, player_id, achievement_id, update)
            .await
            .map_err(storage)
    }

    async fn players_with_progress(&self) -> StoreResult<Vec<DbId>> {
        ProgressRepo::players_with_progress(&self.pool)
            .await
            .map_err(storage)
    }

    async fn list_progress(&self, query: ProgressQuery) -> StoreResult<Vec<ProgressRecord>> {
        Ok(
            ProgressRepo::list(&self.pool, query.achievement_id, query.limit, query.offset)
                .await
                .map_err(storage)?
                .into_iter()
                .map(ProgressRecord::from)
                .collect(),
        )
    }

    async fn reset_all_progress(&self) -> StoreResult<u64> {
        ProgressRepo::delete_all(&self.pool).await.map_err(storage)
    }
}

#[async_trait]
impl NotificationStore for PgStore {
    async fn create_notification(
        &self,
        new: &NewNotification,
    ) -> StoreResult<Option<Notification>> {
        NotificationRepo::create(&self.pool, new)
            .await
            .map_err(storage)?
            .map(Notification::try_from)
            .transpose()
    }

    async fn claim_pending(
        &self,
        limit: i64,
        now: Timestamp,
        lease_until: Timestamp,
    ) -> StoreResult<Vec<Notification>> {
        NotificationRepo::claim_pending(&self.pool, limit, now, lease_until)
            .await
            .map_err(storage)?
            .into_iter()
            .map(Notification::try_from)
            .collect()
    }

    async fn mark_sent(&self, id: DbId, sent_at: Timestamp) -> StoreResult<()> {
        NotificationRepo::mark_sent(&self.pool, id, sent_at)
            .await
            .map_err(storage)
    }

    async fn mark_failed(&self, id: DbId, reason: &str) -> StoreResult<()> {
        NotificationRepo::mark_failed(&self.pool, id, reason)
            .await
            .map_err(storage)
    }

    async fn requeue_retryable(
        &self,
        policy: &RetryPolicy,
        now: Timestamp,
    ) -> StoreResult<Vec<Notification>> {
        NotificationRepo::requeue_retryable(&self.pool, policy.max_retries, policy.retry_cutoff(now))
            .await
            .map_err(storage)?
            .into_iter()
            .map(Notification::try_from)
            .collect()
    }

    async fn delete_created_before(&self, cutoff: Timestamp) -> StoreResult<u64> {
        NotificationRepo::delete_created_before(&self.pool, cutoff)
            .await
            .map_err(storage)
    }

    async fn list_player_notifications(&self, player_id: DbId) -> StoreResult<Vec<Notification>> {
        NotificationRepo::list_for_player(&self.pool, player_id)
            .await
            .map_err(storage)?
            .into_iter()
            .map(Notification::try_from)
            .collect()
    }

    async fn notification_stats(
        &self,
        window_hours: i64,
        policy: &RetryPolicy,
        now: Timestamp,
    ) -> StoreResult<NotificationStats> {
        let since = now - Duration::hours(window_hours);
        let counts = NotificationRepo::counts(
            &self.pool,
            since,
            policy.max_retries,
            policy.retry_cutoff(now),
        )
        .await
        .map_err(storage)?;
        Ok(NotificationStats {
            window_hours,
            pending: counts.pending,
            sent: counts.sent,
            failed: counts.failed,
            abandoned: counts.abandoned,
        })
    }

    async fn delete_all_notifications(&self) -> StoreResult<u64> {
        NotificationRepo::delete_all(&self.pool)
            .await
            .map_err(storage)
    }
}

#[async_trait]
impl PlayerDirectory for PgStore {
    async fn find_player(&self, player_id: DbId) -> StoreResult<Option<PlayerSnapshot>> {
        Ok(PlayerRepo::find_by_id(&self.pool, player_id)
            .await
            .map_err(storage)?
            .map(PlayerSnapshot::from))
    }
}
