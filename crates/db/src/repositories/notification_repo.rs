//! Repository for the `achievement_notifications` table.

use podium_core::notification::NewNotification;
use podium_core::types::{DbId, Timestamp};
use sqlx::PgPool;

use crate::models::notification::{NotificationCounts, NotificationRow};

/// Column list for `achievement_notifications` queries.
const COLUMNS: &str = "id, player_id, achievement_id, channel, status, retry_count, \
                       failure_reason, created_at, updated_at, sent_at, claimed_until";

/// Provides creation, sweep and statistics queries for notifications.
pub struct NotificationRepo;

impl NotificationRepo {
    /// Create a pending notification. Returns `None` if the
    /// (player, achievement, channel) triple already exists.
    pub async fn create(
        pool: &PgPool,
        new: &NewNotification,
    ) -> Result<Option<NotificationRow>, sqlx::Error> {
        let query = format!(
            "INSERT INTO achievement_notifications (player_id, achievement_id, channel) \
             VALUES ($1, $2, $3) \
             ON CONFLICT (player_id, achievement_id, channel) DO NOTHING \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, NotificationRow>(&query)
            .bind(new.player_id)
            .bind(new.achievement_id)
            .bind(new.channel.as_str())
            .fetch_optional(pool)
            .await
    }

    /// Claim the oldest unleased pending notifications until `lease_until`.
    ///
    /// `SKIP LOCKED` keeps concurrent claimers from blocking on or sharing
    /// the same rows.
    pub async fn claim_pending(
        pool: &PgPool,
        limit: i64,
        now: Timestamp,
        lease_until: Timestamp,
    ) -> Result<Vec<NotificationRow>, sqlx::Error> {
        let query = format!(
            "WITH claimed AS ( \
                UPDATE achievement_notifications SET claimed_until = $3 \
                WHERE id IN ( \
                    SELECT id FROM achievement_notifications \
                    WHERE status = 'pending' \
                      AND (claimed_until IS NULL OR claimed_until < $2) \
                    ORDER BY created_at, id \
                    LIMIT $1 \
                    FOR UPDATE SKIP LOCKED) \
                RETURNING {COLUMNS}) \
             SELECT {COLUMNS} FROM claimed ORDER BY created_at, id"
        );
        sqlx::query_as::<_, NotificationRow>(&query)
            .bind(limit)
            .bind(now)
            .bind(lease_until)
            .fetch_all(pool)
            .await
    }

    pub async fn mark_sent(pool: &PgPool, id: DbId, sent_at: Timestamp) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE achievement_notifications \
             SET status = 'sent', sent_at = $2, failure_reason = NULL, claimed_until = NULL, \
                 updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(sent_at)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn mark_failed(pool: &PgPool, id: DbId, reason: &str) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE achievement_notifications \
             SET status = 'failed', retry_count = retry_count + 1, failure_reason = $2, \
                 claimed_until = NULL, updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(reason)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Reset failed notifications under the retry cap and inside the retry
    /// window to unclaimed pending, returning them.
    pub async fn requeue_retryable(
        pool: &PgPool,
        max_retries: i32,
        created_after: Timestamp,
    ) -> Result<Vec<NotificationRow>, sqlx::Error> {
        let query = format!(
            "UPDATE achievement_notifications \
             SET status = 'pending', claimed_until = NULL, updated_at = NOW() \
             WHERE status = 'failed' AND retry_count < $1 AND created_at >= $2 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, NotificationRow>(&query)
            .bind(max_retries)
            .bind(created_after)
            .fetch_all(pool)
            .await
    }

    /// Delete notifications created before `cutoff`, any status.
    pub async fn delete_created_before(pool: &PgPool, cutoff: Timestamp) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM achievement_notifications WHERE created_at < $1")
            .bind(cutoff)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn list_for_player(
        pool: &PgPool,
        player_id: DbId,
    ) -> Result<Vec<NotificationRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM achievement_notifications \
             WHERE player_id = $1 \
             ORDER BY created_at DESC, id DESC"
        );
        sqlx::query_as::<_, NotificationRow>(&query)
            .bind(player_id)
            .fetch_all(pool)
            .await
    }

    /// Counts by status for notifications created since `since`.
    ///
    /// A failed row is abandoned when it is at the retry cap or older than
    /// `retry_cutoff`.
    pub async fn counts(
        pool: &PgPool,
        since: Timestamp,
        max_retries: i32,
        retry_cutoff: Timestamp,
    ) -> Result<NotificationCounts, sqlx::Error> {
        sqlx::query_as::<_, NotificationCounts>(
            "SELECT \
                COUNT(*) FILTER (WHERE status = 'pending') AS pending, \
                COUNT(*) FILTER (WHERE status = 'sent') AS sent, \
                COUNT(*) FILTER (WHERE status = 'failed') AS failed, \
                COUNT(*) FILTER (WHERE status = 'failed' \
                    AND (retry_count >= $2 OR created_at < $3)) AS abandoned \
             FROM achievement_notifications \
             WHERE created_at >= $1",
        )
        .bind(since)
        .bind(max_retries)
        .bind(retry_cutoff)
        .fetch_one(pool)
        .await
    }

    pub async fn delete_all(pool: &PgPool) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM achievement_notifications")
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}
