//! Repository for the `player_achievement_progress` table.

use podium_core::progress::{apply_update, ProgressRecord, ProgressUpdate, TransitionOutcome};
use podium_core::types::DbId;
use sqlx::PgPool;

use crate::models::progress::ProgressRow;

/// Column list for `player_achievement_progress` queries.
const COLUMNS: &str = "player_id, achievement_id, progress, achieved, date_earned, opponent_id, \
                       opponent_name, game_id, game_played_at, recent_event_ids, updated_at";

pub struct ProgressRepo;

impl ProgressRepo {
    pub async fn find(
        pool: &PgPool,
        player_id: DbId,
        achievement_id: DbId,
    ) -> Result<Option<ProgressRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM player_achievement_progress \
             WHERE player_id = $1 AND achievement_id = $2"
        );
        sqlx::query_as::<_, ProgressRow>(&query)
            .bind(player_id)
            .bind(achievement_id)
            .fetch_optional(pool)
            .await
    }

    pub async fn list_for_player(
        pool: &PgPool,
        player_id: DbId,
    ) -> Result<Vec<ProgressRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM player_achievement_progress \
             WHERE player_id = $1 ORDER BY achievement_id"
        );
        sqlx::query_as::<_, ProgressRow>(&query)
            .bind(player_id)
            .fetch_all(pool)
            .await
    }

    /// Apply one update under a row lock.
    ///
    /// The row is created lazily, then locked with `SELECT ... FOR UPDATE` so
    /// concurrent events for the same (player, achievement) serialize here.
    pub async fn apply(
        pool: &PgPool,
        player_id: DbId,
        achievement_id: DbId,
        update: &ProgressUpdate,
    ) -> Result<(ProgressRecord, TransitionOutcome), sqlx::Error> {
        let mut tx = pool.begin().await?;

        sqlx::query(
            "INSERT INTO player_achievement_progress (player_id, achievement_id) \
             VALUES ($1, $2) \
             ON CONFLICT DO NOTHING",
        )
        .bind(player_id)
        .bind(achievement_id)
        .execute(&mut *tx)
        .await?;

        let query = format!(
            "SELECT {COLUMNS} FROM player_achievement_progress \
             WHERE player_id = $1 AND achievement_id = $2 \
             FOR UPDATE"
        );
        let row = sqlx::query_as::<_, ProgressRow>(&query)
            .bind(player_id)
            .bind(achievement_id)
            .fetch_one(&mut *tx)
            .await?;

        let mut record = ProgressRecord::from(row);
        let outcome = apply_update(&mut record, update);

        if outcome.is_write() {
            sqlx::query(
                "UPDATE player_achievement_progress SET \
                    progress = $3, achieved = $4, date_earned = $5, opponent_id = $6, \
                    opponent_name = $7, game_id = $8, game_played_at = $9, \
                    recent_event_ids = $10, updated_at = $11 \
                 WHERE player_id = $1 AND achievement_id = $2",
            )
            .bind(player_id)
            .bind(achievement_id)
            .bind(record.progress)
            .bind(record.achieved)
            .bind(record.date_earned)
            .bind(record.opponent_id)
            .bind(&record.opponent_name)
            .bind(record.game_id)
            .bind(record.game_played_at)
            .bind(&record.recent_event_ids)
            .bind(record.updated_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok((record, outcome))
    }

    pub async fn players_with_progress(pool: &PgPool) -> Result<Vec<DbId>, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT DISTINCT player_id FROM player_achievement_progress ORDER BY player_id",
        )
        .fetch_all(pool)
        .await
    }

    /// Raw rows for analytics, optionally filtered to one achievement.
    pub async fn list(
        pool: &PgPool,
        achievement_id: Option<DbId>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<ProgressRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM player_achievement_progress \
             WHERE ($1::BIGINT IS NULL OR achievement_id = $1) \
             ORDER BY player_id, achievement_id \
             LIMIT $2 OFFSET $3"
        );
        sqlx::query_as::<_, ProgressRow>(&query)
            .bind(achievement_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    /// Delete every progress row. Returns the number removed.
    pub async fn delete_all(pool: &PgPool) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM player_achievement_progress")
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}
