//! Repository for the `achievement_dependencies` table.

use podium_core::achievement::AchievementDependency;
use sqlx::PgPool;

use crate::models::achievement::DependencyRow;

/// Provides edge reads and writes. Cycle checks happen before insert, against
/// the in-memory graph.
pub struct DependencyRepo;

impl DependencyRepo {
    pub async fn list(pool: &PgPool) -> Result<Vec<DependencyRow>, sqlx::Error> {
        sqlx::query_as::<_, DependencyRow>(
            "SELECT achievement_id, prerequisite_id, kind \
             FROM achievement_dependencies \
             ORDER BY achievement_id, prerequisite_id, kind",
        )
        .fetch_all(pool)
        .await
    }

    /// Returns `false` if the edge already existed.
    pub async fn insert(pool: &PgPool, edge: &AchievementDependency) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO achievement_dependencies (achievement_id, prerequisite_id, kind) \
             VALUES ($1, $2, $3) \
             ON CONFLICT DO NOTHING",
        )
        .bind(edge.achievement_id)
        .bind(edge.prerequisite_id)
        .bind(edge.kind.as_str())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Returns `true` if a row was removed.
    pub async fn delete(pool: &PgPool, edge: &AchievementDependency) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM achievement_dependencies \
             WHERE achievement_id = $1 AND prerequisite_id = $2 AND kind = $3",
        )
        .bind(edge.achievement_id)
        .bind(edge.prerequisite_id)
        .bind(edge.kind.as_str())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
