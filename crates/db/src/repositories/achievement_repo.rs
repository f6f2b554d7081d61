//! Repository for the `achievements` table.

use podium_core::catalog_config::AchievementDefinition;
use podium_core::types::DbId;
use sqlx::PgPool;

use crate::models::achievement::AchievementRow;

/// Column list for `achievements` queries.
const COLUMNS: &str = "id, key, name, description, icon, category, target, parameter, \
                       game_type, points, is_hidden, created_at, updated_at";

/// Provides catalog reads and the configuration upsert.
pub struct AchievementRepo;

impl AchievementRepo {
    pub async fn list(pool: &PgPool) -> Result<Vec<AchievementRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM achievements ORDER BY id");
        sqlx::query_as::<_, AchievementRow>(&query)
            .fetch_all(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<AchievementRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM achievements WHERE id = $1");
        sqlx::query_as::<_, AchievementRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_key(
        pool: &PgPool,
        key: &str,
    ) -> Result<Option<AchievementRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM achievements WHERE key = $1");
        sqlx::query_as::<_, AchievementRow>(&query)
            .bind(key)
            .fetch_optional(pool)
            .await
    }

    /// Insert a definition, or update the achievement with the same key in
    /// place so its id (and every progress row) survives.
    pub async fn upsert(
        pool: &PgPool,
        def: &AchievementDefinition,
    ) -> Result<AchievementRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO achievements \
                (key, name, description, icon, category, target, parameter, game_type, points, is_hidden) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             ON CONFLICT (key) DO UPDATE SET \
                name = EXCLUDED.name, \
                description = EXCLUDED.description, \
                icon = EXCLUDED.icon, \
                category = EXCLUDED.category, \
                target = EXCLUDED.target, \
                parameter = EXCLUDED.parameter, \
                game_type = EXCLUDED.game_type, \
                points = EXCLUDED.points, \
                is_hidden = EXCLUDED.is_hidden, \
                updated_at = NOW() \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, AchievementRow>(&query)
            .bind(&def.key)
            .bind(&def.name)
            .bind(&def.description)
            .bind(&def.icon)
            .bind(def.criteria.category.as_str())
            .bind(def.criteria.target)
            .bind(def.criteria.parameter)
            .bind(&def.criteria.game_type)
            .bind(def.points)
            .bind(def.hidden)
            .fetch_one(pool)
            .await
    }
}
