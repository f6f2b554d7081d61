//! Read-only access to the `players` table.

use podium_core::types::DbId;
use sqlx::PgPool;

use crate::models::player::PlayerRow;

pub struct PlayerRepo;

impl PlayerRepo {
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<PlayerRow>, sqlx::Error> {
        sqlx::query_as::<_, PlayerRow>(
            "SELECT id, display_name, rating_overall, rating_singles, rating_doubles, \
                    rating_tournament \
             FROM players WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }
}
