//! Player snapshot rows.

use podium_core::context::{PlayerSnapshot, RatingCategory};
use podium_core::types::DbId;
use sqlx::FromRow;

/// A row from the `players` table.
#[derive(Debug, Clone, FromRow)]
pub struct PlayerRow {
    pub id: DbId,
    pub display_name: String,
    pub rating_overall: Option<i32>,
    pub rating_singles: Option<i32>,
    pub rating_doubles: Option<i32>,
    pub rating_tournament: Option<i32>,
}

impl From<PlayerRow> for PlayerSnapshot {
    fn from(row: PlayerRow) -> Self {
        let mut snapshot = PlayerSnapshot::new(row.id, row.display_name);
        let ratings = [
            (RatingCategory::Overall, row.rating_overall),
            (RatingCategory::Singles, row.rating_singles),
            (RatingCategory::Doubles, row.rating_doubles),
            (RatingCategory::Tournament, row.rating_tournament),
        ];
        for (category, rating) in ratings {
            if let Some(rating) = rating {
                snapshot = snapshot.with_rating(category, rating);
            }
        }
        snapshot
    }
}
