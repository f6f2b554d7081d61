//! Progress rows.

use podium_core::progress::ProgressRecord;
use podium_core::types::{DbId, Timestamp};
use sqlx::FromRow;
use uuid::Uuid;

/// A row from the `player_achievement_progress` table.
#[derive(Debug, Clone, FromRow)]
pub struct ProgressRow {
    pub player_id: DbId,
    pub achievement_id: DbId,
    pub progress: i64,
    pub achieved: bool,
    pub date_earned: Option<Timestamp>,
    pub opponent_id: Option<DbId>,
    pub opponent_name: Option<String>,
    pub game_id: Option<DbId>,
    pub game_played_at: Option<Timestamp>,
    pub recent_event_ids: Vec<Uuid>,
    pub updated_at: Timestamp,
}

impl From<ProgressRow> for ProgressRecord {
    fn from(row: ProgressRow) -> Self {
        ProgressRecord {
            player_id: row.player_id,
            achievement_id: row.achievement_id,
            progress: row.progress,
            achieved: row.achieved,
            date_earned: row.date_earned,
            opponent_id: row.opponent_id,
            opponent_name: row.opponent_name,
            game_id: row.game_id,
            game_played_at: row.game_played_at,
            recent_event_ids: row.recent_event_ids,
            updated_at: row.updated_at,
        }
    }
}
