//! Notification rows.

use podium_core::channels::Channel;
use podium_core::error::CoreError;
use podium_core::notification::{Notification, NotificationStatus};
use podium_core::types::{DbId, Timestamp};
use sqlx::FromRow;

/// A row from the `achievement_notifications` table.
#[derive(Debug, Clone, FromRow)]
pub struct NotificationRow {
    pub id: DbId,
    pub player_id: DbId,
    pub achievement_id: DbId,
    pub channel: String,
    pub status: String,
    pub retry_count: i32,
    pub failure_reason: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub sent_at: Option<Timestamp>,
    pub claimed_until: Option<Timestamp>,
}

impl TryFrom<NotificationRow> for Notification {
    type Error = CoreError;

    fn try_from(row: NotificationRow) -> Result<Self, Self::Error> {
        let channel = Channel::parse(&row.channel).ok_or_else(|| {
            CoreError::Storage(format!("unknown notification channel '{}'", row.channel))
        })?;
        Ok(Notification {
            id: row.id,
            player_id: row.player_id,
            achievement_id: row.achievement_id,
            channel,
            status: NotificationStatus::parse(&row.status)?,
            retry_count: row.retry_count,
            failure_reason: row.failure_reason,
            created_at: row.created_at,
            updated_at: row.updated_at,
            sent_at: row.sent_at,
            claimed_until: row.claimed_until,
        })
    }
}

/// Aggregate row for notification statistics.
#[derive(Debug, Clone, Default, FromRow)]
pub struct NotificationCounts {
    pub pending: i64,
    pub sent: i64,
    pub failed: i64,
    pub abandoned: i64,
}
