//! Unlock notifications: status values, retry rules and statistics.
//!
//! A notification is created once per (player, achievement, channel). The
//! delivery sweep moves it `PENDING -> SENT | FAILED`; the retry sweep moves
//! retryable `FAILED` rows back to `PENDING`. A row is claimed with a lease
//! before it is handed to an adapter, so overlapping sweeps deliver it once. Rows past the retry cap or the
//! retry window are abandoned and only show up in [`NotificationStats`].

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::channels::Channel;
use crate::error::CoreError;
use crate::types::{DbId, Timestamp};

/// Default number of delivery attempts before a notification is abandoned.
pub const DEFAULT_MAX_RETRIES: i32 = 3;

/// Default age after which failed notifications are no longer retried.
pub const DEFAULT_RETRY_WINDOW_HOURS: i64 = 24;

/// Default age after which notifications are deleted regardless of status.
pub const DEFAULT_RETENTION_DAYS: i64 = 30;

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationStatus {
    Pending,
    Sent,
    Failed,
}

impl NotificationStatus {
    pub const ALL: [NotificationStatus; 3] = [
        NotificationStatus::Pending,
        NotificationStatus::Sent,
        NotificationStatus::Failed,
    ];

    /// String representation for database storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationStatus::Pending => "pending",
            NotificationStatus::Sent => "sent",
            NotificationStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s {
            "pending" => Ok(NotificationStatus::Pending),
            "sent" => Ok(NotificationStatus::Sent),
            "failed" => Ok(NotificationStatus::Failed),
            other => Err(CoreError::Storage(format!(
                "unknown notification status '{other}'"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// A stored notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: DbId,
    pub player_id: DbId,
    pub achievement_id: DbId,
    pub channel: Channel,
    pub status: NotificationStatus,
    pub retry_count: i32,
    pub failure_reason: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub sent_at: Option<Timestamp>,
    /// Delivery lease. Other deliverers skip a pending row until it expires.
    pub claimed_until: Option<Timestamp>,
}

/// Creation request. Ignored when the (player, achievement, channel) triple
/// already exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNotification {
    pub player_id: DbId,
    pub achievement_id: DbId,
    pub channel: Channel,
}

/// Rendered message handed to a channel adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnlockMessage {
    pub notification_id: DbId,
    pub player_id: DbId,
    pub player_name: String,
    pub achievement_id: DbId,
    pub achievement_name: String,
    pub achievement_description: String,
    pub points: i32,
    pub channel: Channel,
}

impl UnlockMessage {
    /// One-line text used by chat-style channels.
    pub fn text(&self) -> String {
        format!(
            "{} unlocked \"{}\" (+{} pts): {}",
            self.player_name, self.achievement_name, self.points, self.achievement_description
        )
    }
}

// ---------------------------------------------------------------------------
// RetryPolicy
// ---------------------------------------------------------------------------

/// Retry cap, retry window and retention window for the sweeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: i32,
    pub retry_window: Duration,
    pub retention: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            retry_window: Duration::hours(DEFAULT_RETRY_WINDOW_HOURS),
            retention: Duration::days(DEFAULT_RETENTION_DAYS),
        }
    }
}

impl RetryPolicy {
    /// Notifications created before this instant are outside the retry window.
    pub fn retry_cutoff(&self, now: Timestamp) -> Timestamp {
        now - self.retry_window
    }

    /// Notifications created before this instant are deleted.
    pub fn retention_cutoff(&self, now: Timestamp) -> Timestamp {
        now - self.retention
    }

    /// A failed notification under the retry cap and inside the window.
    pub fn is_retryable(&self, notification: &Notification, now: Timestamp) -> bool {
        notification.status == NotificationStatus::Failed
            && notification.retry_count < self.max_retries
            && notification.created_at >= self.retry_cutoff(now)
    }

    /// A failed notification that will never be retried again.
    pub fn is_abandoned(&self, notification: &Notification, now: Timestamp) -> bool {
        notification.status == NotificationStatus::Failed && !self.is_retryable(notification, now)
    }

    pub fn is_expired(&self, notification: &Notification, now: Timestamp) -> bool {
        notification.created_at < self.retention_cutoff(now)
    }
}

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// Counts by status over a trailing window.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationStats {
    pub window_hours: i64,
    pub pending: i64,
    pub sent: i64,
    pub failed: i64,
    /// Failed notifications that the retry sweep will not pick up again.
    pub abandoned: i64,
}

impl NotificationStats {
    pub fn total(&self) -> i64 {
        self.pending + self.sent + self.failed
    }

    /// Fold a set of notifications created inside the window.
    pub fn tally<'a>(
        window_hours: i64,
        notifications: impl IntoIterator<Item = &'a Notification>,
        policy: &RetryPolicy,
        now: Timestamp,
    ) -> Self {
        let mut stats = Self {
            window_hours,
            ..Self::default()
        };
        for n in notifications {
            match n.status {
                NotificationStatus::Pending => stats.pending += 1,
                NotificationStatus::Sent => stats.sent += 1,
                NotificationStatus::Failed => {
                    stats.failed += 1;
                    if policy.is_abandoned(n, now) {
                        stats.abandoned += 1;
                    }
                }
            }
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn failed(retry_count: i32, age: Duration) -> Notification {
        let now = Utc::now();
        Notification {
            id: 1,
            player_id: 1,
            achievement_id: 1,
            channel: Channel::Chat,
            status: NotificationStatus::Failed,
            retry_count,
            failure_reason: Some("timeout".into()),
            created_at: now - age,
            updated_at: now,
            sent_at: None,
            claimed_until: None,
        }
    }

    #[test]
    fn retry_cap_excludes_third_failure() {
        let policy = RetryPolicy::default();
        let now = Utc::now();
        assert!(!policy.is_retryable(&failed(3, Duration::hours(1)), now));
        assert!(policy.is_abandoned(&failed(3, Duration::hours(1)), now));
        assert!(policy.is_retryable(&failed(2, Duration::hours(1)), now));
    }

    #[test]
    fn retry_window_excludes_old_failures() {
        let policy = RetryPolicy::default();
        let now = Utc::now();
        assert!(!policy.is_retryable(&failed(0, Duration::hours(25)), now));
        assert!(policy.is_abandoned(&failed(0, Duration::hours(25)), now));
    }

    #[test]
    fn sent_is_never_retryable_or_abandoned() {
        let policy = RetryPolicy::default();
        let now = Utc::now();
        let mut n = failed(0, Duration::hours(1));
        n.status = NotificationStatus::Sent;
        assert!(!policy.is_retryable(&n, now));
        assert!(!policy.is_abandoned(&n, now));
    }

    #[test]
    fn retention_applies_to_every_status() {
        let policy = RetryPolicy::default();
        let now = Utc::now();
        let mut n = failed(0, Duration::days(31));
        n.status = NotificationStatus::Sent;
        assert!(policy.is_expired(&n, now));
        assert!(!policy.is_expired(&failed(0, Duration::days(29)), now));
    }

    #[test]
    fn tally_counts_by_status() {
        let policy = RetryPolicy::default();
        let now = Utc::now();
        let mut sent = failed(0, Duration::hours(1));
        sent.status = NotificationStatus::Sent;
        let rows = [sent, failed(1, Duration::hours(1)), failed(3, Duration::hours(1))];

        let stats = NotificationStats::tally(24, &rows, &policy, now);
        assert_eq!(stats.sent, 1);
        assert_eq!(stats.failed, 2);
        assert_eq!(stats.abandoned, 1);
        assert_eq!(stats.total(), 3);
    }

    #[test]
    fn status_parses_stored_names() {
        for status in NotificationStatus::ALL {
            assert_eq!(NotificationStatus::parse(status.as_str()).unwrap(), status);
        }
        assert!(NotificationStatus::parse("queued").is_err());
    }
}
