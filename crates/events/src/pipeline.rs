//! Notification pipeline.
//!
//! Unlocks create one notification per configured channel. Delivery is a
//! separate sweep: pending rows go to their channel adapter with a bounded
//! timeout and end up `SENT` or `FAILED`. The retry sweep requeues retryable
//! failures and redelivers them; the cleanup sweep drops expired rows.
//!
//! Every delivery claims its rows first with a lease covering a whole batch
//! of timeouts. Sweeps running at the same time, in one process or several,
//! never hand the same row to an adapter twice.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use podium_core::channels::{Channel, DeliveryPolicy};
use podium_core::error::CoreError;
use podium_core::notification::{
    NewNotification, Notification, NotificationStats, RetryPolicy, UnlockMessage,
};
use podium_core::store::{NotificationStore, PlayerDirectory};
use podium_core::types::DbId;
use serde::Serialize;

use crate::delivery::{ChannelAdapter, DeliveryError};
use crate::metrics::EngineMetrics;
use crate::registry::AchievementRegistry;

/// Result of one delivery pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeliveryReport {
    pub sent: usize,
    pub failed: usize,
}

/// Result of one retry pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RetryReport {
    pub requeued: usize,
    pub delivery: DeliveryReport,
}

pub struct NotificationPipeline {
    store: Arc<dyn NotificationStore>,
    players: Arc<dyn PlayerDirectory>,
    registry: Arc<AchievementRegistry>,
    adapters: HashMap<Channel, Arc<dyn ChannelAdapter>>,
    channels: Vec<Channel>,
    policy: RetryPolicy,
    delivery_timeout: Duration,
    batch_size: i64,
    metrics: Arc<EngineMetrics>,
}

impl NotificationPipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn NotificationStore>,
        players: Arc<dyn PlayerDirectory>,
        registry: Arc<AchievementRegistry>,
        adapters: Vec<Arc<dyn ChannelAdapter>>,
        channels: Vec<Channel>,
        policy: RetryPolicy,
        delivery_timeout: Duration,
        batch_size: i64,
        metrics: Arc<EngineMetrics>,
    ) -> Self {
        let mut by_channel = HashMap::new();
        for adapter in adapters {
            by_channel.entry(adapter.channel()).or_insert(adapter);
        }
        Self {
            store,
            players,
            registry,
            adapters: by_channel,
            channels,
            policy,
            delivery_timeout,
            batch_size,
            metrics,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    // -----------------------------------------------------------------------
    // Creation
    // -----------------------------------------------------------------------

    /// Create one notification per configured channel for an unlock.
    ///
    /// Existing (player, achievement, channel) rows are left alone. Storage
    /// failures are logged per channel and never propagate to the unlock.
    pub async fn enqueue_unlock(&self, player_id: DbId, achievement_id: DbId) -> Vec<Notification> {
        let mut created = Vec::new();
        for channel in &self.channels {
            let new = NewNotification {
                player_id,
                achievement_id,
                channel: *channel,
            };
            match self.store.create_notification(&new).await {
                Ok(Some(notification)) => {
                    EngineMetrics::incr(&self.metrics.notifications_created);
                    created.push(notification);
                }
                Ok(None) => {
                    tracing::debug!(
                        player_id,
                        achievement_id,
                        channel = %channel,
                        "Notification already exists"
                    );
                }
                Err(e) => {
                    tracing::error!(
                        player_id,
                        achievement_id,
                        channel = %channel,
                        error = %e,
                        "Failed to create notification"
                    );
                }
            }
        }
        created
    }

    // -----------------------------------------------------------------------
    // Delivery
    // -----------------------------------------------------------------------

    /// Claim and deliver one batch of pending notifications.
    pub async fn deliver_pending(&self) -> Result<DeliveryReport, CoreError> {
        let now = Utc::now();
        let claimed = self
            .store
            .claim_pending(self.batch_size, now, now + self.claim_lease())
            .await?;
        Ok(self.deliver_all(&claimed).await)
    }

    /// Long enough for every row of a batch to hit its delivery timeout.
    fn claim_lease(&self) -> chrono::Duration {
        let rows = u32::try_from(self.batch_size).unwrap_or(u32::MAX);
        let lease = self.delivery_timeout.saturating_mul(rows.saturating_add(1));
        chrono::Duration::from_std(lease).unwrap_or_else(|_| chrono::Duration::days(1))
    }

    async fn deliver_all(&self, notifications: &[Notification]) -> DeliveryReport {
        let mut report = DeliveryReport::default();
        for notification in notifications {
            match self.deliver_one(notification).await {
                Ok(true) => report.sent += 1,
                Ok(false) => report.failed += 1,
                Err(e) => {
                    tracing::error!(
                        notification_id = notification.id,
                        error = %e,
                        "Failed to record delivery result"
                    );
                }
            }
        }
        report
    }

    /// Deliver a single notification and record the result. Returns whether
    /// it ended up sent.
    async fn deliver_one(&self, notification: &Notification) -> Result<bool, CoreError> {
        if notification.channel.policy() == DeliveryPolicy::Deferred {
            self.store.mark_sent(notification.id, Utc::now()).await?;
            EngineMetrics::incr(&self.metrics.deliveries_sent);
            return Ok(true);
        }

        let Some(adapter) = self
            .adapters
            .get(&notification.channel)
            .filter(|a| a.is_enabled())
        else {
            let reason = DeliveryError::Unavailable(format!(
                "no enabled adapter for channel {}",
                notification.channel
            ));
            return self.record_failure(notification, &reason).await;
        };

        let message = match self.render(notification).await {
            Ok(message) => message,
            Err(e) => {
                let reason = DeliveryError::Unavailable(e.to_string());
                return self.record_failure(notification, &reason).await;
            }
        };

        let result = match tokio::time::timeout(self.delivery_timeout, adapter.deliver(&message)).await
        {
            Ok(result) => result,
            Err(_) => Err(DeliveryError::Timeout(self.delivery_timeout)),
        };

        match result {
            Ok(()) => {
                self.store.mark_sent(notification.id, Utc::now()).await?;
                EngineMetrics::incr(&self.metrics.deliveries_sent);
                tracing::info!(
                    notification_id = notification.id,
                    player_id = notification.player_id,
                    achievement_id = notification.achievement_id,
                    channel = %notification.channel,
                    "Notification delivered"
                );
                Ok(true)
            }
            Err(e) => self.record_failure(notification, &e).await,
        }
    }

    async fn record_failure(
        &self,
        notification: &Notification,
        error: &DeliveryError,
    ) -> Result<bool, CoreError> {
        tracing::warn!(
            notification_id = notification.id,
            channel = %notification.channel,
            retry_count = notification.retry_count + 1,
            error = %error,
            "Notification delivery failed"
        );
        self.store
            .mark_failed(notification.id, &error.to_string())
            .await?;
        EngineMetrics::incr(&self.metrics.deliveries_failed);
        Ok(false)
    }

    async fn render(&self, notification: &Notification) -> Result<UnlockMessage, CoreError> {
        let snapshot = self.registry.snapshot();
        let achievement =
            snapshot
                .achievement(notification.achievement_id)
                .ok_or(CoreError::NotFound {
                    entity: "Achievement",
                    id: notification.achievement_id,
                })?;
        let player_name = self
            .players
            .find_player(notification.player_id)
            .await?
            .map(|p| p.display_name)
            .unwrap_or_else(|| format!("Player {}", notification.player_id));

        Ok(UnlockMessage {
            notification_id: notification.id,
            player_id: notification.player_id,
            player_name,
            achievement_id: achievement.id,
            achievement_name: achievement.name.clone(),
            achievement_description: achievement.description.clone(),
            points: achievement.points,
            channel: notification.channel,
        })
    }

    // -----------------------------------------------------------------------
    // Retry, cleanup, stats
    // -----------------------------------------------------------------------

    /// Requeue retryable failures and redeliver them.
    ///
    /// Requeued rows go through the same claim as the delivery sweep; a row
    /// the delivery sweep claims first is not part of this report.
    pub async fn retry_failed(&self) -> Result<RetryReport, CoreError> {
        let requeued = self.store.requeue_retryable(&self.policy, Utc::now()).await?;
        let delivery = if requeued.is_empty() {
            DeliveryReport::default()
        } else {
            self.deliver_pending().await?
        };
        Ok(RetryReport {
            requeued: requeued.len(),
            delivery,
        })
    }

    /// Delete notifications past the retention window. Returns the count.
    pub async fn cleanup_expired(&self) -> Result<u64, CoreError> {
        let cutoff = self.policy.retention_cutoff(Utc::now());
        self.store.delete_created_before(cutoff).await
    }

    pub async fn stats(&self, window_hours: i64) -> Result<NotificationStats, CoreError> {
        self.store
            .notification_stats(window_hours, &self.policy, Utc::now())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use crate::registry::CatalogSnapshot;
    use async_trait::async_trait;
    use podium_core::achievement::Achievement;
    use podium_core::criteria::{Criteria, CriteriaCategory};
    use podium_core::notification::NotificationStatus;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Adapter whose first `fail_times` calls fail. Each call waits `delay`
    /// first.
    struct Scripted {
        fail_times: usize,
        calls: AtomicUsize,
        delay: Duration,
    }

    #[async_trait]
    impl ChannelAdapter for Scripted {
        fn channel(&self) -> Channel {
            Channel::Chat
        }

        async fn deliver(&self, _message: &UnlockMessage) -> Result<(), DeliveryError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            if call < self.fail_times {
                Err(DeliveryError::HttpStatus(503))
            } else {
                Ok(())
            }
        }
    }

    fn registry() -> Arc<AchievementRegistry> {
        let registry = Arc::new(AchievementRegistry::new());
        registry.replace(CatalogSnapshot::build(
            vec![Achievement {
                id: 1,
                key: "first".into(),
                name: "First".into(),
                description: "Win once".into(),
                icon: None,
                criteria: Criteria::new(CriteriaCategory::WinCount, 1),
                points: 10,
                is_hidden: false,
            }],
            Vec::new(),
        ));
        registry
    }

    fn pipeline(
        store: Arc<MemoryStore>,
        adapters: Vec<Arc<dyn ChannelAdapter>>,
    ) -> NotificationPipeline {
        NotificationPipeline::new(
            store.clone(),
            store,
            registry(),
            adapters,
            vec![Channel::InApp, Channel::Chat],
            RetryPolicy::default(),
            Duration::from_millis(50),
            100,
            Arc::new(EngineMetrics::default()),
        )
    }

    fn scripted(fail_times: usize) -> Arc<Scripted> {
        Arc::new(Scripted {
            fail_times,
            calls: AtomicUsize::new(0),
            delay: Duration::ZERO,
        })
    }

    async fn statuses(store: &MemoryStore) -> Vec<(Channel, NotificationStatus, i32)> {
        let mut rows: Vec<_> = store
            .list_player_notifications(7)
            .await
            .unwrap()
            .into_iter()
            .map(|n| (n.channel, n.status, n.retry_count))
            .collect();
        rows.sort_by_key(|(c, _, _)| *c);
        rows
    }

    #[tokio::test]
    async fn enqueue_is_idempotent_per_channel() {
        let store = Arc::new(MemoryStore::new());
        let pipeline = pipeline(store.clone(), Vec::new());

        assert_eq!(pipeline.enqueue_unlock(7, 1).await.len(), 2);
        assert!(pipeline.enqueue_unlock(7, 1).await.is_empty());
        assert_eq!(store.list_player_notifications(7).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn deferred_channel_is_sent_without_adapter() {
        let store = Arc::new(MemoryStore::new());
        let adapter = scripted(0);
        let pipeline = pipeline(store.clone(), vec![adapter.clone()]);
        pipeline.enqueue_unlock(7, 1).await;

        let report = pipeline.deliver_pending().await.unwrap();
        assert_eq!(report, DeliveryReport { sent: 2, failed: 0 });
        assert_eq!(adapter.calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            statuses(&store).await,
            vec![
                (Channel::InApp, NotificationStatus::Sent, 0),
                (Channel::Chat, NotificationStatus::Sent, 0),
            ]
        );
    }

    #[tokio::test]
    async fn failure_then_retry_succeeds() {
        let store = Arc::new(MemoryStore::new());
        let pipeline = pipeline(store.clone(), vec![scripted(1)]);
        pipeline.enqueue_unlock(7, 1).await;

        let first = pipeline.deliver_pending().await.unwrap();
        assert_eq!(first.failed, 1);
        assert_eq!(
            statuses(&store).await[1],
            (Channel::Chat, NotificationStatus::Failed, 1)
        );

        let retry = pipeline.retry_failed().await.unwrap();
        assert_eq!(retry.requeued, 1);
        assert_eq!(retry.delivery.sent, 1);
        assert_eq!(
            statuses(&store).await[1],
            (Channel::Chat, NotificationStatus::Sent, 1)
        );
    }

    #[tokio::test]
    async fn overlapping_retry_and_delivery_send_once() {
        let store = Arc::new(MemoryStore::new());
        let adapter = Arc::new(Scripted {
            fail_times: 1,
            calls: AtomicUsize::new(0),
            delay: Duration::from_millis(10),
        });
        let pipeline = pipeline(store.clone(), vec![adapter.clone()]);
        pipeline.enqueue_unlock(7, 1).await;
        assert_eq!(pipeline.deliver_pending().await.unwrap().failed, 1);

        let (retry, delivery) = tokio::join!(pipeline.retry_failed(), pipeline.deliver_pending());
        let sent = retry.unwrap().delivery.sent + delivery.unwrap().sent;

        assert_eq!(sent, 1);
        assert_eq!(adapter.calls.load(Ordering::SeqCst), 2);
        assert_eq!(
            statuses(&store).await[1],
            (Channel::Chat, NotificationStatus::Sent, 1)
        );
    }

    #[tokio::test]
    async fn claimed_rows_are_skipped_until_the_lease_expires() {
        let store = Arc::new(MemoryStore::new());
        let adapter = scripted(0);
        let pipeline = pipeline(store.clone(), vec![adapter.clone()]);
        pipeline.enqueue_unlock(7, 1).await;

        let now = Utc::now();
        let lease = now + chrono::Duration::minutes(5);
        assert_eq!(store.claim_pending(10, now, lease).await.unwrap().len(), 2);

        assert_eq!(pipeline.deliver_pending().await.unwrap(), DeliveryReport::default());
        assert_eq!(adapter.calls.load(Ordering::SeqCst), 0);

        let expired = lease + chrono::Duration::seconds(1);
        assert_eq!(store.claim_pending(10, expired, expired).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn retry_cap_abandons_notification() {
        let store = Arc::new(MemoryStore::new());
        let pipeline = pipeline(store.clone(), vec![scripted(usize::MAX)]);
        pipeline.enqueue_unlock(7, 1).await;

        pipeline.deliver_pending().await.unwrap();
        for _ in 0..5 {
            pipeline.retry_failed().await.unwrap();
        }
        assert_eq!(
            statuses(&store).await[1],
            (Channel::Chat, NotificationStatus::Failed, 3)
        );
        assert_eq!(pipeline.retry_failed().await.unwrap().requeued, 0);

        let stats = pipeline.stats(24).await.unwrap();
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.abandoned, 1);
        assert_eq!(stats.sent, 1);
    }

    #[tokio::test]
    async fn missing_adapter_on_immediate_channel_fails() {
        let store = Arc::new(MemoryStore::new());
        let pipeline = pipeline(store.clone(), Vec::new());
        pipeline.enqueue_unlock(7, 1).await;

        let report = pipeline.deliver_pending().await.unwrap();
        assert_eq!(report, DeliveryReport { sent: 1, failed: 1 });
    }

    #[tokio::test]
    async fn slow_adapter_times_out_as_failure() {
        let store = Arc::new(MemoryStore::new());
        let slow = Arc::new(Scripted {
            fail_times: 0,
            calls: AtomicUsize::new(0),
            delay: Duration::from_secs(3600),
        });
        let pipeline = pipeline(store.clone(), vec![slow]);
        pipeline.enqueue_unlock(7, 1).await;

        let report = pipeline.deliver_pending().await.unwrap();
        assert_eq!(report.failed, 1);
        let chat = store
            .list_player_notifications(7)
            .await
            .unwrap()
            .into_iter()
            .find(|n| n.channel == Channel::Chat)
            .unwrap();
        assert!(chat.failure_reason.unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn cleanup_removes_expired_rows_of_any_status() {
        let store = Arc::new(MemoryStore::new());
        let pipeline = pipeline(store.clone(), vec![scripted(0)]);
        let created = pipeline.enqueue_unlock(7, 1).await;
        pipeline.deliver_pending().await.unwrap();

        store
            .backdate_notification(created[0].id, Utc::now() - chrono::Duration::days(31))
            .unwrap();
        assert_eq!(pipeline.cleanup_expired().await.unwrap(), 1);
        assert_eq!(store.list_player_notifications(7).await.unwrap().len(), 1);
    }
}
