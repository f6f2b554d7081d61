//! Periodic notification sweeps.
//!
//! Delivery, retry and cleanup each run on their own `tokio::time::interval`
//! until the cancellation token fires. A failed pass is logged and the loop
//! carries on with the next tick.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::EngineConfig;
use crate::pipeline::NotificationPipeline;

#[derive(Clone)]
pub struct NotificationSweeps {
    pipeline: Arc<NotificationPipeline>,
    delivery_interval: Duration,
    retry_interval: Duration,
    cleanup_interval: Duration,
}

impl NotificationSweeps {
    pub fn new(pipeline: Arc<NotificationPipeline>, config: &EngineConfig) -> Self {
        Self {
            pipeline,
            delivery_interval: config.delivery_interval,
            retry_interval: config.retry_interval,
            cleanup_interval: config.cleanup_interval,
        }
    }

    /// Spawn the three sweep loops.
    pub fn spawn(&self, cancel: CancellationToken) -> Vec<JoinHandle<()>> {
        vec![
            tokio::spawn(self.clone().run_delivery(cancel.clone())),
            tokio::spawn(self.clone().run_retry(cancel.clone())),
            tokio::spawn(self.clone().run_cleanup(cancel)),
        ]
    }

    pub async fn run_delivery(self, cancel: CancellationToken) {
        tracing::info!(
            interval_secs = self.delivery_interval.as_secs(),
            "Notification delivery sweep started"
        );
        let mut interval = tokio::time::interval(self.delivery_interval);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Notification delivery sweep stopping");
                    break;
                }
                _ = interval.tick() => {
                    match self.pipeline.deliver_pending().await {
                        Ok(report) if report.sent + report.failed > 0 => {
                            tracing::info!(
                                sent = report.sent,
                                failed = report.failed,
                                "Delivery sweep: processed pending notifications"
                            );
                        }
                        Ok(_) => tracing::debug!("Delivery sweep: nothing pending"),
                        Err(e) => tracing::error!(error = %e, "Delivery sweep failed"),
                    }
                }
            }
        }
    }

    pub async fn run_retry(self, cancel: CancellationToken) {
        tracing::info!(
            interval_secs = self.retry_interval.as_secs(),
            max_retries = self.pipeline.policy().max_retries,
            "Notification retry sweep started"
        );
        let mut interval = tokio::time::interval(self.retry_interval);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Notification retry sweep stopping");
                    break;
                }
                _ = interval.tick() => {
                    match self.pipeline.retry_failed().await {
                        Ok(report) if report.requeued > 0 => {
                            tracing::info!(
                                requeued = report.requeued,
                                sent = report.delivery.sent,
                                failed = report.delivery.failed,
                                "Retry sweep: redelivered failed notifications"
                            );
                        }
                        Ok(_) => tracing::debug!("Retry sweep: nothing to retry"),
                        Err(e) => tracing::error!(error = %e, "Retry sweep failed"),
                    }
                }
            }
        }
    }

    pub async fn run_cleanup(self, cancel: CancellationToken) {
        tracing::info!(
            interval_secs = self.cleanup_interval.as_secs(),
            retention_days = self.pipeline.policy().retention.num_days(),
            "Notification cleanup sweep started"
        );
        let mut interval = tokio::time::interval(self.cleanup_interval);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Notification cleanup sweep stopping");
                    break;
                }
                _ = interval.tick() => {
                    match self.pipeline.cleanup_expired().await {
                        Ok(deleted) if deleted > 0 => {
                            tracing::info!(deleted, "Cleanup sweep: purged expired notifications");
                        }
                        Ok(_) => tracing::debug!("Cleanup sweep: no rows to purge"),
                        Err(e) => tracing::error!(error = %e, "Cleanup sweep failed"),
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use crate::metrics::EngineMetrics;
    use crate::registry::{AchievementRegistry, CatalogSnapshot};
    use podium_core::achievement::Achievement;
    use podium_core::channels::Channel;
    use podium_core::criteria::{Criteria, CriteriaCategory};
    use podium_core::notification::{NotificationStatus, RetryPolicy};
    use podium_core::store::NotificationStore;

    #[tokio::test]
    async fn delivery_sweep_sends_pending_in_app_rows() {
        let store = Arc::new(MemoryStore::new());
        let registry = Arc::new(AchievementRegistry::new());
        registry.replace(CatalogSnapshot::build(
            vec![Achievement {
                id: 1,
                key: "first".into(),
                name: "First".into(),
                description: String::new(),
                icon: None,
                criteria: Criteria::new(CriteriaCategory::GameCount, 1),
                points: 1,
                is_hidden: false,
            }],
            Vec::new(),
        ));
        let pipeline = Arc::new(NotificationPipeline::new(
            store.clone(),
            store.clone(),
            registry,
            Vec::new(),
            vec![Channel::InApp],
            RetryPolicy::default(),
            Duration::from_secs(1),
            100,
            Arc::new(EngineMetrics::default()),
        ));
        pipeline.enqueue_unlock(3, 1).await;

        let config = EngineConfig {
            delivery_interval: Duration::from_millis(10),
            ..EngineConfig::default()
        };
        let cancel = CancellationToken::new();
        let handles = NotificationSweeps::new(pipeline, &config).spawn(cancel.clone());

        let mut status = NotificationStatus::Pending;
        for _ in 0..100 {
            status = store.list_player_notifications(3).await.unwrap()[0].status;
            if status == NotificationStatus::Sent {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(status, NotificationStatus::Sent);

        cancel.cancel();
        for handle in handles {
            handle.await.unwrap();
        }
    }
}
