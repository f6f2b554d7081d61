//! [`AchievementEngine`]: the assembled engine and its query and
//! administrative operations.
//!
//! The API and worker binaries build one engine per process. It owns the
//! registry, ledger, dispatcher and notification pipeline and is shared
//! behind an `Arc`.

use std::collections::HashSet;
use std::sync::Arc;

use podium_core::achievement::{Achievement, AchievementDependency};
use podium_core::catalog_config::{CatalogConfig, ConfigLoadReport, RejectedEntry};
use podium_core::channels::{Channel, DeliveryPolicy};
use podium_core::context::GameEvent;
use podium_core::criteria::{CriteriaCategory, TriggerEventType};
use podium_core::dependency_graph::DependencyNode;
use podium_core::error::CoreError;
use podium_core::evaluators::EvaluatorRegistry;
use podium_core::notification::{Notification, NotificationStats};
use podium_core::progress::ProgressRecord;
use podium_core::store::{
    CatalogStore, NotificationStore, PlayerDirectory, ProgressQuery, ProgressStore,
};
use podium_core::types::{DbId, Timestamp};
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::bus::EventBus;
use crate::config::EngineConfig;
use crate::delivery::{ChannelAdapter, ChatWebhookChannel, DeliveryError};
use crate::dispatcher::{DispatchError, EventDispatcher};
use crate::ledger::ProgressLedger;
use crate::metrics::{EngineMetrics, MetricsSnapshot};
use crate::pipeline::NotificationPipeline;
use crate::registry::AchievementRegistry;
use crate::sweeps::NotificationSweeps;

/// Name shown for hidden achievements the player has not earned.
pub const HIDDEN_NAME: &str = "Hidden achievement";
/// Description shown for hidden achievements the player has not earned.
pub const HIDDEN_DESCRIPTION: &str = "Keep playing to reveal this achievement.";

/// Largest page of raw progress rows.
pub const MAX_PROGRESS_PAGE: i64 = 1000;

// ---------------------------------------------------------------------------
// Stores
// ---------------------------------------------------------------------------

/// The four storage seams the engine needs.
#[derive(Clone)]
pub struct EngineStores {
    pub catalog: Arc<dyn CatalogStore>,
    pub progress: Arc<dyn ProgressStore>,
    pub notifications: Arc<dyn NotificationStore>,
    pub players: Arc<dyn PlayerDirectory>,
}

impl EngineStores {
    /// Use one backend for every seam.
    pub fn from_shared<S>(store: Arc<S>) -> Self
    where
        S: CatalogStore + ProgressStore + NotificationStore + PlayerDirectory + 'static,
    {
        Self {
            catalog: store.clone(),
            progress: store.clone(),
            notifications: store.clone(),
            players: store,
        }
    }
}

/// Adapters for every immediate channel. The chat adapter is disabled when
/// no webhook URL is configured. Deferred channels such as the in-app feed
/// need no adapter.
pub fn default_adapters(config: &EngineConfig) -> Result<Vec<Arc<dyn ChannelAdapter>>, DeliveryError> {
    let chat = ChatWebhookChannel::new(config.chat_webhook_url.clone())?;
    Ok(vec![Arc::new(chat) as Arc<dyn ChannelAdapter>])
}

// ---------------------------------------------------------------------------
// Views
// ---------------------------------------------------------------------------

/// One achievement as seen by one player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlayerAchievementView {
    pub achievement_id: DbId,
    pub key: String,
    pub name: String,
    pub description: String,
    pub icon: Option<String>,
    pub points: i32,
    pub category: CriteriaCategory,
    pub target: i64,
    pub progress: i64,
    pub achieved: bool,
    pub date_earned: Option<Timestamp>,
    /// Every REQUIRED prerequisite is achieved.
    pub eligible: bool,
    /// No UNLOCKS prerequisite, or at least one achieved.
    pub visible: bool,
    /// Name and description are masked.
    pub hidden: bool,
    pub opponent_name: Option<String>,
    pub game_played_at: Option<Timestamp>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlayerAchievements {
    pub player_id: DbId,
    pub display_name: String,
    pub total_points: i64,
    pub achieved_count: usize,
    pub achievements: Vec<PlayerAchievementView>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlayerAchievementTree {
    pub player_id: DbId,
    /// One tree per achievement that nothing else depends on.
    pub roots: Vec<DependencyNode>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AchievementDependencies {
    pub achievement_id: DbId,
    pub prerequisites: Vec<AchievementDependency>,
    pub dependents: Vec<AchievementDependency>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReevaluationReport {
    pub players: usize,
    pub unlocked: usize,
    pub failed_players: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ResetReport {
    pub progress_deleted: u64,
    pub notifications_deleted: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineStats {
    #[serde(flatten)]
    pub notifications: NotificationStats,
    pub engine: MetricsSnapshot,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

pub struct AchievementEngine {
    stores: EngineStores,
    registry: Arc<AchievementRegistry>,
    ledger: Arc<ProgressLedger>,
    dispatcher: Arc<EventDispatcher>,
    pipeline: Arc<NotificationPipeline>,
    sweeps: NotificationSweeps,
    metrics: Arc<EngineMetrics>,
    bus: EventBus,
    reset_token: Option<String>,
}

impl AchievementEngine {
    /// Assemble the engine and load the catalog snapshot from storage.
    ///
    /// Configured channels that are not deferred and have no enabled adapter
    /// are dropped with a warning.
    pub async fn new(
        stores: EngineStores,
        config: EngineConfig,
        adapters: Vec<Arc<dyn ChannelAdapter>>,
    ) -> Result<Self, CoreError> {
        let metrics = Arc::new(EngineMetrics::default());
        let registry = Arc::new(AchievementRegistry::new());
        registry.rebuild(stores.catalog.as_ref()).await?;

        let channels = active_channels(&config.channels, &adapters);
        let pipeline = Arc::new(NotificationPipeline::new(
            stores.notifications.clone(),
            stores.players.clone(),
            registry.clone(),
            adapters,
            channels,
            config.retry_policy,
            config.delivery_timeout,
            config.delivery_batch_size,
            metrics.clone(),
        ));
        let ledger = Arc::new(ProgressLedger::new(
            stores.progress.clone(),
            stores.players.clone(),
            registry.clone(),
            Arc::new(EvaluatorRegistry::with_builtins()),
            pipeline.clone(),
            metrics.clone(),
            config.cascade_max_depth,
        ));
        let dispatcher = Arc::new(EventDispatcher::new(
            ledger.clone(),
            metrics.clone(),
            config.queue_capacity,
            config.workers,
        ));
        let sweeps = NotificationSweeps::new(pipeline.clone(), &config);

        tracing::info!(
            channels = ?pipeline.channels(),
            queue_capacity = config.queue_capacity,
            workers = config.workers,
            "Achievement engine ready"
        );

        Ok(Self {
            stores,
            registry,
            ledger,
            dispatcher,
            pipeline,
            sweeps,
            metrics,
            bus: EventBus::default(),
            reset_token: None,
        })
    }

    /// Token that authorises [`AchievementEngine::reset_progress`]. Without
    /// one, reset is refused.
    pub fn with_reset_token(mut self, token: Option<String>) -> Self {
        self.reset_token = token.filter(|t| !t.is_empty());
        self
    }

    pub fn registry(&self) -> &Arc<AchievementRegistry> {
        &self.registry
    }

    pub fn dispatcher(&self) -> &Arc<EventDispatcher> {
        &self.dispatcher
    }

    pub fn pipeline(&self) -> &Arc<NotificationPipeline> {
        &self.pipeline
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    // -----------------------------------------------------------------------
    // Background tasks
    // -----------------------------------------------------------------------

    /// Start the dispatcher workers and the bus listener.
    pub fn spawn_workers(&self, cancel: CancellationToken) -> Vec<JoinHandle<()>> {
        let mut handles = self.dispatcher.spawn_workers(cancel.clone());
        let dispatcher = self.dispatcher.clone();
        let receiver = self.bus.subscribe();
        handles.push(tokio::spawn(async move {
            dispatcher.run_bus_listener(receiver, cancel).await
        }));
        handles
    }

    /// Start the delivery, retry and cleanup sweeps.
    pub fn spawn_sweeps(&self, cancel: CancellationToken) -> Vec<JoinHandle<()>> {
        self.sweeps.spawn(cancel)
    }

    // -----------------------------------------------------------------------
    // Ingestion
    // -----------------------------------------------------------------------

    /// Validate and queue an event without waiting for capacity.
    pub fn try_ingest(&self, event: GameEvent) -> Result<(), IngestError> {
        validate_event(&event)?;
        self.dispatcher.try_submit(event)?;
        Ok(())
    }

    /// Validate and queue an event, waiting for capacity.
    pub async fn ingest(&self, event: GameEvent) -> Result<(), IngestError> {
        validate_event(&event)?;
        self.dispatcher.submit(event).await?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Every achievement with the player's progress, eligibility and
    /// visibility. Hidden achievements the player has not earned are masked.
    pub async fn player_achievements(&self, player_id: DbId) -> Result<PlayerAchievements, CoreError> {
        let player = self
            .stores
            .players
            .find_player(player_id)
            .await?
            .ok_or(CoreError::NotFound {
                entity: "Player",
                id: player_id,
            })?;
        let snapshot = self.registry.snapshot();
        let records: std::collections::HashMap<DbId, ProgressRecord> = self
            .stores
            .progress
            .list_player_progress(player_id)
            .await?
            .into_iter()
            .map(|r| (r.achievement_id, r))
            .collect();
        let achieved: HashSet<DbId> = records
            .values()
            .filter(|r| r.achieved)
            .map(|r| r.achievement_id)
            .collect();

        let achievements: Vec<PlayerAchievementView> = snapshot
            .sorted()
            .into_iter()
            .map(|a| {
                view(
                    a,
                    records.get(&a.id),
                    snapshot.graph.is_eligible(a.id, &achieved),
                    snapshot.graph.is_visible(a.id, &achieved),
                )
            })
            .collect();
        let total_points = achievements
            .iter()
            .filter(|v| v.achieved)
            .map(|v| i64::from(v.points))
            .sum();

        Ok(PlayerAchievements {
            player_id,
            display_name: player.display_name,
            total_points,
            achieved_count: achieved.len(),
            achievements,
        })
    }

    /// Dependency forest with the player's achieved flags.
    pub async fn player_tree(&self, player_id: DbId) -> Result<PlayerAchievementTree, CoreError> {
        self.require_player(player_id).await?;
        let snapshot = self.registry.snapshot();
        let achieved = self.stores.progress.achieved_ids(player_id).await?;
        let roots = snapshot
            .sorted()
            .into_iter()
            .filter(|a| snapshot.graph.dependents_of(a.id).is_empty())
            .map(|a| snapshot.graph.tree(a.id, &achieved))
            .collect();
        Ok(PlayerAchievementTree { player_id, roots })
    }

    /// Raw progress rows for analytics consumers.
    pub async fn analytics_progress(
        &self,
        mut query: ProgressQuery,
    ) -> Result<Vec<ProgressRecord>, CoreError> {
        if query.limit <= 0 || query.offset < 0 {
            return Err(CoreError::Validation(
                "limit must be positive and offset non-negative".into(),
            ));
        }
        query.limit = query.limit.min(MAX_PROGRESS_PAGE);
        self.stores.progress.list_progress(query).await
    }

    /// The catalog ordered by id.
    pub fn achievements(&self) -> Vec<Achievement> {
        self.registry
            .snapshot()
            .sorted()
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn achievement_dependencies(
        &self,
        achievement_id: DbId,
    ) -> Result<AchievementDependencies, CoreError> {
        let snapshot = self.registry.snapshot();
        if snapshot.achievement(achievement_id).is_none() {
            return Err(CoreError::NotFound {
                entity: "Achievement",
                id: achievement_id,
            });
        }
        let mut prerequisites: Vec<_> = snapshot
            .graph
            .prerequisites_of(achievement_id, None)
            .into_iter()
            .collect();
        prerequisites.sort();
        let mut dependents: Vec<_> = snapshot
            .graph
            .dependents_of(achievement_id)
            .into_iter()
            .collect();
        dependents.sort();
        Ok(AchievementDependencies {
            achievement_id,
            prerequisites,
            dependents,
        })
    }

    /// The player's in-app feed, newest first.
    pub async fn player_notifications(&self, player_id: DbId) -> Result<Vec<Notification>, CoreError> {
        self.require_player(player_id).await?;
        let mut feed: Vec<Notification> = self
            .stores
            .notifications
            .list_player_notifications(player_id)
            .await?
            .into_iter()
            .filter(|n| n.channel == Channel::InApp)
            .collect();
        feed.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(feed)
    }

    /// Notification counts over the last `window_hours` plus engine counters.
    pub async fn notification_stats(&self, window_hours: i64) -> Result<EngineStats, CoreError> {
        if window_hours <= 0 {
            return Err(CoreError::Validation("hours must be positive".into()));
        }
        Ok(EngineStats {
            notifications: self.pipeline.stats(window_hours).await?,
            engine: self.metrics.snapshot(),
        })
    }

    // -----------------------------------------------------------------------
    // Administration
    // -----------------------------------------------------------------------

    /// Add a dependency edge after a cycle check. Returns `false` if the edge
    /// already existed.
    pub async fn add_dependency(&self, edge: AchievementDependency) -> Result<bool, CoreError> {
        let _guard = self.registry.lock_edits().await;
        let snapshot = self.registry.snapshot();
        for id in [edge.achievement_id, edge.prerequisite_id] {
            if snapshot.achievement(id).is_none() {
                return Err(CoreError::NotFound {
                    entity: "Achievement",
                    id,
                });
            }
        }
        if snapshot.graph.contains(&edge) {
            return Ok(false);
        }
        if snapshot
            .graph
            .would_create_cycle(edge.achievement_id, edge.prerequisite_id)
        {
            return Err(CoreError::Cycle {
                achievement_id: edge.achievement_id,
                prerequisite_id: edge.prerequisite_id,
            });
        }

        let inserted = self.stores.catalog.insert_dependency(&edge).await?;
        self.registry.rebuild(self.stores.catalog.as_ref()).await?;
        tracing::info!(
            achievement_id = edge.achievement_id,
            prerequisite_id = edge.prerequisite_id,
            kind = edge.kind.as_str(),
            "Dependency added"
        );
        Ok(inserted)
    }

    pub async fn remove_dependency(&self, edge: AchievementDependency) -> Result<(), CoreError> {
        let _guard = self.registry.lock_edits().await;
        if !self.stores.catalog.delete_dependency(&edge).await? {
            return Err(CoreError::NotFound {
                entity: "Dependency",
                id: edge.achievement_id,
            });
        }
        self.registry.rebuild(self.stores.catalog.as_ref()).await?;
        tracing::info!(
            achievement_id = edge.achievement_id,
            prerequisite_id = edge.prerequisite_id,
            kind = edge.kind.as_str(),
            "Dependency removed"
        );
        Ok(())
    }

    /// Promote every stalled record of one player. Returns the newly
    /// unlocked achievement ids.
    pub async fn reevaluate_player(&self, player_id: DbId) -> Result<Vec<DbId>, CoreError> {
        self.require_player(player_id).await?;
        self.ledger.reevaluate_player(player_id).await
    }

    /// Re-evaluate every player that has progress. A failing player is
    /// logged and skipped.
    pub async fn reevaluate_all(&self) -> Result<ReevaluationReport, CoreError> {
        let players = self.stores.progress.players_with_progress().await?;
        let mut report = ReevaluationReport {
            players: players.len(),
            ..ReevaluationReport::default()
        };
        for player_id in players {
            match self.ledger.reevaluate_player(player_id).await {
                Ok(unlocked) => report.unlocked += unlocked.len(),
                Err(e) => {
                    report.failed_players += 1;
                    tracing::error!(player_id, error = %e, "Re-evaluation failed");
                }
            }
        }
        tracing::info!(
            players = report.players,
            unlocked = report.unlocked,
            failed = report.failed_players,
            "Re-evaluated all players"
        );
        Ok(report)
    }

    /// Delete all progress and notifications. Requires the configured
    /// confirmation token.
    pub async fn reset_progress(&self, token: &str) -> Result<ResetReport, CoreError> {
        match &self.reset_token {
            None => {
                return Err(CoreError::Forbidden(
                    "progress reset is disabled on this server".into(),
                ));
            }
            Some(expected) if expected != token => {
                tracing::warn!("Progress reset refused: bad confirmation token");
                return Err(CoreError::Forbidden("invalid confirmation token".into()));
            }
            Some(_) => {}
        }

        let notifications_deleted = self.stores.notifications.delete_all_notifications().await?;
        let progress_deleted = self.stores.progress.reset_all_progress().await?;
        tracing::warn!(progress_deleted, notifications_deleted, "All achievement progress reset");
        Ok(ResetReport {
            progress_deleted,
            notifications_deleted,
        })
    }

    /// Apply a declarative catalog.
    ///
    /// Invalid achievements and dependencies are reported individually; the
    /// rest are applied. The registry is rebuilt afterwards.
    pub async fn load_config(&self, config: &CatalogConfig) -> Result<ConfigLoadReport, CoreError> {
        let _guard = self.registry.lock_edits().await;
        let (definitions, rejected) = config.check();
        let mut report = ConfigLoadReport {
            rejected,
            ..ConfigLoadReport::default()
        };

        for definition in &definitions {
            match self.stores.catalog.upsert_achievement(definition).await {
                Ok(achievement) => report.loaded.push(achievement.key),
                Err(e) => {
                    tracing::error!(key = %definition.key, error = %e, "Failed to store achievement");
                    report
                        .rejected
                        .push(RejectedEntry::new(definition.key.clone(), e));
                }
            }
        }

        let snapshot = self.registry.rebuild(self.stores.catalog.as_ref()).await?;
        let mut graph = snapshot.graph.clone();
        for dependency in &config.dependencies {
            let label = dependency.label();
            let achievement = snapshot.by_key(dependency.achievement.trim());
            let prerequisite = snapshot.by_key(dependency.prerequisite.trim());
            let (Some(achievement), Some(prerequisite)) = (achievement, prerequisite) else {
                report
                    .dependencies_rejected
                    .push(RejectedEntry::new(label, "unknown achievement key"));
                continue;
            };

            let edge = AchievementDependency::new(achievement.id, prerequisite.id, dependency.kind);
            match graph.add_edge(edge) {
                Ok(false) => {}
                Ok(true) => match self.stores.catalog.insert_dependency(&edge).await {
                    Ok(_) => report.dependencies_added += 1,
                    Err(e) => {
                        graph.remove_edge(&edge);
                        report.dependencies_rejected.push(RejectedEntry::new(label, e));
                    }
                },
                Err(e) => report.dependencies_rejected.push(RejectedEntry::new(label, e)),
            }
        }
        if report.dependencies_added > 0 {
            self.registry.rebuild(self.stores.catalog.as_ref()).await?;
        }

        if report.is_clean() {
            tracing::info!(
                loaded = report.loaded.len(),
                dependencies_added = report.dependencies_added,
                "Achievement catalog loaded"
            );
        } else {
            tracing::warn!(
                loaded = report.loaded.len(),
                rejected = report.rejected.len(),
                dependencies_added = report.dependencies_added,
                dependencies_rejected = report.dependencies_rejected.len(),
                "Achievement catalog loaded with rejections"
            );
        }
        Ok(report)
    }

    async fn require_player(&self, player_id: DbId) -> Result<(), CoreError> {
        match self.stores.players.find_player(player_id).await? {
            Some(_) => Ok(()),
            None => Err(CoreError::NotFound {
                entity: "Player",
                id: player_id,
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Why an event was not queued.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error(transparent)]
    Invalid(#[from] CoreError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

/// Structural checks on an incoming event.
pub fn validate_event(event: &GameEvent) -> Result<(), CoreError> {
    let missing = match event.event_type {
        TriggerEventType::GameCompleted if event.game.is_none() => Some("game"),
        TriggerEventType::TournamentEvent if event.tournament.is_none() => Some("tournament"),
        TriggerEventType::StreakChanged if event.streaks.is_empty() => Some("streaks"),
        _ => None,
    };
    if let Some(field) = missing {
        return Err(CoreError::Validation(format!(
            "{} event requires '{field}'",
            event.event_type.as_str()
        )));
    }
    if event.affected_players().is_empty() {
        return Err(CoreError::Validation("event has no affected players".into()));
    }
    Ok(())
}

fn active_channels(configured: &[Channel], adapters: &[Arc<dyn ChannelAdapter>]) -> Vec<Channel> {
    configured
        .iter()
        .copied()
        .filter(|channel| {
            let usable = channel.policy() == DeliveryPolicy::Deferred
                || adapters
                    .iter()
                    .any(|a| a.channel() == *channel && a.is_enabled());
            if !usable {
                tracing::warn!(channel = %channel, "No enabled adapter, channel disabled");
            }
            usable
        })
        .collect()
}

fn view(
    achievement: &Achievement,
    record: Option<&ProgressRecord>,
    eligible: bool,
    visible: bool,
) -> PlayerAchievementView {
    let achieved = record.is_some_and(|r| r.achieved);
    let masked = achievement.is_hidden && !achieved;
    PlayerAchievementView {
        achievement_id: achievement.id,
        key: achievement.key.clone(),
        name: if masked {
            HIDDEN_NAME.to_string()
        } else {
            achievement.name.clone()
        },
        description: if masked {
            HIDDEN_DESCRIPTION.to_string()
        } else {
            achievement.description.clone()
        },
        icon: if masked { None } else { achievement.icon.clone() },
        points: achievement.points,
        category: achievement.criteria.category,
        target: achievement.criteria.target,
        progress: record.map_or(0, |r| r.progress),
        achieved,
        date_earned: record.and_then(|r| r.date_earned),
        eligible,
        visible,
        hidden: masked,
        opponent_name: record.and_then(|r| r.opponent_name.clone()),
        game_played_at: record.and_then(|r| r.game_played_at),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use assert_matches::assert_matches;
    use chrono::Utc;
    use podium_core::achievement::DependencyKind;
    use podium_core::context::{GameOutcome, PlayerSnapshot};
    use podium_core::notification::NotificationStatus;

    const CATALOG: &str = r#"{
        "achievements": [
            { "key": "first_win", "name": "First Win", "description": "Win a game",
              "points": 10, "criteria": { "category": "win_count", "target": 1 } },
            { "key": "veteran", "name": "Veteran", "description": "Play three games",
              "points": 20, "criteria": { "category": "game_count", "target": 3 } },
            { "key": "secret", "name": "Secret", "description": "Shutout",
              "points": 50, "hidden": true,
              "criteria": { "category": "winner_against_zero", "target": 1 } },
            { "key": "broken", "name": "Broken",
              "criteria": { "category": "close_game", "target": 1 } },
            { "key": "mystery", "name": "Mystery", "criteria": { "category": "teleport" } }
        ],
        "dependencies": [
            { "achievement": "veteran", "prerequisite": "first_win", "kind": "unlocks" },
            { "achievement": "first_win", "prerequisite": "veteran" },
            { "achievement": "veteran", "prerequisite": "nope" }
        ]
    }"#;

    async fn engine() -> (AchievementEngine, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        store.upsert_player(PlayerSnapshot::new(7, "Ada")).unwrap();
        store.upsert_player(PlayerSnapshot::new(8, "Brook")).unwrap();
        let config = EngineConfig {
            channels: vec![Channel::InApp, Channel::Chat],
            ..EngineConfig::default()
        };
        let adapters = default_adapters(&config).unwrap();
        let engine = AchievementEngine::new(EngineStores::from_shared(store.clone()), config, adapters)
            .await
            .unwrap()
            .with_reset_token(Some("confirm-reset".into()));
        let report = engine
            .load_config(&CatalogConfig::from_json(CATALOG).unwrap())
            .await
            .unwrap();
        assert_eq!(report.loaded, vec!["first_win", "veteran", "secret"]);
        (engine, store)
    }

    fn id_of(engine: &AchievementEngine, key: &str) -> DbId {
        engine.registry().snapshot().by_key(key).unwrap().id
    }

    fn win(challenger_score: i32, opponent_score: i32) -> GameEvent {
        GameEvent::game_completed(
            "pool",
            GameOutcome {
                game_id: None,
                challenger_id: 7,
                opponent_id: 8,
                challenger_score,
                opponent_score,
                played_at: Utc::now(),
            },
        )
    }

    #[tokio::test]
    async fn config_load_reports_rejections_individually() {
        let store = Arc::new(MemoryStore::new());
        let engine = AchievementEngine::new(
            EngineStores::from_shared(store),
            EngineConfig::default(),
            Vec::new(),
        )
        .await
        .unwrap();
        let report = engine
            .load_config(&CatalogConfig::from_json(CATALOG).unwrap())
            .await
            .unwrap();

        let rejected: Vec<&str> = report.rejected.iter().map(|r| r.item.as_str()).collect();
        assert_eq!(rejected, vec!["broken", "mystery"]);
        assert_eq!(report.dependencies_added, 1);
        assert_eq!(report.dependencies_rejected.len(), 2);
        assert_eq!(engine.achievements().len(), 3);
    }

    #[tokio::test]
    async fn chat_without_webhook_is_dropped() {
        let (engine, _) = engine().await;
        assert_eq!(engine.pipeline().channels(), &[Channel::InApp]);
    }

    #[test]
    fn default_adapters_cover_only_immediate_channels() {
        let adapters = default_adapters(&EngineConfig::default()).unwrap();
        assert_eq!(adapters.len(), 1);
        assert_eq!(adapters[0].channel(), Channel::Chat);
        assert_eq!(adapters[0].channel().policy(), DeliveryPolicy::Immediate);
    }

    #[tokio::test]
    async fn unlocks_edge_reveals_dependent_with_zero_progress() {
        let (engine, _) = engine().await;
        let veteran = id_of(&engine, "veteran");

        let before = engine.player_achievements(7).await.unwrap();
        let row = before
            .achievements
            .iter()
            .find(|v| v.achievement_id == veteran)
            .unwrap();
        assert!(!row.visible);
        assert!(row.eligible);

        engine.dispatcher().process_event(&win(11, 4)).await;

        let after = engine.player_achievements(7).await.unwrap();
        let row = after
            .achievements
            .iter()
            .find(|v| v.achievement_id == veteran)
            .unwrap();
        assert!(row.visible);
        assert_eq!(row.progress, 1);
        assert_eq!(after.total_points, 10);

        let loser = engine.player_achievements(8).await.unwrap();
        let row = loser
            .achievements
            .iter()
            .find(|v| v.achievement_id == veteran)
            .unwrap();
        assert!(!row.visible);
    }

    #[tokio::test]
    async fn hidden_achievement_is_masked_until_earned() {
        let (engine, _) = engine().await;
        let secret = id_of(&engine, "secret");
        let find = |list: &PlayerAchievements| {
            list.achievements
                .iter()
                .find(|v| v.achievement_id == secret)
                .cloned()
                .unwrap()
        };

        let masked = find(&engine.player_achievements(7).await.unwrap());
        assert!(masked.hidden);
        assert_eq!(masked.name, HIDDEN_NAME);

        engine.dispatcher().process_event(&win(11, 0)).await;
        let revealed = find(&engine.player_achievements(7).await.unwrap());
        assert!(!revealed.hidden);
        assert_eq!(revealed.name, "Secret");
        assert_eq!(revealed.opponent_name.as_deref(), Some("Brook"));
    }

    #[tokio::test]
    async fn unknown_player_is_not_found() {
        let (engine, _) = engine().await;
        assert_matches!(
            engine.player_achievements(99).await,
            Err(CoreError::NotFound { entity: "Player", id: 99 })
        );
        assert_matches!(engine.player_tree(99).await, Err(CoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn reverse_edge_is_a_cycle() {
        let (engine, _) = engine().await;
        let first = id_of(&engine, "first_win");
        let secret = id_of(&engine, "secret");

        assert!(engine
            .add_dependency(AchievementDependency::new(secret, first, DependencyKind::Required))
            .await
            .unwrap());
        assert_matches!(
            engine
                .add_dependency(AchievementDependency::new(first, secret, DependencyKind::Required))
                .await,
            Err(CoreError::Cycle { .. })
        );
        assert_matches!(
            engine
                .add_dependency(AchievementDependency::new(first, 999, DependencyKind::Required))
                .await,
            Err(CoreError::NotFound { id: 999, .. })
        );

        let deps = engine.achievement_dependencies(first).unwrap();
        assert_eq!(deps.dependents.len(), 2);
    }

    #[tokio::test]
    async fn removing_required_edge_then_reevaluating_unlocks() {
        let (engine, _) = engine().await;
        let veteran = id_of(&engine, "veteran");
        let secret = id_of(&engine, "secret");
        let edge = AchievementDependency::new(secret, veteran, DependencyKind::Required);
        engine.add_dependency(edge).await.unwrap();

        // Shutout meets the secret's target while veteran is still open.
        engine.dispatcher().process_event(&win(11, 0)).await;
        let list = engine.player_achievements(7).await.unwrap();
        let row = list
            .achievements
            .iter()
            .find(|v| v.achievement_id == secret)
            .unwrap();
        assert!(!row.achieved);
        assert!(!row.eligible);
        assert_eq!(row.progress, 1);

        engine.remove_dependency(edge).await.unwrap();
        assert_matches!(
            engine.remove_dependency(edge).await,
            Err(CoreError::NotFound { entity: "Dependency", .. })
        );
        assert_eq!(engine.reevaluate_player(7).await.unwrap(), vec![secret]);
        assert!(engine.reevaluate_player(7).await.unwrap().is_empty());

        let report = engine.reevaluate_all().await.unwrap();
        assert_eq!(report.players, 2);
        assert_eq!(report.unlocked, 0);
    }

    #[tokio::test]
    async fn reset_requires_the_token() {
        let (engine, store) = engine().await;
        engine.dispatcher().process_event(&win(11, 4)).await;

        assert_matches!(engine.reset_progress("guess").await, Err(CoreError::Forbidden(_)));
        let report = engine.reset_progress("confirm-reset").await.unwrap();
        assert!(report.progress_deleted > 0);
        assert_eq!(report.notifications_deleted, 1);
        assert!(store.list_player_progress(7).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn stats_include_engine_counters() {
        let (engine, _) = engine().await;
        engine.try_ingest(win(11, 4)).unwrap();
        engine.dispatcher().process_event(&win(11, 4)).await;
        engine.pipeline().deliver_pending().await.unwrap();

        let stats = engine.notification_stats(24).await.unwrap();
        assert_eq!(stats.notifications.sent, 1);
        assert_eq!(stats.engine.events_accepted, 1);
        assert_eq!(stats.engine.unlocks, 1);
        assert_matches!(engine.notification_stats(0).await, Err(CoreError::Validation(_)));

        let feed = engine.player_notifications(7).await.unwrap();
        assert_eq!(feed.len(), 1);
        assert_eq!(feed[0].status, NotificationStatus::Sent);
    }

    #[test]
    fn events_without_context_are_rejected() {
        let mut event = win(1, 0);
        event.game = None;
        assert_matches!(validate_event(&event), Err(CoreError::Validation(_)));
        assert_matches!(
            validate_event(&GameEvent::new(TriggerEventType::RatingChanged)),
            Err(CoreError::Validation(_))
        );
        assert!(validate_event(&GameEvent::rating_changed(7)).is_ok());
    }
}
