//! In-process storage backend.
//!
//! [`MemoryStore`] implements every storage trait with plain collections. It
//! backs the test suites and the API's development mode when no database is
//! configured. Progress records are locked per (player, achievement) key; the
//! outer map lock is only held to look a key up.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use podium_core::achievement::{Achievement, AchievementDependency};
use podium_core::catalog_config::AchievementDefinition;
use podium_core::context::PlayerSnapshot;
use podium_core::error::CoreError;
use podium_core::notification::{
    NewNotification, Notification, NotificationStats, NotificationStatus, RetryPolicy,
};
use podium_core::progress::{apply_update, ProgressRecord, ProgressUpdate, TransitionOutcome};
use podium_core::store::{
    CatalogStore, NotificationStore, PlayerDirectory, ProgressQuery, ProgressStore, StoreResult,
};
use podium_core::types::{DbId, Timestamp};

type ProgressKey = (DbId, DbId);

#[derive(Debug, Default)]
struct Catalog {
    next_id: DbId,
    achievements: BTreeMap<DbId, Achievement>,
    dependencies: Vec<AchievementDependency>,
}

#[derive(Debug, Default)]
struct Notifications {
    next_id: DbId,
    rows: BTreeMap<DbId, Notification>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    catalog: Mutex<Catalog>,
    progress: Mutex<BTreeMap<ProgressKey, Arc<Mutex<ProgressRecord>>>>,
    notifications: Mutex<Notifications>,
    players: Mutex<HashMap<DbId, PlayerSnapshot>>,
}

fn lock<T>(mutex: &Mutex<T>) -> StoreResult<MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|_| CoreError::Storage("memory store lock poisoned".into()))
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace a player snapshot.
    pub fn upsert_player(&self, player: PlayerSnapshot) -> StoreResult<()> {
        lock(&self.players)?.insert(player.id, player);
        Ok(())
    }

    /// Shift a notification's creation time; lets tests age rows.
    pub fn backdate_notification(&self, id: DbId, created_at: Timestamp) -> StoreResult<()> {
        let mut notifications = lock(&self.notifications)?;
        let row = notifications.rows.get_mut(&id).ok_or(CoreError::NotFound {
            entity: "Notification",
            id,
        })?;
        row.created_at = created_at;
        Ok(())
    }

    fn records(&self) -> StoreResult<Vec<ProgressRecord>> {
        let entries: Vec<Arc<Mutex<ProgressRecord>>> =
            lock(&self.progress)?.values().cloned().collect();
        entries
            .iter()
            .map(|entry| lock(entry).map(|r| r.clone()))
            .collect()
    }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn list_achievements(&self) -> StoreResult<Vec<Achievement>> {
        Ok(lock(&self.catalog)?.achievements.values().cloned().collect())
    }

    async fn find_achievement(&self, id: DbId) -> StoreResult<Option<Achievement>> {
        Ok(lock(&self.catalog)?.achievements.get(&id).cloned())
    }

    async fn find_achievement_by_key(&self, key: &str) -> StoreResult<Option<Achievement>> {
        Ok(lock(&self.catalog)?
            .achievements
            .values()
            .find(|a| a.key == key)
            .cloned())
    }

    async fn upsert_achievement(
        &self,
        definition: &AchievementDefinition,
    ) -> StoreResult<Achievement> {
        let mut catalog = lock(&self.catalog)?;
        let existing = catalog
            .achievements
            .values()
            .find(|a| a.key == definition.key)
            .map(|a| a.id);
        let id = match existing {
            Some(id) => id,
            None => {
                catalog.next_id += 1;
                catalog.next_id
            }
        };
        let achievement = Achievement {
            id,
            key: definition.key.clone(),
            name: definition.name.clone(),
            description: definition.description.clone(),
            icon: definition.icon.clone(),
            criteria: definition.criteria.clone(),
            points: definition.points,
            is_hidden: definition.hidden,
        };
        catalog.achievements.insert(id, achievement.clone());
        Ok(achievement)
    }

    async fn list_dependencies(&self) -> StoreResult<Vec<AchievementDependency>> {
        let mut edges = lock(&self.catalog)?.dependencies.clone();
        edges.sort();
        Ok(edges)
    }

    async fn insert_dependency(&self, edge: &AchievementDependency) -> StoreResult<bool> {
        let mut catalog = lock(&self.catalog)?;
        if catalog.dependencies.contains(edge) {
            return Ok(false);
        }
        catalog.dependencies.push(*edge);
        Ok(true)
    }

    async fn delete_dependency(&self, edge: &AchievementDependency) -> StoreResult<bool> {
        let mut catalog = lock(&self.catalog)?;
        let before = catalog.dependencies.len();
        catalog.dependencies.retain(|e| e != edge);
        Ok(catalog.dependencies.len() < before)
    }
}

#[async_trait]
impl ProgressStore for MemoryStore {
    async fn find_progress(
        &self,
        player_id: DbId,
        achievement_id: DbId,
    ) -> StoreResult<Option<ProgressRecord>> {
        let entry = lock(&self.progress)?.get(&(player_id, achievement_id)).cloned();
        match entry {
            Some(entry) => Ok(Some(lock(&entry)?.clone())),
            None => Ok(None),
        }
    }

    async fn list_player_progress(&self, player_id: DbId) -> StoreResult<Vec<ProgressRecord>> {
        let entries: Vec<Arc<Mutex<ProgressRecord>>> = lock(&self.progress)?
            .range((player_id, DbId::MIN)..=(player_id, DbId::MAX))
            .map(|(_, entry)| entry.clone())
            .collect();
        entries
            .iter()
            .map(|entry| lock(entry).map(|r| r.clone()))
            .collect()
    }

    async fn apply_progress(
        &self,
        player_id: DbId,
        achievement_id: DbId,
        update: &ProgressUpdate,
    ) -> StoreResult<(ProgressRecord, TransitionOutcome)> {
        let entry = lock(&self.progress)?
            .entry((player_id, achievement_id))
            .or_insert_with(|| {
                Arc::new(Mutex::new(ProgressRecord::new(
                    player_id,
                    achievement_id,
                    Utc::now(),
                )))
            })
            .clone();

        let mut record = lock(&entry)?;
        let outcome = apply_update(&mut record, update);
        Ok((record.clone(), outcome))
    }

    async fn players_with_progress(&self) -> StoreResult<Vec<DbId>> {
        let mut players: Vec<DbId> = lock(&self.progress)?.keys().map(|(p, _)| *p).collect();
        players.dedup();
        Ok(players)
    }

    async fn list_progress(&self, query: ProgressQuery) -> StoreResult<Vec<ProgressRecord>> {
        Ok(self
            .records()?
            .into_iter()
            .filter(|r| query.achievement_id.map_or(true, |id| r.achievement_id == id))
            .skip(query.offset.max(0) as usize)
            .take(query.limit.max(0) as usize)
            .collect())
    }

    async fn reset_all_progress(&self) -> StoreResult<u64> {
        let mut progress = lock(&self.progress)?;
        let removed = progress.len() as u64;
        progress.clear();
        Ok(removed)
    }
}

#[async_trait]
impl NotificationStore for MemoryStore {
    async fn create_notification(
        &self,
        new: &NewNotification,
    ) -> StoreResult<Option<Notification>> {
        let mut notifications = lock(&self.notifications)?;
        let exists = notifications.rows.values().any(|n| {
            n.player_id == new.player_id
                && n.achievement_id == new.achievement_id
                && n.channel == new.channel
        });
        if exists {
            return Ok(None);
        }

        notifications.next_id += 1;
        let now = Utc::now();
        let notification = Notification {
            id: notifications.next_id,
            player_id: new.player_id,
            achievement_id: new.achievement_id,
            channel: new.channel,
            status: NotificationStatus::Pending,
            retry_count: 0,
            failure_reason: None,
            created_at: now,
            updated_at: now,
            sent_at: None,
            claimed_until: None,
        };
        notifications
            .rows
            .insert(notification.id, notification.clone());
        Ok(Some(notification))
    }

    async fn claim_pending(
        &self,
        limit: i64,
        now: Timestamp,
        lease_until: Timestamp,
    ) -> StoreResult<Vec<Notification>> {
        let mut notifications = lock(&self.notifications)?;
        let mut ids: Vec<(Timestamp, DbId)> = notifications
            .rows
            .values()
            .filter(|n| n.status == NotificationStatus::Pending)
            .filter(|n| n.claimed_until.map_or(true, |until| until < now))
            .map(|n| (n.created_at, n.id))
            .collect();
        ids.sort_unstable();
        ids.truncate(limit.max(0) as usize);

        let mut claimed = Vec::with_capacity(ids.len());
        for (_, id) in ids {
            if let Some(row) = notifications.rows.get_mut(&id) {
                row.claimed_until = Some(lease_until);
                claimed.push(row.clone());
            }
        }
        Ok(claimed)
    }

    async fn mark_sent(&self, id: DbId, sent_at: Timestamp) -> StoreResult<()> {
        if let Some(row) = lock(&self.notifications)?.rows.get_mut(&id) {
            row.status = NotificationStatus::Sent;
            row.sent_at = Some(sent_at);
            row.failure_reason = None;
            row.claimed_until = None;
            row.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn mark_failed(&self, id: DbId, reason: &str) -> StoreResult<()> {
        if let Some(row) = lock(&self.notifications)?.rows.get_mut(&id) {
            row.status = NotificationStatus::Failed;
            row.retry_count += 1;
            row.failure_reason = Some(reason.to_string());
            row.claimed_until = None;
            row.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn requeue_retryable(
        &self,
        policy: &RetryPolicy,
        now: Timestamp,
    ) -> StoreResult<Vec<Notification>> {
        let mut requeued = Vec::new();
        for row in lock(&self.notifications)?.rows.values_mut() {
            if policy.is_retryable(row, now) {
                row.status = NotificationStatus::Pending;
                row.claimed_until = None;
                row.updated_at = now;
                requeued.push(row.clone());
            }
        }
        Ok(requeued)
    }

    async fn delete_created_before(&self, cutoff: Timestamp) -> StoreResult<u64> {
        let mut notifications = lock(&self.notifications)?;
        let before = notifications.rows.len();
        notifications.rows.retain(|_, n| n.created_at >= cutoff);
        Ok((before - notifications.rows.len()) as u64)
    }

    async fn list_player_notifications(&self, player_id: DbId) -> StoreResult<Vec<Notification>> {
        let mut rows: Vec<Notification> = lock(&self.notifications)?
            .rows
            .values()
            .filter(|n| n.player_id == player_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(rows)
    }

    async fn notification_stats(
        &self,
        window_hours: i64,
        policy: &RetryPolicy,
        now: Timestamp,
    ) -> StoreResult<NotificationStats> {
        let since = now - Duration::hours(window_hours);
        let notifications = lock(&self.notifications)?;
        Ok(NotificationStats::tally(
            window_hours,
            notifications.rows.values().filter(|n| n.created_at >= since),
            policy,
            now,
        ))
    }

    async fn delete_all_notifications(&self) -> StoreResult<u64> {
        let mut notifications = lock(&self.notifications)?;
        let removed = notifications.rows.len() as u64;
        notifications.rows.clear();
        Ok(removed)
    }
}

#[async_trait]
impl PlayerDirectory for MemoryStore {
    async fn find_player(&self, player_id: DbId) -> StoreResult<Option<PlayerSnapshot>> {
        Ok(lock(&self.players)?.get(&player_id).cloned())
    }
}
