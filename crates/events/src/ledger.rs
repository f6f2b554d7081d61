//! Progress ledger: evaluation, progress transitions and cascading unlocks
//! for one player at a time.
//!
//! Evaluation errors are isolated per achievement: they are logged, counted
//! and never stop sibling achievements. After any unlock the ledger walks the
//! unlocked achievement's dependents and promotes every one whose stored
//! progress already meets its target and which is now eligible. A record that
//! stalls re-reads the achieved set, so a prerequisite unlocked by a concurrent
//! event is not missed.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use chrono::Utc;
use podium_core::achievement::{Achievement, DependencyKind};
use podium_core::context::{EvaluationContext, GameEvent, PlayerSnapshot};
use podium_core::error::CoreError;
use podium_core::evaluators::EvaluatorRegistry;
use podium_core::progress::{ProgressUpdate, TransitionOutcome, UnlockContext};
use podium_core::store::{PlayerDirectory, ProgressStore};
use podium_core::types::DbId;
use serde::Serialize;

use crate::metrics::EngineMetrics;
use crate::pipeline::NotificationPipeline;
use crate::registry::{AchievementRegistry, CatalogSnapshot};

/// What evaluating one event did for one player.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PlayerOutcome {
    pub player_id: DbId,
    /// Candidate achievements the player was evaluated against.
    pub evaluated: usize,
    /// Achievements whose progress was written.
    pub advanced: usize,
    /// Newly achieved, including cascaded unlocks, in unlock order.
    pub unlocked: Vec<DbId>,
    pub errors: usize,
}

pub struct ProgressLedger {
    store: Arc<dyn ProgressStore>,
    players: Arc<dyn PlayerDirectory>,
    registry: Arc<AchievementRegistry>,
    evaluators: Arc<EvaluatorRegistry>,
    pipeline: Arc<NotificationPipeline>,
    metrics: Arc<EngineMetrics>,
    max_cascade_depth: usize,
}

impl ProgressLedger {
    pub fn new(
        store: Arc<dyn ProgressStore>,
        players: Arc<dyn PlayerDirectory>,
        registry: Arc<AchievementRegistry>,
        evaluators: Arc<EvaluatorRegistry>,
        pipeline: Arc<NotificationPipeline>,
        metrics: Arc<EngineMetrics>,
        max_cascade_depth: usize,
    ) -> Self {
        Self {
            store,
            players,
            registry,
            evaluators,
            pipeline,
            metrics,
            max_cascade_depth,
        }
    }

    // -----------------------------------------------------------------------
    // Event evaluation
    // -----------------------------------------------------------------------

    /// Evaluate every candidate achievement of `event` for one player.
    ///
    /// Returns an error only when the player's achieved set cannot be read;
    /// failures on individual achievements are logged and counted.
    pub async fn process_player(
        &self,
        event: &GameEvent,
        player_id: DbId,
    ) -> Result<PlayerOutcome, CoreError> {
        let snapshot = self.registry.snapshot();
        let mut outcome = PlayerOutcome {
            player_id,
            ..PlayerOutcome::default()
        };

        let candidates = snapshot
            .index
            .candidates_for(event.event_type, event.game_type.as_deref());
        if candidates.is_empty() {
            return Ok(outcome);
        }

        let player = self.player_snapshot(player_id).await?;
        let mut achieved = self.store.achieved_ids(player_id).await?;
        let ctx = EvaluationContext::new(event, player_id);
        let unlock_context = self.unlock_context(&ctx).await;

        for achievement_id in candidates {
            if achieved.contains(&achievement_id) {
                continue;
            }
            let Some(achievement) = snapshot.achievement(achievement_id) else {
                continue;
            };
            outcome.evaluated += 1;

            let delta = match self.evaluators.evaluate(&player, achievement, &ctx) {
                Ok(delta) => delta,
                Err(e) => {
                    EngineMetrics::incr(&self.metrics.evaluation_errors);
                    outcome.errors += 1;
                    tracing::warn!(
                        player_id,
                        achievement_id,
                        event_id = %event.id,
                        error = %e,
                        "Achievement evaluation failed"
                    );
                    continue;
                }
            };
            if delta <= 0 {
                continue;
            }

            let update = ProgressUpdate {
                delta,
                target: achievement.criteria.target,
                eligible: snapshot.graph.is_eligible(achievement_id, &achieved),
                event_id: Some(event.id),
                occurred_at: event.occurred_at,
                context: unlock_context.clone(),
            };
            match self.store.apply_progress(player_id, achievement_id, &update).await {
                Ok((_, transition)) => {
                    if transition.is_write() {
                        outcome.advanced += 1;
                    }
                    if transition.is_unlock() {
                        self.record_unlock(player_id, achievement, &mut achieved).await;
                        outcome.unlocked.push(achievement_id);
                    } else if matches!(transition, TransitionOutcome::Stalled { .. })
                        && self
                            .recheck_stalled(&snapshot, player_id, achievement_id, &mut achieved)
                            .await
                    {
                        outcome.unlocked.push(achievement_id);
                    }
                }
                Err(e) => {
                    outcome.errors += 1;
                    tracing::error!(
                        player_id,
                        achievement_id,
                        error = %e,
                        "Failed to apply progress"
                    );
                }
            }
        }

        if !outcome.unlocked.is_empty() {
            let roots = outcome.unlocked.clone();
            let cascaded = self
                .cascade(&snapshot, player_id, roots, &mut achieved)
                .await;
            outcome.unlocked.extend(cascaded);
        }

        Ok(outcome)
    }

    // -----------------------------------------------------------------------
    // Cascade and re-evaluation
    // -----------------------------------------------------------------------

    /// Promote dependents of newly achieved achievements, breadth first.
    ///
    /// SUGGESTED edges never gate anything and are not followed. Depth is
    /// bounded by `max_cascade_depth`.
    async fn cascade(
        &self,
        snapshot: &CatalogSnapshot,
        player_id: DbId,
        roots: Vec<DbId>,
        achieved: &mut HashSet<DbId>,
    ) -> Vec<DbId> {
        let mut unlocked = Vec::new();
        let mut visited: HashSet<DbId> = roots.iter().copied().collect();
        let mut queue: VecDeque<(DbId, usize)> = roots.into_iter().map(|id| (id, 0)).collect();

        while let Some((current, depth)) = queue.pop_front() {
            if depth >= self.max_cascade_depth {
                tracing::warn!(
                    player_id,
                    achievement_id = current,
                    depth,
                    "Cascade depth limit reached"
                );
                continue;
            }

            let mut dependents: Vec<DbId> = snapshot
                .graph
                .dependents_of(current)
                .into_iter()
                .filter(|edge| edge.kind != DependencyKind::Suggested)
                .map(|edge| edge.achievement_id)
                .collect();
            dependents.sort_unstable();
            dependents.dedup();

            for dependent in dependents {
                if achieved.contains(&dependent) || !visited.insert(dependent) {
                    continue;
                }
                match self.try_promote(snapshot, player_id, dependent, achieved).await {
                    Ok(true) => {
                        unlocked.push(dependent);
                        queue.push_back((dependent, depth + 1));
                    }
                    Ok(false) => {
                        // Not promotable yet; a later unlock may revisit it.
                        visited.remove(&dependent);
                    }
                    Err(e) => {
                        tracing::error!(
                            player_id,
                            achievement_id = dependent,
                            error = %e,
                            "Failed to promote dependent achievement"
                        );
                    }
                }
            }
        }
        unlocked
    }

    /// Achieve `achievement_id` if its stored progress meets the target and
    /// it is eligible. Returns whether it was newly achieved.
    async fn try_promote(
        &self,
        snapshot: &CatalogSnapshot,
        player_id: DbId,
        achievement_id: DbId,
        achieved: &mut HashSet<DbId>,
    ) -> Result<bool, CoreError> {
        let Some(achievement) = snapshot.achievement(achievement_id) else {
            return Ok(false);
        };
        if !snapshot.graph.is_eligible(achievement_id, achieved) {
            return Ok(false);
        }
        let Some(record) = self.store.find_progress(player_id, achievement_id).await? else {
            return Ok(false);
        };
        if record.achieved || record.progress < achievement.criteria.target {
            return Ok(false);
        }

        let update = ProgressUpdate {
            delta: 0,
            target: achievement.criteria.target,
            eligible: true,
            event_id: None,
            occurred_at: Utc::now(),
            context: UnlockContext {
                opponent_id: record.opponent_id,
                opponent_name: record.opponent_name.clone(),
                game_id: record.game_id,
                game_played_at: record.game_played_at,
            },
        };
        let (_, transition) = self
            .store
            .apply_progress(player_id, achievement_id, &update)
            .await?;
        if !transition.is_unlock() {
            return Ok(false);
        }

        self.record_unlock(player_id, achievement, achieved).await;
        Ok(true)
    }

    /// Re-read the achieved set after a record stalled at its target and
    /// promote it if a concurrent event achieved the missing prerequisite
    /// since this evaluation started.
    async fn recheck_stalled(
        &self,
        snapshot: &CatalogSnapshot,
        player_id: DbId,
        achievement_id: DbId,
        achieved: &mut HashSet<DbId>,
    ) -> bool {
        let result = match self.store.achieved_ids(player_id).await {
            Ok(current) => {
                achieved.extend(current);
                self.try_promote(snapshot, player_id, achievement_id, achieved).await
            }
            Err(e) => Err(e),
        };
        result.unwrap_or_else(|e| {
            tracing::error!(
                player_id,
                achievement_id,
                error = %e,
                "Failed to recheck stalled achievement"
            );
            false
        })
    }

    /// Promote every stalled record of one player until nothing changes.
    pub async fn reevaluate_player(&self, player_id: DbId) -> Result<Vec<DbId>, CoreError> {
        let snapshot = self.registry.snapshot();
        let records = self.store.list_player_progress(player_id).await?;
        let mut achieved: HashSet<DbId> = records
            .iter()
            .filter(|r| r.achieved)
            .map(|r| r.achievement_id)
            .collect();
        let mut stalled: Vec<DbId> = records
            .iter()
            .filter(|r| !r.achieved)
            .map(|r| r.achievement_id)
            .collect();
        stalled.sort_unstable();

        let mut unlocked = Vec::new();
        loop {
            let mut changed = false;
            let mut remaining = Vec::with_capacity(stalled.len());
            for achievement_id in stalled {
                if self
                    .try_promote(&snapshot, player_id, achievement_id, &mut achieved)
                    .await?
                {
                    unlocked.push(achievement_id);
                    changed = true;
                } else {
                    remaining.push(achievement_id);
                }
            }
            stalled = remaining;
            if !changed || stalled.is_empty() {
                break;
            }
        }

        if !unlocked.is_empty() {
            tracing::info!(player_id, unlocked = unlocked.len(), "Re-evaluation unlocked achievements");
        }
        Ok(unlocked)
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    async fn record_unlock(
        &self,
        player_id: DbId,
        achievement: &Achievement,
        achieved: &mut HashSet<DbId>,
    ) {
        EngineMetrics::incr(&self.metrics.unlocks);
        tracing::info!(
            player_id,
            achievement_id = achievement.id,
            key = %achievement.key,
            points = achievement.points,
            "Achievement unlocked"
        );
        achieved.insert(achievement.id);
        self.pipeline.enqueue_unlock(player_id, achievement.id).await;
    }

    /// The player's snapshot, or a bare one when the directory does not know
    /// the player. Game rules only need the event.
    async fn player_snapshot(&self, player_id: DbId) -> Result<PlayerSnapshot, CoreError> {
        Ok(self
            .players
            .find_player(player_id)
            .await?
            .unwrap_or_else(|| {
                tracing::debug!(player_id, "Player not in directory, using bare snapshot");
                PlayerSnapshot::new(player_id, format!("Player {player_id}"))
            }))
    }

    async fn unlock_context(&self, ctx: &EvaluationContext<'_>) -> UnlockContext {
        let Some(game) = ctx.game() else {
            return UnlockContext::default();
        };
        let opponent_id = ctx.perspective().map(|p| p.opponent_id);
        let opponent_name = match opponent_id {
            Some(id) => match self.players.find_player(id).await {
                Ok(found) => found.map(|p| p.display_name),
                Err(e) => {
                    tracing::warn!(opponent_id = id, error = %e, "Failed to load opponent");
                    None
                }
            },
            None => None,
        };
        UnlockContext {
            opponent_id,
            opponent_name,
            game_id: game.game_id,
            game_played_at: Some(game.played_at),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use podium_core::achievement::AchievementDependency;
    use podium_core::channels::Channel;
    use podium_core::context::GameOutcome;
    use podium_core::criteria::{Criteria, CriteriaCategory};
    use podium_core::evaluators::{EvaluationError, Evaluator, RuleEvaluator};
    use podium_core::notification::RetryPolicy;
    use podium_core::store::NotificationStore;
    use async_trait::async_trait;
    use podium_core::context::TournamentOutcome;
    use podium_core::store::StoreResult;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;
    use tokio::sync::Notify;

    fn achievement(id: DbId, category: CriteriaCategory, target: i64) -> Achievement {
        Achievement {
            id,
            key: format!("ach_{id}"),
            name: format!("Achievement {id}"),
            description: String::new(),
            icon: None,
            criteria: Criteria::new(category, target),
            points: 5,
            is_hidden: false,
        }
    }

    struct Harness {
        store: Arc<MemoryStore>,
        ledger: ProgressLedger,
        metrics: Arc<EngineMetrics>,
    }

    fn harness(
        achievements: Vec<Achievement>,
        edges: Vec<AchievementDependency>,
        evaluators: EvaluatorRegistry,
    ) -> Harness {
        harness_with_directory(achievements, edges, evaluators, |store| store)
    }

    fn harness_with_directory(
        achievements: Vec<Achievement>,
        edges: Vec<AchievementDependency>,
        evaluators: EvaluatorRegistry,
        directory: impl FnOnce(Arc<MemoryStore>) -> Arc<dyn PlayerDirectory>,
    ) -> Harness {
        let store = Arc::new(MemoryStore::new());
        store
            .upsert_player(PlayerSnapshot::new(7, "Ada"))
            .unwrap();
        store
            .upsert_player(PlayerSnapshot::new(8, "Brook"))
            .unwrap();
        let registry = Arc::new(AchievementRegistry::new());
        registry.replace(CatalogSnapshot::build(achievements, edges));
        let metrics = Arc::new(EngineMetrics::default());
        let pipeline = Arc::new(NotificationPipeline::new(
            store.clone(),
            store.clone(),
            registry.clone(),
            Vec::new(),
            vec![Channel::InApp],
            RetryPolicy::default(),
            Duration::from_secs(1),
            100,
            metrics.clone(),
        ));
        let ledger = ProgressLedger::new(
            store.clone(),
            directory(store.clone()),
            registry,
            Arc::new(evaluators),
            pipeline,
            metrics.clone(),
            16,
        );
        Harness {
            store,
            ledger,
            metrics,
        }
    }

    fn win_for_7() -> GameEvent {
        GameEvent::game_completed(
            "pool",
            GameOutcome {
                game_id: Some(42),
                challenger_id: 7,
                opponent_id: 8,
                challenger_score: 11,
                opponent_score: 4,
                played_at: Utc::now(),
            },
        )
    }

    #[tokio::test]
    async fn tenth_win_unlocks_with_game_context() {
        let h = harness(
            vec![achievement(1, CriteriaCategory::WinCount, 10)],
            Vec::new(),
            EvaluatorRegistry::with_builtins(),
        );
        for _ in 0..9 {
            h.ledger.process_player(&win_for_7(), 7).await.unwrap();
        }
        let record = h.store.find_progress(7, 1).await.unwrap().unwrap();
        assert_eq!(record.progress, 9);
        assert!(!record.achieved);

        let event = win_for_7();
        let outcome = h.ledger.process_player(&event, 7).await.unwrap();
        assert_eq!(outcome.unlocked, vec![1]);

        let record = h.store.find_progress(7, 1).await.unwrap().unwrap();
        assert!(record.achieved);
        assert_eq!(record.progress, 10);
        assert_eq!(record.date_earned, Some(event.occurred_at));
        assert_eq!(record.opponent_id, Some(8));
        assert_eq!(record.opponent_name.as_deref(), Some("Brook"));
        assert_eq!(record.game_id, Some(42));
        assert_eq!(h.store.list_player_notifications(7).await.unwrap().len(), 1);
        assert_eq!(h.metrics.snapshot().unlocks, 1);
    }

    #[tokio::test]
    async fn replayed_event_changes_nothing() {
        let h = harness(
            vec![
                achievement(1, CriteriaCategory::WinCount, 5),
                achievement(2, CriteriaCategory::GameCount, 1),
            ],
            Vec::new(),
            EvaluatorRegistry::with_builtins(),
        );
        let event = win_for_7();
        let first = h.ledger.process_player(&event, 7).await.unwrap();
        assert_eq!(first.unlocked, vec![2]);

        let second = h.ledger.process_player(&event, 7).await.unwrap();
        assert!(second.unlocked.is_empty());
        assert_eq!(second.advanced, 0);
        assert_eq!(h.store.find_progress(7, 1).await.unwrap().unwrap().progress, 1);
        assert_eq!(h.store.list_player_notifications(7).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn losing_player_gets_no_win_progress() {
        let h = harness(
            vec![achievement(1, CriteriaCategory::WinCount, 1)],
            Vec::new(),
            EvaluatorRegistry::with_builtins(),
        );
        let outcome = h.ledger.process_player(&win_for_7(), 8).await.unwrap();
        assert_eq!(outcome.evaluated, 1);
        assert!(outcome.unlocked.is_empty());
        assert!(h.store.find_progress(8, 1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn stalled_dependent_unlocks_when_prerequisite_does() {
        // 1 requires 2; 1 is evaluated first on every event.
        let h = harness(
            vec![
                achievement(1, CriteriaCategory::GameCount, 1),
                achievement(2, CriteriaCategory::WinCount, 2),
            ],
            vec![AchievementDependency::new(1, 2, DependencyKind::Required)],
            EvaluatorRegistry::with_builtins(),
        );

        let first = h.ledger.process_player(&win_for_7(), 7).await.unwrap();
        assert!(first.unlocked.is_empty());
        let stalled = h.store.find_progress(7, 1).await.unwrap().unwrap();
        assert_eq!(stalled.progress, 1);
        assert!(!stalled.achieved);

        let second = h.ledger.process_player(&win_for_7(), 7).await.unwrap();
        assert_eq!(second.unlocked, vec![2, 1]);
        assert!(h.store.find_progress(7, 1).await.unwrap().unwrap().achieved);
        assert_eq!(h.store.list_player_notifications(7).await.unwrap().len(), 2);
    }

    /// Parks the first lookup of one player until released.
    struct PausingDirectory {
        inner: Arc<MemoryStore>,
        pause_on: DbId,
        paused: AtomicBool,
        arrived: Notify,
        release: Notify,
    }

    #[async_trait]
    impl PlayerDirectory for PausingDirectory {
        async fn find_player(&self, player_id: DbId) -> StoreResult<Option<PlayerSnapshot>> {
            if player_id == self.pause_on && !self.paused.swap(true, Ordering::SeqCst) {
                self.arrived.notify_one();
                self.release.notified().await;
            }
            self.inner.find_player(player_id).await
        }
    }

    #[tokio::test]
    async fn prerequisite_unlocked_by_concurrent_event_promotes_stalled_dependent() {
        // 1 requires 2. The game event reads the achieved set, then parks on
        // the opponent lookup while a tournament event unlocks 2.
        let mut gate = None;
        let h = harness_with_directory(
            vec![
                achievement(1, CriteriaCategory::GameCount, 1),
                achievement(2, CriteriaCategory::TournamentWin, 1),
            ],
            vec![AchievementDependency::new(1, 2, DependencyKind::Required)],
            EvaluatorRegistry::with_builtins(),
            |store| {
                let pausing = Arc::new(PausingDirectory {
                    inner: store,
                    pause_on: 8,
                    paused: AtomicBool::new(false),
                    arrived: Notify::new(),
                    release: Notify::new(),
                });
                gate = Some(pausing.clone());
                pausing
            },
        );
        let gate = gate.unwrap();

        let game = win_for_7();
        let tournament = GameEvent::tournament(TournamentOutcome {
            tournament_id: 3,
            winner_id: Some(7),
            participants: vec![7, 8],
        });

        let (late, early) = tokio::join!(h.ledger.process_player(&game, 7), async {
            gate.arrived.notified().await;
            let outcome = h.ledger.process_player(&tournament, 7).await;
            gate.release.notify_one();
            outcome
        });

        assert_eq!(early.unwrap().unlocked, vec![2]);
        assert_eq!(late.unwrap().unlocked, vec![1]);
        assert!(h.store.find_progress(7, 1).await.unwrap().unwrap().achieved);
        assert_eq!(h.store.list_player_notifications(7).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn suggested_edge_does_not_gate() {
        let h = harness(
            vec![
                achievement(1, CriteriaCategory::GameCount, 1),
                achievement(2, CriteriaCategory::WinCount, 5),
            ],
            vec![AchievementDependency::new(1, 2, DependencyKind::Suggested)],
            EvaluatorRegistry::with_builtins(),
        );
        let outcome = h.ledger.process_player(&win_for_7(), 7).await.unwrap();
        assert_eq!(outcome.unlocked, vec![1]);
    }

    struct Broken;

    impl Evaluator for Broken {
        fn name(&self) -> &'static str {
            "broken"
        }

        fn categories(&self) -> &'static [CriteriaCategory] {
            &[CriteriaCategory::WinCount]
        }

        fn evaluate(
            &self,
            _player: &PlayerSnapshot,
            _achievement: &Achievement,
            _ctx: &EvaluationContext<'_>,
        ) -> Result<i64, EvaluationError> {
            Err(EvaluationError::MissingParameter(CriteriaCategory::WinCount))
        }
    }

    #[tokio::test]
    async fn evaluator_error_does_not_stop_siblings() {
        let mut evaluators: Vec<Arc<dyn Evaluator>> = vec![Arc::new(Broken)];
        evaluators.extend(
            RuleEvaluator::ALL
                .into_iter()
                .map(|rule| Arc::new(rule) as Arc<dyn Evaluator>),
        );
        let h = harness(
            vec![
                achievement(1, CriteriaCategory::WinCount, 1),
                achievement(2, CriteriaCategory::GameCount, 1),
            ],
            Vec::new(),
            EvaluatorRegistry::new(evaluators),
        );

        let outcome = h.ledger.process_player(&win_for_7(), 7).await.unwrap();
        assert_eq!(outcome.errors, 1);
        assert_eq!(outcome.unlocked, vec![2]);
        assert_eq!(h.metrics.snapshot().evaluation_errors, 1);
    }

    #[tokio::test]
    async fn reevaluation_promotes_records_after_edge_removal() {
        let h = harness(
            vec![
                achievement(1, CriteriaCategory::GameCount, 1),
                achievement(2, CriteriaCategory::WinCount, 3),
            ],
            vec![AchievementDependency::new(1, 2, DependencyKind::Required)],
            EvaluatorRegistry::with_builtins(),
        );
        h.ledger.process_player(&win_for_7(), 7).await.unwrap();
        assert!(h.ledger.reevaluate_player(7).await.unwrap().is_empty());

        h.ledger
            .registry
            .replace(CatalogSnapshot::build(
                vec![
                    achievement(1, CriteriaCategory::GameCount, 1),
                    achievement(2, CriteriaCategory::WinCount, 3),
                ],
                Vec::new(),
            ));
        assert_eq!(h.ledger.reevaluate_player(7).await.unwrap(), vec![1]);
        assert!(h.ledger.reevaluate_player(7).await.unwrap().is_empty());
    }
}
