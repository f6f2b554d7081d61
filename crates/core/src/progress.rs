//! Per-(player, achievement) progress and the unlock transition.
//!
//! [`apply_update`] is the whole state machine. Storage backends call it while
//! holding the record exclusively (row lock or per-key mutex), so the
//! "became achieved" transition happens at most once per key.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{DbId, Timestamp};

/// How many applied event ids a record remembers for replay detection.
/// A replay older than this many later events on the same record is applied
/// again.
pub const RECENT_EVENT_WINDOW: usize = 32;

/// Lifecycle of a progress record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressState {
    Unstarted,
    InProgress,
    Achieved,
}

impl ProgressState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProgressState::Unstarted => "unstarted",
            ProgressState::InProgress => "in_progress",
            ProgressState::Achieved => "achieved",
        }
    }
}

/// Contextual metadata captured at unlock time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnlockContext {
    pub opponent_id: Option<DbId>,
    pub opponent_name: Option<String>,
    pub game_id: Option<DbId>,
    pub game_played_at: Option<Timestamp>,
}

/// Stored progress of one player toward one achievement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressRecord {
    pub player_id: DbId,
    pub achievement_id: DbId,
    pub progress: i64,
    pub achieved: bool,
    pub date_earned: Option<Timestamp>,
    pub opponent_id: Option<DbId>,
    pub opponent_name: Option<String>,
    pub game_id: Option<DbId>,
    pub game_played_at: Option<Timestamp>,
    /// Most recent events applied to this record, newest last. Bounded by
    /// [`RECENT_EVENT_WINDOW`]; replays of any of them are ignored.
    pub recent_event_ids: Vec<Uuid>,
    pub updated_at: Timestamp,
}

impl ProgressRecord {
    /// A fresh, unstarted record.
    pub fn new(player_id: DbId, achievement_id: DbId, now: Timestamp) -> Self {
        Self {
            player_id,
            achievement_id,
            progress: 0,
            achieved: false,
            date_earned: None,
            opponent_id: None,
            opponent_name: None,
            game_id: None,
            game_played_at: None,
            recent_event_ids: Vec::new(),
            updated_at: now,
        }
    }

    /// Record an applied event, dropping the oldest beyond the window.
    pub fn remember_event(&mut self, event_id: Uuid) {
        self.recent_event_ids.push(event_id);
        if self.recent_event_ids.len() > RECENT_EVENT_WINDOW {
            let excess = self.recent_event_ids.len() - RECENT_EVENT_WINDOW;
            self.recent_event_ids.drain(..excess);
        }
    }

    pub fn state(&self) -> ProgressState {
        if self.achieved {
            ProgressState::Achieved
        } else if self.progress > 0 {
            ProgressState::InProgress
        } else {
            ProgressState::Unstarted
        }
    }
}

/// One proposed change to a record.
#[derive(Debug, Clone)]
pub struct ProgressUpdate {
    pub delta: i64,
    pub target: i64,
    /// Result of the REQUIRED-prerequisite check at the time of the update.
    pub eligible: bool,
    /// `None` for re-evaluation passes that are not tied to an event.
    pub event_id: Option<Uuid>,
    pub occurred_at: Timestamp,
    pub context: UnlockContext,
}

/// What [`apply_update`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// Nothing changed.
    Unchanged,
    /// Progress grew and the target is not met yet.
    Advanced { progress: i64 },
    /// Target met but a REQUIRED prerequisite is missing.
    Stalled { progress: i64 },
    /// The record just became achieved.
    Achieved { progress: i64 },
    /// The record was already achieved; terminal state.
    AlreadyAchieved,
    /// The same event was already applied to this record.
    DuplicateEvent,
}

impl TransitionOutcome {
    pub fn is_unlock(&self) -> bool {
        matches!(self, TransitionOutcome::Achieved { .. })
    }

    /// Whether the record must be written back.
    pub fn is_write(&self) -> bool {
        matches!(
            self,
            TransitionOutcome::Advanced { .. }
                | TransitionOutcome::Stalled { .. }
                | TransitionOutcome::Achieved { .. }
        )
    }
}

/// Apply an update to a record in place.
///
/// - An achieved record never changes.
/// - Negative deltas count as zero; progress never decreases.
/// - While ineligible, progress saturates at the target.
/// - The record is achieved the moment progress meets the target while
///   eligible; `date_earned` is the event time.
/// - A zero delta still promotes a stalled record once it is eligible.
pub fn apply_update(record: &mut ProgressRecord, update: &ProgressUpdate) -> TransitionOutcome {
    if record.achieved {
        return TransitionOutcome::AlreadyAchieved;
    }
    if let Some(event_id) = update.event_id {
        if record.recent_event_ids.contains(&event_id) {
            return TransitionOutcome::DuplicateEvent;
        }
    }

    let delta = update.delta.max(0);
    let mut next = record.progress.saturating_add(delta);
    if !update.eligible {
        next = record.progress.max(next.min(update.target));
    }

    let meets_target = next >= update.target;
    if delta == 0 && !(meets_target && update.eligible) {
        return TransitionOutcome::Unchanged;
    }

    record.progress = next;
    record.updated_at = update.occurred_at;
    if let Some(event_id) = update.event_id {
        record.remember_event(event_id);
    }

    if !meets_target {
        return TransitionOutcome::Advanced { progress: next };
    }
    if !update.eligible {
        return TransitionOutcome::Stalled { progress: next };
    }

    record.achieved = true;
    record.date_earned = Some(update.occurred_at);
    record.opponent_id = update.context.opponent_id;
    record.opponent_name = update.context.opponent_name.clone();
    record.game_id = update.context.game_id;
    record.game_played_at = update.context.game_played_at;
    TransitionOutcome::Achieved { progress: next }
}
