//! Gameplay events and the player-facing evaluation context.
//!
//! [`GameEvent`] is the envelope the game, rating, streak and tournament
//! subsystems emit. Evaluators never see it directly; they receive an
//! [`EvaluationContext`] that resolves the event from one player's point of
//! view.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::criteria::{normalize_game_type, TriggerEventType};
use crate::types::{DbId, Timestamp};

/// Attribute key for the number of rare items a player found in a game.
pub const ATTR_RARE_ITEMS_FOUND: &str = "rare_items_found";

// ---------------------------------------------------------------------------
// Player snapshot
// ---------------------------------------------------------------------------

/// The four rating categories every player is rated in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RatingCategory {
    Overall,
    Singles,
    Doubles,
    Tournament,
}

impl RatingCategory {
    pub const ALL: [RatingCategory; 4] = [
        RatingCategory::Overall,
        RatingCategory::Singles,
        RatingCategory::Doubles,
        RatingCategory::Tournament,
    ];
}

/// Read-only view of a player supplied by the player store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    pub id: DbId,
    pub display_name: String,
    #[serde(default)]
    pub ratings: HashMap<RatingCategory, i32>,
}

impl PlayerSnapshot {
    pub fn new(id: DbId, display_name: impl Into<String>) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            ratings: HashMap::new(),
        }
    }

    pub fn with_rating(mut self, category: RatingCategory, rating: i32) -> Self {
        self.ratings.insert(category, rating);
        self
    }

    pub fn rating(&self, category: RatingCategory) -> Option<i32> {
        self.ratings.get(&category).copied()
    }
}

// ---------------------------------------------------------------------------
// Game and tournament outcomes
// ---------------------------------------------------------------------------

/// Final result of a two-sided game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameOutcome {
    #[serde(default)]
    pub game_id: Option<DbId>,
    pub challenger_id: DbId,
    pub opponent_id: DbId,
    pub challenger_score: i32,
    pub opponent_score: i32,
    pub played_at: Timestamp,
}

/// A game seen from one participant's side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GamePerspective {
    pub opponent_id: DbId,
    pub own_score: i32,
    pub opponent_score: i32,
}

impl GamePerspective {
    pub fn won(&self) -> bool {
        self.own_score > self.opponent_score
    }

    pub fn lost(&self) -> bool {
        self.own_score < self.opponent_score
    }

    /// Absolute margin, widened so extreme scores cannot overflow.
    pub fn score_difference(&self) -> i64 {
        (i64::from(self.own_score) - i64::from(self.opponent_score)).abs()
    }
}

impl GameOutcome {
    /// The game from `player_id`'s side, or `None` if they did not play.
    pub fn perspective(&self, player_id: DbId) -> Option<GamePerspective> {
        if player_id == self.challenger_id {
            Some(GamePerspective {
                opponent_id: self.opponent_id,
                own_score: self.challenger_score,
                opponent_score: self.opponent_score,
            })
        } else if player_id == self.opponent_id {
            Some(GamePerspective {
                opponent_id: self.challenger_id,
                own_score: self.opponent_score,
                opponent_score: self.challenger_score,
            })
        } else {
            None
        }
    }

    /// The winner, or `None` on a tie.
    pub fn winner_id(&self) -> Option<DbId> {
        use std::cmp::Ordering;
        match self.challenger_score.cmp(&self.opponent_score) {
            Ordering::Greater => Some(self.challenger_id),
            Ordering::Less => Some(self.opponent_id),
            Ordering::Equal => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TournamentOutcome {
    pub tournament_id: DbId,
    #[serde(default)]
    pub winner_id: Option<DbId>,
    #[serde(default)]
    pub participants: Vec<DbId>,
}

// ---------------------------------------------------------------------------
// GameEvent
// ---------------------------------------------------------------------------

/// A gameplay, rating, streak or tournament event.
///
/// Build with one of the constructors and enrich with the `with_*`
/// methods.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameEvent {
    /// Unique event id; reprocessing the same id is a no-op per progress record.
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub event_type: TriggerEventType,
    #[serde(default)]
    pub game_type: Option<String>,
    #[serde(default = "chrono::Utc::now")]
    pub occurred_at: Timestamp,
    /// Affected players. Defaults to the game participants when empty.
    #[serde(default)]
    pub players: Vec<DbId>,
    #[serde(default)]
    pub game: Option<GameOutcome>,
    #[serde(default)]
    pub tournament: Option<TournamentOutcome>,
    /// Current streak length per player (streak events).
    #[serde(default)]
    pub streaks: BTreeMap<DbId, i32>,
    /// Precomputed per-player values, e.g. [`ATTR_RARE_ITEMS_FOUND`].
    #[serde(default)]
    pub attributes: BTreeMap<DbId, BTreeMap<String, i64>>,
}

impl GameEvent {
    pub fn new(event_type: TriggerEventType) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_type,
            game_type: None,
            occurred_at: chrono::Utc::now(),
            players: Vec::new(),
            game: None,
            tournament: None,
            streaks: BTreeMap::new(),
            attributes: BTreeMap::new(),
        }
    }

    /// A completed game; both participants are affected.
    pub fn game_completed(game_type: impl Into<String>, game: GameOutcome) -> Self {
        let mut event = Self::new(TriggerEventType::GameCompleted);
        event.occurred_at = game.played_at;
        event.game_type = Some(game_type.into());
        event.game = Some(game);
        event
    }

    pub fn rating_changed(player_id: DbId) -> Self {
        Self::new(TriggerEventType::RatingChanged).with_players([player_id])
    }

    pub fn streak_changed(player_id: DbId, streak: i32) -> Self {
        let mut event = Self::new(TriggerEventType::StreakChanged).with_players([player_id]);
        event.streaks.insert(player_id, streak);
        event
    }

    pub fn tournament(outcome: TournamentOutcome) -> Self {
        let mut event = Self::new(TriggerEventType::TournamentEvent);
        event.tournament = Some(outcome);
        event
    }

    pub fn with_players(mut self, players: impl IntoIterator<Item = DbId>) -> Self {
        self.players.extend(players);
        self
    }

    pub fn with_game_type(mut self, game_type: impl Into<String>) -> Self {
        self.game_type = Some(game_type.into());
        self
    }

    pub fn with_attribute(mut self, player_id: DbId, key: impl Into<String>, value: i64) -> Self {
        self.attributes
            .entry(player_id)
            .or_default()
            .insert(key.into(), value);
        self
    }

    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = id;
        self
    }

    pub fn at(mut self, occurred_at: Timestamp) -> Self {
        self.occurred_at = occurred_at;
        self
    }

    /// Normalised game type used for trigger lookups.
    pub fn normalized_game_type(&self) -> Option<String> {
        normalize_game_type(self.game_type.as_deref())
    }

    /// Distinct affected players, in first-seen order.
    ///
    /// Explicit `players` come first, then game participants, then
    /// tournament participants.
    pub fn affected_players(&self) -> Vec<DbId> {
        let mut ids = self.players.clone();
        if let Some(game) = &self.game {
            ids.push(game.challenger_id);
            ids.push(game.opponent_id);
        }
        if let Some(tournament) = &self.tournament {
            ids.extend(tournament.participants.iter().copied());
            ids.extend(tournament.winner_id);
        }
        let mut seen = std::collections::HashSet::new();
        ids.retain(|id| seen.insert(*id));
        ids
    }
}

// ---------------------------------------------------------------------------
// EvaluationContext
// ---------------------------------------------------------------------------

/// An event resolved from one player's point of view.
#[derive(Debug, Clone, Copy)]
pub struct EvaluationContext<'a> {
    pub event: &'a GameEvent,
    pub player_id: DbId,
}

impl<'a> EvaluationContext<'a> {
    pub fn new(event: &'a GameEvent, player_id: DbId) -> Self {
        Self { event, player_id }
    }

    pub fn game(&self) -> Option<&'a GameOutcome> {
        self.event.game.as_ref()
    }

    pub fn perspective(&self) -> Option<GamePerspective> {
        self.game().and_then(|g| g.perspective(self.player_id))
    }

    pub fn streak(&self) -> Option<i32> {
        self.event.streaks.get(&self.player_id).copied()
    }

    pub fn attribute(&self, key: &str) -> Option<i64> {
        self.event
            .attributes
            .get(&self.player_id)
            .and_then(|attrs| attrs.get(key))
            .copied()
    }

    pub fn game_type(&self) -> Option<&'a str> {
        self.event.game_type.as_deref()
    }
}
