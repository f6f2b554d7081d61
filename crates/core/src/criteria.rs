//! Achievement criteria: the typed rule an achievement is unlocked by.
//!
//! A [`Criteria`] is a category tag, a progress `target`, an optional rule
//! `parameter` and an optional game-type scope. The category also decides
//! which event bucket ([`TriggerEventType`]) can advance the achievement.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// TriggerEventType
// ---------------------------------------------------------------------------

/// The kind of gameplay event an achievement listens to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerEventType {
    GameCompleted,
    RatingChanged,
    StreakChanged,
    TournamentEvent,
}

impl TriggerEventType {
    pub const ALL: [TriggerEventType; 4] = [
        TriggerEventType::GameCompleted,
        TriggerEventType::RatingChanged,
        TriggerEventType::StreakChanged,
        TriggerEventType::TournamentEvent,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerEventType::GameCompleted => "game_completed",
            TriggerEventType::RatingChanged => "rating_changed",
            TriggerEventType::StreakChanged => "streak_changed",
            TriggerEventType::TournamentEvent => "tournament_event",
        }
    }
}

// ---------------------------------------------------------------------------
// CriteriaCategory
// ---------------------------------------------------------------------------

/// Category tag of an achievement rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CriteriaCategory {
    WinCount,
    GameCount,
    CloseGame,
    OpponentScoreBelow,
    WinnerAgainstZero,
    LoserScoredZero,
    AllRatingsThreshold,
    RatingReached,
    WinStreak,
    TournamentWin,
    TournamentParticipation,
    RareItemFound,
    PointsScored,
}

impl CriteriaCategory {
    pub const ALL: [CriteriaCategory; 13] = [
        CriteriaCategory::WinCount,
        CriteriaCategory::GameCount,
        CriteriaCategory::CloseGame,
        CriteriaCategory::OpponentScoreBelow,
        CriteriaCategory::WinnerAgainstZero,
        CriteriaCategory::LoserScoredZero,
        CriteriaCategory::AllRatingsThreshold,
        CriteriaCategory::RatingReached,
        CriteriaCategory::WinStreak,
        CriteriaCategory::TournamentWin,
        CriteriaCategory::TournamentParticipation,
        CriteriaCategory::RareItemFound,
        CriteriaCategory::PointsScored,
    ];

    /// String representation for database storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            CriteriaCategory::WinCount => "win_count",
            CriteriaCategory::GameCount => "game_count",
            CriteriaCategory::CloseGame => "close_game",
            CriteriaCategory::OpponentScoreBelow => "opponent_score_below",
            CriteriaCategory::WinnerAgainstZero => "winner_against_zero",
            CriteriaCategory::LoserScoredZero => "loser_scored_zero",
            CriteriaCategory::AllRatingsThreshold => "all_ratings_threshold",
            CriteriaCategory::RatingReached => "rating_reached",
            CriteriaCategory::WinStreak => "win_streak",
            CriteriaCategory::TournamentWin => "tournament_win",
            CriteriaCategory::TournamentParticipation => "tournament_participation",
            CriteriaCategory::RareItemFound => "rare_item_found",
            CriteriaCategory::PointsScored => "points_scored",
        }
    }

    /// Parse a stored category tag.
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| CoreError::Configuration(format!("unknown criteria category '{s}'")))
    }

    /// The event bucket this category is advanced by. Anything that is not
    /// rating, streak or tournament driven lands in the game-completion bucket.
    pub fn event_type(&self) -> TriggerEventType {
        match self {
            CriteriaCategory::AllRatingsThreshold | CriteriaCategory::RatingReached => {
                TriggerEventType::RatingChanged
            }
            CriteriaCategory::WinStreak => TriggerEventType::StreakChanged,
            CriteriaCategory::TournamentWin | CriteriaCategory::TournamentParticipation => {
                TriggerEventType::TournamentEvent
            }
            _ => TriggerEventType::GameCompleted,
        }
    }

    /// Whether a game-type scope means anything for this category. Rating,
    /// streak and tournament rules never look at the game type.
    pub fn supports_game_type(&self) -> bool {
        self.event_type() == TriggerEventType::GameCompleted
    }

    /// Whether the rule needs a numeric `parameter`.
    pub fn requires_parameter(&self) -> bool {
        matches!(
            self,
            CriteriaCategory::CloseGame
                | CriteriaCategory::OpponentScoreBelow
                | CriteriaCategory::AllRatingsThreshold
                | CriteriaCategory::RatingReached
                | CriteriaCategory::WinStreak
        )
    }
}

impl std::fmt::Display for CriteriaCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Criteria
// ---------------------------------------------------------------------------

fn default_target() -> i64 {
    1
}

/// The unlock rule of an achievement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Criteria {
    pub category: CriteriaCategory,

    /// Progress needed to unlock.
    #[serde(default = "default_target")]
    pub target: i64,

    /// Rule value: maximum score difference, opponent score bound, rating
    /// threshold or streak length, depending on the category.
    #[serde(default)]
    pub parameter: Option<i64>,

    /// Game-type scope. `None` applies to every game type.
    #[serde(default)]
    pub game_type: Option<String>,
}

impl Criteria {
    pub fn new(category: CriteriaCategory, target: i64) -> Self {
        Self {
            category,
            target,
            parameter: None,
            game_type: None,
        }
    }

    pub fn with_parameter(mut self, parameter: i64) -> Self {
        self.parameter = Some(parameter);
        self
    }

    pub fn with_game_type(mut self, game_type: impl Into<String>) -> Self {
        self.game_type = Some(game_type.into());
        self
    }

    /// Check the criteria and normalise its game-type scope.
    ///
    /// A blank scope becomes universal; scopes are lowercased so index
    /// lookups are case-insensitive.
    pub fn validate(mut self) -> Result<Self, CoreError> {
        if self.target < 1 {
            return Err(CoreError::Configuration(format!(
                "{} target must be at least 1, got {}",
                self.category, self.target
            )));
        }
        if self.category.requires_parameter() {
            match self.parameter {
                None => {
                    return Err(CoreError::Configuration(format!(
                        "{} requires a parameter",
                        self.category
                    )))
                }
                Some(p) if p < 0 => {
                    return Err(CoreError::Configuration(format!(
                        "{} parameter must not be negative, got {p}",
                        self.category
                    )))
                }
                Some(_) => {}
            }
        }
        self.game_type = normalize_game_type(self.game_type.as_deref());
        if self.game_type.is_some() && !self.category.supports_game_type() {
            return Err(CoreError::Configuration(format!(
                "{} does not take a game_type scope",
                self.category
            )));
        }
        Ok(self)
    }

    /// Whether an event for `game_type` falls inside this criteria's scope.
    pub fn matches_game_type(&self, game_type: Option<&str>) -> bool {
        match &self.game_type {
            None => true,
            Some(scope) => normalize_game_type(game_type).as_deref() == Some(scope.as_str()),
        }
    }
}

/// Lowercase and trim a game type; blank values mean "no game type".
pub fn normalize_game_type(game_type: Option<&str>) -> Option<String> {
    game_type
        .map(|g| g.trim().to_lowercase())
        .filter(|g| !g.is_empty())
}
