//! Rule evaluators and their registry. Pure logic, no persistence.
//!
//! An [`Evaluator`] claims the criteria it understands and turns an event,
//! seen from one player's side, into a progress delta. The
//! [`EvaluatorRegistry`] keeps evaluators in registration order and builds a
//! category dispatch table once, at construction.

use std::collections::HashMap;
use std::sync::Arc;

use crate::achievement::Achievement;
use crate::context::{EvaluationContext, PlayerSnapshot, RatingCategory, ATTR_RARE_ITEMS_FOUND};
use crate::criteria::{Criteria, CriteriaCategory};

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Failure while evaluating one achievement for one player.
#[derive(Debug, thiserror::Error)]
pub enum EvaluationError {
    #[error("{category} evaluation needs {what}, which the event does not carry")]
    MissingContext {
        category: CriteriaCategory,
        what: &'static str,
    },

    #[error("{0} criteria has no parameter")]
    MissingParameter(CriteriaCategory),

    #[error("No evaluator handles {0} criteria")]
    Unhandled(CriteriaCategory),
}

// ---------------------------------------------------------------------------
// Evaluator trait
// ---------------------------------------------------------------------------

/// A pluggable rule.
///
/// Implementations are pure functions of `(player, achievement, context)`;
/// the caller applies the returned delta.
pub trait Evaluator: Send + Sync {
    fn name(&self) -> &'static str;

    /// Categories this evaluator is registered under in the dispatch table.
    fn categories(&self) -> &'static [CriteriaCategory];

    fn can_handle(&self, criteria: &Criteria) -> bool {
        self.categories().contains(&criteria.category)
    }

    fn evaluate(
        &self,
        player: &PlayerSnapshot,
        achievement: &Achievement,
        ctx: &EvaluationContext<'_>,
    ) -> Result<i64, EvaluationError>;
}

// ---------------------------------------------------------------------------
// Built-in rules
// ---------------------------------------------------------------------------

/// The built-in rules, one variant per criteria category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleEvaluator {
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

impl RuleEvaluator {
    /// Registration order of the built-in rules.
    pub const ALL: [RuleEvaluator; 13] = [
        RuleEvaluator::WinCount,
        RuleEvaluator::GameCount,
        RuleEvaluator::CloseGame,
        RuleEvaluator::OpponentScoreBelow,
        RuleEvaluator::WinnerAgainstZero,
        RuleEvaluator::LoserScoredZero,
        RuleEvaluator::AllRatingsThreshold,
        RuleEvaluator::RatingReached,
        RuleEvaluator::WinStreak,
        RuleEvaluator::TournamentWin,
        RuleEvaluator::TournamentParticipation,
        RuleEvaluator::RareItemFound,
        RuleEvaluator::PointsScored,
    ];

    pub fn category(&self) -> CriteriaCategory {
        match self {
            RuleEvaluator::WinCount => CriteriaCategory::WinCount,
            RuleEvaluator::GameCount => CriteriaCategory::GameCount,
            RuleEvaluator::CloseGame => CriteriaCategory::CloseGame,
            RuleEvaluator::OpponentScoreBelow => CriteriaCategory::OpponentScoreBelow,
            RuleEvaluator::WinnerAgainstZero => CriteriaCategory::WinnerAgainstZero,
            RuleEvaluator::LoserScoredZero => CriteriaCategory::LoserScoredZero,
            RuleEvaluator::AllRatingsThreshold => CriteriaCategory::AllRatingsThreshold,
            RuleEvaluator::RatingReached => CriteriaCategory::RatingReached,
            RuleEvaluator::WinStreak => CriteriaCategory::WinStreak,
            RuleEvaluator::TournamentWin => CriteriaCategory::TournamentWin,
            RuleEvaluator::TournamentParticipation => CriteriaCategory::TournamentParticipation,
            RuleEvaluator::RareItemFound => CriteriaCategory::RareItemFound,
            RuleEvaluator::PointsScored => CriteriaCategory::PointsScored,
        }
    }
}

fn flag(condition: bool) -> i64 {
    if condition {
        1
    } else {
        0
    }
}

fn parameter(criteria: &Criteria) -> Result<i64, EvaluationError> {
    criteria
        .parameter
        .ok_or(EvaluationError::MissingParameter(criteria.category))
}

fn require_game(
    criteria: &Criteria,
    ctx: &EvaluationContext<'_>,
) -> Result<Option<crate::context::GamePerspective>, EvaluationError> {
    if ctx.game().is_none() {
        return Err(EvaluationError::MissingContext {
            category: criteria.category,
            what: "a game result",
        });
    }
    if !criteria.matches_game_type(ctx.game_type()) {
        return Ok(None);
    }
    Ok(ctx.perspective())
}

impl Evaluator for RuleEvaluator {
    fn name(&self) -> &'static str {
        self.category().as_str()
    }

    fn categories(&self) -> &'static [CriteriaCategory] {
        match self {
            RuleEvaluator::WinCount => &[CriteriaCategory::WinCount],
            RuleEvaluator::GameCount => &[CriteriaCategory::GameCount],
            RuleEvaluator::CloseGame => &[CriteriaCategory::CloseGame],
            RuleEvaluator::OpponentScoreBelow => &[CriteriaCategory::OpponentScoreBelow],
            RuleEvaluator::WinnerAgainstZero => &[CriteriaCategory::WinnerAgainstZero],
            RuleEvaluator::LoserScoredZero => &[CriteriaCategory::LoserScoredZero],
            RuleEvaluator::AllRatingsThreshold => &[CriteriaCategory::AllRatingsThreshold],
            RuleEvaluator::RatingReached => &[CriteriaCategory::RatingReached],
            RuleEvaluator::WinStreak => &[CriteriaCategory::WinStreak],
            RuleEvaluator::TournamentWin => &[CriteriaCategory::TournamentWin],
            RuleEvaluator::TournamentParticipation => &[CriteriaCategory::TournamentParticipation],
            RuleEvaluator::RareItemFound => &[CriteriaCategory::RareItemFound],
            RuleEvaluator::PointsScored => &[CriteriaCategory::PointsScored],
        }
    }

    fn evaluate(
        &self,
        player: &PlayerSnapshot,
        achievement: &Achievement,
        ctx: &EvaluationContext<'_>,
    ) -> Result<i64, EvaluationError> {
        let criteria = &achievement.criteria;
        match self {
            RuleEvaluator::WinCount => {
                Ok(flag(require_game(criteria, ctx)?.is_some_and(|p| p.won())))
            }
            RuleEvaluator::GameCount => Ok(flag(require_game(criteria, ctx)?.is_some())),
            RuleEvaluator::CloseGame => {
                let max_diff = parameter(criteria)?;
                Ok(flag(require_game(criteria, ctx)?.is_some_and(|p| {
                    p.won() && p.score_difference() <= max_diff
                })))
            }
            RuleEvaluator::OpponentScoreBelow => {
                let bound = parameter(criteria)?;
                Ok(flag(require_game(criteria, ctx)?.is_some_and(|p| {
                    p.won() && i64::from(p.opponent_score) < bound
                })))
            }
            // A 0-0 tie has no winner, so it never counts.
            RuleEvaluator::WinnerAgainstZero => Ok(flag(
                require_game(criteria, ctx)?.is_some_and(|p| p.won() && p.opponent_score == 0),
            )),
            RuleEvaluator::LoserScoredZero => Ok(flag(
                require_game(criteria, ctx)?.is_some_and(|p| p.lost() && p.own_score == 0),
            )),
            RuleEvaluator::AllRatingsThreshold => {
                let threshold = parameter(criteria)?;
                Ok(flag(RatingCategory::ALL.iter().all(|c| {
                    player
                        .rating(*c)
                        .is_some_and(|rating| i64::from(rating) >= threshold)
                })))
            }
            RuleEvaluator::RatingReached => {
                let threshold = parameter(criteria)?;
                Ok(flag(
                    player
                        .ratings
                        .values()
                        .any(|rating| i64::from(*rating) >= threshold),
                ))
            }
            RuleEvaluator::WinStreak => {
                let length = parameter(criteria)?;
                let streak = ctx.streak().ok_or(EvaluationError::MissingContext {
                    category: criteria.category,
                    what: "the player's streak",
                })?;
                Ok(flag(i64::from(streak) >= length))
            }
            RuleEvaluator::TournamentWin => {
                let tournament =
                    ctx.event
                        .tournament
                        .as_ref()
                        .ok_or(EvaluationError::MissingContext {
                            category: criteria.category,
                            what: "a tournament result",
                        })?;
                Ok(flag(tournament.winner_id == Some(ctx.player_id)))
            }
            RuleEvaluator::TournamentParticipation => {
                let tournament =
                    ctx.event
                        .tournament
                        .as_ref()
                        .ok_or(EvaluationError::MissingContext {
                            category: criteria.category,
                            what: "a tournament result",
                        })?;
                Ok(flag(
                    tournament.participants.contains(&ctx.player_id)
                        || tournament.winner_id == Some(ctx.player_id),
                ))
            }
            // The game subsystem precomputes rare finds; never recount here.
            RuleEvaluator::RareItemFound => {
                if !criteria.matches_game_type(ctx.game_type()) {
                    return Ok(0);
                }
                Ok(ctx.attribute(ATTR_RARE_ITEMS_FOUND).unwrap_or(0).max(0))
            }
            RuleEvaluator::PointsScored => Ok(require_game(criteria, ctx)?
                .map(|p| i64::from(p.own_score.max(0)))
                .unwrap_or(0)),
        }
    }
}

// ---------------------------------------------------------------------------
// EvaluatorRegistry
// ---------------------------------------------------------------------------

/// Ordered evaluator list plus a category dispatch table.
#[derive(Clone)]
pub struct EvaluatorRegistry {
    evaluators: Vec<Arc<dyn Evaluator>>,
    dispatch: HashMap<CriteriaCategory, usize>,
}

impl std::fmt::Debug for EvaluatorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvaluatorRegistry")
            .field(
                "evaluators",
                &self.evaluators.iter().map(|e| e.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl EvaluatorRegistry {
    /// Build a registry from a registration list. For each category the first
    /// evaluator claiming it wins.
    pub fn new(evaluators: Vec<Arc<dyn Evaluator>>) -> Self {
        let mut dispatch = HashMap::new();
        for (index, evaluator) in evaluators.iter().enumerate() {
            for category in evaluator.categories() {
                dispatch.entry(*category).or_insert(index);
            }
        }
        Self {
            evaluators,
            dispatch,
        }
    }

    /// Registry holding every [`RuleEvaluator`].
    pub fn with_builtins() -> Self {
        Self::new(
            RuleEvaluator::ALL
                .into_iter()
                .map(|rule| Arc::new(rule) as Arc<dyn Evaluator>)
                .collect(),
        )
    }

    /// The first evaluator whose `can_handle` accepts `criteria`.
    ///
    /// The dispatch table is consulted first; evaluators that refine
    /// `can_handle` beyond their category fall back to a scan in registration
    /// order.
    pub fn resolve(&self, criteria: &Criteria) -> Option<&dyn Evaluator> {
        if let Some(&index) = self.dispatch.get(&criteria.category) {
            let evaluator = &self.evaluators[index];
            if evaluator.can_handle(criteria) {
                return Some(evaluator.as_ref());
            }
        }
        self.evaluators
            .iter()
            .find(|e| e.can_handle(criteria))
            .map(|e| e.as_ref())
    }

    pub fn evaluate(
        &self,
        player: &PlayerSnapshot,
        achievement: &Achievement,
        ctx: &EvaluationContext<'_>,
    ) -> Result<i64, EvaluationError> {
        let evaluator = self
            .resolve(&achievement.criteria)
            .ok_or(EvaluationError::Unhandled(achievement.criteria.category))?;
        evaluator.evaluate(player, achievement, ctx)
    }

    pub fn len(&self) -> usize {
        self.evaluators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.evaluators.is_empty()
    }
}

impl Default for EvaluatorRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}
