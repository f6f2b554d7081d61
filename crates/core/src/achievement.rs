//! Achievement and dependency entities.

use serde::{Deserialize, Serialize};

use crate::criteria::Criteria;
use crate::error::CoreError;
use crate::types::DbId;

/// An unlockable, point-valued goal.
///
/// Created by configuration load, never by runtime evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Achievement {
    pub id: DbId,
    /// Stable configuration key, e.g. `"ten_wins"`.
    pub key: String,
    pub name: String,
    pub description: String,
    pub icon: Option<String>,
    pub criteria: Criteria,
    pub points: i32,
    pub is_hidden: bool,
}

/// The kind of a prerequisite edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyKind {
    /// Gates eligibility to earn.
    Required,
    /// Gates visibility; any one achieved prerequisite reveals the dependent.
    Unlocks,
    /// Advisory only.
    Suggested,
}

impl DependencyKind {
    /// String representation for database storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            DependencyKind::Required => "required",
            DependencyKind::Unlocks => "unlocks",
            DependencyKind::Suggested => "suggested",
        }
    }

    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s {
            "required" => Ok(DependencyKind::Required),
            "unlocks" => Ok(DependencyKind::Unlocks),
            "suggested" => Ok(DependencyKind::Suggested),
            other => Err(CoreError::Validation(format!(
                "unknown dependency kind '{other}'"
            ))),
        }
    }
}

/// Directed edge: `achievement_id` depends on `prerequisite_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AchievementDependency {
    pub achievement_id: DbId,
    pub prerequisite_id: DbId,
    pub kind: DependencyKind,
}

impl AchievementDependency {
    pub fn new(achievement_id: DbId, prerequisite_id: DbId, kind: DependencyKind) -> Self {
        Self {
            achievement_id,
            prerequisite_id,
            kind,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dependency_kind_parses_stored_names() {
        assert_eq!(
            DependencyKind::parse("required").unwrap(),
            DependencyKind::Required
        );
        assert_eq!(
            DependencyKind::parse("unlocks").unwrap(),
            DependencyKind::Unlocks
        );
        assert!(DependencyKind::parse("optional").is_err());
    }
}
