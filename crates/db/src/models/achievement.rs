//! Achievement and dependency rows.

use podium_core::achievement::{Achievement, AchievementDependency, DependencyKind};
use podium_core::criteria::{Criteria, CriteriaCategory};
use podium_core::error::CoreError;
use podium_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `achievements` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AchievementRow {
    pub id: DbId,
    pub key: String,
    pub name: String,
    pub description: String,
    pub icon: Option<String>,
    pub category: String,
    pub target: i64,
    pub parameter: Option<i64>,
    pub game_type: Option<String>,
    pub points: i32,
    pub is_hidden: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl TryFrom<AchievementRow> for Achievement {
    type Error = CoreError;

    fn try_from(row: AchievementRow) -> Result<Self, Self::Error> {
        Ok(Achievement {
            id: row.id,
            key: row.key,
            name: row.name,
            description: row.description,
            icon: row.icon,
            criteria: Criteria {
                category: CriteriaCategory::parse(&row.category)?,
                target: row.target,
                parameter: row.parameter,
                game_type: row.game_type,
            },
            points: row.points,
            is_hidden: row.is_hidden,
        })
    }
}

/// A row from the `achievement_dependencies` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct DependencyRow {
    pub achievement_id: DbId,
    pub prerequisite_id: DbId,
    pub kind: String,
}

impl TryFrom<DependencyRow> for AchievementDependency {
    type Error = CoreError;

    fn try_from(row: DependencyRow) -> Result<Self, Self::Error> {
        Ok(AchievementDependency::new(
            row.achievement_id,
            row.prerequisite_id,
            DependencyKind::parse(&row.kind)?,
        ))
    }
}
