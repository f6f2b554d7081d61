//! Handlers for the `/achievements` catalog.

use axum::extract::{Path, State};
use axum::Json;
use podium_core::achievement::Achievement;
use podium_core::types::DbId;
use podium_events::engine::AchievementDependencies;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/achievements
pub async fn list_achievements(
    State(state): State<AppState>,
) -> Json<DataResponse<Vec<Achievement>>> {
    Json(DataResponse::new(state.engine.achievements()))
}

/// GET /api/v1/achievements/{id}/dependencies
///
/// Prerequisite edges of the achievement and edges of achievements that
/// depend on it.
pub async fn get_dependencies(
    State(state): State<AppState>,
    Path(achievement_id): Path<DbId>,
) -> AppResult<Json<DataResponse<AchievementDependencies>>> {
    let dependencies = state.engine.achievement_dependencies(achievement_id)?;
    Ok(Json(DataResponse::new(dependencies)))
}
