//! Handlers for the `/players/{id}` resource.

use axum::extract::{Path, State};
use axum::Json;
use podium_core::notification::Notification;
use podium_core::types::DbId;
use podium_events::engine::{PlayerAchievementTree, PlayerAchievements};

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/players/{id}/achievements
///
/// Every achievement with the player's progress, eligibility and visibility.
pub async fn list_player_achievements(
    State(state): State<AppState>,
    Path(player_id): Path<DbId>,
) -> AppResult<Json<DataResponse<PlayerAchievements>>> {
    let achievements = state.engine.player_achievements(player_id).await?;
    Ok(Json(DataResponse::new(achievements)))
}

/// GET /api/v1/players/{id}/achievement-tree
pub async fn get_achievement_tree(
    State(state): State<AppState>,
    Path(player_id): Path<DbId>,
) -> AppResult<Json<DataResponse<PlayerAchievementTree>>> {
    let tree = state.engine.player_tree(player_id).await?;
    Ok(Json(DataResponse::new(tree)))
}

/// GET /api/v1/players/{id}/notifications
///
/// The player's in-app unlock feed, newest first.
pub async fn list_player_notifications(
    State(state): State<AppState>,
    Path(player_id): Path<DbId>,
) -> AppResult<Json<DataResponse<Vec<Notification>>>> {
    let feed = state.engine.player_notifications(player_id).await?;
    Ok(Json(DataResponse::new(feed)))
}
