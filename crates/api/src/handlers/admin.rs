//! Administrative handlers: dependency edits, re-evaluation, reset and
//! catalog loads.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use podium_core::achievement::{AchievementDependency, DependencyKind};
use podium_core::catalog_config::{CatalogConfig, ConfigLoadReport};
use podium_core::types::DbId;
use podium_events::engine::{ReevaluationReport, ResetReport};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Body of `POST` and `DELETE /admin/dependencies`.
#[derive(Debug, Deserialize)]
pub struct DependencyRequest {
    pub achievement_id: DbId,
    pub prerequisite_id: DbId,
    #[serde(default = "default_kind")]
    pub kind: DependencyKind,
}

fn default_kind() -> DependencyKind {
    DependencyKind::Required
}

impl DependencyRequest {
    fn edge(&self) -> AchievementDependency {
        AchievementDependency::new(self.achievement_id, self.prerequisite_id, self.kind)
    }
}

#[derive(Debug, Deserialize)]
pub struct ResetRequest {
    pub confirmation_token: String,
}

#[derive(Debug, Serialize)]
pub struct PlayerReevaluation {
    pub player_id: DbId,
    pub unlocked: Vec<DbId>,
}

// ---------------------------------------------------------------------------
// Dependencies
// ---------------------------------------------------------------------------

/// POST /api/v1/admin/dependencies
///
/// 201 when the edge was added, 200 when it already existed, 409 `CYCLE`
/// when it would close a cycle.
pub async fn add_dependency(
    State(state): State<AppState>,
    Json(body): Json<DependencyRequest>,
) -> AppResult<(StatusCode, Json<DataResponse<AchievementDependency>>)> {
    let edge = body.edge();
    let created = state.engine.add_dependency(edge).await?;
    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(DataResponse::new(edge))))
}

/// DELETE /api/v1/admin/dependencies
pub async fn remove_dependency(
    State(state): State<AppState>,
    Json(body): Json<DependencyRequest>,
) -> AppResult<StatusCode> {
    state.engine.remove_dependency(body.edge()).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Re-evaluation and reset
// ---------------------------------------------------------------------------

/// POST /api/v1/admin/reevaluate/{player_id}
pub async fn reevaluate_player(
    State(state): State<AppState>,
    Path(player_id): Path<DbId>,
) -> AppResult<Json<DataResponse<PlayerReevaluation>>> {
    let unlocked = state.engine.reevaluate_player(player_id).await?;
    Ok(Json(DataResponse::new(PlayerReevaluation {
        player_id,
        unlocked,
    })))
}

/// POST /api/v1/admin/reevaluate
pub async fn reevaluate_all(
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<ReevaluationReport>>> {
    let report = state.engine.reevaluate_all().await?;
    Ok(Json(DataResponse::new(report)))
}

/// POST /api/v1/admin/reset
///
/// Deletes all progress and notifications. The body must carry the
/// configured confirmation token.
pub async fn reset_progress(
    State(state): State<AppState>,
    Json(body): Json<ResetRequest>,
) -> AppResult<Json<DataResponse<ResetReport>>> {
    if body.confirmation_token.trim().is_empty() {
        return Err(AppError::BadRequest(
            "confirmation_token must not be empty".into(),
        ));
    }
    let report = state.engine.reset_progress(&body.confirmation_token).await?;
    Ok(Json(DataResponse::new(report)))
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// POST /api/v1/admin/config
///
/// Apply a declarative catalog. Invalid entries are listed in the report;
/// the rest are applied.
pub async fn load_config(
    State(state): State<AppState>,
    Json(catalog): Json<CatalogConfig>,
) -> AppResult<Json<DataResponse<ConfigLoadReport>>> {
    let report = state.engine.load_config(&catalog).await?;
    Ok(Json(DataResponse::new(report)))
}
