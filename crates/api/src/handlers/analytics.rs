//! Raw progress reads for analytics consumers.

use axum::extract::{Query, State};
use axum::Json;
use podium_core::progress::ProgressRecord;
use podium_core::store::ProgressQuery;

use crate::error::AppResult;
use crate::query::{ProgressParams, DEFAULT_LIMIT};
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/analytics/progress?limit=&offset=&achievement_id=
pub async fn list_progress(
    State(state): State<AppState>,
    Query(params): Query<ProgressParams>,
) -> AppResult<Json<DataResponse<Vec<ProgressRecord>>>> {
    let query = ProgressQuery {
        achievement_id: params.achievement_id,
        limit: params.limit.unwrap_or(DEFAULT_LIMIT),
        offset: params.offset.unwrap_or(0),
    };
    let rows = state.engine.analytics_progress(query).await?;
    Ok(Json(DataResponse::new(rows)))
}
