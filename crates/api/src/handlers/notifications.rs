//! Notification monitoring.

use axum::extract::{Query, State};
use axum::Json;
use podium_events::engine::EngineStats;

use crate::error::AppResult;
use crate::query::{StatsParams, DEFAULT_STATS_HOURS};
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/notifications/stats?hours=
///
/// Counts by status for notifications created in the trailing window, plus
/// engine counters under `engine`.
pub async fn get_stats(
    State(state): State<AppState>,
    Query(params): Query<StatsParams>,
) -> AppResult<Json<DataResponse<EngineStats>>> {
    let hours = params.hours.unwrap_or(DEFAULT_STATS_HOURS);
    let stats = state.engine.notification_stats(hours).await?;
    Ok(Json(DataResponse::new(stats)))
}
