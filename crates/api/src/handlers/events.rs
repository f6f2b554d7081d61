//! Handler for event ingestion.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use podium_events::GameEvent;
use serde::Serialize;
use uuid::Uuid;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct EventAccepted {
    pub event_id: Uuid,
    pub players: usize,
}

/// POST /api/v1/events
///
/// Queue a game event for evaluation. Returns 202 once queued and 503 when
/// the queue is full. Evaluation happens asynchronously; its failures never
/// reach the caller.
pub async fn ingest_event(
    State(state): State<AppState>,
    Json(event): Json<GameEvent>,
) -> AppResult<(StatusCode, Json<DataResponse<EventAccepted>>)> {
    let accepted = EventAccepted {
        event_id: event.id,
        players: event.affected_players().len(),
    };
    state.engine.try_ingest(event)?;

    tracing::debug!(event_id = %accepted.event_id, "Event queued");
    Ok((StatusCode::ACCEPTED, Json(DataResponse::new(accepted))))
}
