//! Route definitions for event ingestion.

use axum::routing::post;
use axum::Router;

use crate::handlers::events;
use crate::state::AppState;

/// Routes mounted at `/events`.
///
/// ```text
/// POST   /                          -> ingest_event
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route("/", post(events::ingest_event))
}
