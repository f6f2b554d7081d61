use axum::routing::get;
use axum::Router;

use crate::handlers::analytics;
use crate::state::AppState;

/// Routes mounted at `/analytics`.
///
/// ```text
/// GET    /progress                  -> list_progress
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route("/progress", get(analytics::list_progress))
}
