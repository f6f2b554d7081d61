use axum::routing::get;
use axum::Router;

use crate::handlers::notifications;
use crate::state::AppState;

/// Routes mounted at `/notifications`.
///
/// ```text
/// GET    /stats                     -> get_stats
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route("/stats", get(notifications::get_stats))
}
