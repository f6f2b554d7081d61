//! Route definitions for administrative operations.
//!
//! There is no authentication layer; `/admin/reset` is guarded by its
//! confirmation token only.

use axum::routing::post;
use axum::Router;

use crate::handlers::admin;
use crate::state::AppState;

/// Routes mounted at `/admin`.
///
/// ```text
/// POST   /dependencies              -> add_dependency
/// DELETE /dependencies              -> remove_dependency
/// POST   /reevaluate                -> reevaluate_all
/// POST   /reevaluate/{player_id}    -> reevaluate_player
/// POST   /reset                     -> reset_progress
/// POST   /config                    -> load_config
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/dependencies",
            post(admin::add_dependency).delete(admin::remove_dependency),
        )
        .route("/reevaluate", post(admin::reevaluate_all))
        .route("/reevaluate/{player_id}", post(admin::reevaluate_player))
        .route("/reset", post(admin::reset_progress))
        .route("/config", post(admin::load_config))
}
