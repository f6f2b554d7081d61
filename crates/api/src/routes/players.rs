//! Route definitions for the `/players` resource.

use axum::routing::get;
use axum::Router;

use crate::handlers::players;
use crate::state::AppState;

/// Routes mounted at `/players`.
///
/// ```text
/// GET    /{id}/achievements         -> list_player_achievements
/// GET    /{id}/achievement-tree     -> get_achievement_tree
/// GET    /{id}/notifications        -> list_player_notifications
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{id}/achievements", get(players::list_player_achievements))
        .route("/{id}/achievement-tree", get(players::get_achievement_tree))
        .route("/{id}/notifications", get(players::list_player_notifications))
}
