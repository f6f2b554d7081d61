pub mod achievements;
pub mod admin;
pub mod analytics;
pub mod events;
pub mod health;
pub mod notifications;
pub mod players;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /health                                          service health
///
/// /events                                          ingest (POST, 202)
///
/// /players/{id}/achievements                       per-player list
/// /players/{id}/achievement-tree                   dependency tree
/// /players/{id}/notifications                      in-app feed
///
/// /achievements                                    catalog
/// /achievements/{id}/dependencies                  prerequisites, dependents
///
/// /analytics/progress                              raw progress rows
///
/// /notifications/stats                             counts by status
///
/// /admin/dependencies                              add (POST), remove (DELETE)
/// /admin/reevaluate                                all players (POST)
/// /admin/reevaluate/{player_id}                    one player (POST)
/// /admin/reset                                     wipe progress (POST)
/// /admin/config                                    load catalog (POST)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .nest("/events", events::router())
        .nest("/players", players::router())
        .nest("/achievements", achievements::router())
        .nest("/analytics", analytics::router())
        .nest("/notifications", notifications::router())
        .nest("/admin", admin::router())
}
