use std::sync::Arc;

use podium_events::AchievementEngine;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable; everything is behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<AchievementEngine>,
    pub config: Arc<ServerConfig>,
    /// PostgreSQL pool, or `None` when running on the in-process store.
    pub pool: Option<podium_db::DbPool>,
}
