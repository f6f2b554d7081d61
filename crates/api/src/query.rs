//! Shared query parameter types for API handlers.

use serde::Deserialize;

use podium_core::types::DbId;

/// Default page size for raw progress reads.
pub const DEFAULT_LIMIT: i64 = 100;

/// Default trailing window for notification statistics.
pub const DEFAULT_STATS_HOURS: i64 = 24;

/// `?limit=&offset=&achievement_id=` for the analytics progress read.
///
/// The engine rejects non-positive limits and caps large ones.
#[derive(Debug, Deserialize)]
pub struct ProgressParams {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub achievement_id: Option<DbId>,
}

/// `?hours=` for notification statistics.
#[derive(Debug, Deserialize)]
pub struct StatsParams {
    pub hours: Option<i64>,
}
