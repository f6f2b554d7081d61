use crate::types::DbId;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: DbId },

    #[error("Validation failed: {0}")]
    Validation(String),

    /// Malformed criteria or an unresolvable evaluator. Rejects only the
    /// offending achievement.
    #[error("Invalid achievement configuration: {0}")]
    Configuration(String),

    /// The edge `achievement_id -> prerequisite_id` would close a cycle.
    #[error(
        "Dependency cycle: achievement {achievement_id} is reachable from prerequisite {prerequisite_id}"
    )]
    Cycle {
        achievement_id: DbId,
        prerequisite_id: DbId,
    },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
