use crate::types::DbId;

/// Business-rule errors surfaced by the lifecycle core.
///
/// `NotFound` and `Conflict` map directly to the 404/409 responses the
/// consuming service layer renders; the reason strings are written to be
/// shown to an operator as-is.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("{entity} not found: id {id}")]
    NotFound { entity: &'static str, id: DbId },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation failed: {0}")]
    Validation(String),
}

impl CoreError {
    pub fn not_found(entity: &'static str, id: DbId) -> Self {
        CoreError::NotFound { entity, id }
    }

    pub fn conflict(reason: impl Into<String>) -> Self {
        CoreError::Conflict(reason.into())
    }
}
