use roster_core::error::CoreError;
use roster_db::store::StoreError;

/// Errors surfaced by coordinator operations.
///
/// Business errors (`Core`) are final and never retried automatically;
/// storage errors are transient and the caller may retry the whole
/// operation, which rolled back completely.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

impl ServiceError {
    pub fn conflict(reason: impl Into<String>) -> Self {
        ServiceError::Core(CoreError::conflict(reason))
    }

    pub fn not_found(entity: &'static str, id: roster_core::types::DbId) -> Self {
        ServiceError::Core(CoreError::not_found(entity, id))
    }
}
