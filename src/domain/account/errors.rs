use uuid::Uuid;

use crate::storage::StorageError;

// ============================================================================
// Account Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AccountError {
    #[error("user not found: {0}")]
    UserNotFound(Uuid),

    #[error("driver not found: {0}")]
    DriverNotFound(Uuid),

    #[error("email already registered: {0}")]
    DuplicateEmail(String),

    #[error("driver profile already exists for user {0}")]
    DuplicateDriverProfile(Uuid),

    #[error(transparent)]
    Storage(#[from] StorageError),
}
