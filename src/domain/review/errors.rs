use uuid::Uuid;

use crate::storage::StorageError;

// ============================================================================
// Review Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ReviewError {
    #[error("user not found: {0}")]
    UserNotFound(Uuid),

    #[error("restaurant not found: {0}")]
    RestaurantNotFound(Uuid),

    #[error("rating must be between 1 and 5, got {0}")]
    InvalidRating(i32),

    #[error(transparent)]
    Storage(#[from] StorageError),
}
