use rust_decimal::Decimal;
use uuid::Uuid;

use crate::storage::StorageError;

// ============================================================================
// Catalog Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("owner not found: {0}")]
    OwnerNotFound(Uuid),

    #[error("restaurant not found: {0}")]
    RestaurantNotFound(Uuid),

    #[error("menu item not found: {0}")]
    ItemNotFound(Uuid),

    #[error("price must be positive: {0}")]
    InvalidPrice(Decimal),

    #[error("delivery fee cannot be negative: {0}")]
    InvalidDeliveryFee(Decimal),

    #[error(transparent)]
    Storage(#[from] StorageError),
}
