use rust_decimal::Decimal;
use uuid::Uuid;

use crate::models::OrderStatus;
use crate::storage::StorageError;

// ============================================================================
// Order Workflow Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error("restaurant not found: {0}")]
    RestaurantNotFound(Uuid),

    #[error("customer not found: {0}")]
    CustomerNotFound(Uuid),

    #[error("driver not found: {0}")]
    DriverNotFound(Uuid),

    #[error("order not found: {0}")]
    OrderNotFound(Uuid),

    #[error("menu item not found: {0}")]
    ItemNotFound(Uuid),

    #[error("{name} is not available")]
    ItemUnavailable { id: Uuid, name: String },

    #[error("price of menu item {id} changed to {current_price} since the quote")]
    PriceChanged { id: Uuid, current_price: Decimal },

    #[error("order must contain at least one line")]
    EmptyOrder,

    #[error("quantity must be positive, got {quantity} for menu item {menu_item_id}")]
    InvalidQuantity { menu_item_id: Uuid, quantity: i32 },

    #[error("tip cannot be negative: {0}")]
    InvalidTip(Decimal),

    #[error("invalid order status value: {0:?}")]
    InvalidStatusValue(String),

    #[error("cannot transition order from {from:?} to {to:?}")]
    InvalidTransition {
        from: OrderStatus,
        to: OrderStatus,
    },

    #[error("order is closed in status {0:?}")]
    OrderClosed(OrderStatus),

    #[error("could not allocate a unique order number")]
    OrderNumberExhausted,

    #[error(transparent)]
    Storage(#[from] StorageError),
}
