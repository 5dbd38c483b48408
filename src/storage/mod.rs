use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::models::{
    Driver, MenuItem, Order, OrderLine, OrderStatus, Restaurant, Review, User,
};

pub mod memory;
pub mod postgres;

pub use memory::InMemoryStorage;
pub use postgres::PostgresStorage;

// ============================================================================
// Storage Abstraction
// ============================================================================
//
// Every workflow runs against this trait, injected as a constructor argument.
// Backends must honor the transactional contract:
//
// - `create_order` persists the order and all its lines as one unit, or
//   nothing at all. Inside that unit it re-reads every referenced menu item
//   and fails the whole creation if an item vanished, went unavailable, or
//   changed price since the quote was computed.
// - `update_order_status` is a compare-and-set when `expected` is given.
// - `create_review` appends the review and bumps the restaurant's rating
//   aggregate (running sum + count) in the same transaction.
//
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("order number already taken: {0}")]
    DuplicateOrderNumber(String),

    #[error("email already registered: {0}")]
    DuplicateEmail(String),

    #[error("driver profile already exists for user {0}")]
    DuplicateDriverProfile(Uuid),

    #[error("menu item {0} no longer exists")]
    MenuItemMissing(Uuid),

    #[error("menu item {name} ({id}) is unavailable")]
    MenuItemUnavailable { id: Uuid, name: String },

    #[error("menu item {id} now costs {current_price}")]
    PriceDrift { id: Uuid, current_price: Decimal },

    #[error("user {0} no longer exists")]
    UserMissing(Uuid),

    #[error("driver {0} no longer exists")]
    DriverMissing(Uuid),

    #[error("restaurant {0} no longer exists")]
    RestaurantMissing(Uuid),

    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

impl StorageError {
    /// Only connection-level failures are worth retrying; every other kind
    /// is a stable fact about the data.
    pub fn is_transient(&self) -> bool {
        matches!(self, StorageError::Unavailable(_))
    }
}

/// Outcome of a compare-and-set status update.
#[derive(Debug, Clone)]
pub enum StatusUpdate {
    Applied(Order),
    /// The row's status no longer matches what the caller validated against;
    /// carries the current row so the caller can report the real conflict.
    StaleStatus(Order),
}

#[derive(Debug, Clone, Serialize)]
pub struct RestaurantStats {
    pub restaurant_id: Uuid,
    pub total_orders: i64,
    pub gross_revenue: Decimal,
    pub rating: f64,
    pub total_reviews: i64,
}

#[async_trait]
pub trait Storage: Send + Sync {
    // --- identity and catalog lookups -----------------------------------
    async fn find_user(&self, id: Uuid) -> Result<Option<User>, StorageError>;
    async fn find_driver(&self, id: Uuid) -> Result<Option<Driver>, StorageError>;
    async fn find_restaurant(&self, id: Uuid) -> Result<Option<Restaurant>, StorageError>;
    async fn find_menu_item(&self, id: Uuid) -> Result<Option<MenuItem>, StorageError>;
    async fn find_order(&self, id: Uuid) -> Result<Option<Order>, StorageError>;
    async fn order_lines(&self, order_id: Uuid) -> Result<Vec<OrderLine>, StorageError>;

    // --- accounts --------------------------------------------------------
    async fn insert_user(&self, user: &User) -> Result<(), StorageError>;
    async fn insert_driver(&self, driver: &Driver) -> Result<(), StorageError>;
    async fn set_driver_availability(
        &self,
        driver_id: Uuid,
        available: bool,
    ) -> Result<Option<Driver>, StorageError>;

    // --- catalog ---------------------------------------------------------
    async fn insert_restaurant(&self, restaurant: &Restaurant) -> Result<(), StorageError>;
    async fn insert_menu_item(&self, item: &MenuItem) -> Result<(), StorageError>;
    async fn update_menu_item(
        &self,
        id: Uuid,
        price: Option<Decimal>,
        available: Option<bool>,
    ) -> Result<Option<MenuItem>, StorageError>;
    async fn set_restaurant_open(
        &self,
        id: Uuid,
        open: bool,
    ) -> Result<Option<Restaurant>, StorageError>;

    // --- order workflow --------------------------------------------------
    async fn create_order(&self, order: &Order, lines: &[OrderLine]) -> Result<(), StorageError>;
    async fn update_order_status(
        &self,
        id: Uuid,
        expected: Option<OrderStatus>,
        next: OrderStatus,
        delivered_at: Option<DateTime<Utc>>,
    ) -> Result<Option<StatusUpdate>, StorageError>;
    async fn assign_driver(
        &self,
        order_id: Uuid,
        driver_id: Uuid,
    ) -> Result<Option<Order>, StorageError>;

    // --- reviews and aggregates ------------------------------------------
    /// Returns the restaurant with its updated rating aggregate.
    async fn create_review(&self, review: &Review) -> Result<Restaurant, StorageError>;
    async fn reviews_for_restaurant(
        &self,
        restaurant_id: Uuid,
    ) -> Result<Vec<Review>, StorageError>;
    async fn restaurant_order_stats(
        &self,
        restaurant_id: Uuid,
    ) -> Result<(i64, Decimal), StorageError>;
}
