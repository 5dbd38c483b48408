use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::models::{MenuItem, Restaurant};
use crate::storage::{Storage, StorageError};

use super::errors::CatalogError;

// ============================================================================
// Catalog Service
// ============================================================================
//
// Owner-side catalog management. Price and availability are the only
// menu-item mutations; orders snapshot prices, so edits here never touch
// existing orders.
//
// ============================================================================

pub struct CatalogService<S> {
    storage: Arc<S>,
}

impl<S: Storage> CatalogService<S> {
    pub fn new(storage: Arc<S>) -> Self {
        Self { storage }
    }

    pub async fn create_restaurant(
        &self,
        owner_id: Uuid,
        name: &str,
        delivery_fee: Decimal,
    ) -> Result<Restaurant, CatalogError> {
        if delivery_fee < Decimal::ZERO {
            return Err(CatalogError::InvalidDeliveryFee(delivery_fee));
        }
        self.storage
            .find_user(owner_id)
            .await?
            .ok_or(CatalogError::OwnerNotFound(owner_id))?;

        let now = Utc::now();
        let restaurant = Restaurant {
            id: Uuid::new_v4(),
            owner_id,
            name: name.to_string(),
            delivery_fee,
            rating: 0.0,
            rating_total: 0,
            total_reviews: 0,
            is_active: true,
            is_open: true,
            created_at: now,
            updated_at: now,
        };

        match self.storage.insert_restaurant(&restaurant).await {
            Ok(()) => {
                tracing::info!(restaurant_id = %restaurant.id, name, "restaurant created");
                Ok(restaurant)
            }
            Err(StorageError::UserMissing(id)) => Err(CatalogError::OwnerNotFound(id)),
            Err(err) => Err(err.into()),
        }
    }

    pub async fn add_menu_item(
        &self,
        restaurant_id: Uuid,
        name: &str,
        description: Option<String>,
        price: Decimal,
    ) -> Result<MenuItem, CatalogError> {
        if price <= Decimal::ZERO {
            return Err(CatalogError::InvalidPrice(price));
        }
        self.storage
            .find_restaurant(restaurant_id)
            .await?
            .ok_or(CatalogError::RestaurantNotFound(restaurant_id))?;

        let now = Utc::now();
        let item = MenuItem {
            id: Uuid::new_v4(),
            restaurant_id,
            name: name.to_string(),
            description,
            price,
            is_available: true,
            created_at: now,
            updated_at: now,
        };

        match self.storage.insert_menu_item(&item).await {
            Ok(()) => {
                tracing::info!(item_id = %item.id, restaurant_id = %restaurant_id, name, "menu item added");
                Ok(item)
            }
            Err(StorageError::RestaurantMissing(id)) => Err(CatalogError::RestaurantNotFound(id)),
            Err(err) => Err(err.into()),
        }
    }

    /// Edit price and/or availability. Passing `None` leaves a field as is.
    pub async fn update_menu_item(
        &self,
        item_id: Uuid,
        price: Option<Decimal>,
        available: Option<bool>,
    ) -> Result<MenuItem, CatalogError> {
        if let Some(price) = price {
            if price <= Decimal::ZERO {
                return Err(CatalogError::InvalidPrice(price));
            }
        }
        self.storage
            .update_menu_item(item_id, price, available)
            .await?
            .ok_or(CatalogError::ItemNotFound(item_id))
    }

    pub async fn set_restaurant_open(
        &self,
        restaurant_id: Uuid,
        open: bool,
    ) -> Result<Restaurant, CatalogError> {
        self.storage
            .set_restaurant_open(restaurant_id, open)
            .await?
            .ok_or(CatalogError::RestaurantNotFound(restaurant_id))
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
