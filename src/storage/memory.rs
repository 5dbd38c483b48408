use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{
    Driver, MenuItem, Order, OrderLine, OrderStatus, Restaurant, Review, User,
};

use super::{StatusUpdate, Storage, StorageError};

// ============================================================================
// In-Memory Storage Backend
// ============================================================================
//
// Backs the unit tests and the demo binary. A single `RwLock` around the
// whole state makes every mutating operation a critical section, which gives
// the same all-or-nothing visibility the Postgres backend gets from
// transactions: validation happens under the write lock, before any map is
// touched.
//
// ============================================================================

#[derive(Default)]
struct State {
    users: HashMap<Uuid, User>,
    emails: HashSet<String>,
    drivers: HashMap<Uuid, Driver>,
    driver_users: HashSet<Uuid>,
    restaurants: HashMap<Uuid, Restaurant>,
    menu_items: HashMap<Uuid, MenuItem>,
    orders: HashMap<Uuid, Order>,
    order_numbers: HashSet<String>,
    order_lines: HashMap<Uuid, Vec<OrderLine>>,
    reviews: Vec<Review>,
}

#[derive(Default)]
pub struct InMemoryStorage {
    state: RwLock<State>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn find_user(&self, id: Uuid) -> Result<Option<User>, StorageError> {
        Ok(self.state.read().await.users.get(&id).cloned())
    }

    async fn find_driver(&self, id: Uuid) -> Result<Option<Driver>, StorageError> {
        Ok(self.state.read().await.drivers.get(&id).cloned())
    }

    async fn find_restaurant(&self, id: Uuid) -> Result<Option<Restaurant>, StorageError> {
        Ok(self.state.read().await.restaurants.get(&id).cloned())
    }

    async fn find_menu_item(&self, id: Uuid) -> Result<Option<MenuItem>, StorageError> {
        Ok(self.state.read().await.menu_items.get(&id).cloned())
    }

    async fn find_order(&self, id: Uuid) -> Result<Option<Order>, StorageError> {
        Ok(self.state.read().await.orders.get(&id).cloned())
    }

    async fn order_lines(&self, order_id: Uuid) -> Result<Vec<OrderLine>, StorageError> {
        Ok(self
            .state
            .read()
            .await
            .order_lines
            .get(&order_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn insert_user(&self, user: &User) -> Result<(), StorageError> {
        let mut state = self.state.write().await;
        if !state.emails.insert(user.email.clone()) {
            return Err(StorageError::DuplicateEmail(user.email.clone()));
        }
        state.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn insert_driver(&self, driver: &Driver) -> Result<(), StorageError> {
        let mut state = self.state.write().await;
        if !state.users.contains_key(&driver.user_id) {
            return Err(StorageError::UserMissing(driver.user_id));
        }
        if !state.driver_users.insert(driver.user_id) {
            return Err(StorageError::DuplicateDriverProfile(driver.user_id));
        }
        state.drivers.insert(driver.id, driver.clone());
        Ok(())
    }

    async fn set_driver_availability(
        &self,
        driver_id: Uuid,
        available: bool,
    ) -> Result<Option<Driver>, StorageError> {
        let mut state = self.state.write().await;
        Ok(state.drivers.get_mut(&driver_id).map(|driver| {
            driver.is_available = available;
            driver.updated_at = Utc::now();
            driver.clone()
        }))
    }

    async fn insert_restaurant(&self, restaurant: &Restaurant) -> Result<(), StorageError> {
        let mut state = self.state.write().await;
        if !state.users.contains_key(&restaurant.owner_id) {
            return Err(StorageError::UserMissing(restaurant.owner_id));
        }
        state.restaurants.insert(restaurant.id, restaurant.clone());
        Ok(())
    }

    async fn insert_menu_item(&self, item: &MenuItem) -> Result<(), StorageError> {
        let mut state = self.state.write().await;
        if !state.restaurants.contains_key(&item.restaurant_id) {
            return Err(StorageError::RestaurantMissing(item.restaurant_id));
        }
        state.menu_items.insert(item.id, item.clone());
        Ok(())
    }

    async fn update_menu_item(
        &self,
        id: Uuid,
        price: Option<Decimal>,
        available: Option<bool>,
    ) -> Result<Option<MenuItem>, StorageError> {
        let mut state = self.state.write().await;
        Ok(state.menu_items.get_mut(&id).map(|item| {
            if let Some(price) = price {
                item.price = price;
            }
            if let Some(available) = available {
                item.is_available = available;
            }
            item.updated_at = Utc::now();
            item.clone()
        }))
    }

    async fn set_restaurant_open(
        &self,
        id: Uuid,
        open: bool,
    ) -> Result<Option<Restaurant>, StorageError> {
        let mut state = self.state.write().await;
        Ok(state.restaurants.get_mut(&id).map(|restaurant| {
            restaurant.is_open = open;
            restaurant.updated_at = Utc::now();
            restaurant.clone()
        }))
    }

    async fn create_order(&self, order: &Order, lines: &[OrderLine]) -> Result<(), StorageError> {
        let mut state = self.state.write().await;

        // All validation happens before the first insert, so a failure on any
        // line leaves no trace of the order.
        if state.order_numbers.contains(&order.order_number) {
            return Err(StorageError::DuplicateOrderNumber(order.order_number.clone()));
        }
        if !state.users.contains_key(&order.customer_id) {
            return Err(StorageError::UserMissing(order.customer_id));
        }
        if !state.restaurants.contains_key(&order.restaurant_id) {
            return Err(StorageError::RestaurantMissing(order.restaurant_id));
        }
        for line in lines {
            let item = state
                .menu_items
                .get(&line.menu_item_id)
                .ok_or(StorageError::MenuItemMissing(line.menu_item_id))?;
            if item.restaurant_id != order.restaurant_id {
                return Err(StorageError::MenuItemMissing(line.menu_item_id));
            }
            if !item.is_available {
                return Err(StorageError::MenuItemUnavailable {
                    id: item.id,
                    name: item.name.clone(),
                });
            }
            if item.price != line.unit_price {
                return Err(StorageError::PriceDrift {
                    id: item.id,
                    current_price: item.price,
                });
            }
        }

        state.order_numbers.insert(order.order_number.clone());
        state.orders.insert(order.id, order.clone());
        state.order_lines.insert(order.id, lines.to_vec());
        Ok(())
    }

    async fn update_order_status(
        &self,
        id: Uuid,
        expected: Option<OrderStatus>,
        next: OrderStatus,
        delivered_at: Option<DateTime<Utc>>,
    ) -> Result<Option<StatusUpdate>, StorageError> {
        let mut state = self.state.write().await;
        let Some(order) = state.orders.get_mut(&id) else {
            return Ok(None);
        };

        if let Some(expected) = expected {
            if order.status != expected {
                return Ok(Some(StatusUpdate::StaleStatus(order.clone())));
            }
        }

        order.status = next;
        if delivered_at.is_some() {
            order.actual_delivery_time = delivered_at;
        }
        order.updated_at = Utc::now();
        Ok(Some(StatusUpdate::Applied(order.clone())))
    }

    async fn assign_driver(
        &self,
        order_id: Uuid,
        driver_id: Uuid,
    ) -> Result<Option<Order>, StorageError> {
        let mut state = self.state.write().await;
        if !state.drivers.contains_key(&driver_id) {
            return Err(StorageError::DriverMissing(driver_id));
        }
        Ok(state.orders.get_mut(&order_id).map(|order| {
            order.driver_id = Some(driver_id);
            order.updated_at = Utc::now();
            order.clone()
        }))
    }

    async fn create_review(&self, review: &Review) -> Result<Restaurant, StorageError> {
        let mut state = self.state.write().await;
        if !state.users.contains_key(&review.user_id) {
            return Err(StorageError::UserMissing(review.user_id));
        }
        let Some(restaurant) = state.restaurants.get_mut(&review.restaurant_id) else {
            return Err(StorageError::RestaurantMissing(review.restaurant_id));
        };

        // Integral increments keep concurrent review writers composable.
        restaurant.rating_total += i64::from(review.rating);
        restaurant.total_reviews += 1;
        restaurant.rating = restaurant.rating_total as f64 / restaurant.total_reviews as f64;
        restaurant.updated_at = Utc::now();
        let snapshot = restaurant.clone();

        state.reviews.push(review.clone());
        Ok(snapshot)
    }

    async fn reviews_for_restaurant(
        &self,
        restaurant_id: Uuid,
    ) -> Result<Vec<Review>, StorageError> {
        let state = self.state.read().await;
        let mut reviews: Vec<Review> = state
            .reviews
            .iter()
            .filter(|review| review.restaurant_id == restaurant_id)
            .cloned()
            .collect();
        reviews.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(reviews)
    }

    async fn restaurant_order_stats(
        &self,
        restaurant_id: Uuid,
    ) -> Result<(i64, Decimal), StorageError> {
        let state = self.state.read().await;
        let mut count = 0i64;
        let mut revenue = Decimal::ZERO;
        for order in state.orders.values() {
            if order.restaurant_id == restaurant_id {
                count += 1;
                revenue += order.subtotal;
            }
        }
        Ok((count, revenue))
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DeliveryDetails, UserRole};
    use rust_decimal_macros::dec;

    fn user(role: UserRole, email: &str) -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            name: "Test User".into(),
            email: email.into(),
            phone: None,
            role,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    fn restaurant(owner_id: Uuid) -> Restaurant {
        let now = Utc::now();
        Restaurant {
            id: Uuid::new_v4(),
            owner_id,
            name: "Testaurant".into(),
            delivery_fee: dec!(2.99),
            rating: 0.0,
            rating_total: 0,
            total_reviews: 0,
            is_active: true,
            is_open: true,
            created_at: now,
            updated_at: now,
        }
    }

    fn menu_item(restaurant_id: Uuid, price: Decimal) -> MenuItem {
        let now = Utc::now();
        MenuItem {
            id: Uuid::new_v4(),
            restaurant_id,
            name: "Margherita".into(),
            description: None,
            price,
            is_available: true,
            created_at: now,
            updated_at: now,
        }
    }

    fn order(customer_id: Uuid, restaurant_id: Uuid, number: &str) -> Order {
        let now = Utc::now();
        Order {
            id: Uuid::new_v4(),
            customer_id,
            restaurant_id,
            driver_id: None,
            order_number: number.into(),
            status: OrderStatus::Pending,
            subtotal: dec!(9.99),
            delivery_fee: dec!(2.99),
            tax: dec!(0.80),
            tip: dec!(0.00),
            total: dec!(13.78),
            delivery: DeliveryDetails {
                address: "1 Test Street".into(),
                latitude: None,
                longitude: None,
                instructions: None,
            },
            actual_delivery_time: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn line(order: &Order, item: &MenuItem, quantity: i32) -> OrderLine {
        OrderLine {
            id: Uuid::new_v4(),
            order_id: order.id,
            menu_item_id: item.id,
            quantity,
            unit_price: item.price,
            instructions: None,
            created_at: Utc::now(),
        }
    }

    async fn seeded() -> (InMemoryStorage, User, Restaurant, MenuItem) {
        let storage = InMemoryStorage::new();
        let customer = user(UserRole::Customer, "customer@example.com");
        let owner = user(UserRole::RestaurantOwner, "owner@example.com");
        storage.insert_user(&customer).await.unwrap();
        storage.insert_user(&owner).await.unwrap();
        let restaurant = restaurant(owner.id);
        storage.insert_restaurant(&restaurant).await.unwrap();
        let item = menu_item(restaurant.id, dec!(9.99));
        storage.insert_menu_item(&item).await.unwrap();
        (storage, customer, restaurant, item)
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let storage = InMemoryStorage::new();
        storage
            .insert_user(&user(UserRole::Customer, "same@example.com"))
            .await
            .unwrap();
        let err = storage
            .insert_user(&user(UserRole::Driver, "same@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::DuplicateEmail(_)));
    }

    #[tokio::test]
    async fn test_duplicate_driver_profile_rejected() {
        let storage = InMemoryStorage::new();
        let u = user(UserRole::Driver, "driver@example.com");
        storage.insert_user(&u).await.unwrap();

        let now = Utc::now();
        let profile = |id| Driver {
            id,
            user_id: u.id,
            vehicle_type: Some("bike".into()),
            license_plate: None,
            is_available: false,
            created_at: now,
            updated_at: now,
        };
        storage.insert_driver(&profile(Uuid::new_v4())).await.unwrap();
        let err = storage
            .insert_driver(&profile(Uuid::new_v4()))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::DuplicateDriverProfile(id) if id == u.id));
    }

    #[tokio::test]
    async fn test_create_order_persists_order_and_lines_together() {
        let (storage, customer, rest, item) = seeded().await;
        let o = order(customer.id, rest.id, "ORD-AAAA1111");
        let lines = vec![line(&o, &item, 2)];

        storage.create_order(&o, &lines).await.unwrap();

        assert!(storage.find_order(o.id).await.unwrap().is_some());
        assert_eq!(storage.order_lines(o.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_create_order_rejects_duplicate_number() {
        let (storage, customer, rest, item) = seeded().await;
        let first = order(customer.id, rest.id, "ORD-AAAA1111");
        storage
            .create_order(&first, &[line(&first, &item, 1)])
            .await
            .unwrap();

        let second = order(customer.id, rest.id, "ORD-AAAA1111");
        let err = storage
            .create_order(&second, &[line(&second, &item, 1)])
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::DuplicateOrderNumber(_)));
        assert!(storage.find_order(second.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_create_order_revalidates_availability_at_commit() {
        let (storage, customer, rest, item) = seeded().await;
        // Item goes unavailable after the quote was computed.
        storage
            .update_menu_item(item.id, None, Some(false))
            .await
            .unwrap();

        let o = order(customer.id, rest.id, "ORD-BBBB2222");
        let err = storage
            .create_order(&o, &[line(&o, &item, 1)])
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::MenuItemUnavailable { .. }));

        // Nothing committed: no orphan order row, number still free.
        assert!(storage.find_order(o.id).await.unwrap().is_none());
        assert!(storage.order_lines(o.id).await.unwrap().is_empty());
        let retry = order(customer.id, rest.id, "ORD-BBBB2222");
        storage
            .update_menu_item(item.id, None, Some(true))
            .await
            .unwrap();
        storage
            .create_order(&retry, &[line(&retry, &item, 1)])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_create_order_detects_price_drift_at_commit() {
        let (storage, customer, rest, item) = seeded().await;
        let o = order(customer.id, rest.id, "ORD-CCCC3333");
        let stale_lines = vec![line(&o, &item, 1)];

        storage
            .update_menu_item(item.id, Some(dec!(11.49)), None)
            .await
            .unwrap();

        let err = storage.create_order(&o, &stale_lines).await.unwrap_err();
        assert!(
            matches!(err, StorageError::PriceDrift { current_price, .. } if current_price == dec!(11.49))
        );
        assert!(storage.find_order(o.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_create_order_fails_when_any_line_is_invalid() {
        let (storage, customer, rest, item) = seeded().await;
        let o = order(customer.id, rest.id, "ORD-DDDD4444");
        let mut lines = vec![line(&o, &item, 1)];
        let mut ghost = line(&o, &item, 1);
        ghost.menu_item_id = Uuid::new_v4();
        lines.push(ghost);

        let err = storage.create_order(&o, &lines).await.unwrap_err();
        assert!(matches!(err, StorageError::MenuItemMissing(_)));
        assert!(storage.find_order(o.id).await.unwrap().is_none());
        assert!(storage.order_lines(o.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_status_compare_and_set_detects_stale_reads() {
        let (storage, customer, rest, item) = seeded().await;
        let o = order(customer.id, rest.id, "ORD-EEEE5555");
        storage.create_order(&o, &[line(&o, &item, 1)]).await.unwrap();

        let updated = storage
            .update_order_status(o.id, Some(OrderStatus::Pending), OrderStatus::Confirmed, None)
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(updated, StatusUpdate::Applied(ref order) if order.status == OrderStatus::Confirmed));

        // A second writer still holding the Pending read loses the race.
        let stale = storage
            .update_order_status(o.id, Some(OrderStatus::Pending), OrderStatus::Cancelled, None)
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(stale, StatusUpdate::StaleStatus(ref order) if order.status == OrderStatus::Confirmed));
    }

    #[tokio::test]
    async fn test_status_update_on_unknown_order_is_none() {
        let storage = InMemoryStorage::new();
        let outcome = storage
            .update_order_status(Uuid::new_v4(), None, OrderStatus::Confirmed, None)
            .await
            .unwrap();
        assert!(outcome.is_none());
    }

    #[tokio::test]
    async fn test_review_updates_rating_aggregate_atomically() {
        let (storage, customer, rest, _item) = seeded().await;
        let now = Utc::now();
        for (n, rating) in [5, 3, 4].into_iter().enumerate() {
            let review = Review {
                id: Uuid::new_v4(),
                user_id: customer.id,
                restaurant_id: rest.id,
                order_id: None,
                rating,
                comment: None,
                created_at: now + chrono::Duration::seconds(n as i64),
            };
            storage.create_review(&review).await.unwrap();
        }

        let updated = storage.find_restaurant(rest.id).await.unwrap().unwrap();
        assert_eq!(updated.total_reviews, 3);
        assert_eq!(updated.rating_total, 12);
        assert!((updated.rating - 4.0).abs() < f64::EPSILON);
        assert_eq!(storage.reviews_for_restaurant(rest.id).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_review_for_unknown_restaurant_mutates_nothing() {
        let (storage, customer, rest, _item) = seeded().await;
        let review = Review {
            id: Uuid::new_v4(),
            user_id: customer.id,
            restaurant_id: Uuid::new_v4(),
            order_id: None,
            rating: 5,
            comment: None,
            created_at: Utc::now(),
        };
        let err = storage.create_review(&review).await.unwrap_err();
        assert!(matches!(err, StorageError::RestaurantMissing(_)));

        let untouched = storage.find_restaurant(rest.id).await.unwrap().unwrap();
        assert_eq!(untouched.total_reviews, 0);
        assert!(storage.reviews_for_restaurant(rest.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_restaurant_order_stats_counts_and_sums() {
        let (storage, customer, rest, item) = seeded().await;
        for number in ["ORD-11111111", "ORD-22222222"] {
            let o = order(customer.id, rest.id, number);
            storage.create_order(&o, &[line(&o, &item, 1)]).await.unwrap();
        }

        let (count, revenue) = storage.restaurant_order_stats(rest.id).await.unwrap();
        assert_eq!(count, 2);
        assert_eq!(revenue, dec!(19.98));
    }
}
