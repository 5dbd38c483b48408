use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::models::Review;
use crate::storage::{Storage, StorageError};
use crate::utils::{retry_transient, RetryConfig};

use super::errors::ReviewError;

// ============================================================================
// Review Service
// ============================================================================
//
// Reviews are append-only. Each insert carries the restaurant's rating
// aggregate with it: storage bumps the stored running sum and count in the
// same transaction, so the rating a reader sees is always consistent with
// the reviews that exist.
//
// ============================================================================

pub struct ReviewService<S> {
    storage: Arc<S>,
    retry: RetryConfig,
}

impl<S: Storage> ReviewService<S> {
    pub fn new(storage: Arc<S>) -> Self {
        Self {
            storage,
            retry: RetryConfig::default(),
        }
    }

    pub async fn add_review(
        &self,
        user_id: Uuid,
        restaurant_id: Uuid,
        rating: i32,
        comment: Option<String>,
        order_id: Option<Uuid>,
    ) -> Result<Review, ReviewError> {
        if !(1..=5).contains(&rating) {
            return Err(ReviewError::InvalidRating(rating));
        }
        self.storage
            .find_user(user_id)
            .await?
            .ok_or(ReviewError::UserNotFound(user_id))?;
        self.storage
            .find_restaurant(restaurant_id)
            .await?
            .ok_or(ReviewError::RestaurantNotFound(restaurant_id))?;

        let review = Review {
            id: Uuid::new_v4(),
            user_id,
            restaurant_id,
            order_id,
            rating,
            comment,
            created_at: Utc::now(),
        };

        let result = retry_transient(&self.retry, || {
            let storage = Arc::clone(&self.storage);
            let review = review.clone();
            async move { storage.create_review(&review).await }
        })
        .await;

        match result {
            Ok(restaurant) => {
                tracing::info!(
                    review_id = %review.id,
                    restaurant_id = %restaurant_id,
                    rating,
                    restaurant_rating = restaurant.rating,
                    total_reviews = restaurant.total_reviews,
                    "review recorded"
                );
                Ok(review)
            }
            Err(StorageError::UserMissing(id)) => Err(ReviewError::UserNotFound(id)),
            Err(StorageError::RestaurantMissing(id)) => Err(ReviewError::RestaurantNotFound(id)),
            Err(err) => Err(err.into()),
        }
    }

    /// Reviews for one restaurant, newest first.
    pub async fn restaurant_reviews(
        &self,
        restaurant_id: Uuid,
    ) -> Result<Vec<Review>, ReviewError> {
        self.storage
            .find_restaurant(restaurant_id)
            .await?
            .ok_or(ReviewError::RestaurantNotFound(restaurant_id))?;
        Ok(self.storage.reviews_for_restaurant(restaurant_id).await?)
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Restaurant, User, UserRole};
    use crate::storage::InMemoryStorage;
    use rust_decimal_macros::dec;

    async fn seeded() -> (Arc<InMemoryStorage>, User, Restaurant) {
        let storage = Arc::new(InMemoryStorage::new());
        let now = Utc::now();
        let reviewer = User {
            id: Uuid::new_v4(),
            name: "Rae".into(),
            email: "rae@example.com".into(),
            phone: None,
            role: UserRole::Customer,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        let owner = User {
            id: Uuid::new_v4(),
            name: "Omar".into(),
            email: "omar@example.com".into(),
            phone: None,
            role: UserRole::RestaurantOwner,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        storage.insert_user(&reviewer).await.unwrap();
        storage.insert_user(&owner).await.unwrap();

        let restaurant = Restaurant {
            id: Uuid::new_v4(),
            owner_id: owner.id,
            name: "Noodle Barn".into(),
            delivery_fee: dec!(1.50),
            rating: 0.0,
            rating_total: 0,
            total_reviews: 0,
            is_active: true,
            is_open: true,
            created_at: now,
            updated_at: now,
        };
        storage.insert_restaurant(&restaurant).await.unwrap();
        (storage, reviewer, restaurant)
    }

    #[tokio::test]
    async fn test_rating_converges_regardless_of_insertion_order() {
        for ratings in [[5, 3, 4], [4, 5, 3], [3, 4, 5], [5, 4, 3], [4, 3, 5], [3, 5, 4]] {
            let (storage, reviewer, restaurant) = seeded().await;
            let service = ReviewService::new(Arc::clone(&storage));

            for rating in ratings {
                service
                    .add_review(reviewer.id, restaurant.id, rating, None, None)
                    .await
                    .unwrap();
            }

            let updated = storage.find_restaurant(restaurant.id).await.unwrap().unwrap();
            assert_eq!(updated.total_reviews, 3, "ratings {ratings:?}");
            assert!((updated.rating - 4.0).abs() < f64::EPSILON, "ratings {ratings:?}");
        }
    }

    #[tokio::test]
    async fn test_review_fields_are_persisted() {
        let (storage, reviewer, restaurant) = seeded().await;
        let service = ReviewService::new(Arc::clone(&storage));

        let order_ref = Uuid::new_v4();
        let review = service
            .add_review(
                reviewer.id,
                restaurant.id,
                5,
                Some("Excellent dumplings".into()),
                Some(order_ref),
            )
            .await
            .unwrap();

        let listed = service.restaurant_reviews(restaurant.id).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, review.id);
        assert_eq!(listed[0].comment.as_deref(), Some("Excellent dumplings"));
        assert_eq!(listed[0].order_id, Some(order_ref));
    }

    #[tokio::test]
    async fn test_out_of_range_ratings_rejected_before_any_write() {
        let (storage, reviewer, restaurant) = seeded().await;
        let service = ReviewService::new(Arc::clone(&storage));

        for rating in [0, 6, -1] {
            let err = service
                .add_review(reviewer.id, restaurant.id, rating, None, None)
                .await
                .unwrap_err();
            assert!(matches!(err, ReviewError::InvalidRating(r) if r == rating));
        }

        let untouched = storage.find_restaurant(restaurant.id).await.unwrap().unwrap();
        assert_eq!(untouched.total_reviews, 0);
    }

    #[tokio::test]
    async fn test_unknown_references_mutate_nothing() {
        let (storage, reviewer, restaurant) = seeded().await;
        let service = ReviewService::new(Arc::clone(&storage));

        let err = service
            .add_review(Uuid::new_v4(), restaurant.id, 4, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ReviewError::UserNotFound(_)));

        let err = service
            .add_review(reviewer.id, Uuid::new_v4(), 4, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ReviewError::RestaurantNotFound(_)));

        let untouched = storage.find_restaurant(restaurant.id).await.unwrap().unwrap();
        assert_eq!(untouched.total_reviews, 0);
        assert_eq!(untouched.rating_total, 0);
    }
}
