use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::models::{Driver, User, UserRole};
use crate::storage::{Storage, StorageError};

use super::errors::AccountError;

// ============================================================================
// Account Service
// ============================================================================

pub struct AccountService<S> {
    storage: Arc<S>,
}

impl<S: Storage> AccountService<S> {
    pub fn new(storage: Arc<S>) -> Self {
        Self { storage }
    }

    /// Register a user. Emails are unique across the system.
    pub async fn register_user(
        &self,
        name: &str,
        email: &str,
        phone: Option<String>,
        role: UserRole,
    ) -> Result<User, AccountError> {
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            name: name.to_string(),
            email: email.to_string(),
            phone,
            role,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        match self.storage.insert_user(&user).await {
            Ok(()) => {
                tracing::info!(user_id = %user.id, role = ?role, "user registered");
                Ok(user)
            }
            Err(StorageError::DuplicateEmail(email)) => Err(AccountError::DuplicateEmail(email)),
            Err(err) => Err(err.into()),
        }
    }

    /// Attach a driver profile to an existing user. One profile per user.
    pub async fn create_driver_profile(
        &self,
        user_id: Uuid,
        vehicle_type: Option<String>,
        license_plate: Option<String>,
    ) -> Result<Driver, AccountError> {
        self.storage
            .find_user(user_id)
            .await?
            .ok_or(AccountError::UserNotFound(user_id))?;

        let now = Utc::now();
        let driver = Driver {
            id: Uuid::new_v4(),
            user_id,
            vehicle_type,
            license_plate,
            is_available: false,
            created_at: now,
            updated_at: now,
        };

        match self.storage.insert_driver(&driver).await {
            Ok(()) => {
                tracing::info!(driver_id = %driver.id, user_id = %user_id, "driver profile created");
                Ok(driver)
            }
            Err(StorageError::DuplicateDriverProfile(id)) => {
                Err(AccountError::DuplicateDriverProfile(id))
            }
            Err(StorageError::UserMissing(id)) => Err(AccountError::UserNotFound(id)),
            Err(err) => Err(err.into()),
        }
    }

    pub async fn set_driver_availability(
        &self,
        driver_id: Uuid,
        available: bool,
    ) -> Result<Driver, AccountError> {
        self.storage
            .set_driver_availability(driver_id, available)
            .await?
            .ok_or(AccountError::DriverNotFound(driver_id))
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
