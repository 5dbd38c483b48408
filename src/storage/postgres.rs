use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::models::{
    Driver, MenuItem, Order, OrderLine, OrderStatus, Restaurant, Review, User, UserRole,
};

use super::{StatusUpdate, Storage, StorageError};

// ============================================================================
// Postgres Storage Backend
// ============================================================================
//
// Production backend. The three multi-row workflows (create order with
// lines, status compare-and-set, review + rating aggregate) each run inside
// a single transaction; an early return drops the transaction and rolls it
// back. Uniqueness conflicts are surfaced through named constraints so they
// map to the typed error kinds instead of a generic database failure.
//
// ============================================================================

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id UUID PRIMARY KEY,
    name TEXT NOT NULL,
    email TEXT NOT NULL,
    phone TEXT,
    role TEXT NOT NULL,
    is_active BOOLEAN NOT NULL DEFAULT TRUE,
    created_at TIMESTAMPTZ NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL,
    CONSTRAINT users_email_key UNIQUE (email)
);

CREATE TABLE IF NOT EXISTS drivers (
    id UUID PRIMARY KEY,
    user_id UUID NOT NULL REFERENCES users (id),
    vehicle_type TEXT,
    license_plate TEXT,
    is_available BOOLEAN NOT NULL DEFAULT FALSE,
    created_at TIMESTAMPTZ NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL,
    CONSTRAINT drivers_user_id_key UNIQUE (user_id)
);

CREATE TABLE IF NOT EXISTS restaurants (
    id UUID PRIMARY KEY,
    owner_id UUID NOT NULL REFERENCES users (id),
    name TEXT NOT NULL,
    delivery_fee NUMERIC(10, 2) NOT NULL DEFAULT 0,
    rating DOUBLE PRECISION NOT NULL DEFAULT 0,
    rating_total BIGINT NOT NULL DEFAULT 0,
    total_reviews BIGINT NOT NULL DEFAULT 0,
    is_active BOOLEAN NOT NULL DEFAULT TRUE,
    is_open BOOLEAN NOT NULL DEFAULT TRUE,
    created_at TIMESTAMPTZ NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL
);

CREATE TABLE IF NOT EXISTS menu_items (
    id UUID PRIMARY KEY,
    restaurant_id UUID NOT NULL REFERENCES restaurants (id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    description TEXT,
    price NUMERIC(10, 2) NOT NULL,
    is_available BOOLEAN NOT NULL DEFAULT TRUE,
    created_at TIMESTAMPTZ NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL
);

CREATE TABLE IF NOT EXISTS orders (
    id UUID PRIMARY KEY,
    customer_id UUID NOT NULL REFERENCES users (id),
    restaurant_id UUID NOT NULL REFERENCES restaurants (id),
    driver_id UUID REFERENCES drivers (id),
    order_number TEXT NOT NULL,
    status TEXT NOT NULL,
    subtotal NUMERIC(10, 2) NOT NULL,
    delivery_fee NUMERIC(10, 2) NOT NULL,
    tax NUMERIC(10, 2) NOT NULL,
    tip NUMERIC(10, 2) NOT NULL,
    total NUMERIC(10, 2) NOT NULL,
    delivery_address TEXT NOT NULL,
    delivery_latitude DOUBLE PRECISION,
    delivery_longitude DOUBLE PRECISION,
    delivery_instructions TEXT,
    actual_delivery_time TIMESTAMPTZ,
    created_at TIMESTAMPTZ NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL,
    CONSTRAINT orders_order_number_key UNIQUE (order_number)
);

CREATE TABLE IF NOT EXISTS order_lines (
    id UUID PRIMARY KEY,
    order_id UUID NOT NULL REFERENCES orders (id) ON DELETE CASCADE,
    menu_item_id UUID NOT NULL REFERENCES menu_items (id),
    quantity INTEGER NOT NULL CHECK (quantity > 0),
    unit_price NUMERIC(10, 2) NOT NULL,
    instructions TEXT,
    created_at TIMESTAMPTZ NOT NULL
);

CREATE TABLE IF NOT EXISTS reviews (
    id UUID PRIMARY KEY,
    user_id UUID NOT NULL REFERENCES users (id),
    restaurant_id UUID NOT NULL REFERENCES restaurants (id),
    order_id UUID REFERENCES orders (id),
    rating INTEGER NOT NULL CHECK (rating BETWEEN 1 AND 5),
    comment TEXT,
    created_at TIMESTAMPTZ NOT NULL
);
"#;

pub struct PostgresStorage {
    pool: PgPool,
}

impl PostgresStorage {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(url: &str) -> Result<Self, StorageError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Create the schema if it does not exist yet. Idempotent.
    pub async fn init_schema(&self) -> Result<(), StorageError> {
        sqlx::raw_sql(SCHEMA).execute(&self.pool).await?;
        tracing::info!("storage schema ready");
        Ok(())
    }
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        if matches!(
            err,
            sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed
        ) {
            StorageError::Unavailable(err.to_string())
        } else {
            StorageError::Backend(err.into())
        }
    }
}

/// Name of the violated constraint, if this is a constraint violation.
fn violated_constraint(err: &sqlx::Error) -> Option<&str> {
    match err {
        sqlx::Error::Database(db) => db.constraint(),
        _ => None,
    }
}

fn parse_status(raw: &str) -> Result<OrderStatus, StorageError> {
    OrderStatus::parse(raw)
        .ok_or_else(|| StorageError::Backend(anyhow::anyhow!("unknown order status in storage: {raw}")))
}

fn parse_role(raw: &str) -> Result<UserRole, StorageError> {
    match raw {
        "customer" => Ok(UserRole::Customer),
        "restaurant_owner" => Ok(UserRole::RestaurantOwner),
        "driver" => Ok(UserRole::Driver),
        "admin" => Ok(UserRole::Admin),
        other => Err(StorageError::Backend(anyhow::anyhow!(
            "unknown user role in storage: {other}"
        ))),
    }
}

fn role_str(role: UserRole) -> &'static str {
    match role {
        UserRole::Customer => "customer",
        UserRole::RestaurantOwner => "restaurant_owner",
        UserRole::Driver => "driver",
        UserRole::Admin => "admin",
    }
}

fn user_from_row(row: &PgRow) -> Result<User, StorageError> {
    let role: String = row.try_get("role")?;
    Ok(User {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        phone: row.try_get("phone")?,
        role: parse_role(&role)?,
        is_active: row.try_get("is_active")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn driver_from_row(row: &PgRow) -> Result<Driver, StorageError> {
    Ok(Driver {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        vehicle_type: row.try_get("vehicle_type")?,
        license_plate: row.try_get("license_plate")?,
        is_available: row.try_get("is_available")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn restaurant_from_row(row: &PgRow) -> Result<Restaurant, StorageError> {
    Ok(Restaurant {
        id: row.try_get("id")?,
        owner_id: row.try_get("owner_id")?,
        name: row.try_get("name")?,
        delivery_fee: row.try_get("delivery_fee")?,
        rating: row.try_get("rating")?,
        rating_total: row.try_get("rating_total")?,
        total_reviews: row.try_get("total_reviews")?,
        is_active: row.try_get("is_active")?,
        is_open: row.try_get("is_open")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn menu_item_from_row(row: &PgRow) -> Result<MenuItem, StorageError> {
    Ok(MenuItem {
        id: row.try_get("id")?,
        restaurant_id: row.try_get("restaurant_id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        price: row.try_get("price")?,
        is_available: row.try_get("is_available")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn order_from_row(row: &PgRow) -> Result<Order, StorageError> {
    let status: String = row.try_get("status")?;
    Ok(Order {
        id: row.try_get("id")?,
        customer_id: row.try_get("customer_id")?,
        restaurant_id: row.try_get("restaurant_id")?,
        driver_id: row.try_get("driver_id")?,
        order_number: row.try_get("order_number")?,
        status: parse_status(&status)?,
        subtotal: row.try_get("subtotal")?,
        delivery_fee: row.try_get("delivery_fee")?,
        tax: row.try_get("tax")?,
        tip: row.try_get("tip")?,
        total: row.try_get("total")?,
        delivery: crate::models::DeliveryDetails {
            address: row.try_get("delivery_address")?,
            latitude: row.try_get("delivery_latitude")?,
            longitude: row.try_get("delivery_longitude")?,
            instructions: row.try_get("delivery_instructions")?,
        },
        actual_delivery_time: row.try_get("actual_delivery_time")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn order_line_from_row(row: &PgRow) -> Result<OrderLine, StorageError> {
    Ok(OrderLine {
        id: row.try_get("id")?,
        order_id: row.try_get("order_id")?,
        menu_item_id: row.try_get("menu_item_id")?,
        quantity: row.try_get("quantity")?,
        unit_price: row.try_get("unit_price")?,
        instructions: row.try_get("instructions")?,
        created_at: row.try_get("created_at")?,
    })
}

fn review_from_row(row: &PgRow) -> Result<Review, StorageError> {
    Ok(Review {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        restaurant_id: row.try_get("restaurant_id")?,
        order_id: row.try_get("order_id")?,
        rating: row.try_get("rating")?,
        comment: row.try_get("comment")?,
        created_at: row.try_get("created_at")?,
    })
}

#[async_trait]
impl Storage for PostgresStorage {
    async fn find_user(&self, id: Uuid) -> Result<Option<User>, StorageError> {
        let row = sqlx::query("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn find_driver(&self, id: Uuid) -> Result<Option<Driver>, StorageError> {
        let row = sqlx::query("SELECT * FROM drivers WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(driver_from_row).transpose()
    }

    async fn find_restaurant(&self, id: Uuid) -> Result<Option<Restaurant>, StorageError> {
        let row = sqlx::query("SELECT * FROM restaurants WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(restaurant_from_row).transpose()
    }

    async fn find_menu_item(&self, id: Uuid) -> Result<Option<MenuItem>, StorageError> {
        let row = sqlx::query("SELECT * FROM menu_items WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(menu_item_from_row).transpose()
    }

    async fn find_order(&self, id: Uuid) -> Result<Option<Order>, StorageError> {
        let row = sqlx::query("SELECT * FROM orders WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(order_from_row).transpose()
    }

    async fn order_lines(&self, order_id: Uuid) -> Result<Vec<OrderLine>, StorageError> {
        let rows = sqlx::query(
            "SELECT * FROM order_lines WHERE order_id = $1 ORDER BY created_at ASC",
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(order_line_from_row).collect()
    }

    async fn insert_user(&self, user: &User) -> Result<(), StorageError> {
        let result = sqlx::query(
            "INSERT INTO users (id, name, email, phone, role, is_active, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.phone)
        .bind(role_str(user.role))
        .bind(user.is_active)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(err) if violated_constraint(&err) == Some("users_email_key") => {
                Err(StorageError::DuplicateEmail(user.email.clone()))
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn insert_driver(&self, driver: &Driver) -> Result<(), StorageError> {
        let result = sqlx::query(
            "INSERT INTO drivers (id, user_id, vehicle_type, license_plate, is_available, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(driver.id)
        .bind(driver.user_id)
        .bind(&driver.vehicle_type)
        .bind(&driver.license_plate)
        .bind(driver.is_available)
        .bind(driver.created_at)
        .bind(driver.updated_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(err) if violated_constraint(&err) == Some("drivers_user_id_key") => {
                Err(StorageError::DuplicateDriverProfile(driver.user_id))
            }
            Err(err) if violated_constraint(&err) == Some("drivers_user_id_fkey") => {
                Err(StorageError::UserMissing(driver.user_id))
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn set_driver_availability(
        &self,
        driver_id: Uuid,
        available: bool,
    ) -> Result<Option<Driver>, StorageError> {
        let row = sqlx::query(
            "UPDATE drivers SET is_available = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(driver_id)
        .bind(available)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(driver_from_row).transpose()
    }

    async fn insert_restaurant(&self, restaurant: &Restaurant) -> Result<(), StorageError> {
        let result = sqlx::query(
            "INSERT INTO restaurants (id, owner_id, name, delivery_fee, rating, rating_total,
                                      total_reviews, is_active, is_open, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(restaurant.id)
        .bind(restaurant.owner_id)
        .bind(&restaurant.name)
        .bind(restaurant.delivery_fee)
        .bind(restaurant.rating)
        .bind(restaurant.rating_total)
        .bind(restaurant.total_reviews)
        .bind(restaurant.is_active)
        .bind(restaurant.is_open)
        .bind(restaurant.created_at)
        .bind(restaurant.updated_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(err) if violated_constraint(&err) == Some("restaurants_owner_id_fkey") => {
                Err(StorageError::UserMissing(restaurant.owner_id))
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn insert_menu_item(&self, item: &MenuItem) -> Result<(), StorageError> {
        let result = sqlx::query(
            "INSERT INTO menu_items (id, restaurant_id, name, description, price, is_available,
                                     created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(item.id)
        .bind(item.restaurant_id)
        .bind(&item.name)
        .bind(&item.description)
        .bind(item.price)
        .bind(item.is_available)
        .bind(item.created_at)
        .bind(item.updated_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(err) if violated_constraint(&err) == Some("menu_items_restaurant_id_fkey") => {
                Err(StorageError::RestaurantMissing(item.restaurant_id))
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn update_menu_item(
        &self,
        id: Uuid,
        price: Option<Decimal>,
        available: Option<bool>,
    ) -> Result<Option<MenuItem>, StorageError> {
        let row = sqlx::query(
            "UPDATE menu_items
             SET price = COALESCE($2, price),
                 is_available = COALESCE($3, is_available),
                 updated_at = NOW()
             WHERE id = $1
             RETURNING *",
        )
        .bind(id)
        .bind(price)
        .bind(available)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(menu_item_from_row).transpose()
    }

    async fn set_restaurant_open(
        &self,
        id: Uuid,
        open: bool,
    ) -> Result<Option<Restaurant>, StorageError> {
        let row = sqlx::query(
            "UPDATE restaurants SET is_open = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(open)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(restaurant_from_row).transpose()
    }

    async fn create_order(&self, order: &Order, lines: &[OrderLine]) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await?;

        // Re-validate the catalog under row locks before writing anything;
        // the quote may be stale by now. Any failure rolls the whole
        // transaction back.
        for line in lines {
            let row = sqlx::query(
                "SELECT restaurant_id, name, price, is_available FROM menu_items
                 WHERE id = $1 FOR SHARE",
            )
            .bind(line.menu_item_id)
            .fetch_optional(&mut *tx)
            .await?;

            let Some(row) = row else {
                return Err(StorageError::MenuItemMissing(line.menu_item_id));
            };
            let restaurant_id: Uuid = row.try_get("restaurant_id")?;
            if restaurant_id != order.restaurant_id {
                return Err(StorageError::MenuItemMissing(line.menu_item_id));
            }
            if !row.try_get::<bool, _>("is_available")? {
                return Err(StorageError::MenuItemUnavailable {
                    id: line.menu_item_id,
                    name: row.try_get("name")?,
                });
            }
            let current_price: Decimal = row.try_get("price")?;
            if current_price != line.unit_price {
                return Err(StorageError::PriceDrift {
                    id: line.menu_item_id,
                    current_price,
                });
            }
        }

        let result = sqlx::query(
            "INSERT INTO orders (id, customer_id, restaurant_id, driver_id, order_number, status,
                                 subtotal, delivery_fee, tax, tip, total,
                                 delivery_address, delivery_latitude, delivery_longitude,
                                 delivery_instructions, actual_delivery_time, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)",
        )
        .bind(order.id)
        .bind(order.customer_id)
        .bind(order.restaurant_id)
        .bind(order.driver_id)
        .bind(&order.order_number)
        .bind(order.status.as_str())
        .bind(order.subtotal)
        .bind(order.delivery_fee)
        .bind(order.tax)
        .bind(order.tip)
        .bind(order.total)
        .bind(&order.delivery.address)
        .bind(order.delivery.latitude)
        .bind(order.delivery.longitude)
        .bind(&order.delivery.instructions)
        .bind(order.actual_delivery_time)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *tx)
        .await;

        match result {
            Ok(_) => {}
            Err(err) if violated_constraint(&err) == Some("orders_order_number_key") => {
                return Err(StorageError::DuplicateOrderNumber(order.order_number.clone()));
            }
            Err(err) if violated_constraint(&err) == Some("orders_customer_id_fkey") => {
                return Err(StorageError::UserMissing(order.customer_id));
            }
            Err(err) if violated_constraint(&err) == Some("orders_restaurant_id_fkey") => {
                return Err(StorageError::RestaurantMissing(order.restaurant_id));
            }
            Err(err) => return Err(err.into()),
        }

        for line in lines {
            sqlx::query(
                "INSERT INTO order_lines (id, order_id, menu_item_id, quantity, unit_price,
                                          instructions, created_at)
                 VALUES ($1, $2, $3, $4, $5, $6, $7)",
            )
            .bind(line.id)
            .bind(line.order_id)
            .bind(line.menu_item_id)
            .bind(line.quantity)
            .bind(line.unit_price)
            .bind(&line.instructions)
            .bind(line.created_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn update_order_status(
        &self,
        id: Uuid,
        expected: Option<OrderStatus>,
        next: OrderStatus,
        delivered_at: Option<DateTime<Utc>>,
    ) -> Result<Option<StatusUpdate>, StorageError> {
        let row = sqlx::query(
            "UPDATE orders
             SET status = $2,
                 actual_delivery_time = COALESCE($3, actual_delivery_time),
                 updated_at = NOW()
             WHERE id = $1 AND ($4::text IS NULL OR status = $4)
             RETURNING *",
        )
        .bind(id)
        .bind(next.as_str())
        .bind(delivered_at)
        .bind(expected.map(|status| status.as_str()))
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = row {
            return Ok(Some(StatusUpdate::Applied(order_from_row(&row)?)));
        }

        // Either the order is gone or another writer moved the status first.
        let current = self.find_order(id).await?;
        Ok(current.map(StatusUpdate::StaleStatus))
    }

    async fn assign_driver(
        &self,
        order_id: Uuid,
        driver_id: Uuid,
    ) -> Result<Option<Order>, StorageError> {
        let result = sqlx::query(
            "UPDATE orders SET driver_id = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(order_id)
        .bind(driver_id)
        .fetch_optional(&self.pool)
        .await;

        match result {
            Ok(row) => row.as_ref().map(order_from_row).transpose(),
            Err(err) if violated_constraint(&err) == Some("orders_driver_id_fkey") => {
                Err(StorageError::DriverMissing(driver_id))
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn create_review(&self, review: &Review) -> Result<Restaurant, StorageError> {
        let mut tx = self.pool.begin().await?;

        let user = sqlx::query("SELECT 1 FROM users WHERE id = $1")
            .bind(review.user_id)
            .fetch_optional(&mut *tx)
            .await?;
        if user.is_none() {
            return Err(StorageError::UserMissing(review.user_id));
        }

        // Atomic increments of the stored running aggregate; concurrent
        // review writers serialize on the restaurant row.
        let row = sqlx::query(
            "UPDATE restaurants
             SET rating_total = rating_total + $2,
                 total_reviews = total_reviews + 1,
                 rating = (rating_total + $2)::float8 / (total_reviews + 1),
                 updated_at = NOW()
             WHERE id = $1
             RETURNING *",
        )
        .bind(review.restaurant_id)
        .bind(i64::from(review.rating))
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            return Err(StorageError::RestaurantMissing(review.restaurant_id));
        };
        let restaurant = restaurant_from_row(&row)?;

        sqlx::query(
            "INSERT INTO reviews (id, user_id, restaurant_id, order_id, rating, comment, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(review.id)
        .bind(review.user_id)
        .bind(review.restaurant_id)
        .bind(review.order_id)
        .bind(review.rating)
        .bind(&review.comment)
        .bind(review.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(restaurant)
    }

    async fn reviews_for_restaurant(
        &self,
        restaurant_id: Uuid,
    ) -> Result<Vec<Review>, StorageError> {
        let rows = sqlx::query(
            "SELECT * FROM reviews WHERE restaurant_id = $1 ORDER BY created_at DESC",
        )
        .bind(restaurant_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(review_from_row).collect()
    }

    async fn restaurant_order_stats(
        &self,
        restaurant_id: Uuid,
    ) -> Result<(i64, Decimal), StorageError> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS total_orders, COALESCE(SUM(subtotal), 0) AS gross_revenue
             FROM orders WHERE restaurant_id = $1",
        )
        .bind(restaurant_id)
        .fetch_one(&self.pool)
        .await?;
        Ok((row.try_get("total_orders")?, row.try_get("gross_revenue")?))
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
