use std::sync::Arc;

use rust_decimal_macros::dec;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use uuid::Uuid;

mod domain;
mod models;
mod storage;
mod utils;

use domain::account::AccountService;
use domain::catalog::CatalogService;
use domain::order::{LineRequest, OrderWorkflow};
use domain::review::ReviewService;
use models::{DeliveryDetails, OrderStatus, UserRole};
use storage::{InMemoryStorage, PostgresStorage, Storage};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Structured logging, overridable with RUST_LOG (e.g. RUST_LOG=debug).
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,delivery_core=debug")),
        )
        .init();

    tracing::info!("🚀 Starting order workflow demo");

    // DATABASE_URL selects the Postgres backend; otherwise everything runs
    // against the in-memory backend.
    match std::env::var("DATABASE_URL") {
        Ok(url) => {
            tracing::info!("Connecting to Postgres...");
            let storage = PostgresStorage::connect(&url).await?;
            storage.init_schema().await?;
            run_demo(Arc::new(storage)).await
        }
        Err(_) => {
            tracing::info!("DATABASE_URL not set, using in-memory storage");
            run_demo(Arc::new(InMemoryStorage::new())).await
        }
    }
}

async fn run_demo<S: Storage + 'static>(storage: Arc<S>) -> anyhow::Result<()> {
    let accounts = AccountService::new(Arc::clone(&storage));
    let catalog = CatalogService::new(Arc::clone(&storage));
    let orders = OrderWorkflow::new(Arc::clone(&storage));
    let reviews = ReviewService::new(Arc::clone(&storage));

    // Emails are unique per run so the demo can be re-run against a
    // persistent database.
    let run = Uuid::new_v4().simple().to_string();

    // === 1. Accounts ===
    let owner = accounts
        .register_user(
            "Olive Owner",
            &format!("olive+{run}@example.com"),
            None,
            UserRole::RestaurantOwner,
        )
        .await?;
    let customer = accounts
        .register_user(
            "Ada Appetite",
            &format!("ada+{run}@example.com"),
            Some("555-0101".into()),
            UserRole::Customer,
        )
        .await?;
    let courier_user = accounts
        .register_user(
            "Kai Courier",
            &format!("kai+{run}@example.com"),
            None,
            UserRole::Driver,
        )
        .await?;
    let courier = accounts
        .create_driver_profile(courier_user.id, Some("bike".into()), None)
        .await?;
    accounts.set_driver_availability(courier.id, true).await?;

    // === 2. Catalog ===
    let restaurant = catalog
        .create_restaurant(owner.id, "Burger Cellar", dec!(2.99))
        .await?;
    let burger = catalog
        .add_menu_item(restaurant.id, "Smash Burger", None, dec!(9.99))
        .await?;
    let fries = catalog
        .add_menu_item(restaurant.id, "Fries", None, dec!(2.99))
        .await?;

    // === 3. Quote and create an order ===
    let priced = orders
        .price_order(
            restaurant.id,
            &[
                LineRequest::new(burger.id, 2),
                LineRequest {
                    menu_item_id: fries.id,
                    quantity: 1,
                    instructions: Some("extra crispy".into()),
                },
            ],
            dec!(1.00),
        )
        .await?;

    let order = orders
        .create_order(
            customer.id,
            priced,
            DeliveryDetails {
                address: "221B Baker Street".into(),
                latitude: Some(51.5237),
                longitude: Some(-0.1585),
                instructions: Some("Ring twice".into()),
            },
        )
        .await?;
    println!("{}", serde_json::to_string_pretty(&order)?);

    // === 4. Fulfillment ===
    orders
        .set_order_status(order.id, OrderStatus::Confirmed)
        .await?;
    orders
        .set_order_status(order.id, OrderStatus::Preparing)
        .await?;
    orders
        .set_order_status(order.id, OrderStatus::ReadyForPickup)
        .await?;
    orders.assign_driver(order.id, courier.id).await?;
    orders
        .set_order_status(order.id, OrderStatus::PickedUp)
        .await?;
    let delivered = orders
        .set_order_status(order.id, OrderStatus::Delivered)
        .await?;
    tracing::info!(
        order_number = %delivered.order_number,
        delivered_at = ?delivered.actual_delivery_time,
        "✅ Order delivered"
    );

    // === 5. A second order: skips are rejected, cancellation is not ===
    let priced = orders
        .price_order(restaurant.id, &[LineRequest::new(fries.id, 3)], dec!(0.50))
        .await?;
    let second = orders
        .create_order(
            customer.id,
            priced,
            DeliveryDetails {
                address: "742 Evergreen Terrace".into(),
                latitude: None,
                longitude: None,
                instructions: None,
            },
        )
        .await?;
    if let Err(err) = orders
        .set_order_status(second.id, OrderStatus::Delivered)
        .await
    {
        tracing::info!(error = %err, "skipping ahead is rejected");
    }
    orders
        .set_order_status(second.id, OrderStatus::Cancelled)
        .await?;

    // === 6. Reviews update the restaurant aggregate ===
    for (rating, comment) in [
        (5, Some("Perfect burger".to_string())),
        (3, None),
        (4, Some("Fries were cold, burger great".to_string())),
    ] {
        reviews
            .add_review(customer.id, restaurant.id, rating, comment, Some(order.id))
            .await?;
    }

    let stats = orders.restaurant_stats(restaurant.id).await?;
    tracing::info!(
        total_orders = stats.total_orders,
        gross_revenue = %stats.gross_revenue,
        rating = stats.rating,
        total_reviews = stats.total_reviews,
        "🎉 Demo complete"
    );

    Ok(())
}
