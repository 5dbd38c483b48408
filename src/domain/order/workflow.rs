use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::models::{DeliveryDetails, Order, OrderLine, OrderStatus};
use crate::storage::{RestaurantStats, StatusUpdate, Storage, StorageError};
use crate::utils::{retry_transient, RetryConfig};

use super::errors::OrderError;
use super::number::generate_order_number;
use super::pricing::{LineRequest, PricedLine, PricedOrder};

// ============================================================================
// Order Workflow
// ============================================================================
//
// Orchestrates: quote -> atomic creation -> supervised status progression.
// Storage is injected; the transactional work (create, status update) runs
// through the transient-failure retry wrapper.
//
// ============================================================================

/// Fresh order numbers drawn before giving up on a collision streak.
const ORDER_NUMBER_ATTEMPTS: u32 = 4;

pub struct OrderWorkflow<S> {
    storage: Arc<S>,
    retry: RetryConfig,
}

impl<S: Storage> OrderWorkflow<S> {
    pub fn new(storage: Arc<S>) -> Self {
        Self {
            storage,
            retry: RetryConfig::default(),
        }
    }

    /// Price a selection against the current catalog. Read-only; the first
    /// invalid line aborts the whole quote.
    pub async fn price_order(
        &self,
        restaurant_id: Uuid,
        requests: &[LineRequest],
        tip: Decimal,
    ) -> Result<PricedOrder, OrderError> {
        let restaurant = self
            .storage
            .find_restaurant(restaurant_id)
            .await?
            .ok_or(OrderError::RestaurantNotFound(restaurant_id))?;
        if requests.is_empty() {
            return Err(OrderError::EmptyOrder);
        }

        let mut lines = Vec::with_capacity(requests.len());
        for request in requests {
            let item = self
                .storage
                .find_menu_item(request.menu_item_id)
                .await?
                .ok_or(OrderError::ItemNotFound(request.menu_item_id))?;
            lines.push(PricedLine::try_new(&restaurant, &item, request)?);
        }

        let priced = PricedOrder::assemble(&restaurant, lines, tip)?;
        tracing::debug!(
            restaurant_id = %restaurant_id,
            lines = priced.lines.len(),
            subtotal = %priced.subtotal,
            total = %priced.total,
            "priced order"
        );
        Ok(priced)
    }

    /// Persist a priced order and its lines as one unit. Storage re-validates
    /// the catalog at commit, so a quote that went stale fails here instead
    /// of silently mispricing.
    pub async fn create_order(
        &self,
        customer_id: Uuid,
        priced: PricedOrder,
        delivery: DeliveryDetails,
    ) -> Result<Order, OrderError> {
        self.storage
            .find_user(customer_id)
            .await?
            .ok_or(OrderError::CustomerNotFound(customer_id))?;
        self.storage
            .find_restaurant(priced.restaurant_id)
            .await?
            .ok_or(OrderError::RestaurantNotFound(priced.restaurant_id))?;
        if priced.lines.is_empty() {
            return Err(OrderError::EmptyOrder);
        }

        for attempt in 1..=ORDER_NUMBER_ATTEMPTS {
            let now = Utc::now();
            let order = Order {
                id: Uuid::new_v4(),
                customer_id,
                restaurant_id: priced.restaurant_id,
                driver_id: None,
                order_number: generate_order_number(),
                // Callers never pick the initial status.
                status: OrderStatus::Pending,
                subtotal: priced.subtotal,
                delivery_fee: priced.delivery_fee,
                tax: priced.tax,
                tip: priced.tip,
                total: priced.total,
                delivery: delivery.clone(),
                actual_delivery_time: None,
                created_at: now,
                updated_at: now,
            };
            let lines: Vec<OrderLine> = priced
                .lines
                .iter()
                .map(|line| OrderLine {
                    id: Uuid::new_v4(),
                    order_id: order.id,
                    menu_item_id: line.menu_item_id,
                    quantity: line.quantity,
                    unit_price: line.unit_price,
                    instructions: line.instructions.clone(),
                    created_at: now,
                })
                .collect();

            let result = retry_transient(&self.retry, || {
                let storage = Arc::clone(&self.storage);
                let order = order.clone();
                let lines = lines.clone();
                async move { storage.create_order(&order, &lines).await }
            })
            .await;

            match result {
                Ok(()) => {
                    tracing::info!(
                        order_id = %order.id,
                        order_number = %order.order_number,
                        total = %order.total,
                        "order created"
                    );
                    return Ok(order);
                }
                Err(StorageError::DuplicateOrderNumber(number)) => {
                    tracing::warn!(attempt, order_number = %number, "order number collision, regenerating");
                    continue;
                }
                Err(err) => return Err(map_commit_error(err)),
            }
        }

        Err(OrderError::OrderNumberExhausted)
    }

    pub async fn get_order(&self, order_id: Uuid) -> Result<(Order, Vec<OrderLine>), OrderError> {
        let order = self
            .storage
            .find_order(order_id)
            .await?
            .ok_or(OrderError::OrderNotFound(order_id))?;
        let lines = self.storage.order_lines(order_id).await?;
        Ok((order, lines))
    }

    /// Apply one supervised transition: a single forward step in the
    /// fulfillment flow, or cancellation from any non-terminal status.
    pub async fn set_order_status(
        &self,
        order_id: Uuid,
        next: OrderStatus,
    ) -> Result<Order, OrderError> {
        let order = self
            .storage
            .find_order(order_id)
            .await?
            .ok_or(OrderError::OrderNotFound(order_id))?;
        if !order.status.can_transition_to(next) {
            return Err(OrderError::InvalidTransition {
                from: order.status,
                to: next,
            });
        }
        self.apply_status(order_id, Some(order.status), next).await
    }

    /// Same as [`set_order_status`](Self::set_order_status), but takes the
    /// wire name of the target status.
    pub async fn set_order_status_by_name(
        &self,
        order_id: Uuid,
        status: &str,
    ) -> Result<Order, OrderError> {
        let next = OrderStatus::parse(status)
            .ok_or_else(|| OrderError::InvalidStatusValue(status.to_string()))?;
        self.set_order_status(order_id, next).await
    }

    /// Admin override preserving the legacy accept-any-status behavior: the
    /// transition table is bypassed, but the order must exist and the status
    /// must be a recognized value.
    pub async fn force_order_status(
        &self,
        order_id: Uuid,
        next: OrderStatus,
    ) -> Result<Order, OrderError> {
        self.storage
            .find_order(order_id)
            .await?
            .ok_or(OrderError::OrderNotFound(order_id))?;
        tracing::warn!(
            order_id = %order_id,
            status = next.as_str(),
            "forcing order status outside the transition table"
        );
        self.apply_status(order_id, None, next).await
    }

    async fn apply_status(
        &self,
        order_id: Uuid,
        expected: Option<OrderStatus>,
        next: OrderStatus,
    ) -> Result<Order, OrderError> {
        let delivered_at = (next == OrderStatus::Delivered).then(Utc::now);

        let outcome = retry_transient(&self.retry, || {
            let storage = Arc::clone(&self.storage);
            async move {
                storage
                    .update_order_status(order_id, expected, next, delivered_at)
                    .await
            }
        })
        .await?;

        match outcome {
            None => Err(OrderError::OrderNotFound(order_id)),
            Some(StatusUpdate::Applied(order)) => {
                tracing::info!(
                    order_id = %order.id,
                    status = order.status.as_str(),
                    "order status updated"
                );
                Ok(order)
            }
            // Another writer moved the order first; report against the row
            // as it is now.
            Some(StatusUpdate::StaleStatus(current)) => Err(OrderError::InvalidTransition {
                from: current.status,
                to: next,
            }),
        }
    }

    /// Attach a driver to an open order.
    pub async fn assign_driver(
        &self,
        order_id: Uuid,
        driver_id: Uuid,
    ) -> Result<Order, OrderError> {
        let order = self
            .storage
            .find_order(order_id)
            .await?
            .ok_or(OrderError::OrderNotFound(order_id))?;
        if order.status.is_terminal() {
            return Err(OrderError::OrderClosed(order.status));
        }
        let driver = self
            .storage
            .find_driver(driver_id)
            .await?
            .ok_or(OrderError::DriverNotFound(driver_id))?;

        match self.storage.assign_driver(order_id, driver.id).await {
            Ok(Some(order)) => {
                tracing::info!(order_id = %order.id, driver_id = %driver.id, "driver assigned");
                Ok(order)
            }
            Ok(None) => Err(OrderError::OrderNotFound(order_id)),
            Err(StorageError::DriverMissing(id)) => Err(OrderError::DriverNotFound(id)),
            Err(err) => Err(err.into()),
        }
    }

    pub async fn restaurant_stats(
        &self,
        restaurant_id: Uuid,
    ) -> Result<RestaurantStats, OrderError> {
        let restaurant = self
            .storage
            .find_restaurant(restaurant_id)
            .await?
            .ok_or(OrderError::RestaurantNotFound(restaurant_id))?;
        let (total_orders, gross_revenue) =
            self.storage.restaurant_order_stats(restaurant_id).await?;
        Ok(RestaurantStats {
            restaurant_id,
            total_orders,
            gross_revenue,
            rating: restaurant.rating,
            total_reviews: restaurant.total_reviews,
        })
    }
}

/// Storage failures from commit-time re-validation map back onto the same
/// error kinds the pricing pass reports.
fn map_commit_error(err: StorageError) -> OrderError {
    match err {
        StorageError::MenuItemMissing(id) => OrderError::ItemNotFound(id),
        StorageError::MenuItemUnavailable { id, name } => {
            OrderError::ItemUnavailable { id, name }
        }
        StorageError::PriceDrift { id, current_price } => {
            OrderError::PriceChanged { id, current_price }
        }
        StorageError::UserMissing(id) => OrderError::CustomerNotFound(id),
        StorageError::RestaurantMissing(id) => OrderError::RestaurantNotFound(id),
        other => OrderError::Storage(other),
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
