use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Domain Models
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Customer,
    RestaurantOwner,
    Driver,
    Admin,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub role: UserRole,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Driver profile attached to a user. At most one profile per user.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Driver {
    pub id: Uuid,
    pub user_id: Uuid,
    pub vehicle_type: Option<String>,
    pub license_plate: Option<String>,
    pub is_available: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// `rating`, `rating_total`, and `total_reviews` are aggregate state owned by
/// review creation. They are updated atomically alongside each review insert
/// and are not settable through any other path.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Restaurant {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub delivery_fee: Decimal,
    pub rating: f64,
    pub rating_total: i64,
    pub total_reviews: i64,
    pub is_active: bool,
    pub is_open: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Menu item in a restaurant's catalog. Only `price` and `is_available` are
/// mutable after creation; orders snapshot the price at quote time, so later
/// edits never rewrite history.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct MenuItem {
    pub id: Uuid,
    pub restaurant_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub is_available: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Order {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub restaurant_id: Uuid,
    pub driver_id: Option<Uuid>,
    pub order_number: String,
    pub status: OrderStatus,

    // Pricing, fixed at creation: total == subtotal + delivery_fee + tax + tip
    pub subtotal: Decimal,
    pub delivery_fee: Decimal,
    pub tax: Decimal,
    pub tip: Decimal,
    pub total: Decimal,

    pub delivery: DeliveryDetails,
    pub actual_delivery_time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct DeliveryDetails {
    pub address: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub instructions: Option<String>,
}

/// One priced line within an order. `unit_price` is a snapshot of the menu
/// item price at quote time, not a live reference. Immutable after creation.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct OrderLine {
    pub id: Uuid,
    pub order_id: Uuid,
    pub menu_item_id: Uuid,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub instructions: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Append-only customer review. Creating one updates the restaurant's rating
/// aggregate in the same transaction.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Review {
    pub id: Uuid,
    pub user_id: Uuid,
    pub restaurant_id: Uuid,
    pub order_id: Option<Uuid>,
    pub rating: i32,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Order Status
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Preparing,
    ReadyForPickup,
    PickedUp,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    /// Wire/storage name, matching the serde representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Preparing => "preparing",
            OrderStatus::ReadyForPickup => "ready_for_pickup",
            OrderStatus::PickedUp => "picked_up",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(OrderStatus::Pending),
            "confirmed" => Some(OrderStatus::Confirmed),
            "preparing" => Some(OrderStatus::Preparing),
            "ready_for_pickup" => Some(OrderStatus::ReadyForPickup),
            "picked_up" => Some(OrderStatus::PickedUp),
            "delivered" => Some(OrderStatus::Delivered),
            "cancelled" => Some(OrderStatus::Cancelled),
            _ => None,
        }
    }

    /// No transition is defined out of a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    /// The single forward step in the fulfillment flow, if any.
    pub fn next_in_flow(&self) -> Option<OrderStatus> {
        match self {
            OrderStatus::Pending => Some(OrderStatus::Confirmed),
            OrderStatus::Confirmed => Some(OrderStatus::Preparing),
            OrderStatus::Preparing => Some(OrderStatus::ReadyForPickup),
            OrderStatus::ReadyForPickup => Some(OrderStatus::PickedUp),
            OrderStatus::PickedUp => Some(OrderStatus::Delivered),
            OrderStatus::Delivered | OrderStatus::Cancelled => None,
        }
    }

    /// Allowed transitions: one step forward in the fulfillment flow, or
    /// cancellation from any non-terminal status. Skips and regressions are
    /// rejected.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        if next == OrderStatus::Cancelled {
            return true;
        }
        self.next_in_flow() == Some(next)
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_STATUSES: [OrderStatus; 7] = [
        OrderStatus::Pending,
        OrderStatus::Confirmed,
        OrderStatus::Preparing,
        OrderStatus::ReadyForPickup,
        OrderStatus::PickedUp,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
    ];

    #[test]
    fn test_status_wire_names_round_trip() {
        for status in ALL_STATUSES {
            assert_eq!(OrderStatus::parse(status.as_str()), Some(status));

            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
            let back: OrderStatus = serde_json::from_str(&json).unwrap();
            assert_eq!(back, status);
        }
    }

    #[test]
    fn test_status_parse_rejects_unknown_values() {
        assert_eq!(OrderStatus::parse("shipped"), None);
        assert_eq!(OrderStatus::parse("PENDING"), None);
        assert_eq!(OrderStatus::parse(""), None);
    }

    #[test]
    fn test_linear_flow_is_accepted_step_by_step() {
        let flow = [
            OrderStatus::Pending,
            OrderStatus::Confirmed,
            OrderStatus::Preparing,
            OrderStatus::ReadyForPickup,
            OrderStatus::PickedUp,
            OrderStatus::Delivered,
        ];

        for pair in flow.windows(2) {
            assert!(
                pair[0].can_transition_to(pair[1]),
                "{:?} -> {:?} should be allowed",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn test_skips_and_regressions_are_rejected() {
        assert!(!OrderStatus::Pending.can_transition_to(OrderStatus::Preparing));
        assert!(!OrderStatus::Pending.can_transition_to(OrderStatus::Delivered));
        assert!(!OrderStatus::Preparing.can_transition_to(OrderStatus::Confirmed));
        assert!(!OrderStatus::PickedUp.can_transition_to(OrderStatus::Pending));
        // Self-transitions count as regressions.
        assert!(!OrderStatus::Confirmed.can_transition_to(OrderStatus::Confirmed));
    }

    #[test]
    fn test_cancellation_reachable_from_any_non_terminal_status() {
        for status in ALL_STATUSES {
            if !status.is_terminal() {
                assert!(status.can_transition_to(OrderStatus::Cancelled));
            }
        }
    }

    #[test]
    fn test_terminal_statuses_allow_no_transitions() {
        for terminal in [OrderStatus::Delivered, OrderStatus::Cancelled] {
            assert!(terminal.is_terminal());
            for next in ALL_STATUSES {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn test_user_role_serialization() {
        let json = serde_json::to_string(&UserRole::RestaurantOwner).unwrap();
        assert_eq!(json, "\"restaurant_owner\"");
        let back: UserRole = serde_json::from_str(&json).unwrap();
        assert_eq!(back, UserRole::RestaurantOwner);
    }
}
