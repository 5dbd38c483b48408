use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{MenuItem, Restaurant};

use super::errors::OrderError;

// ============================================================================
// Pricing Calculator
// ============================================================================
//
// Pure over its inputs: resolving menu items against the catalog happens in
// the workflow; everything here is arithmetic and validation. Tax is the
// only computed amount that can fall below cent precision, so it is rounded
// once, at computation. The total is then an exact sum of 2-decimal
// quantities, which keeps `total == subtotal + delivery_fee + tax + tip`
// free of rounding drift.
//
// ============================================================================

/// Flat tax rate applied to the subtotal of every order.
pub const TAX_RATE: Decimal = dec!(0.08);

const MONEY_DP: u32 = 2;

/// Round to currency precision, half-up.
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(MONEY_DP, RoundingStrategy::MidpointAwayFromZero)
}

/// One requested selection: which item, how many, any free-text note.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineRequest {
    pub menu_item_id: Uuid,
    pub quantity: i32,
    pub instructions: Option<String>,
}

impl LineRequest {
    pub fn new(menu_item_id: Uuid, quantity: i32) -> Self {
        Self {
            menu_item_id,
            quantity,
            instructions: None,
        }
    }
}

/// A validated line with the unit price snapshotted from the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricedLine {
    pub menu_item_id: Uuid,
    pub name: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub instructions: Option<String>,
}

impl PricedLine {
    /// Validate one selection against its resolved menu item.
    pub fn try_new(
        restaurant: &Restaurant,
        item: &MenuItem,
        request: &LineRequest,
    ) -> Result<Self, OrderError> {
        if request.quantity <= 0 {
            return Err(OrderError::InvalidQuantity {
                menu_item_id: item.id,
                quantity: request.quantity,
            });
        }
        // An item from another restaurant's catalog is not findable here.
        if item.restaurant_id != restaurant.id {
            return Err(OrderError::ItemNotFound(item.id));
        }
        if !item.is_available {
            return Err(OrderError::ItemUnavailable {
                id: item.id,
                name: item.name.clone(),
            });
        }

        Ok(Self {
            menu_item_id: item.id,
            name: item.name.clone(),
            quantity: request.quantity,
            unit_price: item.price,
            instructions: request.instructions.clone(),
        })
    }

    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// A fully priced order, ready to persist. Totals are computed once, here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricedOrder {
    pub restaurant_id: Uuid,
    pub lines: Vec<PricedLine>,
    pub subtotal: Decimal,
    pub delivery_fee: Decimal,
    pub tax: Decimal,
    pub tip: Decimal,
    pub total: Decimal,
}

impl PricedOrder {
    /// Compute totals over validated lines.
    pub fn assemble(
        restaurant: &Restaurant,
        lines: Vec<PricedLine>,
        tip: Decimal,
    ) -> Result<Self, OrderError> {
        if lines.is_empty() {
            return Err(OrderError::EmptyOrder);
        }
        if tip < Decimal::ZERO {
            return Err(OrderError::InvalidTip(tip));
        }
        let tip = round_money(tip);

        let subtotal: Decimal = lines.iter().map(PricedLine::line_total).sum();
        let delivery_fee = restaurant.delivery_fee;
        let tax = round_money(subtotal * TAX_RATE);
        let total = subtotal + delivery_fee + tax + tip;

        Ok(Self {
            restaurant_id: restaurant.id,
            lines,
            subtotal,
            delivery_fee,
            tax,
            tip,
            total,
        })
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn restaurant(delivery_fee: Decimal) -> Restaurant {
        let now = Utc::now();
        Restaurant {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            name: "Testaurant".into(),
            delivery_fee,
            rating: 0.0,
            rating_total: 0,
            total_reviews: 0,
            is_active: true,
            is_open: true,
            created_at: now,
            updated_at: now,
        }
    }

    fn item(restaurant: &Restaurant, name: &str, price: Decimal) -> MenuItem {
        let now = Utc::now();
        MenuItem {
            id: Uuid::new_v4(),
            restaurant_id: restaurant.id,
            name: name.into(),
            description: None,
            price,
            is_available: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_totals_for_reference_scenario() {
        // 2 x 9.99 + 1 x 2.99 with fee 2.99 and tip 1.00.
        let rest = restaurant(dec!(2.99));
        let burger = item(&rest, "Burger", dec!(9.99));
        let fries = item(&rest, "Fries", dec!(2.99));

        let lines = vec![
            PricedLine::try_new(&rest, &burger, &LineRequest::new(burger.id, 2)).unwrap(),
            PricedLine::try_new(&rest, &fries, &LineRequest::new(fries.id, 1)).unwrap(),
        ];
        let priced = PricedOrder::assemble(&rest, lines, dec!(1.00)).unwrap();

        assert_eq!(priced.subtotal, dec!(22.97));
        assert_eq!(priced.delivery_fee, dec!(2.99));
        // 22.97 * 0.08 = 1.8376, rounded half-up to cents.
        assert_eq!(priced.tax, dec!(1.84));
        assert_eq!(priced.tip, dec!(1.00));
        assert_eq!(priced.total, dec!(28.80));
    }

    #[test]
    fn test_total_invariant_holds_exactly() {
        let rest = restaurant(dec!(4.50));
        let dish = item(&rest, "Pad Thai", dec!(13.25));
        let lines =
            vec![PricedLine::try_new(&rest, &dish, &LineRequest::new(dish.id, 3)).unwrap()];
        let priced = PricedOrder::assemble(&rest, lines, dec!(2.35)).unwrap();

        assert_eq!(
            priced.total,
            priced.subtotal + priced.delivery_fee + priced.tax + priced.tip
        );
    }

    #[test]
    fn test_tax_rounds_half_up() {
        let rest = restaurant(Decimal::ZERO);
        // 9.44 * 0.08 = 0.7552 -> 0.76
        let dish = item(&rest, "Soup", dec!(9.44));
        let lines =
            vec![PricedLine::try_new(&rest, &dish, &LineRequest::new(dish.id, 1)).unwrap()];
        let priced = PricedOrder::assemble(&rest, lines, Decimal::ZERO).unwrap();
        assert_eq!(priced.tax, dec!(0.76));
    }

    #[test]
    fn test_pricing_is_deterministic() {
        let rest = restaurant(dec!(1.99));
        let dish = item(&rest, "Ramen", dec!(11.80));
        let request = LineRequest::new(dish.id, 2);

        let price_once = || {
            let lines = vec![PricedLine::try_new(&rest, &dish, &request).unwrap()];
            PricedOrder::assemble(&rest, lines, dec!(0.50)).unwrap()
        };
        assert_eq!(price_once(), price_once());
    }

    #[test]
    fn test_zero_and_negative_quantities_rejected() {
        let rest = restaurant(Decimal::ZERO);
        let dish = item(&rest, "Taco", dec!(3.50));

        for quantity in [0, -2] {
            let err =
                PricedLine::try_new(&rest, &dish, &LineRequest::new(dish.id, quantity))
                    .unwrap_err();
            assert!(matches!(err, OrderError::InvalidQuantity { quantity: q, .. } if q == quantity));
        }
    }

    #[test]
    fn test_unavailable_item_rejected() {
        let rest = restaurant(Decimal::ZERO);
        let mut dish = item(&rest, "Oysters", dec!(19.00));
        dish.is_available = false;

        let err = PricedLine::try_new(&rest, &dish, &LineRequest::new(dish.id, 1)).unwrap_err();
        assert!(matches!(err, OrderError::ItemUnavailable { ref name, .. } if name == "Oysters"));
    }

    #[test]
    fn test_item_from_another_catalog_is_not_found() {
        let rest = restaurant(Decimal::ZERO);
        let other = restaurant(Decimal::ZERO);
        let dish = item(&other, "Sushi", dec!(15.00));

        let err = PricedLine::try_new(&rest, &dish, &LineRequest::new(dish.id, 1)).unwrap_err();
        assert!(matches!(err, OrderError::ItemNotFound(id) if id == dish.id));
    }

    #[test]
    fn test_empty_selection_rejected() {
        let rest = restaurant(Decimal::ZERO);
        let err = PricedOrder::assemble(&rest, vec![], Decimal::ZERO).unwrap_err();
        assert!(matches!(err, OrderError::EmptyOrder));
    }

    #[test]
    fn test_negative_tip_rejected_and_tip_normalized() {
        let rest = restaurant(Decimal::ZERO);
        let dish = item(&rest, "Bao", dec!(6.00));
        let lines =
            vec![PricedLine::try_new(&rest, &dish, &LineRequest::new(dish.id, 1)).unwrap()];

        let err =
            PricedOrder::assemble(&rest, lines.clone(), dec!(-0.01)).unwrap_err();
        assert!(matches!(err, OrderError::InvalidTip(_)));

        let priced = PricedOrder::assemble(&rest, lines, dec!(1.005)).unwrap();
        assert_eq!(priced.tip, dec!(1.01));
    }
}
