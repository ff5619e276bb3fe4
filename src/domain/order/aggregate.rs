use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::OrderError;
use super::value_objects::OrderState;
use crate::domain::customer::{Address, Customer};
use crate::domain::fulfillment::Shipment;
use crate::domain::inventory::Variant;

// ============================================================================
// Order Aggregate
// ============================================================================
//
// The order row keeps references to its customer, shipment and payment and
// embeds the shipping address snapshot. Lines live in their own collection.
//
// `subtotal`, `total` and `total_quantity` are derived. They are only ever
// written through `Order::apply_stats`.
//
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    // Identity
    pub id: Uuid,
    pub code: String,

    pub state: OrderState,

    // Derived totals
    pub subtotal: i64,
    pub total: i64,
    pub total_quantity: i64,

    // Relations
    pub customer_id: Option<Uuid>,
    pub shipping_address: Option<Address>,
    pub shipment_id: Option<Uuid>,
    pub payment_id: Option<Uuid>,

    // Audit Trail
    pub placed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Empty order in MODIFYING state with zeroed totals.
    pub fn new(code: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            code,
            state: OrderState::Modifying,
            subtotal: 0,
            total: 0,
            total_quantity: 0,
            customer_id: None,
            shipping_address: None,
            shipment_id: None,
            payment_id: None,
            placed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn apply_stats(&mut self, stats: OrderStats) {
        self.subtotal = stats.subtotal;
        self.total = stats.total;
        self.total_quantity = stats.total_quantity;
        self.updated_at = Utc::now();
    }

    pub fn stats(&self) -> OrderStats {
        OrderStats {
            subtotal: self.subtotal,
            total: self.total,
            total_quantity: self.total_quantity,
        }
    }

    /// Moves the order into a paid state and stamps `placed_at`.
    pub(crate) fn place(&mut self, state: OrderState, payment_id: Uuid) {
        let now = Utc::now();
        self.state = state;
        self.payment_id = Some(payment_id);
        self.placed_at = Some(now);
        self.updated_at = now;
    }
}

// ============================================================================
// Order Lines
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLine {
    pub id: Uuid,
    pub order_id: Uuid,
    pub variant_id: Uuid,
    pub quantity: i32,
    pub unit_price: i64,
    pub line_price: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OrderLine {
    /// New line priced from the variant's current price.
    pub fn new(order_id: Uuid, variant: &Variant, quantity: i32) -> Result<Self, OrderError> {
        let now = Utc::now();
        Ok(Self {
            id: Uuid::now_v7(),
            order_id,
            variant_id: variant.id,
            quantity,
            unit_price: variant.price,
            line_price: line_price(variant.price, quantity)?,
            created_at: now,
            updated_at: now,
        })
    }

    /// Sets an absolute quantity, re-snapshotting the unit price.
    pub fn reprice(&mut self, variant: &Variant, quantity: i32) -> Result<(), OrderError> {
        self.unit_price = variant.price;
        self.quantity = quantity;
        self.line_price = line_price(variant.price, quantity)?;
        self.updated_at = Utc::now();
        Ok(())
    }
}

fn line_price(unit_price: i64, quantity: i32) -> Result<i64, OrderError> {
    unit_price.checked_mul(i64::from(quantity)).ok_or_else(|| {
        OrderError::InvalidInput(format!(
            "line price overflows: {unit_price} x {quantity}"
        ))
    })
}

/// Positive quantity check shared by line operations.
pub fn validate_quantity(quantity: i32) -> Result<(), OrderError> {
    if quantity <= 0 {
        return Err(OrderError::InvalidInput(format!(
            "quantity must be positive, got {quantity}"
        )));
    }
    Ok(())
}

// ============================================================================
// Stats Recalculation
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderStats {
    pub subtotal: i64,
    pub total: i64,
    pub total_quantity: i64,
}

impl OrderStats {
    /// `subtotal = Σ line_price`, `total = subtotal + shipment amount`,
    /// `total_quantity = Σ quantity`.
    /// Fails with `INVALID_INPUT` when a sum leaves the `i64` range.
    pub fn compute(lines: &[OrderLine], shipment: Option<&Shipment>) -> Result<Self, OrderError> {
        let subtotal = checked_sum(lines.iter().map(|line| line.line_price), "subtotal")?;
        let total_quantity =
            checked_sum(lines.iter().map(|line| i64::from(line.quantity)), "total quantity")?;
        let total = subtotal
            .checked_add(shipment.map_or(0, |s| s.amount))
            .ok_or_else(|| OrderError::InvalidInput("order total overflows".to_string()))?;

        Ok(Self {
            subtotal,
            total,
            total_quantity,
        })
    }
}

fn checked_sum(mut values: impl Iterator<Item = i64>, field: &str) -> Result<i64, OrderError> {
    values
        .try_fold(0i64, |acc, value| acc.checked_add(value))
        .ok_or_else(|| OrderError::InvalidInput(format!("order {field} overflows")))
}

// ============================================================================
// Snapshot handed to shipping calculators and payment integrations
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderSnapshot {
    pub order: Order,
    pub lines: Vec<OrderLine>,
    pub customer: Option<Customer>,
    pub shipment: Option<Shipment>,
}

// ============================================================================
// Unit Tests
// ============================================================================
