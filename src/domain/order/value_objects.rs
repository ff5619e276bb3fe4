use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Order Value Objects
// ============================================================================

/// Lifecycle state of an order.
///
/// Every order starts in `Modifying`. Adding a payment is the only operation
/// that moves an order forward, and there is no way back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderState {
    Modifying,
    PaymentAdded,
    PaymentAuthorized,
}

impl OrderState {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderState::Modifying => "MODIFYING",
            OrderState::PaymentAdded => "PAYMENT_ADDED",
            OrderState::PaymentAuthorized => "PAYMENT_AUTHORIZED",
        }
    }

    pub fn parse(s: &str) -> anyhow::Result<Self> {
        match s {
            "MODIFYING" => Ok(OrderState::Modifying),
            "PAYMENT_ADDED" => Ok(OrderState::PaymentAdded),
            "PAYMENT_AUTHORIZED" => Ok(OrderState::PaymentAuthorized),
            other => anyhow::bail!("unknown order state: {other}"),
        }
    }
}

impl Default for OrderState {
    fn default() -> Self {
        OrderState::Modifying
    }
}

impl fmt::Display for OrderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pagination window for list queries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListInput {
    pub skip: Option<i64>,
    pub take: Option<i64>,
}

impl ListInput {
    pub fn new(skip: i64, take: i64) -> Self {
        Self {
            skip: Some(skip),
            take: Some(take),
        }
    }

    /// Applies the window to an already sorted collection.
    pub fn apply<T>(&self, items: Vec<T>) -> Vec<T> {
        let skip = self.skip.unwrap_or(0).max(0) as usize;
        let iter = items.into_iter().skip(skip);
        match self.take {
            Some(take) => iter.take(take.max(0) as usize).collect(),
            None => iter.collect(),
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
