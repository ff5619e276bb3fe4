use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::value_objects::OrderState;

// ============================================================================
// Order Error Codes
// ============================================================================

/// Stable, caller-facing tag for every failure an order operation can return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderErrorCode {
    OrderNotFound,
    LineNotFound,
    OrderTransitionError,
    NotEnoughStock,
    CustomerInvalidEmail,
    ShippingMethodNotFound,
    PaymentMethodNotFound,
    PaymentDeclined,
    VariantNotFound,
    InvalidInput,
    Infrastructure,
}

impl OrderErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderErrorCode::OrderNotFound => "ORDER_NOT_FOUND",
            OrderErrorCode::LineNotFound => "LINE_NOT_FOUND",
            OrderErrorCode::OrderTransitionError => "ORDER_TRANSITION_ERROR",
            OrderErrorCode::NotEnoughStock => "NOT_ENOUGH_STOCK",
            OrderErrorCode::CustomerInvalidEmail => "CUSTOMER_INVALID_EMAIL",
            OrderErrorCode::ShippingMethodNotFound => "SHIPPING_METHOD_NOT_FOUND",
            OrderErrorCode::PaymentMethodNotFound => "PAYMENT_METHOD_NOT_FOUND",
            OrderErrorCode::PaymentDeclined => "PAYMENT_DECLINED",
            OrderErrorCode::VariantNotFound => "VARIANT_NOT_FOUND",
            OrderErrorCode::InvalidInput => "INVALID_INPUT",
            OrderErrorCode::Infrastructure => "INFRASTRUCTURE",
        }
    }
}

impl fmt::Display for OrderErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Order Business Rule Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error("Order not found: {0}")]
    OrderNotFound(Uuid),

    #[error("Order line not found: {0}")]
    LineNotFound(Uuid),

    #[error("Unable to {action} order in state {state}")]
    Transition {
        action: &'static str,
        state: OrderState,
    },

    #[error("Not enough stock for variant {variant_id}: requested {requested}, available {available}")]
    NotEnoughStock {
        variant_id: Uuid,
        requested: i32,
        available: i32,
    },

    #[error("Invalid email: {0}")]
    InvalidEmail(String),

    #[error("Shipping method not found: {0}")]
    ShippingMethodNotFound(Uuid),

    #[error("Payment method not found: {0}")]
    PaymentMethodNotFound(Uuid),

    #[error("Payment declined{}", declined_suffix(.reason))]
    PaymentDeclined { reason: Option<String> },

    #[error("Variant not found: {0}")]
    VariantNotFound(Uuid),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Persistence or collaborator failure. Never recovered locally.
    #[error(transparent)]
    Infrastructure(#[from] anyhow::Error),
}

fn declined_suffix(reason: &Option<String>) -> String {
    reason.as_deref().map(|r| format!(": {r}")).unwrap_or_default()
}

impl OrderError {
    pub fn code(&self) -> OrderErrorCode {
        match self {
            OrderError::OrderNotFound(_) => OrderErrorCode::OrderNotFound,
            OrderError::LineNotFound(_) => OrderErrorCode::LineNotFound,
            OrderError::Transition { .. } => OrderErrorCode::OrderTransitionError,
            OrderError::NotEnoughStock { .. } => OrderErrorCode::NotEnoughStock,
            OrderError::InvalidEmail(_) => OrderErrorCode::CustomerInvalidEmail,
            OrderError::ShippingMethodNotFound(_) => OrderErrorCode::ShippingMethodNotFound,
            OrderError::PaymentMethodNotFound(_) => OrderErrorCode::PaymentMethodNotFound,
            OrderError::PaymentDeclined { .. } => OrderErrorCode::PaymentDeclined,
            OrderError::VariantNotFound(_) => OrderErrorCode::VariantNotFound,
            OrderError::InvalidInput(_) => OrderErrorCode::InvalidInput,
            OrderError::Infrastructure(_) => OrderErrorCode::Infrastructure,
        }
    }

    /// True for recoverable, caller-surfaced rejections.
    pub fn is_business(&self) -> bool {
        !matches!(self, OrderError::Infrastructure(_))
    }

    pub(crate) fn transition(action: &'static str, state: OrderState) -> Self {
        OrderError::Transition { action, state }
    }
}
