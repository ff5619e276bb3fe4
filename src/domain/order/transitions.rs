use super::errors::OrderError;
use super::value_objects::OrderState;

// ============================================================================
// Order Transition Table
// ============================================================================
//
// Line, customer, address and shipment changes only need the order to be
// MODIFYING. Adding a payment is the one operation that moves the order, so
// it is checked against the (from, to) pairs below.
//
// A second payment attempt from PAYMENT_ADDED or PAYMENT_AUTHORIZED is not
// in the table: once stock has been committed the order cannot be paid again.
//
// ============================================================================

pub const VALID_TRANSITIONS: &[(OrderState, OrderState)] = &[
    (OrderState::Modifying, OrderState::PaymentAdded),
    (OrderState::Modifying, OrderState::PaymentAuthorized),
];

/// Whether `from -> to` appears in the transition table.
pub fn can_transition(from: OrderState, to: OrderState) -> bool {
    VALID_TRANSITIONS
        .iter()
        .any(|&(prev, next)| prev == from && next == to)
}

/// Rejects the transition with `ORDER_TRANSITION_ERROR` when it is not listed.
pub fn ensure_transition(
    from: OrderState,
    to: OrderState,
    action: &'static str,
) -> Result<(), OrderError> {
    if can_transition(from, to) {
        Ok(())
    } else {
        Err(OrderError::transition(action, from))
    }
}

/// Flat guard used by every mutation that does not change the state.
pub fn ensure_modifying(state: OrderState, action: &'static str) -> Result<(), OrderError> {
    match state {
        OrderState::Modifying => Ok(()),
        _ => Err(OrderError::transition(action, state)),
    }
}
