// ============================================================================
// Order Domain - Business Logic for the Order Aggregate
// ============================================================================
//
// - Value objects (OrderState, ListInput)
// - Inputs (CreateOrderLineInput, UpdateOrderLineInput)
// - Errors (OrderError, OrderErrorCode)
// - Aggregate (Order, OrderLine, OrderStats, OrderSnapshot)
// - Transition table
//
// Persistence and orchestration live in `store` and `engine`.
//
// ============================================================================

pub mod value_objects;
pub mod commands;
pub mod errors;
pub mod aggregate;
pub mod transitions;

// Re-export for convenience
pub use value_objects::*;
pub use commands::*;
pub use errors::*;
pub use aggregate::*;
pub use transitions::*;
