// ============================================================================
// Domain Layer - Business Logic
// ============================================================================
//
// Entities, value objects, inputs and rule checks. Nothing in here touches
// persistence; the engine loads and saves these types through `store`.
//
// ============================================================================

pub mod order;
pub mod customer;
pub mod inventory;
pub mod fulfillment;
