use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Order Line Inputs
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOrderLineInput {
    pub variant_id: Uuid,
    pub quantity: i32,
}

/// Absolute quantity for an existing line. Zero removes the line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateOrderLineInput {
    pub quantity: i32,
}
