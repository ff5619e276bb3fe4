// ============================================================================
// Inventory Domain - purchasable variants with price and stock
// ============================================================================

pub mod variant;

pub use variant::*;
