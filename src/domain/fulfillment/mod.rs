// ============================================================================
// Fulfillment Domain - shipping and payment records attached to orders
// ============================================================================

pub mod shipping;
pub mod payment;

pub use shipping::*;
pub use payment::*;
