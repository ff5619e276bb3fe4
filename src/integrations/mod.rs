// ============================================================================
// Integrations - pluggable strategies resolved by a stored code
// ============================================================================
//
// Shipping methods name a price calculator, payment methods name a payment
// integration. Both are looked up in a registry keyed by that code.
//
// ============================================================================

pub mod shipping;
pub mod payments;

pub use shipping::{FlatRateCalculator, ShippingCalculatorRegistry, ShippingPriceCalculator};
pub use payments::{ManualPaymentIntegration, PaymentIntegration, PaymentIntegrationRegistry};
