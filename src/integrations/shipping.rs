use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::order::OrderSnapshot;

/// Computes the shipping price for an order.
///
/// Failures are treated as infrastructure errors and abort the operation.
#[async_trait]
pub trait ShippingPriceCalculator: Send + Sync {
    /// Code stored on `ShippingMethod::price_calculator_code`.
    fn code(&self) -> &str;

    async fn calculate_price(&self, order: &OrderSnapshot) -> anyhow::Result<i64>;
}

// ============================================================================
// Registry
// ============================================================================

#[derive(Clone, Default)]
pub struct ShippingCalculatorRegistry {
    calculators: HashMap<String, Arc<dyn ShippingPriceCalculator>>,
}

impl ShippingCalculatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a calculator under its own code. Codes must be unique.
    pub fn register(&mut self, calculator: Arc<dyn ShippingPriceCalculator>) -> anyhow::Result<()> {
        let code = calculator.code().to_string();
        if code.is_empty() {
            anyhow::bail!("shipping price calculator code must not be empty");
        }
        if self.calculators.contains_key(&code) {
            anyhow::bail!("shipping price calculator already registered: {code}");
        }
        tracing::debug!(code = %code, "Registered shipping price calculator");
        self.calculators.insert(code, calculator);
        Ok(())
    }

    pub fn with(mut self, calculator: Arc<dyn ShippingPriceCalculator>) -> anyhow::Result<Self> {
        self.register(calculator)?;
        Ok(self)
    }

    pub fn resolve(&self, code: &str) -> Option<Arc<dyn ShippingPriceCalculator>> {
        self.calculators.get(code).cloned()
    }

    pub fn codes(&self) -> Vec<&str> {
        let mut codes: Vec<&str> = self.calculators.keys().map(String::as_str).collect();
        codes.sort_unstable();
        codes
    }
}

impl std::fmt::Debug for ShippingCalculatorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShippingCalculatorRegistry")
            .field("codes", &self.codes())
            .finish()
    }
}

// ============================================================================
// Built-in calculators
// ============================================================================

/// Charges the same amount regardless of the order contents.
#[derive(Debug, Clone)]
pub struct FlatRateCalculator {
    code: String,
    amount: i64,
}

impl FlatRateCalculator {
    pub fn new(code: impl Into<String>, amount: i64) -> Self {
        Self {
            code: code.into(),
            amount,
        }
    }
}

#[async_trait]
impl ShippingPriceCalculator for FlatRateCalculator {
    fn code(&self) -> &str {
        &self.code
    }

    async fn calculate_price(&self, _order: &OrderSnapshot) -> anyhow::Result<i64> {
        Ok(self.amount)
    }
}
