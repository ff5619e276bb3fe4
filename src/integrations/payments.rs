use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::fulfillment::PaymentIntegrationResult;
use crate::domain::order::OrderSnapshot;

/// Settles an order with an external payment provider.
///
/// A declined payment is a normal result, not an error. `Err` means the
/// provider could not be reached or answered garbage.
#[async_trait]
pub trait PaymentIntegration: Send + Sync {
    /// Code stored on `PaymentMethod::integration_code`.
    fn code(&self) -> &str;

    async fn create_payment(&self, order: &OrderSnapshot) -> anyhow::Result<PaymentIntegrationResult>;
}

// ============================================================================
// Registry
// ============================================================================

#[derive(Clone, Default)]
pub struct PaymentIntegrationRegistry {
    integrations: HashMap<String, Arc<dyn PaymentIntegration>>,
}

impl PaymentIntegrationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, integration: Arc<dyn PaymentIntegration>) -> anyhow::Result<()> {
        let code = integration.code().to_string();
        if code.is_empty() {
            anyhow::bail!("payment integration code must not be empty");
        }
        if self.integrations.contains_key(&code) {
            anyhow::bail!("payment integration already registered: {code}");
        }
        tracing::debug!(code = %code, "Registered payment integration");
        self.integrations.insert(code, integration);
        Ok(())
    }

    pub fn with(mut self, integration: Arc<dyn PaymentIntegration>) -> anyhow::Result<Self> {
        self.register(integration)?;
        Ok(self)
    }

    pub fn resolve(&self, code: &str) -> Option<Arc<dyn PaymentIntegration>> {
        self.integrations.get(code).cloned()
    }

    pub fn codes(&self) -> Vec<&str> {
        let mut codes: Vec<&str> = self.integrations.keys().map(String::as_str).collect();
        codes.sort_unstable();
        codes
    }
}

impl std::fmt::Debug for PaymentIntegrationRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentIntegrationRegistry")
            .field("codes", &self.codes())
            .finish()
    }
}

// ============================================================================
// Built-in integrations
// ============================================================================

/// Offline payment (cash on delivery, bank transfer): always registers the
/// payment for the order total and leaves settlement to a human.
#[derive(Debug, Clone)]
pub struct ManualPaymentIntegration {
    code: String,
}

impl ManualPaymentIntegration {
    pub fn new(code: impl Into<String>) -> Self {
        Self { code: code.into() }
    }
}

#[async_trait]
impl PaymentIntegration for ManualPaymentIntegration {
    fn code(&self) -> &str {
        &self.code
    }

    async fn create_payment(&self, order: &OrderSnapshot) -> anyhow::Result<PaymentIntegrationResult> {
        tracing::debug!(
            order_code = %order.order.code,
            total = order.order.total,
            "Manual payment registered"
        );
        Ok(PaymentIntegrationResult::Created)
    }
}
