use super::OrderEngine;
use crate::domain::fulfillment::{
    CreatePaymentMethodInput, CreateShippingMethodInput, PaymentMethod, ShippingMethod,
};
use crate::domain::order::OrderError;
use crate::store::{OrderStore, StoreTransaction};

// ============================================================================
// Shipping / Payment Method Catalog
// ============================================================================

impl<S: OrderStore> OrderEngine<S> {
    pub async fn create_shipping_method(
        &self,
        input: CreateShippingMethodInput,
    ) -> Result<ShippingMethod, OrderError> {
        self.observe("create_shipping_method", async move {
            if input.price_calculator_code.trim().is_empty() {
                return Err(OrderError::InvalidInput(
                    "price_calculator_code must not be empty".to_string(),
                ));
            }
            let method = ShippingMethod::from(input);

            // Resolved lazily by add_shipment; an unknown code fails there
            if self.shipping.resolve(&method.price_calculator_code).is_none() {
                tracing::warn!(
                    code = %method.price_calculator_code,
                    registered = ?self.shipping.codes(),
                    "Shipping method uses an unregistered calculator code"
                );
            }

            let mut tx = self.store.begin().await?;
            tx.insert_shipping_method(&method).await?;
            tx.commit().await?;

            tracing::info!(method_id = %method.id, name = %method.name, "Shipping method created");
            Ok(method)
        })
        .await
    }

    pub async fn create_payment_method(
        &self,
        input: CreatePaymentMethodInput,
    ) -> Result<PaymentMethod, OrderError> {
        self.observe("create_payment_method", async move {
            if input.integration_code.trim().is_empty() {
                return Err(OrderError::InvalidInput(
                    "integration_code must not be empty".to_string(),
                ));
            }
            let method = PaymentMethod::from(input);

            if self.payments.resolve(&method.integration_code).is_none() {
                tracing::warn!(
                    code = %method.integration_code,
                    registered = ?self.payments.codes(),
                    "Payment method uses an unregistered integration code"
                );
            }

            let mut tx = self.store.begin().await?;
            tx.insert_payment_method(&method).await?;
            tx.commit().await?;

            tracing::info!(method_id = %method.id, name = %method.name, "Payment method created");
            Ok(method)
        })
        .await
    }
}
