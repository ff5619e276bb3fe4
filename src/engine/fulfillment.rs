use anyhow::{anyhow, Context};
use uuid::Uuid;

use super::OrderEngine;
use crate::domain::fulfillment::{
    AddPaymentToOrderInput, AddShipmentToOrderInput, Payment, PaymentIntegrationResult, Shipment,
};
use crate::domain::order::{ensure_modifying, ensure_transition, Order, OrderError, OrderState};
use crate::store::{OrderStore, StoreTransaction};

// ============================================================================
// Fulfillment Binder
// ============================================================================
//
// `add_payment` is the commit point of an order. It locks every variant on
// the order (ascending id, after the order row) and re-checks stock before
// the integration is contacted, so two orders racing for the last units
// cannot both be placed.
//
// ============================================================================

impl<S: OrderStore> OrderEngine<S> {
    /// Prices a shipment with the method's calculator and attaches it,
    /// replacing any previous shipment.
    pub async fn add_shipment(
        &self,
        order_id: Uuid,
        input: AddShipmentToOrderInput,
    ) -> Result<Order, OrderError> {
        self.observe("add_shipment", async move {
            let method_id = input.shipping_method_id;

            let mut tx = self.store.begin().await?;
            let mut order = Self::locked_order(&mut tx, order_id).await?;
            ensure_modifying(order.state, "add shipment to")?;

            let method = tx
                .find_shipping_method(method_id)
                .await?
                .filter(|m| m.enabled)
                .ok_or(OrderError::ShippingMethodNotFound(method_id))?;

            let calculator = self
                .shipping
                .resolve(&method.price_calculator_code)
                .ok_or_else(|| {
                    anyhow!(
                        "no shipping price calculator registered for code '{}'",
                        method.price_calculator_code
                    )
                })?;

            let lines = tx.find_lines(order.id).await?;
            let snapshot = Self::snapshot(&mut tx, &order, lines).await?;
            let amount = calculator
                .calculate_price(&snapshot)
                .await
                .with_context(|| format!("shipping calculator '{}' failed", calculator.code()))?;
            if amount < 0 {
                return Err(anyhow!(
                    "shipping calculator '{}' returned negative amount {amount}",
                    calculator.code()
                )
                .into());
            }

            let shipment = Shipment::new(method.id, amount);
            tx.insert_shipment(&shipment).await?;

            let previous = order.shipment_id.replace(shipment.id);
            tx.save_order(&order).await?;
            if let Some(previous) = previous {
                tx.delete_shipment(previous).await?;
            }

            let order = Self::finalize(&mut tx, order).await?;
            tx.commit().await?;

            tracing::info!(
                order_id = %order.id,
                shipment_id = %shipment.id,
                amount,
                total = order.total,
                "🚚 Shipment attached"
            );
            Ok(order)
        })
        .await
    }

    /// Settles the order through the payment method's integration and, unless
    /// declined, places it and commits its lines out of stock.
    pub async fn add_payment(
        &self,
        order_id: Uuid,
        input: AddPaymentToOrderInput,
    ) -> Result<Order, OrderError> {
        self.observe("add_payment", async move {
            let method_id = input.method_id;

            let mut tx = self.store.begin().await?;
            let mut order = Self::locked_order(&mut tx, order_id).await?;
            ensure_transition(order.state, OrderState::PaymentAdded, "add payment to")?;

            let method = tx
                .find_payment_method(method_id)
                .await?
                .filter(|m| m.enabled)
                .ok_or(OrderError::PaymentMethodNotFound(method_id))?;

            let integration = self
                .payments
                .resolve(&method.integration_code)
                .ok_or_else(|| {
                    anyhow!(
                        "no payment integration registered for code '{}'",
                        method.integration_code
                    )
                })?;

            let lines = tx.find_lines(order.id).await?;
            let variant_ids: Vec<Uuid> = lines.iter().map(|line| line.variant_id).collect();
            let mut variants = tx.lock_variants(&variant_ids).await?;
            for line in &lines {
                variants
                    .iter()
                    .find(|v| v.id == line.variant_id)
                    .ok_or(OrderError::VariantNotFound(line.variant_id))?
                    .ensure_stock(line.quantity)?;
            }

            let snapshot = Self::snapshot(&mut tx, &order, lines.clone()).await?;
            let result = integration
                .create_payment(&snapshot)
                .await
                .with_context(|| format!("payment integration '{}' failed", integration.code()))?;

            let status = result.status();
            let (state, amount, transaction_id) = match result {
                PaymentIntegrationResult::Declined { reason } => {
                    tracing::warn!(
                        order_id = %order.id,
                        integration = integration.code(),
                        reason = reason.as_deref().unwrap_or("unspecified"),
                        "💳 Payment declined"
                    );
                    if let Some(metrics) = &self.metrics {
                        metrics.record_payment(integration.code(), status);
                    }
                    return Err(OrderError::PaymentDeclined { reason });
                }
                PaymentIntegrationResult::Created => (OrderState::PaymentAdded, order.total, None),
                PaymentIntegrationResult::Authorized {
                    amount,
                    transaction_id,
                } => {
                    ensure_transition(order.state, OrderState::PaymentAuthorized, "authorize payment for")?;
                    if amount < 0 {
                        return Err(anyhow!(
                            "payment integration '{}' authorized negative amount {amount}",
                            integration.code()
                        )
                        .into());
                    }
                    (OrderState::PaymentAuthorized, amount, transaction_id)
                }
            };

            let payment = Payment::new(method.id, amount, transaction_id);
            tx.insert_payment(&payment).await?;
            order.place(state, payment.id);

            let mut units: u64 = 0;
            for line in &lines {
                if let Some(variant) = variants.iter_mut().find(|v| v.id == line.variant_id) {
                    variant.commit_stock(line.quantity)?;
                    units += u64::try_from(line.quantity).unwrap_or(0);
                }
            }
            tx.save_variants(&variants).await?;

            let order = Self::finalize(&mut tx, order).await?;
            tx.commit().await?;

            if let Some(metrics) = &self.metrics {
                metrics.record_payment(integration.code(), status);
                metrics.record_order_placed(order.state.as_str(), units);
            }
            tracing::info!(
                order_id = %order.id,
                code = %order.code,
                state = %order.state,
                payment_id = %payment.id,
                amount,
                "💳 Payment added, order placed"
            );
            Ok(order)
        })
        .await
    }
}
