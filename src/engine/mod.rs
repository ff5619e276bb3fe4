use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::domain::order::{Order, OrderError, OrderLine, OrderSnapshot, OrderStats};
use crate::integrations::{PaymentIntegrationRegistry, ShippingCalculatorRegistry};
use crate::metrics::Metrics;
use crate::store::{OrderStore, StoreTransaction};

mod customer;
mod fulfillment;
mod inventory;
mod lines;
mod lookup;
mod methods;

#[cfg(test)]
mod tests;

// ============================================================================
// Order Engine
// ============================================================================
//
// Each public operation:
//   1. opens one store transaction
//   2. locks the order row and checks the state allows the operation
//   3. applies the change
//   4. recalculates stats from freshly read lines and shipment (`finalize`)
//   5. commits
//
// Any error before step 5 drops the transaction, so nothing is persisted.
//
// ============================================================================

pub struct OrderEngine<S: OrderStore> {
    store: S,
    shipping: ShippingCalculatorRegistry,
    payments: PaymentIntegrationRegistry,
    metrics: Option<Arc<Metrics>>,
}

impl<S: OrderStore> OrderEngine<S> {
    pub fn new(store: S, config: EngineConfig) -> Self {
        Self {
            store,
            shipping: config.shipping,
            payments: config.payments,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Times an operation, logs its outcome and records it in metrics.
    async fn observe<T>(
        &self,
        operation: &'static str,
        fut: impl Future<Output = Result<T, OrderError>>,
    ) -> Result<T, OrderError> {
        let started = Instant::now();
        let result = fut.await;

        let outcome = match &result {
            Ok(_) => {
                tracing::debug!(operation, "Order operation completed");
                "ok"
            }
            Err(e) if e.is_business() => {
                tracing::info!(operation, code = %e.code(), error = %e, "Order operation rejected");
                "rejected"
            }
            Err(e) => {
                tracing::error!(operation, error = ?e, "Order operation failed");
                "error"
            }
        };

        if let Some(metrics) = &self.metrics {
            metrics.record_operation(operation, outcome, started.elapsed().as_secs_f64());
        }
        result
    }

    /// Loads the order under its row lock.
    async fn locked_order(tx: &mut S::Tx, order_id: Uuid) -> Result<Order, OrderError> {
        tx.lock_order(order_id)
            .await?
            .ok_or_else(|| OrderError::OrderNotFound(order_id))
    }

    /// Recomputes the derived totals from the lines and shipment currently
    /// visible in `tx`, then persists the order.
    async fn finalize(tx: &mut S::Tx, mut order: Order) -> Result<Order, OrderError> {
        let lines = tx.find_lines(order.id).await?;
        let shipment = match order.shipment_id {
            Some(id) => tx.find_shipment(id).await?,
            None => None,
        };

        order.apply_stats(OrderStats::compute(&lines, shipment.as_ref())?);
        tx.save_order(&order).await?;
        Ok(order)
    }

    async fn snapshot(
        tx: &mut S::Tx,
        order: &Order,
        lines: Vec<OrderLine>,
    ) -> Result<OrderSnapshot, OrderError> {
        let customer = match order.customer_id {
            Some(id) => tx.find_customer(id).await?,
            None => None,
        };
        let shipment = match order.shipment_id {
            Some(id) => tx.find_shipment(id).await?,
            None => None,
        };

        Ok(OrderSnapshot {
            order: order.clone(),
            lines,
            customer,
            shipment,
        })
    }
}
