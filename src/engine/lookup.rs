use uuid::Uuid;

use super::OrderEngine;
use crate::domain::customer::{Address, Customer};
use crate::domain::fulfillment::{Payment, Shipment};
use crate::domain::inventory::Variant;
use crate::domain::order::{ListInput, Order, OrderError, OrderLine};
use crate::store::{OrderStore, StoreTransaction};

// ============================================================================
// Order Creation & Lookup
// ============================================================================
//
// Reads run in their own transaction and are never committed.
//
// ============================================================================

impl<S: OrderStore> OrderEngine<S> {
    /// Creates an empty MODIFYING order. The code is the next value of the
    /// order code sequence.
    pub async fn create(&self) -> Result<Order, OrderError> {
        self.observe("create", async move {
            let mut tx = self.store.begin().await?;
            let code = tx.next_order_code().await?;
            let order = Order::new(code.to_string());
            tx.insert_order(&order).await?;
            tx.commit().await?;

            if let Some(metrics) = &self.metrics {
                metrics.orders_created_total.inc();
            }
            tracing::info!(order_id = %order.id, code = %order.code, "🆕 Order created");
            Ok(order)
        })
        .await
    }

    /// Looks an order up by id or, when no id is given, by code.
    pub async fn find_unique(
        &self,
        id: Option<Uuid>,
        code: Option<&str>,
    ) -> Result<Option<Order>, OrderError> {
        if id.is_none() && code.is_none() {
            return Err(OrderError::InvalidInput(
                "either id or code is required".to_string(),
            ));
        }

        let mut tx = self.store.begin().await?;
        match (id, code) {
            (Some(id), _) => Ok(tx.find_order(id).await?),
            (None, Some(code)) => Ok(tx.find_order_by_code(code).await?),
            (None, None) => Ok(None),
        }
    }

    /// Newest first.
    pub async fn find(&self, input: ListInput) -> Result<Vec<Order>, OrderError> {
        let mut tx = self.store.begin().await?;
        Ok(tx.list_orders(&input).await?)
    }

    /// Newest first.
    pub async fn find_lines(&self, order_id: Uuid) -> Result<Vec<OrderLine>, OrderError> {
        let mut tx = self.store.begin().await?;
        Ok(tx.find_lines(order_id).await?)
    }

    /// Variant a line points at. `None` once the variant has been removed.
    pub async fn find_line_variant(&self, line_id: Uuid) -> Result<Option<Variant>, OrderError> {
        let mut tx = self.store.begin().await?;
        let line = tx
            .find_line(line_id)
            .await?
            .ok_or(OrderError::LineNotFound(line_id))?;
        Ok(tx.find_variant(line.variant_id).await?)
    }

    pub async fn find_customer(&self, order_id: Uuid) -> Result<Option<Customer>, OrderError> {
        let mut tx = self.store.begin().await?;
        match Self::existing_order(&mut tx, order_id).await?.customer_id {
            Some(id) => Ok(tx.find_customer(id).await?),
            None => Ok(None),
        }
    }

    pub async fn find_shipping_address(
        &self,
        order_id: Uuid,
    ) -> Result<Option<Address>, OrderError> {
        let mut tx = self.store.begin().await?;
        Ok(Self::existing_order(&mut tx, order_id).await?.shipping_address)
    }

    pub async fn find_shipment(&self, order_id: Uuid) -> Result<Option<Shipment>, OrderError> {
        let mut tx = self.store.begin().await?;
        match Self::existing_order(&mut tx, order_id).await?.shipment_id {
            Some(id) => Ok(tx.find_shipment(id).await?),
            None => Ok(None),
        }
    }

    pub async fn find_payment(&self, order_id: Uuid) -> Result<Option<Payment>, OrderError> {
        let mut tx = self.store.begin().await?;
        match Self::existing_order(&mut tx, order_id).await?.payment_id {
            Some(id) => Ok(tx.find_payment(id).await?),
            None => Ok(None),
        }
    }

    async fn existing_order(tx: &mut S::Tx, order_id: Uuid) -> Result<Order, OrderError> {
        tx.find_order(order_id)
            .await?
            .ok_or_else(|| OrderError::OrderNotFound(order_id))
    }
}
