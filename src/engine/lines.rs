use uuid::Uuid;

use super::OrderEngine;
use crate::domain::order::{
    ensure_modifying, validate_quantity, CreateOrderLineInput, Order, OrderError, OrderLine,
    UpdateOrderLineInput,
};
use crate::store::{OrderStore, StoreTransaction};

// ============================================================================
// Line Manager
// ============================================================================
//
// Stock is checked here but only committed by `add_payment`. Lines are
// always written while the owning order row is locked.
//
// ============================================================================

impl<S: OrderStore> OrderEngine<S> {
    /// Adds `quantity` of a variant. A variant already on the order is merged
    /// into its existing line.
    pub async fn add_line(
        &self,
        order_id: Uuid,
        input: CreateOrderLineInput,
    ) -> Result<Order, OrderError> {
        self.observe("add_line", async move {
            validate_quantity(input.quantity)?;

            let mut tx = self.store.begin().await?;
            let order = Self::locked_order(&mut tx, order_id).await?;
            ensure_modifying(order.state, "add line to")?;

            let variant = tx
                .find_variant(input.variant_id)
                .await?
                .ok_or(OrderError::VariantNotFound(input.variant_id))?;

            let existing = tx
                .find_lines(order.id)
                .await?
                .into_iter()
                .find(|line| line.variant_id == variant.id);

            match existing {
                Some(line) => {
                    let quantity = line.quantity.checked_add(input.quantity).ok_or_else(|| {
                        OrderError::InvalidInput(format!(
                            "quantity overflows: {} + {}",
                            line.quantity, input.quantity
                        ))
                    })?;
                    tracing::debug!(
                        order_id = %order.id,
                        line_id = %line.id,
                        quantity,
                        "Merging into existing line"
                    );
                    Self::set_line_quantity(&mut tx, line, quantity).await?;
                }
                None => {
                    variant.ensure_stock(input.quantity)?;
                    let line = OrderLine::new(order.id, &variant, input.quantity)?;
                    tx.insert_line(&line).await?;
                }
            }

            let order = Self::finalize(&mut tx, order).await?;
            tx.commit().await?;

            tracing::info!(
                order_id = %order.id,
                variant_id = %input.variant_id,
                quantity = input.quantity,
                subtotal = order.subtotal,
                "➕ Line added"
            );
            Ok(order)
        })
        .await
    }

    /// Sets an absolute quantity on a line. Zero removes it.
    pub async fn update_line(
        &self,
        line_id: Uuid,
        input: UpdateOrderLineInput,
    ) -> Result<Order, OrderError> {
        self.observe("update_line", async move {
            if input.quantity < 0 {
                return Err(OrderError::InvalidInput(format!(
                    "quantity must not be negative, got {}",
                    input.quantity
                )));
            }

            let mut tx = self.store.begin().await?;
            let (order, line) = Self::locked_line(&mut tx, line_id, "update line of").await?;

            if input.quantity == 0 {
                tx.delete_line(line.id).await?;
            } else {
                Self::set_line_quantity(&mut tx, line, input.quantity).await?;
            }

            let order = Self::finalize(&mut tx, order).await?;
            tx.commit().await?;

            tracing::info!(
                order_id = %order.id,
                line_id = %line_id,
                quantity = input.quantity,
                subtotal = order.subtotal,
                "✏️ Line updated"
            );
            Ok(order)
        })
        .await
    }

    pub async fn remove_line(&self, line_id: Uuid) -> Result<Order, OrderError> {
        self.observe("remove_line", async move {
            let mut tx = self.store.begin().await?;
            let (order, line) = Self::locked_line(&mut tx, line_id, "remove line from").await?;

            tx.delete_line(line.id).await?;

            let order = Self::finalize(&mut tx, order).await?;
            tx.commit().await?;

            tracing::info!(order_id = %order.id, line_id = %line_id, "➖ Line removed");
            Ok(order)
        })
        .await
    }

    /// Resolves the owning order of a line, locks it, and re-reads the line
    /// under that lock.
    async fn locked_line(
        tx: &mut S::Tx,
        line_id: Uuid,
        action: &'static str,
    ) -> Result<(Order, OrderLine), OrderError> {
        let line = tx
            .find_line(line_id)
            .await?
            .ok_or(OrderError::LineNotFound(line_id))?;

        let order = Self::locked_order(tx, line.order_id).await?;
        ensure_modifying(order.state, action)?;

        // May have been removed while we waited for the lock
        let line = tx
            .find_line(line_id)
            .await?
            .ok_or(OrderError::LineNotFound(line_id))?;

        Ok((order, line))
    }

    async fn set_line_quantity(
        tx: &mut S::Tx,
        mut line: OrderLine,
        quantity: i32,
    ) -> Result<(), OrderError> {
        let variant = tx
            .find_variant(line.variant_id)
            .await?
            .ok_or(OrderError::VariantNotFound(line.variant_id))?;

        variant.ensure_stock(quantity)?;
        line.reprice(&variant, quantity)?;
        tx.save_line(&line).await?;
        Ok(())
    }
}
