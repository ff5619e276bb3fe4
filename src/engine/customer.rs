use uuid::Uuid;

use super::OrderEngine;
use crate::domain::customer::{Address, CreateAddressInput, CreateCustomerInput, Customer, Email};
use crate::domain::order::{ensure_modifying, Order, OrderError};
use crate::store::{OrderStore, StoreTransaction};

// ============================================================================
// Customer / Address Binder
// ============================================================================

impl<S: OrderStore> OrderEngine<S> {
    /// Attaches the customer with `input.email`, creating it on first use and
    /// merging the supplied profile fields otherwise.
    pub async fn add_customer(
        &self,
        order_id: Uuid,
        input: CreateCustomerInput,
    ) -> Result<Order, OrderError> {
        self.observe("add_customer", async move {
            let email = Email::parse(&input.email)?;

            let mut tx = self.store.begin().await?;
            let mut order = Self::locked_order(&mut tx, order_id).await?;
            ensure_modifying(order.state, "add customer to")?;

            let customer = match tx.find_customer_by_email(&email).await? {
                Some(mut existing) => {
                    existing.merge(input);
                    existing
                }
                None => {
                    tracing::debug!(email = %email.as_str(), "Creating customer");
                    Customer::new(email, input)
                }
            };
            tx.save_customer(&customer).await?;

            order.customer_id = Some(customer.id);
            let order = Self::finalize(&mut tx, order).await?;
            tx.commit().await?;

            tracing::info!(order_id = %order.id, customer_id = %customer.id, "👤 Customer attached");
            Ok(order)
        })
        .await
    }

    /// Replaces the order's shipping address snapshot.
    pub async fn add_shipping_address(
        &self,
        order_id: Uuid,
        input: CreateAddressInput,
    ) -> Result<Order, OrderError> {
        self.observe("add_shipping_address", async move {
            let mut tx = self.store.begin().await?;
            let mut order = Self::locked_order(&mut tx, order_id).await?;
            ensure_modifying(order.state, "add shipping address to")?;

            order.shipping_address = Some(Address::from(input));
            let order = Self::finalize(&mut tx, order).await?;
            tx.commit().await?;

            tracing::info!(order_id = %order.id, "🏠 Shipping address set");
            Ok(order)
        })
        .await
    }
}
