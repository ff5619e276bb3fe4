use chrono::Utc;
use uuid::Uuid;

use super::OrderEngine;
use crate::domain::inventory::{CreateVariantInput, UpdateVariantInput, Variant};
use crate::domain::order::{ListInput, OrderError};
use crate::store::{OrderStore, StoreTransaction};

// ============================================================================
// Inventory
// ============================================================================
//
// Variants are soft deleted so that placed orders keep their line history.
// Updates take the variant row lock, the same lock `add_payment` takes before
// committing stock.
//
// ============================================================================

impl<S: OrderStore> OrderEngine<S> {
    pub async fn create_variant(&self, input: CreateVariantInput) -> Result<Variant, OrderError> {
        self.observe("create_variant", async move {
            let variant = input.into_variant()?;

            let mut tx = self.store.begin().await?;
            tx.insert_variant(&variant).await?;
            tx.commit().await?;

            tracing::info!(variant_id = %variant.id, sku = %variant.sku, stock = variant.stock, "📦 Variant created");
            Ok(variant)
        })
        .await
    }

    pub async fn update_variant(
        &self,
        id: Uuid,
        input: UpdateVariantInput,
    ) -> Result<Variant, OrderError> {
        self.observe("update_variant", async move {
            let mut tx = self.store.begin().await?;
            let mut variant = Self::locked_variant(&mut tx, id).await?;

            input.apply_to(&mut variant)?;
            tx.save_variants(std::slice::from_ref(&variant)).await?;
            tx.commit().await?;

            tracing::info!(variant_id = %variant.id, price = variant.price, stock = variant.stock, "Variant updated");
            Ok(variant)
        })
        .await
    }

    pub async fn remove_variant(&self, id: Uuid) -> Result<Variant, OrderError> {
        self.observe("remove_variant", async move {
            let mut tx = self.store.begin().await?;
            let mut variant = Self::locked_variant(&mut tx, id).await?;

            let now = Utc::now();
            variant.deleted_at = Some(now);
            variant.updated_at = now;
            tx.save_variants(std::slice::from_ref(&variant)).await?;
            tx.commit().await?;

            tracing::info!(variant_id = %variant.id, "🗑️ Variant removed");
            Ok(variant)
        })
        .await
    }

    pub async fn find_variant(&self, id: Uuid) -> Result<Option<Variant>, OrderError> {
        let mut tx = self.store.begin().await?;
        Ok(tx.find_variant(id).await?)
    }

    /// Live variants, newest first.
    pub async fn find_variants(&self, input: ListInput) -> Result<Vec<Variant>, OrderError> {
        let mut tx = self.store.begin().await?;
        Ok(tx.list_variants(&input).await?)
    }

    async fn locked_variant(tx: &mut S::Tx, id: Uuid) -> Result<Variant, OrderError> {
        tx.lock_variants(&[id])
            .await?
            .pop()
            .ok_or(OrderError::VariantNotFound(id))
    }
}
