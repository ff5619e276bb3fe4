use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::order::OrderError;

/// A purchasable SKU. Prices are in minor currency units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variant {
    pub id: Uuid,
    pub sku: String,
    pub price: i64,
    pub stock: i32,
    pub published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Variant {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Fails with `NOT_ENOUGH_STOCK` when `quantity` exceeds what is on hand.
    pub fn ensure_stock(&self, quantity: i32) -> Result<(), OrderError> {
        if self.stock < quantity {
            return Err(OrderError::NotEnoughStock {
                variant_id: self.id,
                requested: quantity,
                available: self.stock,
            });
        }
        Ok(())
    }

    /// Commits `quantity` units out of stock. Callers check availability first.
    pub fn commit_stock(&mut self, quantity: i32) -> Result<(), OrderError> {
        self.ensure_stock(quantity)?;
        self.stock -= quantity;
        self.updated_at = Utc::now();
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateVariantInput {
    pub sku: String,
    pub price: i64,
    pub stock: i32,
    pub published: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateVariantInput {
    pub sku: Option<String>,
    pub price: Option<i64>,
    pub stock: Option<i32>,
    pub published: Option<bool>,
}

fn validate_amounts(price: Option<i64>, stock: Option<i32>) -> Result<(), OrderError> {
    if let Some(price) = price.filter(|p| *p < 0) {
        return Err(OrderError::InvalidInput(format!("price must not be negative, got {price}")));
    }
    if let Some(stock) = stock.filter(|s| *s < 0) {
        return Err(OrderError::InvalidInput(format!("stock must not be negative, got {stock}")));
    }
    Ok(())
}

impl CreateVariantInput {
    pub fn into_variant(self) -> Result<Variant, OrderError> {
        validate_amounts(Some(self.price), Some(self.stock))?;
        let now = Utc::now();
        Ok(Variant {
            id: Uuid::new_v4(),
            sku: self.sku,
            price: self.price,
            stock: self.stock,
            published: self.published,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        })
    }
}

impl UpdateVariantInput {
    pub fn apply_to(self, variant: &mut Variant) -> Result<(), OrderError> {
        validate_amounts(self.price, self.stock)?;
        if let Some(sku) = self.sku {
            variant.sku = sku;
        }
        if let Some(price) = self.price {
            variant.price = price;
        }
        if let Some(stock) = self.stock {
            variant.stock = stock;
        }
        if let Some(published) = self.published {
            variant.published = published;
        }
        variant.updated_at = Utc::now();
        Ok(())
    }
}
