use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::customer::{Customer, Email};
use crate::domain::fulfillment::{Payment, PaymentMethod, Shipment, ShippingMethod};
use crate::domain::inventory::Variant;
use crate::domain::order::{ListInput, Order, OrderLine};

mod memory;
mod postgres;

pub use memory::{MemoryStore, MemoryTransaction};
pub use postgres::{PgStore, PgTransaction};

// ============================================================================
// Order Aggregate Repository
// ============================================================================
//
// Every engine operation runs inside exactly one `StoreTransaction`.
// Dropping a transaction without calling `commit` discards its writes.
//
// Lock discipline: `lock_order` first, then `lock_variants` (ascending id).
// Line rows are only written while their order row is locked.
//
// ============================================================================

#[async_trait]
pub trait OrderStore: Send + Sync + 'static {
    type Tx: StoreTransaction;

    async fn begin(&self) -> Result<Self::Tx>;
}

#[async_trait]
pub trait StoreTransaction: Send {
    // Orders
    /// Next value of the monotonic order code sequence (starts at 1).
    async fn next_order_code(&mut self) -> Result<i64>;
    async fn insert_order(&mut self, order: &Order) -> Result<()>;
    async fn find_order(&mut self, id: Uuid) -> Result<Option<Order>>;
    /// Reads the order and holds its row lock until the transaction ends.
    async fn lock_order(&mut self, id: Uuid) -> Result<Option<Order>>;
    async fn find_order_by_code(&mut self, code: &str) -> Result<Option<Order>>;
    /// Newest first.
    async fn list_orders(&mut self, input: &ListInput) -> Result<Vec<Order>>;
    async fn save_order(&mut self, order: &Order) -> Result<()>;

    // Lines
    /// Newest first.
    async fn find_lines(&mut self, order_id: Uuid) -> Result<Vec<OrderLine>>;
    async fn find_line(&mut self, line_id: Uuid) -> Result<Option<OrderLine>>;
    async fn insert_line(&mut self, line: &OrderLine) -> Result<()>;
    async fn save_line(&mut self, line: &OrderLine) -> Result<()>;
    async fn delete_line(&mut self, line_id: Uuid) -> Result<()>;

    // Variants
    /// Skips soft-deleted variants.
    async fn find_variant(&mut self, id: Uuid) -> Result<Option<Variant>>;
    /// Locks the live variants among `ids`, in ascending id order.
    async fn lock_variants(&mut self, ids: &[Uuid]) -> Result<Vec<Variant>>;
    async fn list_variants(&mut self, input: &ListInput) -> Result<Vec<Variant>>;
    async fn insert_variant(&mut self, variant: &Variant) -> Result<()>;
    async fn save_variants(&mut self, variants: &[Variant]) -> Result<()>;

    // Customers
    async fn find_customer(&mut self, id: Uuid) -> Result<Option<Customer>>;
    async fn find_customer_by_email(&mut self, email: &Email) -> Result<Option<Customer>>;
    /// Insert or update by id.
    async fn save_customer(&mut self, customer: &Customer) -> Result<()>;

    // Shipping / payment methods
    async fn find_shipping_method(&mut self, id: Uuid) -> Result<Option<ShippingMethod>>;
    async fn insert_shipping_method(&mut self, method: &ShippingMethod) -> Result<()>;
    async fn find_payment_method(&mut self, id: Uuid) -> Result<Option<PaymentMethod>>;
    async fn insert_payment_method(&mut self, method: &PaymentMethod) -> Result<()>;

    // Shipments / payments
    async fn find_shipment(&mut self, id: Uuid) -> Result<Option<Shipment>>;
    async fn insert_shipment(&mut self, shipment: &Shipment) -> Result<()>;
    async fn delete_shipment(&mut self, id: Uuid) -> Result<()>;
    async fn find_payment(&mut self, id: Uuid) -> Result<Option<Payment>>;
    async fn insert_payment(&mut self, payment: &Payment) -> Result<()>;

    async fn commit(self) -> Result<()>;
}
