use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use super::{OrderStore, StoreTransaction};
use crate::domain::customer::{Customer, Email};
use crate::domain::fulfillment::{Payment, PaymentMethod, Shipment, ShippingMethod};
use crate::domain::inventory::Variant;
use crate::domain::order::{ListInput, Order, OrderLine};

// ============================================================================
// In-memory Store
// ============================================================================
//
// One transaction at a time: `begin` takes the store mutex and works on a
// copy of the state. `commit` swaps the copy in; dropping discards it.
//
// ============================================================================

#[derive(Debug, Clone, Default)]
struct MemoryState {
    order_code_seq: i64,
    orders: HashMap<Uuid, Order>,
    lines: HashMap<Uuid, OrderLine>,
    variants: HashMap<Uuid, Variant>,
    customers: HashMap<Uuid, Customer>,
    shipping_methods: HashMap<Uuid, ShippingMethod>,
    payment_methods: HashMap<Uuid, PaymentMethod>,
    shipments: HashMap<Uuid, Shipment>,
    payments: HashMap<Uuid, Payment>,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    type Tx = MemoryTransaction;

    async fn begin(&self) -> Result<Self::Tx> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(MemoryTransaction { guard, working })
    }
}

pub struct MemoryTransaction {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
}

/// Sorts newest first, breaking timestamp ties by id so output is stable.
fn newest_first<T>(mut items: Vec<T>, key: impl Fn(&T) -> (DateTime<Utc>, Uuid)) -> Vec<T> {
    items.sort_by(|a, b| key(b).cmp(&key(a)));
    items
}

#[async_trait]
impl StoreTransaction for MemoryTransaction {
    async fn next_order_code(&mut self) -> Result<i64> {
        self.working.order_code_seq += 1;
        Ok(self.working.order_code_seq)
    }

    async fn insert_order(&mut self, order: &Order) -> Result<()> {
        if self.working.orders.values().any(|o| o.code == order.code) {
            bail!("duplicate order code: {}", order.code);
        }
        self.working.orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn find_order(&mut self, id: Uuid) -> Result<Option<Order>> {
        Ok(self.working.orders.get(&id).cloned())
    }

    async fn lock_order(&mut self, id: Uuid) -> Result<Option<Order>> {
        // The whole store is already held by this transaction
        self.find_order(id).await
    }

    async fn find_order_by_code(&mut self, code: &str) -> Result<Option<Order>> {
        Ok(self.working.orders.values().find(|o| o.code == code).cloned())
    }

    async fn list_orders(&mut self, input: &ListInput) -> Result<Vec<Order>> {
        let orders: Vec<Order> = self.working.orders.values().cloned().collect();
        Ok(input.apply(newest_first(orders, |o| (o.created_at, o.id))))
    }

    async fn save_order(&mut self, order: &Order) -> Result<()> {
        if !self.working.orders.contains_key(&order.id) {
            bail!("order {} does not exist", order.id);
        }
        self.working.orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn find_lines(&mut self, order_id: Uuid) -> Result<Vec<OrderLine>> {
        let lines: Vec<OrderLine> = self
            .working
            .lines
            .values()
            .filter(|l| l.order_id == order_id)
            .cloned()
            .collect();
        Ok(newest_first(lines, |l| (l.created_at, l.id)))
    }

    async fn find_line(&mut self, line_id: Uuid) -> Result<Option<OrderLine>> {
        Ok(self.working.lines.get(&line_id).cloned())
    }

    async fn insert_line(&mut self, line: &OrderLine) -> Result<()> {
        let duplicate = self
            .working
            .lines
            .values()
            .any(|l| l.order_id == line.order_id && l.variant_id == line.variant_id);
        if duplicate {
            bail!(
                "order {} already has a line for variant {}",
                line.order_id,
                line.variant_id
            );
        }
        self.working.lines.insert(line.id, line.clone());
        Ok(())
    }

    async fn save_line(&mut self, line: &OrderLine) -> Result<()> {
        self.working.lines.insert(line.id, line.clone());
        Ok(())
    }

    async fn delete_line(&mut self, line_id: Uuid) -> Result<()> {
        self.working.lines.remove(&line_id);
        Ok(())
    }

    async fn find_variant(&mut self, id: Uuid) -> Result<Option<Variant>> {
        Ok(self
            .working
            .variants
            .get(&id)
            .filter(|v| !v.is_deleted())
            .cloned())
    }

    async fn lock_variants(&mut self, ids: &[Uuid]) -> Result<Vec<Variant>> {
        let mut variants: Vec<Variant> = ids
            .iter()
            .filter_map(|id| self.working.variants.get(id))
            .filter(|v| !v.is_deleted())
            .cloned()
            .collect();
        variants.sort_by_key(|v| v.id);
        variants.dedup_by_key(|v| v.id);
        Ok(variants)
    }

    async fn list_variants(&mut self, input: &ListInput) -> Result<Vec<Variant>> {
        let variants: Vec<Variant> = self
            .working
            .variants
            .values()
            .filter(|v| !v.is_deleted())
            .cloned()
            .collect();
        Ok(input.apply(newest_first(variants, |v| (v.created_at, v.id))))
    }

    async fn insert_variant(&mut self, variant: &Variant) -> Result<()> {
        self.working.variants.insert(variant.id, variant.clone());
        Ok(())
    }

    async fn save_variants(&mut self, variants: &[Variant]) -> Result<()> {
        for variant in variants {
            if variant.stock < 0 {
                bail!("variant {} stock would become negative", variant.id);
            }
            self.working.variants.insert(variant.id, variant.clone());
        }
        Ok(())
    }

    async fn find_customer(&mut self, id: Uuid) -> Result<Option<Customer>> {
        Ok(self.working.customers.get(&id).cloned())
    }

    async fn find_customer_by_email(&mut self, email: &Email) -> Result<Option<Customer>> {
        Ok(self
            .working
            .customers
            .values()
            .find(|c| &c.email == email)
            .cloned())
    }

    async fn save_customer(&mut self, customer: &Customer) -> Result<()> {
        self.working.customers.insert(customer.id, customer.clone());
        Ok(())
    }

    async fn find_shipping_method(&mut self, id: Uuid) -> Result<Option<ShippingMethod>> {
        Ok(self.working.shipping_methods.get(&id).cloned())
    }

    async fn insert_shipping_method(&mut self, method: &ShippingMethod) -> Result<()> {
        self.working.shipping_methods.insert(method.id, method.clone());
        Ok(())
    }

    async fn find_payment_method(&mut self, id: Uuid) -> Result<Option<PaymentMethod>> {
        Ok(self.working.payment_methods.get(&id).cloned())
    }

    async fn insert_payment_method(&mut self, method: &PaymentMethod) -> Result<()> {
        self.working.payment_methods.insert(method.id, method.clone());
        Ok(())
    }

    async fn find_shipment(&mut self, id: Uuid) -> Result<Option<Shipment>> {
        Ok(self.working.shipments.get(&id).cloned())
    }

    async fn insert_shipment(&mut self, shipment: &Shipment) -> Result<()> {
        self.working.shipments.insert(shipment.id, shipment.clone());
        Ok(())
    }

    async fn delete_shipment(&mut self, id: Uuid) -> Result<()> {
        self.working.shipments.remove(&id);
        Ok(())
    }

    async fn find_payment(&mut self, id: Uuid) -> Result<Option<Payment>> {
        Ok(self.working.payments.get(&id).cloned())
    }

    async fn insert_payment(&mut self, payment: &Payment) -> Result<()> {
        self.working.payments.insert(payment.id, payment.clone());
        Ok(())
    }

    async fn commit(self) -> Result<()> {
        let MemoryTransaction { mut guard, working } = self;
        *guard = working;
        Ok(())
    }
}
