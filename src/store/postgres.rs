use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

use super::{OrderStore, StoreTransaction};
use crate::config::DatabaseConfig;
use crate::domain::customer::{Address, Customer, Email};
use crate::domain::fulfillment::{Payment, PaymentMethod, Shipment, ShippingMethod};
use crate::domain::inventory::Variant;
use crate::domain::order::{ListInput, Order, OrderLine, OrderState};
use crate::utils::{retry_on_transient, IsTransient, RetryConfig};

const SCHEMA: &str = include_str!("schema.sql");

const ORDER_COLUMNS: &str = "id, code, state, subtotal, total, total_quantity, customer_id, \
     shipping_address, shipment_id, payment_id, placed_at, created_at, updated_at";
const LINE_COLUMNS: &str =
    "id, order_id, variant_id, quantity, unit_price, line_price, created_at, updated_at";
const VARIANT_COLUMNS: &str =
    "id, sku, price, stock, published, created_at, updated_at, deleted_at";
const CUSTOMER_COLUMNS: &str =
    "id, email, first_name, last_name, phone_number, created_at, updated_at";

// ============================================================================
// Postgres Store
// ============================================================================
//
// Row locks (`SELECT ... FOR UPDATE`) serialize concurrent operations on the
// same order and on the same variants under READ COMMITTED. Order codes come
// from `order_code_seq`, so concurrent `create` calls never collide.
//
// ============================================================================

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl IsTransient for sqlx::Error {
    fn is_transient(&self) -> bool {
        matches!(
            self,
            sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::Tls(_)
        )
    }
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects with exponential backoff; the database may still be starting.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let max_connections = config.max_connections;

        let pool = retry_on_transient(RetryConfig::aggressive(), |attempt| {
            let url = config.url.clone();
            async move {
                tracing::debug!(attempt, "Connecting to Postgres");
                PgPoolOptions::new()
                    .max_connections(max_connections)
                    .connect(&url)
                    .await
            }
        })
        .await
        .into_result()
        .context("failed to connect to Postgres")?;

        tracing::info!(max_connections, "✅ Connected to Postgres");
        Ok(Self { pool })
    }

    /// Applies the idempotent schema.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .context("schema migration failed")?;
        tracing::info!("Schema is up to date");
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl OrderStore for PgStore {
    type Tx = PgTransaction;

    async fn begin(&self) -> Result<Self::Tx> {
        let tx = self.pool.begin().await.context("failed to start transaction")?;
        Ok(PgTransaction { tx })
    }
}

pub struct PgTransaction {
    tx: Transaction<'static, Postgres>,
}

// ============================================================================
// Row mapping
// ============================================================================

fn order_from_row(row: &PgRow) -> Result<Order> {
    let shipping_address: Option<Json<Address>> = row.try_get("shipping_address")?;
    Ok(Order {
        id: row.try_get("id")?,
        code: row.try_get("code")?,
        state: OrderState::parse(&row.try_get::<String, _>("state")?)?,
        subtotal: row.try_get("subtotal")?,
        total: row.try_get("total")?,
        total_quantity: row.try_get("total_quantity")?,
        customer_id: row.try_get("customer_id")?,
        shipping_address: shipping_address.map(|Json(address)| address),
        shipment_id: row.try_get("shipment_id")?,
        payment_id: row.try_get("payment_id")?,
        placed_at: row.try_get("placed_at")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn line_from_row(row: &PgRow) -> Result<OrderLine> {
    Ok(OrderLine {
        id: row.try_get("id")?,
        order_id: row.try_get("order_id")?,
        variant_id: row.try_get("variant_id")?,
        quantity: row.try_get("quantity")?,
        unit_price: row.try_get("unit_price")?,
        line_price: row.try_get("line_price")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn variant_from_row(row: &PgRow) -> Result<Variant> {
    Ok(Variant {
        id: row.try_get("id")?,
        sku: row.try_get("sku")?,
        price: row.try_get("price")?,
        stock: row.try_get("stock")?,
        published: row.try_get("published")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        deleted_at: row.try_get("deleted_at")?,
    })
}

fn customer_from_row(row: &PgRow) -> Result<Customer> {
    Ok(Customer {
        id: row.try_get("id")?,
        email: Email::parse(&row.try_get::<String, _>("email")?)?,
        first_name: row.try_get("first_name")?,
        last_name: row.try_get("last_name")?,
        phone_number: row.try_get("phone_number")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn shipping_method_from_row(row: &PgRow) -> Result<ShippingMethod> {
    Ok(ShippingMethod {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        price_calculator_code: row.try_get("price_calculator_code")?,
        enabled: row.try_get("enabled")?,
        created_at: row.try_get("created_at")?,
    })
}

fn payment_method_from_row(row: &PgRow) -> Result<PaymentMethod> {
    Ok(PaymentMethod {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        integration_code: row.try_get("integration_code")?,
        enabled: row.try_get("enabled")?,
        created_at: row.try_get("created_at")?,
    })
}

// ============================================================================
// Transaction
// ============================================================================

#[async_trait]
impl StoreTransaction for PgTransaction {
    async fn next_order_code(&mut self) -> Result<i64> {
        let (code,): (i64,) = sqlx::query_as("SELECT nextval('order_code_seq')")
            .fetch_one(&mut *self.tx)
            .await
            .context("next_order_code failed")?;
        Ok(code)
    }

    async fn insert_order(&mut self, order: &Order) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO orders (
                id, code, state, subtotal, total, total_quantity, customer_id,
                shipping_address, shipment_id, payment_id, placed_at, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(order.id)
        .bind(&order.code)
        .bind(order.state.as_str())
        .bind(order.subtotal)
        .bind(order.total)
        .bind(order.total_quantity)
        .bind(order.customer_id)
        .bind(order.shipping_address.clone().map(Json))
        .bind(order.shipment_id)
        .bind(order.payment_id)
        .bind(order.placed_at)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *self.tx)
        .await
        .context("insert_order failed")?;
        Ok(())
    }

    async fn find_order(&mut self, id: Uuid) -> Result<Option<Order>> {
        let row = sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await
            .context("find_order failed")?;
        row.as_ref().map(order_from_row).transpose()
    }

    async fn lock_order(&mut self, id: Uuid) -> Result<Option<Order>> {
        let row = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await
        .context("lock_order failed")?;
        row.as_ref().map(order_from_row).transpose()
    }

    async fn find_order_by_code(&mut self, code: &str) -> Result<Option<Order>> {
        let row = sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE code = $1"))
            .bind(code)
            .fetch_optional(&mut *self.tx)
            .await
            .context("find_order_by_code failed")?;
        row.as_ref().map(order_from_row).transpose()
    }

    async fn list_orders(&mut self, input: &ListInput) -> Result<Vec<Order>> {
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders ORDER BY created_at DESC, id DESC OFFSET $1 LIMIT $2"
        ))
        .bind(input.skip.unwrap_or(0).max(0))
        .bind(input.take.map(|take| take.max(0)))
        .fetch_all(&mut *self.tx)
        .await
        .context("list_orders failed")?;
        rows.iter().map(order_from_row).collect()
    }

    async fn save_order(&mut self, order: &Order) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET state = $2,
                subtotal = $3,
                total = $4,
                total_quantity = $5,
                customer_id = $6,
                shipping_address = $7,
                shipment_id = $8,
                payment_id = $9,
                placed_at = $10,
                updated_at = $11
            WHERE id = $1
            "#,
        )
        .bind(order.id)
        .bind(order.state.as_str())
        .bind(order.subtotal)
        .bind(order.total)
        .bind(order.total_quantity)
        .bind(order.customer_id)
        .bind(order.shipping_address.clone().map(Json))
        .bind(order.shipment_id)
        .bind(order.payment_id)
        .bind(order.placed_at)
        .bind(order.updated_at)
        .execute(&mut *self.tx)
        .await
        .context("save_order failed")?;

        if result.rows_affected() != 1 {
            anyhow::bail!("order {} does not exist", order.id);
        }
        Ok(())
    }

    async fn find_lines(&mut self, order_id: Uuid) -> Result<Vec<OrderLine>> {
        let rows = sqlx::query(&format!(
            "SELECT {LINE_COLUMNS} FROM order_line WHERE order_id = $1 ORDER BY created_at DESC, id DESC"
        ))
        .bind(order_id)
        .fetch_all(&mut *self.tx)
        .await
        .context("find_lines failed")?;
        rows.iter().map(line_from_row).collect()
    }

    async fn find_line(&mut self, line_id: Uuid) -> Result<Option<OrderLine>> {
        let row = sqlx::query(&format!("SELECT {LINE_COLUMNS} FROM order_line WHERE id = $1"))
            .bind(line_id)
            .fetch_optional(&mut *self.tx)
            .await
            .context("find_line failed")?;
        row.as_ref().map(line_from_row).transpose()
    }

    async fn insert_line(&mut self, line: &OrderLine) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO order_line (
                id, order_id, variant_id, quantity, unit_price, line_price, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(line.id)
        .bind(line.order_id)
        .bind(line.variant_id)
        .bind(line.quantity)
        .bind(line.unit_price)
        .bind(line.line_price)
        .bind(line.created_at)
        .bind(line.updated_at)
        .execute(&mut *self.tx)
        .await
        .context("insert_line failed")?;
        Ok(())
    }

    async fn save_line(&mut self, line: &OrderLine) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE order_line
            SET quantity = $2, unit_price = $3, line_price = $4, updated_at = $5
            WHERE id = $1
            "#,
        )
        .bind(line.id)
        .bind(line.quantity)
        .bind(line.unit_price)
        .bind(line.line_price)
        .bind(line.updated_at)
        .execute(&mut *self.tx)
        .await
        .context("save_line failed")?;
        Ok(())
    }

    async fn delete_line(&mut self, line_id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM order_line WHERE id = $1")
            .bind(line_id)
            .execute(&mut *self.tx)
            .await
            .context("delete_line failed")?;
        Ok(())
    }

    async fn find_variant(&mut self, id: Uuid) -> Result<Option<Variant>> {
        let row = sqlx::query(&format!(
            "SELECT {VARIANT_COLUMNS} FROM variant WHERE id = $1 AND deleted_at IS NULL"
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await
        .context("find_variant failed")?;
        row.as_ref().map(variant_from_row).transpose()
    }

    async fn lock_variants(&mut self, ids: &[Uuid]) -> Result<Vec<Variant>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query(&format!(
            "SELECT {VARIANT_COLUMNS} FROM variant \
             WHERE id = ANY($1) AND deleted_at IS NULL \
             ORDER BY id FOR UPDATE"
        ))
        .bind(ids.to_vec())
        .fetch_all(&mut *self.tx)
        .await
        .context("lock_variants failed")?;
        rows.iter().map(variant_from_row).collect()
    }

    async fn list_variants(&mut self, input: &ListInput) -> Result<Vec<Variant>> {
        let rows = sqlx::query(&format!(
            "SELECT {VARIANT_COLUMNS} FROM variant WHERE deleted_at IS NULL \
             ORDER BY created_at DESC, id DESC OFFSET $1 LIMIT $2"
        ))
        .bind(input.skip.unwrap_or(0).max(0))
        .bind(input.take.map(|take| take.max(0)))
        .fetch_all(&mut *self.tx)
        .await
        .context("list_variants failed")?;
        rows.iter().map(variant_from_row).collect()
    }

    async fn insert_variant(&mut self, variant: &Variant) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO variant (id, sku, price, stock, published, created_at, updated_at, deleted_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(variant.id)
        .bind(&variant.sku)
        .bind(variant.price)
        .bind(variant.stock)
        .bind(variant.published)
        .bind(variant.created_at)
        .bind(variant.updated_at)
        .bind(variant.deleted_at)
        .execute(&mut *self.tx)
        .await
        .context("insert_variant failed")?;
        Ok(())
    }

    async fn save_variants(&mut self, variants: &[Variant]) -> Result<()> {
        for variant in variants {
            sqlx::query(
                r#"
                UPDATE variant
                SET sku = $2, price = $3, stock = $4, published = $5, updated_at = $6, deleted_at = $7
                WHERE id = $1
                "#,
            )
            .bind(variant.id)
            .bind(&variant.sku)
            .bind(variant.price)
            .bind(variant.stock)
            .bind(variant.published)
            .bind(variant.updated_at)
            .bind(variant.deleted_at)
            .execute(&mut *self.tx)
            .await
            .with_context(|| format!("save_variants failed for {}", variant.id))?;
        }
        Ok(())
    }

    async fn find_customer(&mut self, id: Uuid) -> Result<Option<Customer>> {
        let row = sqlx::query(&format!("SELECT {CUSTOMER_COLUMNS} FROM customer WHERE id = $1"))
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await
            .context("find_customer failed")?;
        row.as_ref().map(customer_from_row).transpose()
    }

    async fn find_customer_by_email(&mut self, email: &Email) -> Result<Option<Customer>> {
        let row = sqlx::query(&format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customer WHERE email = $1"
        ))
        .bind(email.as_str())
        .fetch_optional(&mut *self.tx)
        .await
        .context("find_customer_by_email failed")?;
        row.as_ref().map(customer_from_row).transpose()
    }

    async fn save_customer(&mut self, customer: &Customer) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO customer (id, email, first_name, last_name, phone_number, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id) DO UPDATE
            SET first_name = EXCLUDED.first_name,
                last_name = EXCLUDED.last_name,
                phone_number = EXCLUDED.phone_number,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(customer.id)
        .bind(customer.email.as_str())
        .bind(&customer.first_name)
        .bind(&customer.last_name)
        .bind(&customer.phone_number)
        .bind(customer.created_at)
        .bind(customer.updated_at)
        .execute(&mut *self.tx)
        .await
        .context("save_customer failed")?;
        Ok(())
    }

    async fn find_shipping_method(&mut self, id: Uuid) -> Result<Option<ShippingMethod>> {
        let row = sqlx::query(
            "SELECT id, name, description, price_calculator_code, enabled, created_at \
             FROM shipping_method WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await
        .context("find_shipping_method failed")?;
        row.as_ref().map(shipping_method_from_row).transpose()
    }

    async fn insert_shipping_method(&mut self, method: &ShippingMethod) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO shipping_method (id, name, description, price_calculator_code, enabled, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(method.id)
        .bind(&method.name)
        .bind(&method.description)
        .bind(&method.price_calculator_code)
        .bind(method.enabled)
        .bind(method.created_at)
        .execute(&mut *self.tx)
        .await
        .context("insert_shipping_method failed")?;
        Ok(())
    }

    async fn find_payment_method(&mut self, id: Uuid) -> Result<Option<PaymentMethod>> {
        let row = sqlx::query(
            "SELECT id, name, description, integration_code, enabled, created_at \
             FROM payment_method WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await
        .context("find_payment_method failed")?;
        row.as_ref().map(payment_method_from_row).transpose()
    }

    async fn insert_payment_method(&mut self, method: &PaymentMethod) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO payment_method (id, name, description, integration_code, enabled, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(method.id)
        .bind(&method.name)
        .bind(&method.description)
        .bind(&method.integration_code)
        .bind(method.enabled)
        .bind(method.created_at)
        .execute(&mut *self.tx)
        .await
        .context("insert_payment_method failed")?;
        Ok(())
    }

    async fn find_shipment(&mut self, id: Uuid) -> Result<Option<Shipment>> {
        let row = sqlx::query("SELECT id, method_id, amount, created_at FROM shipment WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await
            .context("find_shipment failed")?;

        row.map(|row| -> Result<Shipment> {
            Ok(Shipment {
                id: row.try_get("id")?,
                method_id: row.try_get("method_id")?,
                amount: row.try_get("amount")?,
                created_at: row.try_get("created_at")?,
            })
        })
        .transpose()
    }

    async fn insert_shipment(&mut self, shipment: &Shipment) -> Result<()> {
        sqlx::query("INSERT INTO shipment (id, method_id, amount, created_at) VALUES ($1, $2, $3, $4)")
            .bind(shipment.id)
            .bind(shipment.method_id)
            .bind(shipment.amount)
            .bind(shipment.created_at)
            .execute(&mut *self.tx)
            .await
            .context("insert_shipment failed")?;
        Ok(())
    }

    async fn delete_shipment(&mut self, id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM shipment WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await
            .context("delete_shipment failed")?;
        Ok(())
    }

    async fn find_payment(&mut self, id: Uuid) -> Result<Option<Payment>> {
        let row = sqlx::query(
            "SELECT id, method_id, amount, transaction_id, created_at FROM payment WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await
        .context("find_payment failed")?;

        row.map(|row| -> Result<Payment> {
            Ok(Payment {
                id: row.try_get("id")?,
                method_id: row.try_get("method_id")?,
                amount: row.try_get("amount")?,
                transaction_id: row.try_get("transaction_id")?,
                created_at: row.try_get("created_at")?,
            })
        })
        .transpose()
    }

    async fn insert_payment(&mut self, payment: &Payment) -> Result<()> {
        sqlx::query(
            "INSERT INTO payment (id, method_id, amount, transaction_id, created_at) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(payment.id)
        .bind(payment.method_id)
        .bind(payment.amount)
        .bind(&payment.transaction_id)
        .bind(payment.created_at)
        .execute(&mut *self.tx)
        .await
        .context("insert_payment failed")?;
        Ok(())
    }

    async fn commit(self) -> Result<()> {
        self.tx.commit().await.context("failed to commit transaction")?;
        Ok(())
    }
}
