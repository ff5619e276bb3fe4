use anyhow::anyhow;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use uuid::Uuid;

use super::OrderEngine;
use crate::config::EngineConfig;
use crate::domain::customer::{CreateAddressInput, CreateCustomerInput};
use crate::domain::fulfillment::{
    AddPaymentToOrderInput, AddShipmentToOrderInput, CreatePaymentMethodInput,
    CreateShippingMethodInput, PaymentIntegrationResult, PaymentMethod, ShippingMethod,
};
use crate::domain::inventory::{CreateVariantInput, UpdateVariantInput, Variant};
use crate::domain::order::{
    CreateOrderLineInput, ListInput, Order, OrderError, OrderErrorCode, OrderSnapshot, OrderState,
    UpdateOrderLineInput,
};
use crate::integrations::{
    FlatRateCalculator, ManualPaymentIntegration, PaymentIntegration, PaymentIntegrationRegistry,
    ShippingCalculatorRegistry, ShippingPriceCalculator,
};
use crate::metrics::Metrics;
use crate::store::{MemoryStore, OrderStore, StoreTransaction};

// ============================================================================
// Test doubles
// ============================================================================

struct FailingCalculator;

#[async_trait]
impl ShippingPriceCalculator for FailingCalculator {
    fn code(&self) -> &str {
        "broken"
    }

    async fn calculate_price(&self, _order: &OrderSnapshot) -> anyhow::Result<i64> {
        Err(anyhow!("rate service unavailable"))
    }
}

struct FailingPayment;

#[async_trait]
impl PaymentIntegration for FailingPayment {
    fn code(&self) -> &str {
        "unreachable"
    }

    async fn create_payment(&self, _order: &OrderSnapshot) -> anyhow::Result<PaymentIntegrationResult> {
        Err(anyhow!("provider timeout"))
    }
}

/// Returns the same result on every call and counts calls.
struct FixedPayment {
    code: &'static str,
    result: PaymentIntegrationResult,
    calls: AtomicUsize,
}

impl FixedPayment {
    fn new(code: &'static str, result: PaymentIntegrationResult) -> Arc<Self> {
        Arc::new(Self {
            code,
            result,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentIntegration for FixedPayment {
    fn code(&self) -> &str {
        self.code
    }

    async fn create_payment(&self, _order: &OrderSnapshot) -> anyhow::Result<PaymentIntegrationResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.result.clone())
    }
}

// ============================================================================
// Harness
// ============================================================================

struct Harness {
    engine: Arc<OrderEngine<MemoryStore>>,
    metrics: Arc<Metrics>,
    flat: ShippingMethod,
    express: ShippingMethod,
    manual: PaymentMethod,
    authorize: PaymentMethod,
    decline: PaymentMethod,
    declining: Arc<FixedPayment>,
}

async fn harness() -> Harness {
    let declining = FixedPayment::new(
        "decline",
        PaymentIntegrationResult::Declined {
            reason: Some("card expired".into()),
        },
    );
    let authorizing = FixedPayment::new(
        "authorize",
        PaymentIntegrationResult::Authorized {
            amount: 1234,
            transaction_id: Some("tx_1".into()),
        },
    );

    let shipping = ShippingCalculatorRegistry::new()
        .with(Arc::new(FlatRateCalculator::new("flat-rate", 500)))
        .unwrap()
        .with(Arc::new(FlatRateCalculator::new("express", 900)))
        .unwrap()
        .with(Arc::new(FailingCalculator))
        .unwrap();
    let payments = PaymentIntegrationRegistry::new()
        .with(Arc::new(ManualPaymentIntegration::new("manual")))
        .unwrap()
        .with(authorizing)
        .unwrap()
        .with(declining.clone())
        .unwrap()
        .with(Arc::new(FailingPayment))
        .unwrap()
        .with(FixedPayment::new(
            "negative",
            PaymentIntegrationResult::Authorized {
                amount: -1,
                transaction_id: Some("tx_neg".into()),
            },
        ))
        .unwrap();

    let metrics = Arc::new(Metrics::new().unwrap());
    let engine = OrderEngine::new(MemoryStore::new(), EngineConfig::new(shipping, payments))
        .with_metrics(metrics.clone());

    let flat = shipping_method(&engine, "flat-rate", true).await;
    let express = shipping_method(&engine, "express", true).await;
    let manual = payment_method(&engine, "manual", true).await;
    let authorize = payment_method(&engine, "authorize", true).await;
    let decline = payment_method(&engine, "decline", true).await;

    Harness {
        engine: Arc::new(engine),
        metrics,
        flat,
        express,
        manual,
        authorize,
        decline,
        declining,
    }
}

async fn shipping_method(
    engine: &OrderEngine<MemoryStore>,
    code: &str,
    enabled: bool,
) -> ShippingMethod {
    engine
        .create_shipping_method(CreateShippingMethodInput {
            name: code.to_uppercase(),
            description: None,
            price_calculator_code: code.into(),
            enabled,
        })
        .await
        .unwrap()
}

async fn payment_method(
    engine: &OrderEngine<MemoryStore>,
    code: &str,
    enabled: bool,
) -> PaymentMethod {
    engine
        .create_payment_method(CreatePaymentMethodInput {
            name: code.to_uppercase(),
            description: None,
            integration_code: code.into(),
            enabled,
        })
        .await
        .unwrap()
}

async fn variant(engine: &OrderEngine<MemoryStore>, price: i64, stock: i32) -> Variant {
    engine
        .create_variant(CreateVariantInput {
            sku: format!("SKU-{}", Uuid::new_v4()),
            price,
            stock,
            published: true,
        })
        .await
        .unwrap()
}

async fn add(
    engine: &OrderEngine<MemoryStore>,
    order: &Order,
    variant: &Variant,
    quantity: i32,
) -> Result<Order, OrderError> {
    engine
        .add_line(
            order.id,
            CreateOrderLineInput {
                variant_id: variant.id,
                quantity,
            },
        )
        .await
}

async fn stock_of(engine: &OrderEngine<MemoryStore>, variant: &Variant) -> i32 {
    engine.find_variant(variant.id).await.unwrap().unwrap().stock
}

async fn reload(engine: &OrderEngine<MemoryStore>, order: &Order) -> Order {
    engine.find_unique(Some(order.id), None).await.unwrap().unwrap()
}

fn assert_stats_consistent(order: &Order, lines: &[crate::domain::order::OrderLine], shipping: i64) {
    let subtotal: i64 = lines.iter().map(|l| l.line_price).sum();
    let quantity: i64 = lines.iter().map(|l| i64::from(l.quantity)).sum();
    assert_eq!(order.subtotal, subtotal);
    assert_eq!(order.total, subtotal + shipping);
    assert_eq!(order.total_quantity, quantity);
}

fn address(city: &str) -> CreateAddressInput {
    CreateAddressInput {
        full_name: "Ana Torres".into(),
        street_line_1: "Av. Siempre Viva 742".into(),
        street_line_2: None,
        city: city.into(),
        province: "Lima".into(),
        postal_code: "15001".into(),
        country: "PE".into(),
        phone_number: None,
        references: Some("blue door".into()),
    }
}

// ============================================================================
// Creation & lookup
// ============================================================================

#[tokio::test]
async fn test_create_assigns_sequential_codes() {
    let h = harness().await;

    let first = h.engine.create().await.unwrap();
    let second = h.engine.create().await.unwrap();

    assert_eq!(first.code, "1");
    assert_eq!(second.code, "2");
    assert_eq!(first.state, OrderState::Modifying);
    assert_eq!((first.subtotal, first.total, first.total_quantity), (0, 0, 0));
    assert!(first.placed_at.is_none());
}

#[tokio::test]
async fn test_find_unique_by_id_or_code() {
    let h = harness().await;
    let order = h.engine.create().await.unwrap();

    let by_id = h.engine.find_unique(Some(order.id), None).await.unwrap();
    let by_code = h.engine.find_unique(None, Some("1")).await.unwrap();
    assert_eq!(by_id, Some(order.clone()));
    assert_eq!(by_code, Some(order.clone()));

    // id wins over code
    let missing = h
        .engine
        .find_unique(Some(Uuid::new_v4()), Some("1"))
        .await
        .unwrap();
    assert!(missing.is_none());

    let err = h.engine.find_unique(None, None).await.unwrap_err();
    assert_eq!(err.code(), OrderErrorCode::InvalidInput);
}

#[tokio::test]
async fn test_find_paginates() {
    let h = harness().await;
    for _ in 0..3 {
        h.engine.create().await.unwrap();
    }

    let first_page = h.engine.find(ListInput::new(0, 2)).await.unwrap();
    let second_page = h.engine.find(ListInput::new(2, 10)).await.unwrap();
    assert_eq!(first_page.len(), 2);
    assert_eq!(second_page.len(), 1);

    let codes: HashSet<String> = first_page
        .iter()
        .chain(second_page.iter())
        .map(|o| o.code.clone())
        .collect();
    assert_eq!(codes.len(), 3);
    assert_eq!(h.engine.find(ListInput::default()).await.unwrap().len(), 3);
}

// ============================================================================
// Lines
// ============================================================================

#[tokio::test]
async fn test_checkout_scenario() {
    let h = harness().await;
    let shirt = variant(&h.engine, 1000, 5).await;
    let order = h.engine.create().await.unwrap();

    let order = add(&h.engine, &order, &shirt, 2).await.unwrap();
    assert_eq!(order.subtotal, 2000);
    assert_eq!(order.total, 2000);
    assert_eq!(order.total_quantity, 2);

    let order = h
        .engine
        .add_shipment(
            order.id,
            AddShipmentToOrderInput {
                shipping_method_id: h.flat.id,
            },
        )
        .await
        .unwrap();
    assert_eq!(order.subtotal, 2000);
    assert_eq!(order.total, 2500);

    let order = h
        .engine
        .add_payment(order.id, AddPaymentToOrderInput { method_id: h.manual.id })
        .await
        .unwrap();
    assert_eq!(order.state, OrderState::PaymentAdded);
    assert!(order.placed_at.is_some());
    assert_eq!(order.total, 2500);
    assert_eq!(stock_of(&h.engine, &shirt).await, 3);

    let payment = h.engine.find_payment(order.id).await.unwrap().unwrap();
    assert_eq!(payment.amount, 2500);
    assert_eq!(payment.method_id, h.manual.id);
    assert!(payment.transaction_id.is_none());
}

#[tokio::test]
async fn test_adding_same_variant_merges_into_one_line() {
    let h = harness().await;
    let mug = variant(&h.engine, 750, 10).await;
    let order = h.engine.create().await.unwrap();

    add(&h.engine, &order, &mug, 1).await.unwrap();
    let order = add(&h.engine, &order, &mug, 2).await.unwrap();

    let lines = h.engine.find_lines(order.id).await.unwrap();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].quantity, 3);
    assert_eq!(lines[0].line_price, 2250);
    assert_stats_consistent(&order, &lines, 0);
}

#[tokio::test]
async fn test_stats_follow_every_line_change() {
    let h = harness().await;
    let a = variant(&h.engine, 300, 10).await;
    let b = variant(&h.engine, 1250, 10).await;
    let order = h.engine.create().await.unwrap();

    add(&h.engine, &order, &a, 2).await.unwrap();
    let order = add(&h.engine, &order, &b, 1).await.unwrap();
    let lines = h.engine.find_lines(order.id).await.unwrap();
    assert_eq!(lines.len(), 2);
    assert_stats_consistent(&order, &lines, 0);

    let order = h
        .engine
        .add_shipment(
            order.id,
            AddShipmentToOrderInput {
                shipping_method_id: h.flat.id,
            },
        )
        .await
        .unwrap();
    assert_stats_consistent(&order, &lines, 500);

    let line_a = lines.iter().find(|l| l.variant_id == a.id).unwrap();
    let order = h
        .engine
        .update_line(line_a.id, UpdateOrderLineInput { quantity: 5 })
        .await
        .unwrap();
    let lines = h.engine.find_lines(order.id).await.unwrap();
    assert_stats_consistent(&order, &lines, 500);
    assert_eq!(order.subtotal, 5 * 300 + 1250);

    let line_b = lines.iter().find(|l| l.variant_id == b.id).unwrap();
    let order = h.engine.remove_line(line_b.id).await.unwrap();
    let lines = h.engine.find_lines(order.id).await.unwrap();
    assert_eq!(lines.len(), 1);
    assert_stats_consistent(&order, &lines, 500);
}

#[tokio::test]
async fn test_add_line_not_enough_stock_leaves_order_unchanged() {
    let h = harness().await;
    let lamp = variant(&h.engine, 4000, 1).await;
    let order = h.engine.create().await.unwrap();

    let err = add(&h.engine, &order, &lamp, 2).await.unwrap_err();
    assert_eq!(err.code(), OrderErrorCode::NotEnoughStock);

    assert_eq!(reload(&h.engine, &order).await, order);
    assert!(h.engine.find_lines(order.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_merge_checks_stock_for_combined_quantity() {
    let h = harness().await;
    let lamp = variant(&h.engine, 4000, 3).await;
    let order = h.engine.create().await.unwrap();

    let order = add(&h.engine, &order, &lamp, 2).await.unwrap();
    let err = add(&h.engine, &order, &lamp, 2).await.unwrap_err();
    assert_eq!(err.code(), OrderErrorCode::NotEnoughStock);

    let lines = h.engine.find_lines(order.id).await.unwrap();
    assert_eq!(lines[0].quantity, 2);
    assert_eq!(reload(&h.engine, &order).await.total_quantity, 2);
}

#[tokio::test]
async fn test_add_line_input_errors() {
    let h = harness().await;
    let sock = variant(&h.engine, 100, 10).await;
    let order = h.engine.create().await.unwrap();

    let err = add(&h.engine, &order, &sock, 0).await.unwrap_err();
    assert_eq!(err.code(), OrderErrorCode::InvalidInput);

    let err = add(&h.engine, &order, &sock, -1).await.unwrap_err();
    assert_eq!(err.code(), OrderErrorCode::InvalidInput);

    let ghost = Order::new("ghost".into());
    let err = add(&h.engine, &ghost, &sock, 1).await.unwrap_err();
    assert_eq!(err.code(), OrderErrorCode::OrderNotFound);
    assert!(matches!(err, OrderError::OrderNotFound(id) if id == ghost.id));

    let err = h
        .engine
        .add_line(
            order.id,
            CreateOrderLineInput {
                variant_id: Uuid::new_v4(),
                quantity: 1,
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), OrderErrorCode::VariantNotFound);
}

#[tokio::test]
async fn test_subtotal_overflow_rejects_line() {
    let h = harness().await;
    let first = variant(&h.engine, i64::MAX / 2 + 1, 1).await;
    let second = variant(&h.engine, i64::MAX / 2 + 1, 1).await;
    let order = h.engine.create().await.unwrap();

    let order = add(&h.engine, &order, &first, 1).await.unwrap();
    let err = add(&h.engine, &order, &second, 1).await.unwrap_err();
    assert_eq!(err.code(), OrderErrorCode::InvalidInput);

    assert_eq!(reload(&h.engine, &order).await, order);
    assert_eq!(h.engine.find_lines(order.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_total_overflow_rejects_shipment() {
    let h = harness().await;
    let yacht = variant(&h.engine, i64::MAX - 100, 1).await;
    let order = h.engine.create().await.unwrap();
    let order = add(&h.engine, &order, &yacht, 1).await.unwrap();

    let err = h
        .engine
        .add_shipment(
            order.id,
            AddShipmentToOrderInput {
                shipping_method_id: h.flat.id,
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), OrderErrorCode::InvalidInput);

    let after = reload(&h.engine, &order).await;
    assert_eq!(after, order);
    assert!(after.shipment_id.is_none());
    assert!(h.engine.find_shipment(order.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_update_line_reprices_from_current_variant_price() {
    let h = harness().await;
    let hat = variant(&h.engine, 1500, 10).await;
    let order = h.engine.create().await.unwrap();
    add(&h.engine, &order, &hat, 1).await.unwrap();
    let line = h.engine.find_lines(order.id).await.unwrap().remove(0);

    h.engine
        .update_variant(
            hat.id,
            UpdateVariantInput {
                price: Some(1800),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let order = h
        .engine
        .update_line(line.id, UpdateOrderLineInput { quantity: 2 })
        .await
        .unwrap();
    let line = h.engine.find_lines(order.id).await.unwrap().remove(0);
    assert_eq!(line.unit_price, 1800);
    assert_eq!(line.line_price, 3600);
    assert_eq!(order.subtotal, 3600);
}

#[tokio::test]
async fn test_update_line_checks_stock_and_sign() {
    let h = harness().await;
    let hat = variant(&h.engine, 1500, 4).await;
    let order = h.engine.create().await.unwrap();
    add(&h.engine, &order, &hat, 1).await.unwrap();
    let line = h.engine.find_lines(order.id).await.unwrap().remove(0);

    let err = h
        .engine
        .update_line(line.id, UpdateOrderLineInput { quantity: 5 })
        .await
        .unwrap_err();
    assert_eq!(err.code(), OrderErrorCode::NotEnoughStock);

    let err = h
        .engine
        .update_line(line.id, UpdateOrderLineInput { quantity: -2 })
        .await
        .unwrap_err();
    assert_eq!(err.code(), OrderErrorCode::InvalidInput);

    let err = h
        .engine
        .update_line(Uuid::new_v4(), UpdateOrderLineInput { quantity: 1 })
        .await
        .unwrap_err();
    assert_eq!(err.code(), OrderErrorCode::LineNotFound);

    assert_eq!(h.engine.find_lines(order.id).await.unwrap()[0].quantity, 1);
}

#[tokio::test]
async fn test_update_line_to_zero_removes_it() {
    let h = harness().await;
    let hat = variant(&h.engine, 1500, 10).await;
    let order = h.engine.create().await.unwrap();
    add(&h.engine, &order, &hat, 3).await.unwrap();
    let line = h.engine.find_lines(order.id).await.unwrap().remove(0);

    let order = h
        .engine
        .update_line(line.id, UpdateOrderLineInput { quantity: 0 })
        .await
        .unwrap();

    assert!(h.engine.find_lines(order.id).await.unwrap().is_empty());
    assert_eq!((order.subtotal, order.total, order.total_quantity), (0, 0, 0));
}

#[tokio::test]
async fn test_remove_unknown_line() {
    let h = harness().await;
    let hat = variant(&h.engine, 1500, 10).await;
    let order = h.engine.create().await.unwrap();
    let order = add(&h.engine, &order, &hat, 3).await.unwrap();

    let err = h.engine.remove_line(Uuid::new_v4()).await.unwrap_err();
    assert_eq!(err.code(), OrderErrorCode::LineNotFound);
    assert!(err.is_business());

    assert_eq!(reload(&h.engine, &order).await, order);
    assert_eq!(h.engine.find_lines(order.id).await.unwrap().len(), 1);
}

// ============================================================================
// Customer & address
// ============================================================================

#[tokio::test]
async fn test_add_customer_upserts_by_email() {
    let h = harness().await;
    let first = h.engine.create().await.unwrap();
    let second = h.engine.create().await.unwrap();

    let first = h
        .engine
        .add_customer(
            first.id,
            CreateCustomerInput {
                email: "ana@Example.com".into(),
                first_name: Some("Ana".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let second = h
        .engine
        .add_customer(
            second.id,
            CreateCustomerInput {
                email: "ana@example.com".into(),
                last_name: Some("Torres".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert!(first.customer_id.is_some());
    assert_eq!(first.customer_id, second.customer_id);

    let customer = h.engine.find_customer(second.id).await.unwrap().unwrap();
    assert_eq!(customer.first_name.as_deref(), Some("Ana"));
    assert_eq!(customer.last_name.as_deref(), Some("Torres"));
}

#[tokio::test]
async fn test_add_customer_validates_email_first() {
    let h = harness().await;

    let err = h
        .engine
        .add_customer(
            Uuid::new_v4(),
            CreateCustomerInput {
                email: "not-an-email".into(),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), OrderErrorCode::CustomerInvalidEmail);

    let err = h
        .engine
        .add_customer(
            Uuid::new_v4(),
            CreateCustomerInput {
                email: "ana@example.com".into(),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), OrderErrorCode::OrderNotFound);
}

#[tokio::test]
async fn test_shipping_address_is_replaced() {
    let h = harness().await;
    let order = h.engine.create().await.unwrap();

    h.engine
        .add_shipping_address(order.id, address("Lima"))
        .await
        .unwrap();
    let order = h
        .engine
        .add_shipping_address(order.id, address("Cusco"))
        .await
        .unwrap();

    assert_eq!(order.shipping_address.as_ref().unwrap().city, "Cusco");
    let stored = h.engine.find_shipping_address(order.id).await.unwrap().unwrap();
    assert_eq!(stored.city, "Cusco");
    assert_eq!(stored.references.as_deref(), Some("blue door"));
}

// ============================================================================
// Shipment
// ============================================================================

#[tokio::test]
async fn test_add_shipment_replaces_previous() {
    let h = harness().await;
    let order = h.engine.create().await.unwrap();

    let order = h
        .engine
        .add_shipment(
            order.id,
            AddShipmentToOrderInput {
                shipping_method_id: h.flat.id,
            },
        )
        .await
        .unwrap();
    let replaced = order.shipment_id.unwrap();

    let order = h
        .engine
        .add_shipment(
            order.id,
            AddShipmentToOrderInput {
                shipping_method_id: h.express.id,
            },
        )
        .await
        .unwrap();
    assert_eq!(order.total, 900);

    let shipment = h.engine.find_shipment(order.id).await.unwrap().unwrap();
    assert_eq!(shipment.method_id, h.express.id);
    assert_eq!(shipment.amount, 900);

    let mut tx = h.engine.store().begin().await.unwrap();
    assert!(tx.find_shipment(replaced).await.unwrap().is_none());
}

#[tokio::test]
async fn test_add_shipment_method_checks() {
    let h = harness().await;
    let disabled = shipping_method(&h.engine, "flat-rate", false).await;
    let order = h.engine.create().await.unwrap();

    for method_id in [disabled.id, Uuid::new_v4()] {
        let err = h
            .engine
            .add_shipment(
                order.id,
                AddShipmentToOrderInput {
                    shipping_method_id: method_id,
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), OrderErrorCode::ShippingMethodNotFound);
    }
}

#[tokio::test]
async fn test_calculator_failures_are_infrastructure_errors() {
    let h = harness().await;
    let broken = shipping_method(&h.engine, "broken", true).await;
    let unknown = shipping_method(&h.engine, "unregistered", true).await;
    let order = h.engine.create().await.unwrap();

    for method in [&broken, &unknown] {
        let err = h
            .engine
            .add_shipment(
                order.id,
                AddShipmentToOrderInput {
                    shipping_method_id: method.id,
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), OrderErrorCode::Infrastructure);
        assert!(!err.is_business());
    }

    assert!(reload(&h.engine, &order).await.shipment_id.is_none());
}

// ============================================================================
// Payment
// ============================================================================

#[tokio::test]
async fn test_authorized_payment_uses_integration_amount() {
    let h = harness().await;
    let boot = variant(&h.engine, 9000, 2).await;
    let order = h.engine.create().await.unwrap();
    add(&h.engine, &order, &boot, 1).await.unwrap();

    let order = h
        .engine
        .add_payment(order.id, AddPaymentToOrderInput { method_id: h.authorize.id })
        .await
        .unwrap();

    assert_eq!(order.state, OrderState::PaymentAuthorized);
    assert!(order.placed_at.is_some());
    assert_eq!(stock_of(&h.engine, &boot).await, 1);

    let payment = h.engine.find_payment(order.id).await.unwrap().unwrap();
    assert_eq!(payment.amount, 1234);
    assert_eq!(payment.transaction_id.as_deref(), Some("tx_1"));
}

#[tokio::test]
async fn test_declined_payment_changes_nothing() {
    let h = harness().await;
    let boot = variant(&h.engine, 9000, 2).await;
    let order = h.engine.create().await.unwrap();
    let order = add(&h.engine, &order, &boot, 2).await.unwrap();

    let err = h
        .engine
        .add_payment(order.id, AddPaymentToOrderInput { method_id: h.decline.id })
        .await
        .unwrap_err();

    assert_eq!(err.code(), OrderErrorCode::PaymentDeclined);
    assert_eq!(err.to_string(), "Payment declined: card expired");
    assert_eq!(h.declining.calls(), 1);

    let after = reload(&h.engine, &order).await;
    assert_eq!(after, order);
    assert_eq!(after.state, OrderState::Modifying);
    assert!(after.payment_id.is_none());
    assert_eq!(stock_of(&h.engine, &boot).await, 2);
}

#[tokio::test]
async fn test_payment_cannot_be_repeated() {
    let h = harness().await;
    let boot = variant(&h.engine, 9000, 5).await;
    let order = h.engine.create().await.unwrap();
    add(&h.engine, &order, &boot, 2).await.unwrap();

    let placed = h
        .engine
        .add_payment(order.id, AddPaymentToOrderInput { method_id: h.manual.id })
        .await
        .unwrap();

    for method in [&h.manual, &h.authorize] {
        let err = h
            .engine
            .add_payment(order.id, AddPaymentToOrderInput { method_id: method.id })
            .await
            .unwrap_err();
        assert_eq!(err.code(), OrderErrorCode::OrderTransitionError);
    }

    assert_eq!(reload(&h.engine, &order).await, placed);
    assert_eq!(stock_of(&h.engine, &boot).await, 3);
}

#[tokio::test]
async fn test_mutations_rejected_once_placed() {
    let h = harness().await;
    let boot = variant(&h.engine, 9000, 5).await;
    let order = h.engine.create().await.unwrap();
    add(&h.engine, &order, &boot, 1).await.unwrap();
    let line = h.engine.find_lines(order.id).await.unwrap().remove(0);
    let placed = h
        .engine
        .add_payment(order.id, AddPaymentToOrderInput { method_id: h.manual.id })
        .await
        .unwrap();

    let results = vec![
        add(&h.engine, &placed, &boot, 1).await,
        h.engine
            .update_line(line.id, UpdateOrderLineInput { quantity: 2 })
            .await,
        h.engine
            .update_line(line.id, UpdateOrderLineInput { quantity: 0 })
            .await,
        h.engine.remove_line(line.id).await,
        h.engine
            .add_customer(
                placed.id,
                CreateCustomerInput {
                    email: "late@example.com".into(),
                    ..Default::default()
                },
            )
            .await,
        h.engine.add_shipping_address(placed.id, address("Lima")).await,
        h.engine
            .add_shipment(
                placed.id,
                AddShipmentToOrderInput {
                    shipping_method_id: h.flat.id,
                },
            )
            .await,
    ];

    for result in results {
        assert_eq!(result.unwrap_err().code(), OrderErrorCode::OrderTransitionError);
    }
    assert_eq!(reload(&h.engine, &placed).await, placed);
    assert_eq!(h.engine.find_lines(placed.id).await.unwrap(), vec![line]);
}

#[tokio::test]
async fn test_payment_rechecks_stock_at_checkout() {
    let h = harness().await;
    let boot = variant(&h.engine, 9000, 5).await;
    let first = h.engine.create().await.unwrap();
    let second = h.engine.create().await.unwrap();
    add(&h.engine, &first, &boot, 3).await.unwrap();
    add(&h.engine, &second, &boot, 3).await.unwrap();

    h.engine
        .add_payment(first.id, AddPaymentToOrderInput { method_id: h.manual.id })
        .await
        .unwrap();
    let err = h
        .engine
        .add_payment(second.id, AddPaymentToOrderInput { method_id: h.manual.id })
        .await
        .unwrap_err();

    assert_eq!(err.code(), OrderErrorCode::NotEnoughStock);
    assert_eq!(reload(&h.engine, &second).await.state, OrderState::Modifying);
    assert_eq!(stock_of(&h.engine, &boot).await, 2);
}

#[tokio::test]
async fn test_payment_method_checks() {
    let h = harness().await;
    let disabled = payment_method(&h.engine, "manual", false).await;
    let unregistered = payment_method(&h.engine, "paypal", true).await;
    let order = h.engine.create().await.unwrap();

    for method_id in [disabled.id, Uuid::new_v4()] {
        let err = h
            .engine
            .add_payment(order.id, AddPaymentToOrderInput { method_id })
            .await
            .unwrap_err();
        assert_eq!(err.code(), OrderErrorCode::PaymentMethodNotFound);
    }

    let err = h
        .engine
        .add_payment(order.id, AddPaymentToOrderInput { method_id: unregistered.id })
        .await
        .unwrap_err();
    assert_eq!(err.code(), OrderErrorCode::Infrastructure);
    assert_eq!(reload(&h.engine, &order).await.state, OrderState::Modifying);
}

#[tokio::test]
async fn test_integration_failure_leaves_order_modifying() {
    let h = harness().await;
    let unreachable = payment_method(&h.engine, "unreachable", true).await;
    let boot = variant(&h.engine, 9000, 3).await;
    let order = h.engine.create().await.unwrap();
    let order = add(&h.engine, &order, &boot, 2).await.unwrap();

    let err = h
        .engine
        .add_payment(order.id, AddPaymentToOrderInput { method_id: unreachable.id })
        .await
        .unwrap_err();
    assert_eq!(err.code(), OrderErrorCode::Infrastructure);
    assert!(!err.is_business());
    assert!(format!("{err:#}").contains("provider timeout"));

    let after = reload(&h.engine, &order).await;
    assert_eq!(after, order);
    assert_eq!(after.state, OrderState::Modifying);
    assert!(after.payment_id.is_none());
    assert!(after.placed_at.is_none());
    assert!(h.engine.find_payment(order.id).await.unwrap().is_none());
    assert_eq!(stock_of(&h.engine, &boot).await, 3);
}

#[tokio::test]
async fn test_payments_recorded_only_when_committed() {
    let h = harness().await;
    let negative = payment_method(&h.engine, "negative", true).await;
    let boot = variant(&h.engine, 9000, 5).await;

    let rolled_back = h.engine.create().await.unwrap();
    add(&h.engine, &rolled_back, &boot, 1).await.unwrap();
    let err = h
        .engine
        .add_payment(rolled_back.id, AddPaymentToOrderInput { method_id: negative.id })
        .await
        .unwrap_err();
    assert_eq!(err.code(), OrderErrorCode::Infrastructure);
    assert_eq!(
        reload(&h.engine, &rolled_back).await.state,
        OrderState::Modifying
    );

    let declined = h.engine.create().await.unwrap();
    add(&h.engine, &declined, &boot, 1).await.unwrap();
    h.engine
        .add_payment(declined.id, AddPaymentToOrderInput { method_id: h.decline.id })
        .await
        .unwrap_err();

    let placed = h.engine.create().await.unwrap();
    add(&h.engine, &placed, &boot, 1).await.unwrap();
    h.engine
        .add_payment(placed.id, AddPaymentToOrderInput { method_id: h.authorize.id })
        .await
        .unwrap();

    let payments = &h.metrics.payments_total;
    assert_eq!(payments.with_label_values(&["negative", "authorized"]).get(), 0);
    assert_eq!(payments.with_label_values(&["decline", "declined"]).get(), 1);
    assert_eq!(payments.with_label_values(&["authorize", "authorized"]).get(), 1);
    assert_eq!(stock_of(&h.engine, &boot).await, 4);
}

// ============================================================================
// Inventory
// ============================================================================

#[tokio::test]
async fn test_removed_variant_is_hidden() {
    let h = harness().await;
    let scarf = variant(&h.engine, 2000, 5).await;
    let keep = variant(&h.engine, 2100, 5).await;
    let order = h.engine.create().await.unwrap();
    add(&h.engine, &order, &scarf, 1).await.unwrap();
    let line = h.engine.find_lines(order.id).await.unwrap().remove(0);

    let removed = h.engine.remove_variant(scarf.id).await.unwrap();
    assert!(removed.is_deleted());

    assert!(h.engine.find_variant(scarf.id).await.unwrap().is_none());
    assert!(h.engine.find_line_variant(line.id).await.unwrap().is_none());
    let live = h.engine.find_variants(ListInput::default()).await.unwrap();
    assert_eq!(live, vec![keep]);

    let err = add(&h.engine, &order, &scarf, 1).await.unwrap_err();
    assert_eq!(err.code(), OrderErrorCode::VariantNotFound);
    let err = h.engine.remove_variant(scarf.id).await.unwrap_err();
    assert_eq!(err.code(), OrderErrorCode::VariantNotFound);
}

#[tokio::test]
async fn test_variant_input_validation() {
    let h = harness().await;

    let err = h
        .engine
        .create_variant(CreateVariantInput {
            sku: "NEG".into(),
            price: -1,
            stock: 1,
            published: false,
        })
        .await
        .unwrap_err();
    assert_eq!(err.code(), OrderErrorCode::InvalidInput);

    let err = h
        .engine
        .update_variant(Uuid::new_v4(), UpdateVariantInput::default())
        .await
        .unwrap_err();
    assert_eq!(err.code(), OrderErrorCode::VariantNotFound);
}

// ============================================================================
// Concurrency
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_creates_get_unique_codes() {
    let h = harness().await;

    let handles: Vec<_> = (0..20)
        .map(|_| {
            let engine = h.engine.clone();
            tokio::spawn(async move { engine.create().await })
        })
        .collect();

    let mut codes = HashSet::new();
    for handle in handles {
        let order = handle.await.unwrap().unwrap();
        codes.insert(order.code);
    }
    assert_eq!(codes.len(), 20);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_payments_never_oversell() {
    let h = harness().await;
    let boot = variant(&h.engine, 9000, 5).await;

    let mut orders = Vec::new();
    for _ in 0..5 {
        let order = h.engine.create().await.unwrap();
        add(&h.engine, &order, &boot, 2).await.unwrap();
        orders.push(order);
    }

    let handles: Vec<_> = orders
        .iter()
        .map(|order| {
            let engine = h.engine.clone();
            let order_id = order.id;
            let method_id = h.manual.id;
            tokio::spawn(async move {
                engine
                    .add_payment(order_id, AddPaymentToOrderInput { method_id })
                    .await
            })
        })
        .collect();

    let mut placed = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(order) => {
                assert_eq!(order.state, OrderState::PaymentAdded);
                placed += 1;
            }
            Err(err) => assert_eq!(err.code(), OrderErrorCode::NotEnoughStock),
        }
    }

    assert_eq!(placed, 2);
    assert_eq!(stock_of(&h.engine, &boot).await, 1);
}

// ============================================================================
// Metrics
// ============================================================================

#[tokio::test]
async fn test_operations_are_recorded() {
    let h = harness().await;
    let boot = variant(&h.engine, 9000, 1).await;
    let order = h.engine.create().await.unwrap();
    add(&h.engine, &order, &boot, 1).await.unwrap();
    add(&h.engine, &order, &boot, 5).await.unwrap_err();
    h.engine
        .add_payment(order.id, AddPaymentToOrderInput { method_id: h.manual.id })
        .await
        .unwrap();

    let gathered = h.metrics.registry().gather();
    let ops = gathered
        .iter()
        .find(|m| m.name() == "order_operations_total")
        .unwrap();
    let rejected = ops
        .metric
        .iter()
        .find(|m| {
            m.label.iter().any(|l| l.value() == "add_line")
                && m.label.iter().any(|l| l.value() == "rejected")
        })
        .unwrap();
    assert_eq!(rejected.counter.value, Some(1.0));

    assert_eq!(h.metrics.orders_created_total.get(), 1);
    assert_eq!(h.metrics.stock_committed_units_total.get(), 1);
}
