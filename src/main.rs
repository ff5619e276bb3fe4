use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use order_engine::config::{AppConfig, EngineConfig};
use order_engine::domain::customer::{CreateAddressInput, CreateCustomerInput};
use order_engine::domain::fulfillment::{
    AddPaymentToOrderInput, AddShipmentToOrderInput, CreatePaymentMethodInput,
    CreateShippingMethodInput,
};
use order_engine::domain::inventory::CreateVariantInput;
use order_engine::domain::order::CreateOrderLineInput;
use order_engine::integrations::{
    FlatRateCalculator, ManualPaymentIntegration, PaymentIntegrationRegistry,
    ShippingCalculatorRegistry,
};
use order_engine::metrics;
use order_engine::{OrderEngine, PgStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Default to INFO level, can be overridden with RUST_LOG env var
    // Example: RUST_LOG=debug cargo run
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,order_engine=debug")),
        )
        .init();

    tracing::info!("🚀 Starting order engine");

    let config = AppConfig::from_env()?;

    // === 1. Postgres ===
    let store = PgStore::connect(&config.database).await?;
    store.migrate().await?;

    // === 2. Prometheus metrics ===
    let metrics = Arc::new(metrics::Metrics::new()?);
    let metrics_registry = Arc::new(metrics.registry().clone());
    let metrics_port = config.metrics_port;
    std::thread::spawn(move || {
        let rt = match tokio::runtime::Runtime::new() {
            Ok(rt) => rt,
            Err(e) => {
                tracing::error!("Metrics runtime error: {}", e);
                return;
            }
        };
        rt.block_on(async {
            if let Err(e) = metrics::start_metrics_server(metrics_registry, metrics_port).await {
                tracing::error!("Metrics server error: {}", e);
            }
        });
    });

    // === 3. Strategies ===
    let shipping = ShippingCalculatorRegistry::new()
        .with(Arc::new(FlatRateCalculator::new("flat-rate", 1500)))?;
    let payments = PaymentIntegrationRegistry::new()
        .with(Arc::new(ManualPaymentIntegration::new("manual")))?;
    tracing::info!(
        calculators = ?shipping.codes(),
        integrations = ?payments.codes(),
        "Strategies registered"
    );

    let engine = OrderEngine::new(store, EngineConfig::new(shipping, payments))
        .with_metrics(metrics.clone());

    // === 4. Demo lifecycle ===
    tracing::info!("📝 Demonstrating order lifecycle");

    let standard = engine
        .create_shipping_method(CreateShippingMethodInput {
            name: "Standard".to_string(),
            description: Some("Flat rate, 3-5 days".to_string()),
            price_calculator_code: "flat-rate".to_string(),
            enabled: true,
        })
        .await?;
    let cash = engine
        .create_payment_method(CreatePaymentMethodInput {
            name: "Cash on delivery".to_string(),
            description: None,
            integration_code: "manual".to_string(),
            enabled: true,
        })
        .await?;
    let variant = engine
        .create_variant(CreateVariantInput {
            sku: "TSHIRT-BLK-M".to_string(),
            price: 2500,
            stock: 10,
            published: true,
        })
        .await?;

    let order = engine.create().await?;
    engine
        .add_line(
            order.id,
            CreateOrderLineInput {
                variant_id: variant.id,
                quantity: 2,
            },
        )
        .await?;
    engine
        .add_customer(
            order.id,
            CreateCustomerInput {
                email: "ana@example.com".to_string(),
                first_name: Some("Ana".to_string()),
                last_name: Some("Torres".to_string()),
                phone_number: None,
            },
        )
        .await?;
    engine
        .add_shipping_address(
            order.id,
            CreateAddressInput {
                full_name: "Ana Torres".to_string(),
                street_line_1: "Av. Larco 1150".to_string(),
                street_line_2: None,
                city: "Lima".to_string(),
                province: "Lima".to_string(),
                postal_code: "15074".to_string(),
                country: "PE".to_string(),
                phone_number: None,
                references: None,
            },
        )
        .await?;
    engine
        .add_shipment(
            order.id,
            AddShipmentToOrderInput {
                shipping_method_id: standard.id,
            },
        )
        .await?;
    let order = engine
        .add_payment(order.id, AddPaymentToOrderInput { method_id: cash.id })
        .await?;

    tracing::info!(
        code = %order.code,
        state = %order.state,
        total = order.total,
        "✅ Order placed"
    );

    // Keep serving /metrics until interrupted
    tracing::info!("⏳ Running, press Ctrl+C to exit");
    tokio::signal::ctrl_c().await?;

    tracing::info!("🎉 Shutdown complete");
    Ok(())
}
