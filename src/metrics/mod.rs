mod server;

use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry};

pub use server::start_metrics_server;

// ============================================================================
// Metrics Module - Prometheus metrics for the order engine
// ============================================================================
//
// - Engine operations (count and latency, by outcome)
// - Orders created and placed
// - Payment integration results
// - Stock committed at checkout
//
// Outcome label values: "ok", "rejected" (business error), "error"
// (infrastructure failure). Scraped via /metrics.
// ============================================================================

pub struct Metrics {
    registry: Registry,

    pub orders_created_total: IntCounter,
    pub orders_placed_total: IntCounterVec,

    pub operations_total: IntCounterVec,
    pub operation_duration: HistogramVec,

    pub payments_total: IntCounterVec,
    pub stock_committed_units_total: IntCounter,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let orders_created_total =
            IntCounter::new("orders_created_total", "Total orders created")?;
        registry.register(Box::new(orders_created_total.clone()))?;

        let orders_placed_total = IntCounterVec::new(
            Opts::new("orders_placed_total", "Total orders placed, by resulting state"),
            &["state"],
        )?;
        registry.register(Box::new(orders_placed_total.clone()))?;

        let operations_total = IntCounterVec::new(
            Opts::new("order_operations_total", "Total engine operations"),
            &["operation", "outcome"],
        )?;
        registry.register(Box::new(operations_total.clone()))?;

        let operation_duration = HistogramVec::new(
            HistogramOpts::new("order_operation_duration_seconds", "Engine operation duration")
                .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
            &["operation"],
        )?;
        registry.register(Box::new(operation_duration.clone()))?;

        let payments_total = IntCounterVec::new(
            Opts::new("payments_total", "Payment integration results"),
            &["integration", "status"],
        )?;
        registry.register(Box::new(payments_total.clone()))?;

        let stock_committed_units_total = IntCounter::new(
            "stock_committed_units_total",
            "Units removed from variant stock by placed orders",
        )?;
        registry.register(Box::new(stock_committed_units_total.clone()))?;

        Ok(Self {
            registry,
            orders_created_total,
            orders_placed_total,
            operations_total,
            operation_duration,
            payments_total,
            stock_committed_units_total,
        })
    }

    /// Get the Prometheus registry for exposing metrics via HTTP
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn record_operation(&self, operation: &str, outcome: &str, duration_secs: f64) {
        self.operations_total.with_label_values(&[operation, outcome]).inc();
        self.operation_duration.with_label_values(&[operation]).observe(duration_secs);
    }

    pub fn record_payment(&self, integration: &str, status: &str) {
        self.payments_total.with_label_values(&[integration, status]).inc();
    }

    pub fn record_order_placed(&self, state: &str, units: u64) {
        self.orders_placed_total.with_label_values(&[state]).inc();
        self.stock_committed_units_total.inc_by(units);
    }
}
