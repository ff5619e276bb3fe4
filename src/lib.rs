// ============================================================================
// order_engine - order lifecycle engine for an e-commerce back office
// ============================================================================
//
// - domain: entities, inputs, errors and the transition table
// - engine: the operations (lines, customer, fulfillment, lookup, catalog)
// - store: transactional persistence (Postgres, in-memory)
// - integrations: shipping price calculators and payment integrations
//
// ============================================================================

pub mod config;
pub mod domain;
pub mod engine;
pub mod integrations;
pub mod metrics;
pub mod store;
pub mod utils;

pub use config::{AppConfig, EngineConfig};
pub use domain::order::{Order, OrderError, OrderErrorCode, OrderState};
pub use engine::OrderEngine;
pub use store::{MemoryStore, OrderStore, PgStore, StoreTransaction};
