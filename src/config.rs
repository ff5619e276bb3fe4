use anyhow::{Context, Result};

use crate::integrations::{PaymentIntegrationRegistry, ShippingCalculatorRegistry};

// ============================================================================
// Configuration
// ============================================================================
//
// Process settings come from the environment. The strategy registries are
// assembled in code by whoever builds the engine.
//
// ============================================================================

pub const ENV_DATABASE_URL: &str = "ORDER_ENGINE_DATABASE_URL";
pub const ENV_DB_MAX_CONNECTIONS: &str = "ORDER_ENGINE_DB_MAX_CONNECTIONS";
pub const ENV_METRICS_PORT: &str = "ORDER_ENGINE_METRICS_PORT";

const DEFAULT_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_METRICS_PORT: u16 = 9090;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub metrics_port: u16,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let url = lookup(ENV_DATABASE_URL)
            .filter(|v| !v.trim().is_empty())
            .with_context(|| format!("missing env var {ENV_DATABASE_URL}"))?;

        let max_connections = match lookup(ENV_DB_MAX_CONNECTIONS) {
            Some(raw) => raw
                .trim()
                .parse()
                .with_context(|| format!("invalid {ENV_DB_MAX_CONNECTIONS}: {raw}"))?,
            None => DEFAULT_MAX_CONNECTIONS,
        };

        let metrics_port = match lookup(ENV_METRICS_PORT) {
            Some(raw) => raw
                .trim()
                .parse()
                .with_context(|| format!("invalid {ENV_METRICS_PORT}: {raw}"))?,
            None => DEFAULT_METRICS_PORT,
        };

        Ok(Self {
            database: DatabaseConfig {
                url,
                max_connections,
            },
            metrics_port,
        })
    }
}

/// Strategies the engine resolves by the codes stored on shipping and
/// payment methods.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    pub shipping: ShippingCalculatorRegistry,
    pub payments: PaymentIntegrationRegistry,
}

impl EngineConfig {
    pub fn new(shipping: ShippingCalculatorRegistry, payments: PaymentIntegrationRegistry) -> Self {
        Self { shipping, payments }
    }
}
