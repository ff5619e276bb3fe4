use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A configured way of paying, settled through the integration registered
/// under `integration_code`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentMethod {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub integration_code: String,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
}

/// Settlement record of one order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    pub method_id: Uuid,
    pub amount: i64,
    pub transaction_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Payment {
    pub fn new(method_id: Uuid, amount: i64, transaction_id: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            method_id,
            amount,
            transaction_id,
            created_at: Utc::now(),
        }
    }
}

/// What a payment integration reports back for an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PaymentIntegrationResult {
    /// Payment registered; it is settled for the order total.
    Created,
    /// Funds authorized by the provider for `amount`.
    Authorized {
        amount: i64,
        transaction_id: Option<String>,
    },
    Declined { reason: Option<String> },
}

impl PaymentIntegrationResult {
    pub fn status(&self) -> &'static str {
        match self {
            PaymentIntegrationResult::Created => "created",
            PaymentIntegrationResult::Authorized { .. } => "authorized",
            PaymentIntegrationResult::Declined { .. } => "declined",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePaymentMethodInput {
    pub name: String,
    pub description: Option<String>,
    pub integration_code: String,
    pub enabled: bool,
}

impl From<CreatePaymentMethodInput> for PaymentMethod {
    fn from(input: CreatePaymentMethodInput) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: input.name,
            description: input.description,
            integration_code: input.integration_code,
            enabled: input.enabled,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddPaymentToOrderInput {
    pub method_id: Uuid,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integration_result_wire_shape() {
        let authorized: PaymentIntegrationResult = serde_json::from_str(
            r#"{"status":"authorized","amount":2500,"transaction_id":"ch_123"}"#,
        )
        .unwrap();
        assert_eq!(
            authorized,
            PaymentIntegrationResult::Authorized {
                amount: 2500,
                transaction_id: Some("ch_123".into()),
            }
        );

        let declined: PaymentIntegrationResult =
            serde_json::from_str(r#"{"status":"declined","reason":null}"#).unwrap();
        assert_eq!(declined.status(), "declined");
    }
}
