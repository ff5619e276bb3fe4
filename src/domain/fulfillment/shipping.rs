use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A configured way of shipping, priced by the calculator registered under
/// `price_calculator_code`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShippingMethod {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub price_calculator_code: String,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
}

/// Priced instance of a shipping method for one order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shipment {
    pub id: Uuid,
    pub method_id: Uuid,
    pub amount: i64,
    pub created_at: DateTime<Utc>,
}

impl Shipment {
    pub fn new(method_id: Uuid, amount: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            method_id,
            amount,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateShippingMethodInput {
    pub name: String,
    pub description: Option<String>,
    pub price_calculator_code: String,
    pub enabled: bool,
}

impl From<CreateShippingMethodInput> for ShippingMethod {
    fn from(input: CreateShippingMethodInput) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: input.name,
            description: input.description,
            price_calculator_code: input.price_calculator_code,
            enabled: input.enabled,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddShipmentToOrderInput {
    pub shipping_method_id: Uuid,
}
