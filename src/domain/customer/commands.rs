use serde::{Deserialize, Serialize};

use super::value_objects::Address;

// ============================================================================
// Customer Inputs
// ============================================================================

/// Customer data supplied when binding a customer to an order.
///
/// `email` is the lookup key; the profile fields are merged over an existing
/// customer with the same email.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateCustomerInput {
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone_number: Option<String>,
}

/// Address fields for an order's shipping address snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAddressInput {
    pub full_name: String,
    pub street_line_1: String,
    pub street_line_2: Option<String>,
    pub city: String,
    pub province: String,
    pub postal_code: String,
    pub country: String,
    pub phone_number: Option<String>,
    pub references: Option<String>,
}

impl From<CreateAddressInput> for Address {
    fn from(input: CreateAddressInput) -> Self {
        Address {
            full_name: input.full_name,
            street_line_1: input.street_line_1,
            street_line_2: input.street_line_2,
            city: input.city,
            province: input.province,
            postal_code: input.postal_code,
            country: input.country,
            phone_number: input.phone_number,
            references: input.references,
        }
    }
}
