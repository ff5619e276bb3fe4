use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::commands::CreateCustomerInput;
use super::value_objects::Email;

// ============================================================================
// Customer - shared across orders, keyed by email
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub id: Uuid,
    pub email: Email,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone_number: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Customer {
    pub fn new(email: Email, input: CreateCustomerInput) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            email,
            first_name: input.first_name,
            last_name: input.last_name,
            phone_number: input.phone_number,
            created_at: now,
            updated_at: now,
        }
    }

    /// Overwrites stored profile fields with the ones present in `input`.
    /// Fields left as `None` keep their current value.
    pub fn merge(&mut self, input: CreateCustomerInput) {
        if let Some(first_name) = input.first_name {
            self.first_name = Some(first_name);
        }
        if let Some(last_name) = input.last_name {
            self.last_name = Some(last_name);
        }
        if let Some(phone_number) = input.phone_number {
            self.phone_number = Some(phone_number);
        }
        self.updated_at = Utc::now();
    }
}
