use crate::domain::order::OrderError;

// ============================================================================
// Customer Business Rule Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum CustomerError {
    #[error("Email cannot be empty")]
    EmptyEmail,

    #[error("Invalid email format: {0}")]
    InvalidEmail(String),
}

impl From<CustomerError> for OrderError {
    fn from(err: CustomerError) -> Self {
        match err {
            CustomerError::EmptyEmail => OrderError::InvalidEmail(String::new()),
            CustomerError::InvalidEmail(raw) => OrderError::InvalidEmail(raw),
        }
    }
}
