use serde::{Deserialize, Serialize};

use super::errors::CustomerError;

// ============================================================================
// Customer Value Objects
// ============================================================================

/// Customer email address, validated on construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Email(String);

impl Email {
    /// Parses and normalizes (trims, lowercases the domain) an email address.
    pub fn parse(raw: &str) -> Result<Self, CustomerError> {
        let email = raw.trim();
        if email.is_empty() {
            return Err(CustomerError::EmptyEmail);
        }

        let invalid = || CustomerError::InvalidEmail(raw.to_string());

        if email.chars().any(char::is_whitespace) {
            return Err(invalid());
        }

        let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
        if local.is_empty() || domain.contains('@') {
            return Err(invalid());
        }

        // Domain needs at least one dot and no empty labels ("a@b", "a@.com", "a@b..c")
        let labels: Vec<&str> = domain.split('.').collect();
        if labels.len() < 2 || labels.iter().any(|label| label.is_empty()) {
            return Err(invalid());
        }

        Ok(Self(format!("{}@{}", local, domain.to_ascii_lowercase())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Shipping address as captured on an order.
///
/// Attaching an address copies it onto the order; later changes elsewhere
/// never reach orders that already hold a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
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

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_emails() {
        for raw in ["ana@example.com", "first.last+tag@shop.co.uk", "  x@y.io  "] {
            assert!(Email::parse(raw).is_ok(), "{raw} should be valid");
        }
    }

    #[test]
    fn test_email_domain_is_normalized() {
        let email = Email::parse("Ana@Example.COM").unwrap();
        assert_eq!(email.as_str(), "Ana@example.com");
    }

    #[test]
    fn test_invalid_emails() {
        for raw in [
            "plainaddress",
            "@example.com",
            "ana@",
            "ana@localhost",
            "ana@@example.com",
            "ana@example..com",
            "ana smith@example.com",
        ] {
            assert!(
                matches!(Email::parse(raw), Err(CustomerError::InvalidEmail(_))),
                "{raw} should be rejected"
            );
        }
    }

    #[test]
    fn test_empty_email() {
        assert!(matches!(Email::parse("   "), Err(CustomerError::EmptyEmail)));
    }
}
