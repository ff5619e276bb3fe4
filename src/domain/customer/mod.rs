// ============================================================================
// Customer Domain
// ============================================================================
//
// - Value objects (Email, Address snapshot)
// - Inputs (CreateCustomerInput, CreateAddressInput)
// - Errors (CustomerError enum)
// - Customer entity with profile merge
//
// ============================================================================

pub mod value_objects;
pub mod commands;
pub mod errors;
pub mod aggregate;

// Re-export for convenience
pub use value_objects::*;
pub use commands::*;
pub use errors::*;
pub use aggregate::*;
