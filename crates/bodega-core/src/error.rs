//! # Error Types
//!
//! Domain-specific error types for bodega-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  bodega-core errors (this file)                                        │
//! │  ├── CoreError        - Catalog, offer, cart and ledger failures       │
//! │  ├── AuthError        - Login and employee directory failures          │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  bodega-db errors (separate crate)                                     │
//! │  └── DbError          - Cache store failures                           │
//! │                                                                         │
//! │  Terminal errors (in app)                                              │
//! │  └── ApiError         - What the cashier sees                          │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError/AuthError → ApiError → Cashier      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Wrong credentials are deliberately NOT an error: `AuthManager::login`
//! answers `Ok(false)` so the login form can show a single generic message.

use thiserror::Error;

use crate::money::Money;

// =============================================================================
// Core Error
// =============================================================================

/// Business rule violations raised by the catalog, offers, cart and ledger.
///
/// Every operation that returns one of these leaves its store untouched.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Product id is not in the catalog.
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// Product id has no line in the current cart.
    #[error("Product {0} is not in the cart")]
    LineNotFound(String),

    /// A cart mutation arrived while nobody is logged in at the terminal.
    #[error("No employee is bound to the cart")]
    NoActiveUser,

    /// Requested cart quantity is above the shelf stock.
    ///
    /// ## User Workflow
    /// ```text
    /// Scan Inca Kola (already 150 in cart)
    ///      │
    ///      ▼
    /// Check stock: available=150
    ///      │
    ///      ▼
    /// InsufficientStock { code: "P001", available: 150, requested: 151 }
    ///      │
    ///      ▼
    /// Cashier sees: "Only 150 units of P001 in stock"
    /// ```
    #[error("Insufficient stock for {code}: available {available}, requested {requested}")]
    InsufficientStock {
        code: String,
        available: i64,
        requested: i64,
    },

    /// Cart has exceeded maximum allowed lines.
    #[error("Cart cannot have more than {max} items")]
    CartTooLarge { max: usize },

    /// Line quantity exceeds maximum allowed.
    #[error("Quantity {requested} exceeds maximum allowed ({max})")]
    QuantityTooLarge { requested: i64, max: i64 },

    /// Offer id is not registered.
    #[error("Offer not found: {0}")]
    OfferNotFound(String),

    /// Sale id (or ticket) is unknown to the ledger.
    #[error("Sale not found: {0}")]
    SaleNotFound(String),

    /// Checkout was attempted with no lines.
    #[error("Cannot complete a sale without items")]
    EmptySale,

    /// Refund asks for more units than remain refundable on the sale.
    #[error("Cannot refund {requested} of {product_id}: only {refundable} left on the sale")]
    RefundExceedsSale {
        product_id: String,
        refundable: i64,
        requested: i64,
    },

    /// Refund line names a product the sale never contained.
    #[error("Product {product_id} is not part of sale {sale_id}")]
    ProductNotInSale { sale_id: String, product_id: String },

    /// Sale has already been fully refunded.
    #[error("Sale {0} has already been fully refunded")]
    AlreadyRefunded(String),

    /// Cash handed over does not cover the amount due.
    #[error("Insufficient payment: due {due}, received {received}")]
    InsufficientTender { due: Money, received: Money },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Auth Error
// =============================================================================

/// Failures from the employee directory and session manager.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Credentials were right but the employee has been deactivated.
    #[error("Account is inactive")]
    AccountInactive,

    /// Employee already holds an active session at another terminal.
    #[error("User already has an active session at terminal {terminal_id}")]
    ConcurrentSessionConflict { terminal_id: String },

    /// Employee id or code is not in the directory.
    #[error("User not found: {0}")]
    UserNotFound(String),

    /// Argon2 rejected the parameters or the input.
    #[error("Password hashing failed: {0}")]
    PasswordHash(String),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when user input doesn't meet requirements.
/// Used for early validation before business logic runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., code with spaces, reversed date range).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Duplicate value (e.g., duplicate product code).
    #[error("{field} '{value}' already exists")]
    Duplicate { field: String, value: String },
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

/// Convenience type alias for Results with AuthError.
pub type AuthResult<T> = Result<T, AuthError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::InsufficientStock {
            code: "P001".to_string(),
            available: 3,
            requested: 5,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for P001: available 3, requested 5"
        );

        let err = CoreError::InsufficientTender {
            due: Money::from_cents(590),
            received: Money::from_cents(500),
        };
        assert_eq!(
            err.to_string(),
            "Insufficient payment: due S/ 5.90, received S/ 5.00"
        );
    }

    #[test]
    fn test_auth_error_messages() {
        let err = AuthError::ConcurrentSessionConflict {
            terminal_id: "T-02".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "User already has an active session at terminal T-02"
        );
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "reason".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
        assert_eq!(core_err.to_string(), "Validation error: reason is required");
    }
}
