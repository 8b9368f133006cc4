//! # API Error Type
//!
//! Unified error type for terminal operations.
//!
//! ## Error Handling Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Flow in Bodega POS                             │
//! │                                                                         │
//! │  Shell                       Terminal                                   │
//! │  ─────                       ────────                                   │
//! │                                                                         │
//! │  > scan 7501234567890 200                                               │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │  Terminal::scan → Result<T, ApiError>                            │  │
//! │  │         │                                                        │  │
//! │  │         ▼                                                        │  │
//! │  │  Cache Error? ─── DbError::QueryFailed("...") ────┐             │  │
//! │  │         │                                          │             │  │
//! │  │         ▼                                          ▼             │  │
//! │  │  Business Error? ─ CoreError::InsufficientStock ─ ApiError ────►│  │
//! │  │         │                                                        │  │
//! │  │         ▼                                                        │  │
//! │  │  Success ──────────────────────────────────────────────────────►│  │
//! │  └──────────────────────────────────────────────────────────────────┘  │
//! │                                                                         │
//! │  ✗ [INSUFFICIENT_STOCK] Only 150 units of P001 in stock                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::Serialize;

use bodega_core::{AuthError, CoreError, ValidationError};
use bodega_db::DbError;

use crate::config::ConfigError;

/// Error returned from terminal operations.
///
/// ## Serialization
/// ```json
/// {
///   "code": "NOT_FOUND",
///   "message": "Sale not found: T1718000000000"
/// }
/// ```
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    /// Machine-readable error code for programmatic handling
    pub code: ErrorCode,

    /// Human-readable error message for display
    pub message: String,
}

/// Error codes shown next to every failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Product, sale, offer or user not found
    NotFound,

    /// Input validation failed
    ValidationError,

    /// Cache store failed
    DatabaseError,

    /// Business rule refused the operation
    BusinessLogic,

    /// Unexpected failure
    Internal,

    /// Cart operation failed
    CartError,

    /// Insufficient stock
    InsufficientStock,

    /// Tender does not cover the amount due
    PaymentError,

    /// Wrong employee code or password
    InvalidCredentials,

    /// Employee has been deactivated
    AccountInactive,

    /// Employee is logged in at another terminal
    SessionConflict,

    /// Operation needs a logged-in employee
    NotLoggedIn,

    /// Refund needs a reason
    EmptyRefundReason,

    /// Bad configuration
    ConfigError,
}

impl ApiError {
    /// Creates a new API error.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        ApiError {
            code,
            message: message.into(),
        }
    }

    /// Creates a not found error.
    pub fn not_found(resource: &str, id: &str) -> Self {
        ApiError::new(
            ErrorCode::NotFound,
            format!("{} not found: {}", resource, id),
        )
    }

    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::ValidationError, message)
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::Internal, message)
    }

    /// Creates a cart error.
    pub fn cart(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::CartError, message)
    }

    pub fn invalid_credentials() -> Self {
        ApiError::new(ErrorCode::InvalidCredentials, "Invalid employee code or password")
    }

    pub fn not_logged_in() -> Self {
        ApiError::new(ErrorCode::NotLoggedIn, "No employee is logged in")
    }
}

/// Converts cache store errors to API errors.
impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::ConnectionFailed(_) => {
                ApiError::new(ErrorCode::DatabaseError, "Database connection failed")
            }
            DbError::MigrationFailed(_) => {
                ApiError::new(ErrorCode::DatabaseError, "Database migration failed")
            }
            DbError::QueryFailed(e) => {
                // Log the actual error but return a generic message
                tracing::error!("Database query failed: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Database operation failed")
            }
            DbError::PoolExhausted => {
                ApiError::new(ErrorCode::DatabaseError, "Database pool exhausted")
            }
            err @ (DbError::Serialization(_)
            | DbError::UnsupportedVersion { .. }
            | DbError::MigrationHookFailed { .. }) => {
                tracing::error!("Cached data unusable: {}", err);
                ApiError::new(ErrorCode::DatabaseError, err.to_string())
            }
            DbError::Internal(e) => {
                tracing::error!("Internal database error: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Database operation failed")
            }
        }
    }
}

/// Converts core errors to API errors.
impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ProductNotFound(id) => ApiError::not_found("Product", &id),
            CoreError::OfferNotFound(id) => ApiError::not_found("Offer", &id),
            CoreError::SaleNotFound(id) => ApiError::not_found("Sale", &id),
            CoreError::LineNotFound(id) => {
                ApiError::cart(format!("Product {} is not in the cart", id))
            }
            CoreError::NoActiveUser => ApiError::not_logged_in(),
            CoreError::InsufficientStock {
                code, available, ..
            } => ApiError::new(
                ErrorCode::InsufficientStock,
                format!("Only {} units of {} in stock", available, code),
            ),
            err @ (CoreError::CartTooLarge { .. } | CoreError::EmptySale) => {
                ApiError::cart(err.to_string())
            }
            err @ CoreError::QuantityTooLarge { .. } => ApiError::validation(err.to_string()),
            err @ (CoreError::RefundExceedsSale { .. }
            | CoreError::ProductNotInSale { .. }
            | CoreError::AlreadyRefunded(_)) => {
                ApiError::new(ErrorCode::BusinessLogic, err.to_string())
            }
            err @ CoreError::InsufficientTender { .. } => {
                ApiError::new(ErrorCode::PaymentError, err.to_string())
            }
            CoreError::Validation(e) => e.into(),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::AccountInactive => {
                ApiError::new(ErrorCode::AccountInactive, "This account has been deactivated")
            }
            err @ AuthError::ConcurrentSessionConflict { .. } => {
                ApiError::new(ErrorCode::SessionConflict, err.to_string())
            }
            AuthError::UserNotFound(id) => ApiError::not_found("User", &id),
            AuthError::PasswordHash(e) => {
                tracing::error!("Password hashing failed: {}", e);
                ApiError::internal("Could not verify credentials")
            }
            AuthError::Validation(e) => e.into(),
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        match &err {
            ValidationError::Required { field } if field == "reason" => {
                ApiError::new(ErrorCode::EmptyRefundReason, "A refund needs a reason")
            }
            _ => ApiError::validation(err.to_string()),
        }
    }
}

impl From<ConfigError> for ApiError {
    fn from(err: ConfigError) -> Self {
        ApiError::new(ErrorCode::ConfigError, err.to_string())
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

/// Convenience alias for terminal operations.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use bodega_core::Money;

    #[test]
    fn test_stock_message_names_available_quantity() {
        let err: ApiError = CoreError::InsufficientStock {
            code: "P001".to_string(),
            available: 150,
            requested: 151,
        }
        .into();

        assert_eq!(err.code, ErrorCode::InsufficientStock);
        assert_eq!(err.message, "Only 150 units of P001 in stock");
    }

    #[test]
    fn test_tender_maps_to_payment_error() {
        let err: ApiError = CoreError::InsufficientTender {
            due: Money::from_cents(470),
            received: Money::from_cents(400),
        }
        .into();
        assert_eq!(err.code, ErrorCode::PaymentError);
    }

    #[test]
    fn test_empty_reason_has_its_own_code() {
        let err: ApiError = CoreError::Validation(ValidationError::Required {
            field: "reason".to_string(),
        })
        .into();
        assert_eq!(err.code, ErrorCode::EmptyRefundReason);
    }

    #[test]
    fn test_serialization_shape() {
        let err = ApiError::not_found("Sale", "T1");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["code"], "NOT_FOUND");
        assert_eq!(json["message"], "Sale not found: T1");
    }

    #[test]
    fn test_session_conflict() {
        let err: ApiError = AuthError::ConcurrentSessionConflict {
            terminal_id: "CAJA-02".to_string(),
        }
        .into();
        assert_eq!(err.code, ErrorCode::SessionConflict);
        assert!(err.message.contains("CAJA-02"));
    }
}
