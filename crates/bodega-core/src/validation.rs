//! # Validation Module
//!
//! Input validation utilities for Bodega POS.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Form renderer (external)                                     │
//! │  ├── Basic format checks (empty, length)                               │
//! │  └── Immediate cashier feedback                                        │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Terminal service (Rust)                                      │
//! │  ├── Type validation (parsing)                                         │
//! │  └── THIS MODULE: Business rule validation                             │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Stores (catalog, offers, ledger)                             │
//! │  ├── Uniqueness (code, barcode, employee code)                         │
//! │  └── Stock and refundable quantity checks                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use bodega_core::validation::{validate_code, validate_quantity, validate_refund_reason};
//!
//! assert!(validate_code("P001").is_ok());
//! assert!(validate_quantity(5).is_ok());
//! assert!(validate_refund_reason("   ").is_err());
//! ```

use chrono::{DateTime, Utc};

use crate::error::ValidationError;
use crate::money::Money;
use crate::{MAX_CART_ITEMS, MAX_ITEM_QUANTITY};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

fn required(field: &str) -> ValidationError {
    ValidationError::Required {
        field: field.to_string(),
    }
}

fn too_long(field: &str, max: usize) -> ValidationError {
    ValidationError::TooLong {
        field: field.to_string(),
        max,
    }
}

// =============================================================================
// String Validators
// =============================================================================

/// Validates a product code.
///
/// ## Rules
/// - Must not be empty
/// - At most 50 characters
/// - Letters, numbers, hyphens and underscores only
///
/// ## Example
/// ```rust
/// use bodega_core::validation::validate_code;
///
/// assert!(validate_code("P001").is_ok());
/// assert!(validate_code("").is_err());
/// assert!(validate_code("P 001").is_err());
/// ```
pub fn validate_code(code: &str) -> ValidationResult<()> {
    let code = code.trim();

    if code.is_empty() {
        return Err(required("code"));
    }

    if code.len() > 50 {
        return Err(too_long("code", 50));
    }

    if !code
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::InvalidFormat {
            field: "code".to_string(),
            reason: "must contain only letters, numbers, hyphens, and underscores".to_string(),
        });
    }

    Ok(())
}

/// Validates a barcode: non-empty, digits only, at most 20 digits.
pub fn validate_barcode(barcode: &str) -> ValidationResult<()> {
    let barcode = barcode.trim();

    if barcode.is_empty() {
        return Err(required("barcode"));
    }

    if barcode.len() > 20 {
        return Err(too_long("barcode", 20));
    }

    if !barcode.chars().all(|c| c.is_ascii_digit()) {
        return Err(ValidationError::InvalidFormat {
            field: "barcode".to_string(),
            reason: "must contain only digits".to_string(),
        });
    }

    Ok(())
}

/// Validates a product description (1-200 characters).
pub fn validate_description(description: &str) -> ValidationResult<()> {
    let description = description.trim();

    if description.is_empty() {
        return Err(required("description"));
    }

    if description.chars().count() > 200 {
        return Err(too_long("description", 200));
    }

    Ok(())
}

/// Validates a category name (1-50 characters).
pub fn validate_category(category: &str) -> ValidationResult<()> {
    let category = category.trim();

    if category.is_empty() {
        return Err(required("category"));
    }

    if category.chars().count() > 50 {
        return Err(too_long("category", 50));
    }

    Ok(())
}

/// Validates a search query.
///
/// ## Rules
/// - Can be empty (matches every active product)
/// - Maximum 100 characters
///
/// ## Returns
/// The trimmed query string.
pub fn validate_search_query(query: &str) -> ValidationResult<String> {
    let query = query.trim();

    if query.len() > 100 {
        return Err(too_long("query", 100));
    }

    Ok(query.to_string())
}

/// Validates the free-text reason attached to a refund.
///
/// The ledger itself accepts any reason; the terminal calls this first so an
/// empty reason never reaches it.
pub fn validate_refund_reason(reason: &str) -> ValidationResult<()> {
    let reason = reason.trim();

    if reason.is_empty() {
        return Err(required("reason"));
    }

    if reason.chars().count() > 500 {
        return Err(too_long("reason", 500));
    }

    Ok(())
}

/// Validates an employee login code (digits, 1-10 characters).
pub fn validate_employee_code(code: &str) -> ValidationResult<()> {
    let code = code.trim();

    if code.is_empty() {
        return Err(required("employee code"));
    }

    if code.len() > 10 {
        return Err(too_long("employee code", 10));
    }

    if !code.chars().all(|c| c.is_ascii_digit()) {
        return Err(ValidationError::InvalidFormat {
            field: "employee code".to_string(),
            reason: "must contain only digits".to_string(),
        });
    }

    Ok(())
}

/// Validates a new password (1-128 characters).
pub fn validate_password(password: &str) -> ValidationResult<()> {
    if password.is_empty() {
        return Err(required("password"));
    }

    if password.chars().count() > 128 {
        return Err(too_long("password", 128));
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a quantity value.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_ITEM_QUANTITY (999)
///
/// ## Cashier Workflow
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  Cart: Add Line                                                         │
/// │                                                                         │
/// │  Cashier enters quantity: 5                                            │
/// │       │                                                                 │
/// │       ▼                                                                 │
/// │  validate_quantity(5) ← THIS FUNCTION                                  │
/// │       │                                                                 │
/// │       ├── qty <= 0? → Error: "quantity must be positive"               │
/// │       │                                                                 │
/// │       ├── qty > 999? → Error: "quantity must be between 1 and 999"     │
/// │       │                                                                 │
/// │       └── OK → stock check in the cart engine                          │
/// │                                                                         │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a price. Zero is allowed (free items), negative is not.
///
/// ## Example
/// ```rust
/// use bodega_core::money::Money;
/// use bodega_core::validation::validate_price;
///
/// assert!(validate_price(Money::from_cents(250)).is_ok());
/// assert!(validate_price(Money::zero()).is_ok());
/// assert!(validate_price(Money::from_cents(-1)).is_err());
/// ```
pub fn validate_price(price: Money) -> ValidationResult<()> {
    if price.is_negative() {
        return Err(ValidationError::OutOfRange {
            field: "price".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Ok(())
}

/// Validates a stock level (>= 0).
pub fn validate_stock(stock: i64) -> ValidationResult<()> {
    if stock < 0 {
        return Err(ValidationError::OutOfRange {
            field: "stock".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Ok(())
}

/// Validates a tax rate in basis points (0% to 100%).
pub fn validate_tax_rate_bps(bps: u32) -> ValidationResult<()> {
    if bps > 10000 {
        return Err(ValidationError::OutOfRange {
            field: "tax_rate".to_string(),
            min: 0,
            max: 10000,
        });
    }

    Ok(())
}

// =============================================================================
// Collection Validators
// =============================================================================

/// Validates cart size before adding a new distinct line.
pub fn validate_cart_size(current_items: usize) -> ValidationResult<()> {
    if current_items >= MAX_CART_ITEMS {
        return Err(ValidationError::OutOfRange {
            field: "cart items".to_string(),
            min: 0,
            max: MAX_CART_ITEMS as i64,
        });
    }

    Ok(())
}

// =============================================================================
// Date Validators
// =============================================================================

/// Validates an offer window: start must not be after end.
pub fn validate_date_range(start: DateTime<Utc>, end: DateTime<Utc>) -> ValidationResult<()> {
    if start > end {
        return Err(ValidationError::InvalidFormat {
            field: "end_date".to_string(),
            reason: "must not be before start_date".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_validate_code() {
        assert!(validate_code("P001").is_ok());
        assert!(validate_code("ABC-123_x").is_ok());

        assert!(validate_code("").is_err());
        assert!(validate_code("   ").is_err());
        assert!(validate_code("has space").is_err());
        assert!(validate_code(&"A".repeat(100)).is_err());
    }

    #[test]
    fn test_validate_barcode() {
        assert!(validate_barcode("7750885000018").is_ok());
        assert!(validate_barcode("").is_err());
        assert!(validate_barcode("77508X").is_err());
        assert!(validate_barcode(&"1".repeat(21)).is_err());
    }

    #[test]
    fn test_validate_description_counts_characters() {
        assert!(validate_description("Pan Francés").is_ok());
        assert!(validate_description("").is_err());
        // 200 accented characters are 400 bytes but still valid
        assert!(validate_description(&"é".repeat(200)).is_ok());
        assert!(validate_description(&"é".repeat(201)).is_err());
    }

    #[test]
    fn test_validate_refund_reason() {
        assert!(validate_refund_reason("Producto vencido").is_ok());
        assert!(matches!(
            validate_refund_reason(""),
            Err(ValidationError::Required { .. })
        ));
        assert!(validate_refund_reason(" \t ").is_err());
    }

    #[test]
    fn test_validate_employee_code() {
        assert!(validate_employee_code("1001").is_ok());
        assert!(validate_employee_code("").is_err());
        assert!(validate_employee_code("10a1").is_err());
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(999).is_ok());

        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(-1).is_err());
        assert!(validate_quantity(1000).is_err());
    }

    #[test]
    fn test_validate_price_and_stock() {
        assert!(validate_price(Money::zero()).is_ok());
        assert!(validate_price(Money::from_cents(-100)).is_err());
        assert!(validate_stock(0).is_ok());
        assert!(validate_stock(-1).is_err());
    }

    #[test]
    fn test_validate_tax_rate_bps() {
        assert!(validate_tax_rate_bps(0).is_ok());
        assert!(validate_tax_rate_bps(1800).is_ok());
        assert!(validate_tax_rate_bps(10001).is_err());
    }

    #[test]
    fn test_validate_date_range() {
        let start = Utc::now();
        assert!(validate_date_range(start, start).is_ok());
        assert!(validate_date_range(start, start + Duration::days(30)).is_ok());
        assert!(validate_date_range(start, start - Duration::seconds(1)).is_err());
    }
}
