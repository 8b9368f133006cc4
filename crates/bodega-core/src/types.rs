//! # Domain Types
//!
//! Core domain types shared by every store in the terminal.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │    CartLine     │   │      Sale       │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │──►│  product (snap) │──►│  ticket_number  │       │
//! │  │  code / barcode │   │  quantity       │   │  lines          │       │
//! │  │  sale_price     │   │  unit_price     │   │  igv_amount     │       │
//! │  │  stock          │   │  discount/total │   │  status         │       │
//! │  └─────────────────┘   └─────────────────┘   └────────┬────────┘       │
//! │                                                       │                 │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌────────▼────────┐       │
//! │  │    TaxRate      │   │   SaleStatus    │   │     Refund      │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  bps (u32)      │   │  Completed      │   │  original_sale  │       │
//! │  │  1800 = 18%     │   │  PartialRefund  │   │  lines, reason  │       │
//! │  └─────────────────┘   │  Refunded       │   │  refund_amount  │       │
//! │                        └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Every entity has:
//! - `id`: UUID v4 - immutable, used for references between stores
//! - Business ID: (code, barcode, ticket_number) - what the cashier types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;

// =============================================================================
// Tax Rate
// =============================================================================

/// Tax rate represented in basis points (bps).
///
/// ## Why Basis Points?
/// 1 basis point = 0.01% = 1/10000
/// 1800 bps = 18% (Peruvian IGV)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TaxRate(u32);

impl TaxRate {
    /// Creates a tax rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        TaxRate(bps)
    }

    /// The standard Peruvian IGV rate.
    #[inline]
    pub const fn igv() -> Self {
        TaxRate(crate::DEFAULT_IGV_RATE_BPS)
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as a percentage (for display only).
    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Zero tax rate.
    #[inline]
    pub const fn zero() -> Self {
        TaxRate(0)
    }
}

impl Default for TaxRate {
    fn default() -> Self {
        TaxRate::igv()
    }
}

// =============================================================================
// Product
// =============================================================================

/// A product on the shelf.
///
/// Products are never removed from the catalog; `is_active = false` hides
/// them from lookups while keeping old sales and refunds resolvable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Product {
    /// Unique identifier.
    pub id: String,

    /// Short business code (e.g. "P001"), unique in the catalog.
    pub code: String,

    /// EAN-13 barcode, unique in the catalog.
    pub barcode: String,

    /// Display name shown to the cashier and on the receipt.
    pub description: String,

    /// What the store paid per unit.
    pub purchase_price: Money,

    /// Shelf price per unit.
    pub sale_price: Money,

    /// Per-product tax rate kept for reporting; cart totals use the
    /// terminal's configured IGV rate.
    pub igv_rate: TaxRate,

    /// Units on the shelf. Never negative.
    pub stock: i64,

    /// Free-form category ("Bebidas", "Abarrotes", ...).
    pub category: String,

    /// Whether product is active (soft delete).
    pub is_active: bool,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Checks if `quantity` units can be taken from the shelf.
    #[inline]
    pub fn can_sell(&self, quantity: i64) -> bool {
        self.stock >= quantity
    }

    /// Freezes the fields a cart line or receipt needs.
    pub fn snapshot(&self) -> ProductSnapshot {
        ProductSnapshot {
            id: self.id.clone(),
            code: self.code.clone(),
            description: self.description.clone(),
            category: self.category.clone(),
        }
    }
}

/// Product data frozen into a cart line at the moment it was scanned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ProductSnapshot {
    pub id: String,
    pub code: String,
    pub description: String,
    pub category: String,
}

// =============================================================================
// Cart Line
// =============================================================================

/// One product in a cart, sale or refund.
///
/// ## Invariants
/// - `quantity > 0`
/// - `0 <= discount <= quantity × unit_price`
/// - `total = quantity × unit_price − discount`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CartLine {
    pub product: ProductSnapshot,
    pub quantity: i64,
    /// Shelf price captured when the line was created.
    pub unit_price: Money,
    pub discount: Money,
    pub total: Money,
    /// Line was added by an N+M offer rather than scanned.
    #[serde(default)]
    pub promotional: bool,
}

impl CartLine {
    /// Creates an undiscounted line from a product.
    pub fn from_product(product: &Product, quantity: i64) -> Self {
        let unit_price = product.sale_price;
        CartLine {
            product: product.snapshot(),
            quantity,
            unit_price,
            discount: Money::zero(),
            total: unit_price * quantity,
            promotional: false,
        }
    }

    /// Product id shortcut.
    #[inline]
    pub fn product_id(&self) -> &str {
        &self.product.id
    }

    /// `quantity × unit_price`, before any discount.
    #[inline]
    pub fn gross(&self) -> Money {
        self.unit_price * self.quantity
    }

    /// Sets the discount (clamped to the gross amount) and recomputes total.
    pub fn set_discount(&mut self, discount: Money) {
        let gross = self.gross();
        self.discount = discount.clamp(Money::zero(), gross);
        self.total = gross - self.discount;
    }

    /// Drops any discount.
    pub fn reset(&mut self) {
        self.set_discount(Money::zero());
    }
}

// =============================================================================
// Sale Status
// =============================================================================

/// Where a sale is in its refund lifecycle.
///
/// ```text
/// Completed ──partial refund──► PartialRefund ──rest refunded──► Refunded
///     │                                                             ▲
///     └──────────────────── everything refunded ────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum SaleStatus {
    Completed,
    PartialRefund,
    Refunded,
}

impl Default for SaleStatus {
    fn default() -> Self {
        SaleStatus::Completed
    }
}

// =============================================================================
// Payment Method
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Physical cash; settled to the nearest 10 céntimos.
    Cash,
    /// Card on an external terminal; charged to the céntimo.
    Card,
}

// =============================================================================
// Sale
// =============================================================================

/// A completed checkout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Sale {
    pub id: String,
    /// Printed on the receipt; what the customer brings back for a refund.
    pub ticket_number: String,
    pub employee_id: String,
    pub employee_name: String,
    pub terminal_id: String,
    pub lines: Vec<CartLine>,
    pub subtotal: Money,
    pub discount_amount: Money,
    pub igv_amount: Money,
    pub total: Money,
    pub payment_method: PaymentMethod,
    pub status: SaleStatus,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub session_start: DateTime<Utc>,
    #[ts(as = "String")]
    pub session_end: DateTime<Utc>,
}

impl Sale {
    /// Total units sold across all lines.
    pub fn items_sold(&self) -> i64 {
        self.lines.iter().map(|l| l.quantity).sum()
    }

    /// Units of `product_id` on the sale (0 if absent).
    pub fn quantity_of(&self, product_id: &str) -> i64 {
        self.lines
            .iter()
            .filter(|l| l.product_id() == product_id)
            .map(|l| l.quantity)
            .sum()
    }
}

// =============================================================================
// Refund
// =============================================================================

/// Money and goods returned against an earlier sale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Refund {
    pub id: String,
    pub original_sale_id: String,
    pub ticket_number: String,
    pub employee_id: String,
    pub employee_name: String,
    pub lines: Vec<CartLine>,
    pub refund_amount: Money,
    pub reason: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Role
// =============================================================================

/// What an employee is allowed to do at the terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Employee,
    Admin,
}

// =============================================================================
// Unit Tests
// =============================================================================
