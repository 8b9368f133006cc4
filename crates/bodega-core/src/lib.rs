//! # bodega-core: Pure Business Logic for Bodega POS
//!
//! Everything a single checkout terminal decides lives in this crate: what is
//! on the shelf, which promotions apply, who is logged in, what the cart
//! costs and what has been sold or refunded. No function here touches a
//! database, a socket or the wall clock.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Bodega POS Architecture                          │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                  apps/terminal (Terminal service)               │   │
//! │  │    login ──► scan ──► cart ──► checkout ──► refund              │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ bodega-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌──────────┐  ┌──────────┐  ┌──────────┐  ┌──────────┐       │   │
//! │  │   │ catalog  │  │  offers  │  │   auth   │  │  ledger  │       │   │
//! │  │   │ products │  │ NxM, N+M │  │ sessions │  │  sales   │       │   │
//! │  │   │  stock   │  │ windows  │  │ timeout  │  │ refunds  │       │   │
//! │  │   └────┬─────┘  └────┬─────┘  └──────────┘  └────▲─────┘       │   │
//! │  │        │             │                           │             │   │
//! │  │        └──────┬──────┘                           │             │   │
//! │  │          ┌────▼─────┐   ┌──────────┐             │             │   │
//! │  │          │   cart   │──►│ pricing  │─────────────┘             │   │
//! │  │          └──────────┘   └──────────┘                           │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • INJECTED CLOCK            │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    bodega-db (Blob Cache)                       │   │
//! │  │          versioned JSON snapshots of every store above          │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Product, CartLine, Sale, Refund, ...)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`error`] - Domain error types
//! - [`validation`] - Business rule validation
//! - [`clock`] - Injected time source
//! - [`catalog`] - Product catalog and stock
//! - [`offers`] - Promotional offer registry
//! - [`pricing`] - Offer application and IGV totals
//! - [`cart`] - Per-employee cart engine
//! - [`tender`] - Cash/card settlement
//! - [`auth`] - Employee directory and terminal sessions
//! - [`ledger`] - Sales and refunds
//! - [`report`] - Daily sales summary
//!
//! ## Example Usage
//!
//! ```rust
//! use bodega_core::money::Money;
//! use bodega_core::types::TaxRate;
//!
//! // S/ 5.00 of merchandise
//! let taxable = Money::from_cents(500);
//!
//! // IGV is 18%
//! let igv = taxable.calculate_tax(TaxRate::from_bps(1800));
//! assert_eq!(igv.cents(), 90);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod auth;
pub mod cart;
pub mod catalog;
pub mod clock;
pub mod error;
pub mod ledger;
pub mod money;
pub mod offers;
pub mod pricing;
pub mod report;
pub mod tender;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use auth::{AuthManager, AuthSettings, AuthSnapshot, IdleStatus, NewUser, Session, UserView};
pub use cart::{CartEngine, CartSnapshot};
pub use catalog::{Catalog, CatalogHandle};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{AuthError, AuthResult, CoreError, CoreResult, ValidationError};
pub use ledger::{prorated_refund_line, LedgerSnapshot, RefundRequest, SaleRequest, SalesLedger};
pub use money::Money;
pub use offers::{OfferHandle, OfferRegistry};
pub use pricing::CartTotals;
pub use report::SalesReport;
pub use tender::{Settlement, Tender};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Peruvian IGV (Impuesto General a las Ventas) in basis points.
pub const DEFAULT_IGV_RATE_BPS: u32 = 1800;

/// Seconds of inactivity before a terminal session is closed.
pub const DEFAULT_IDLE_TIMEOUT_SECS: i64 = 1200;

/// Stock level at or below which a product shows up in the low-stock list.
pub const DEFAULT_LOW_STOCK_THRESHOLD: i64 = 10;

/// Maximum distinct lines an employee can put in a cart.
///
/// ## Business Reason
/// Prevents runaway carts and keeps tickets printable.
pub const MAX_CART_ITEMS: usize = 100;

/// Maximum quantity of a single line.
///
/// ## Business Reason
/// Catches typos at the scanner (1000 instead of 10).
pub const MAX_ITEM_QUANTITY: i64 = 999;
