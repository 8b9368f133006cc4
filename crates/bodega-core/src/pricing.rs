//! # Pricing
//!
//! Offer application and cart totals. The cart engine calls [`apply_offers`]
//! and [`CartTotals::from_lines`] at the end of every mutation; the sales
//! ledger calls [`CartTotals::from_lines`] again on the copied lines so a
//! sale can never disagree with the cart that produced it.
//!
//! ## Recompute Pipeline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. reset        drop promotional lines, discount = 0, total = gross   │
//! │        │                                                                │
//! │        ▼                                                                │
//! │  2. offers       for each active offer, in registration order:         │
//! │        │           NxM → overwrite discount on each trigger line       │
//! │        │           N+M → discount the free product's line, or add a    │
//! │        │                 promotional line for it at zero cost, never   │
//! │        │                 more units than the shelf holds               │
//! │        ▼                                                                │
//! │  3. totals       subtotal − discount → IGV → total → total_rounded     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Overlapping Offers
//! Step 2 overwrites, it does not accumulate. If two active offers touch the
//! same line, the one registered later decides that line's discount.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::catalog::Catalog;
use crate::money::Money;
use crate::offers::{Offer, OfferKind};
use crate::types::{CartLine, TaxRate};

// =============================================================================
// Offer Application
// =============================================================================

/// Recomputes every line's discount from scratch.
///
/// `offers` must already be filtered to the active ones, in registration
/// order. The catalog is only consulted to price free products that are not
/// in the cart yet and to cap them at the stock on hand. Promotional lines
/// stay fully discounted and are never touched by NxM offers. Running this twice on the same input gives the same
/// lines.
pub fn apply_offers(lines: &mut Vec<CartLine>, offers: &[Offer], catalog: &Catalog) {
    lines.retain(|line| !line.promotional);
    for line in lines.iter_mut() {
        line.reset();
    }

    for offer in offers {
        match &offer.kind {
            OfferKind::BuyNPayM { pay_quantity } => {
                apply_buy_n_pay_m(lines, offer, *pay_quantity);
            }
            OfferKind::BuyNGetMFree {
                free_product_id,
                free_quantity,
            } => {
                apply_buy_n_get_m_free(lines, offer, free_product_id, *free_quantity, catalog);
            }
        }
    }
}

fn apply_buy_n_pay_m(lines: &mut [CartLine], offer: &Offer, pay_quantity: i64) {
    let free_per_group = offer.buy_quantity - pay_quantity;

    for line in lines.iter_mut() {
        if line.promotional
            || !offer.applies_to(line.product_id())
            || line.quantity < offer.buy_quantity
        {
            continue;
        }
        let groups = line.quantity / offer.buy_quantity;
        line.set_discount(line.unit_price * (groups * free_per_group));
    }
}

fn apply_buy_n_get_m_free(
    lines: &mut Vec<CartLine>,
    offer: &Offer,
    free_product_id: &str,
    free_quantity: i64,
    catalog: &Catalog,
) {
    for trigger_id in &offer.product_ids {
        let trigger_qty = match lines
            .iter()
            .find(|l| !l.promotional && l.product_id() == trigger_id.as_str())
        {
            Some(line) if line.quantity >= offer.buy_quantity => line.quantity,
            _ => continue,
        };
        let free_units = (trigger_qty / offer.buy_quantity) * free_quantity;

        match lines.iter().position(|l| l.product_id() == free_product_id) {
            Some(index) if lines[index].promotional => {
                // Granted again by another trigger: more free units, still free.
                let on_shelf = catalog.get(free_product_id).map_or(0, |p| p.stock);
                let line = &mut lines[index];
                line.quantity = (line.quantity + free_units).min(on_shelf);
                line.set_discount(line.gross());
            }
            Some(index) => {
                let line = &mut lines[index];
                let units = free_units.min(line.quantity);
                line.set_discount(line.unit_price * units);
            }
            None => {
                let Some(product) = catalog.get(free_product_id).filter(|p| p.is_active) else {
                    continue;
                };
                let units = free_units.min(product.stock);
                if units <= 0 {
                    continue;
                }
                let mut line = CartLine::from_product(product, units);
                line.promotional = true;
                line.set_discount(line.gross());
                lines.push(line);
            }
        }
    }
}

// =============================================================================
// Totals
// =============================================================================

/// The money summary of a set of lines.
///
/// ## Invariants
/// - `total = subtotal − discount + igv`
/// - `total_rounded` is a multiple of 10 céntimos within 5 of `total`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CartTotals {
    pub subtotal: Money,
    pub discount: Money,
    pub igv: Money,
    pub total: Money,
    /// What a cash customer pays.
    pub total_rounded: Money,
}

impl CartTotals {
    /// Totals for `lines` at the given IGV rate.
    ///
    /// ## Example
    /// ```text
    /// subtotal  S/ 5.00
    /// discount  S/ 1.00
    /// IGV 18%   S/ 0.72   (on S/ 4.00)
    /// total     S/ 4.72
    /// cash      S/ 4.70
    /// ```
    pub fn from_lines(lines: &[CartLine], igv_rate: TaxRate) -> Self {
        let subtotal: Money = lines.iter().map(CartLine::gross).sum();
        let discount: Money = lines.iter().map(|l| l.discount).sum();
        let igv = (subtotal - discount).calculate_tax(igv_rate);
        let total = subtotal - discount + igv;

        CartTotals {
            subtotal,
            discount,
            igv,
            total,
            total_rounded: total.round_to_ten_cents(),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
