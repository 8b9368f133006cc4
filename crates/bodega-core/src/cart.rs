//! # Cart Engine
//!
//! The cart of the employee logged in at this terminal, plus the parked
//! carts of anyone who stepped away.
//!
//! ## Cart Operations Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Cart Engine Operations                               │
//! │                                                                         │
//! │  Cashier Action           Engine Call               State Change        │
//! │  ──────────────           ───────────               ────────────        │
//! │                                                                         │
//! │  Scan product ──────────► add_line() ─────────────► upsert line        │
//! │  Change quantity ───────► set_quantity() ─────────► line.qty = n       │
//! │  Remove line ───────────► remove_line() ──────────► lines.remove(i)    │
//! │  Cancel sale ───────────► clear_cart() ───────────► lines.clear()      │
//! │  Login / logout ────────► set_current_user() ─────► park / restore     │
//! │                                                         │               │
//! │                              every mutation ends in ────┘               │
//! │                              recompute_discounts() (synchronous)        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Reads (`lines()`, `totals()`) therefore always reflect every mutation
//! that has returned; there is no pending recompute to wait for.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::catalog::CatalogHandle;
use crate::clock::Clock;
use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::offers::OfferHandle;
use crate::pricing::{apply_offers, CartTotals};
use crate::types::{CartLine, Product, TaxRate};
use crate::validation::{validate_cart_size, validate_quantity};
use crate::MAX_ITEM_QUANTITY;

// =============================================================================
// Snapshot
// =============================================================================

/// Everything the cart engine persists into the `cart` blob.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CartSnapshot {
    pub current_user: Option<String>,
    pub lines: Vec<CartLine>,
    /// Parked carts keyed by employee id.
    pub saved: BTreeMap<String, Vec<CartLine>>,
}

// =============================================================================
// Cart Engine
// =============================================================================

/// Per-terminal cart with automatic offer application.
pub struct CartEngine {
    catalog: CatalogHandle,
    offers: OfferHandle,
    igv_rate: TaxRate,
    clock: Arc<dyn Clock>,
    current_user: Option<String>,
    lines: Vec<CartLine>,
    saved: BTreeMap<String, Vec<CartLine>>,
    totals: CartTotals,
}

impl fmt::Debug for CartEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CartEngine")
            .field("current_user", &self.current_user)
            .field("lines", &self.lines.len())
            .field("saved", &self.saved.len())
            .field("totals", &self.totals)
            .finish()
    }
}

impl CartEngine {
    pub fn new(
        catalog: CatalogHandle,
        offers: OfferHandle,
        igv_rate: TaxRate,
        clock: Arc<dyn Clock>,
    ) -> Self {
        CartEngine {
            catalog,
            offers,
            igv_rate,
            clock,
            current_user: None,
            lines: Vec::new(),
            saved: BTreeMap::new(),
            totals: CartTotals::default(),
        }
    }

    // -------------------------------------------------------------------------
    // Mutations
    // -------------------------------------------------------------------------

    /// Adds `qty` units of `product`, merging into an existing line.
    ///
    /// ## Errors
    /// - `NoActiveUser` if nobody is bound to the cart
    /// - `InsufficientStock` if the line would exceed `product.stock`
    /// - `QuantityTooLarge` / `CartTooLarge` for the per-cart limits
    pub fn add_line(&mut self, product: &Product, qty: i64) -> CoreResult<()> {
        self.require_user()?;
        validate_quantity(qty)?;

        let existing = self.position(&product.id);
        let target = existing.map_or(qty, |i| self.lines[i].quantity + qty);

        if !product.can_sell(target) {
            return Err(CoreError::InsufficientStock {
                code: product.code.clone(),
                available: product.stock,
                requested: target,
            });
        }
        if target > MAX_ITEM_QUANTITY {
            return Err(CoreError::QuantityTooLarge {
                requested: target,
                max: MAX_ITEM_QUANTITY,
            });
        }

        match existing {
            Some(i) => {
                let line = &mut self.lines[i];
                line.quantity = target;
                line.promotional = false;
            }
            None => {
                let scanned = self.lines.iter().filter(|l| !l.promotional).count();
                validate_cart_size(scanned).map_err(|_| CoreError::CartTooLarge {
                    max: crate::MAX_CART_ITEMS,
                })?;
                self.lines.push(CartLine::from_product(product, qty));
            }
        }

        debug!(product_id = %product.id, qty = target, "Cart line added");
        self.recompute_discounts();
        Ok(())
    }

    /// Sets a line's quantity, checked against the catalog's current stock.
    /// A quantity of zero or less removes the line.
    pub fn set_quantity(&mut self, product_id: &str, qty: i64) -> CoreResult<()> {
        self.require_user()?;

        if qty <= 0 {
            if let Some(i) = self.position(product_id) {
                self.lines.remove(i);
                debug!(product_id, "Cart line removed by zero quantity");
                self.recompute_discounts();
            }
            return Ok(());
        }

        let index = self
            .position(product_id)
            .ok_or_else(|| CoreError::LineNotFound(product_id.to_string()))?;
        let product = self
            .catalog
            .product(product_id)
            .ok_or_else(|| CoreError::ProductNotFound(product_id.to_string()))?;

        if !product.can_sell(qty) {
            return Err(CoreError::InsufficientStock {
                code: product.code,
                available: product.stock,
                requested: qty,
            });
        }
        if qty > MAX_ITEM_QUANTITY {
            return Err(CoreError::QuantityTooLarge {
                requested: qty,
                max: MAX_ITEM_QUANTITY,
            });
        }

        let line = &mut self.lines[index];
        line.quantity = qty;
        line.promotional = false;

        debug!(product_id, qty, "Cart quantity set");
        self.recompute_discounts();
        Ok(())
    }

    /// Removes a line.
    ///
    /// A promotional line comes back on the next recompute for as long as the
    /// offer that earned it still applies.
    pub fn remove_line(&mut self, product_id: &str) -> CoreResult<()> {
        self.require_user()?;

        let index = self
            .position(product_id)
            .ok_or_else(|| CoreError::LineNotFound(product_id.to_string()))?;
        self.lines.remove(index);

        debug!(product_id, "Cart line removed");
        self.recompute_discounts();
        Ok(())
    }

    /// Empties the current employee's cart (and their parked copy).
    pub fn clear_cart(&mut self) {
        self.lines.clear();
        if let Some(user) = &self.current_user {
            self.saved.remove(user);
        }
        debug!(user = ?self.current_user, "Cart cleared");
        self.recompute_discounts();
    }

    /// Parks the outgoing employee's cart and restores the incoming one's.
    ///
    /// An empty outgoing cart drops any parked copy instead of keeping a
    /// stale one. `None` unbinds the cart (logout).
    pub fn set_current_user(&mut self, user_id: Option<&str>) {
        if let Some(outgoing) = self.current_user.take() {
            let lines = std::mem::take(&mut self.lines);
            if lines.is_empty() {
                self.saved.remove(&outgoing);
            } else {
                self.saved.insert(outgoing, lines);
            }
        }
        self.lines.clear();

        if let Some(incoming) = user_id {
            self.lines = self.saved.remove(incoming).unwrap_or_default();
            self.current_user = Some(incoming.to_string());
        }

        debug!(user = ?self.current_user, lines = self.lines.len(), "Cart user switched");
        self.recompute_discounts();
    }

    /// Re-applies every active offer and refreshes the totals.
    pub fn recompute_discounts(&mut self) {
        let offers = self.offers.active_offers(self.clock.now());
        let lines = &mut self.lines;
        self.catalog
            .with_catalog(|catalog| apply_offers(lines, &offers, catalog));
        self.totals = CartTotals::from_lines(&self.lines, self.igv_rate);
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    pub fn current_user(&self) -> Option<&str> {
        self.current_user.as_deref()
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn line(&self, product_id: &str) -> Option<&CartLine> {
        self.lines.iter().find(|l| l.product_id() == product_id)
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Total units across all lines.
    pub fn total_quantity(&self) -> i64 {
        self.lines.iter().map(|l| l.quantity).sum()
    }

    pub fn totals(&self) -> CartTotals {
        self.totals
    }

    pub fn subtotal(&self) -> Money {
        self.totals.subtotal
    }

    pub fn discount_total(&self) -> Money {
        self.totals.discount
    }

    pub fn igv_total(&self) -> Money {
        self.totals.igv
    }

    pub fn total(&self) -> Money {
        self.totals.total
    }

    pub fn total_rounded(&self) -> Money {
        self.totals.total_rounded
    }

    pub fn igv_rate(&self) -> TaxRate {
        self.igv_rate
    }

    /// Parked cart of another employee, if any.
    pub fn saved_cart(&self, user_id: &str) -> Option<&[CartLine]> {
        self.saved.get(user_id).map(Vec::as_slice)
    }

    // -------------------------------------------------------------------------
    // Persistence
    // -------------------------------------------------------------------------

    pub fn snapshot(&self) -> CartSnapshot {
        CartSnapshot {
            current_user: self.current_user.clone(),
            lines: self.lines.clone(),
            saved: self.saved.clone(),
        }
    }

    /// Replaces the engine state and recomputes against today's offers.
    pub fn restore(&mut self, snapshot: CartSnapshot) {
        self.current_user = snapshot.current_user;
        self.lines = snapshot.lines;
        self.saved = snapshot.saved;
        self.recompute_discounts();
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    fn require_user(&self) -> CoreResult<&str> {
        self.current_user.as_deref().ok_or(CoreError::NoActiveUser)
    }

    fn position(&self, product_id: &str) -> Option<usize> {
        self.lines.iter().position(|l| l.product_id() == product_id)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Catalog, NewProduct};
    use crate::clock::ManualClock;
    use crate::offers::{NewOffer, OfferKind, OfferRegistry};
    use chrono::{Duration, TimeZone, Utc};

    struct Fixture {
        cart: CartEngine,
        catalog: CatalogHandle,
        offers: OfferHandle,
        clock: ManualClock,
        inca: String,
        pan: String,
        galleta: String,
    }

    fn fixture() -> Fixture {
        let start = Utc.with_ymd_and_hms(2025, 6, 15, 9, 0, 0).unwrap();
        let clock = ManualClock::new(start);

        let mut catalog = Catalog::new();
        let mut add = |code: &str, barcode: &str, price: i64, stock: i64| {
            catalog
                .add(
                    NewProduct {
                        code: code.to_string(),
                        barcode: barcode.to_string(),
                        description: code.to_string(),
                        purchase_price: Money::zero(),
                        sale_price: Money::from_cents(price),
                        igv_rate: TaxRate::igv(),
                        stock,
                        category: "Test".to_string(),
                    },
                    start,
                )
                .unwrap()
                .id
        };
        let inca = add("P001", "1", 250, 150);
        let pan = add("P009", "9", 30, 100);
        let galleta = add("P020", "20", 420, 50);

        let mut registry = OfferRegistry::new();
        registry
            .add(
                NewOffer {
                    name: "Inca Kola 3x2".to_string(),
                    description: None,
                    kind: OfferKind::BuyNPayM { pay_quantity: 2 },
                    product_ids: vec![inca.clone()],
                    buy_quantity: 3,
                    is_active: true,
                    start_date: start - Duration::days(1),
                    end_date: start + Duration::days(1),
                    created_by: "admin".to_string(),
                },
                start,
            )
            .unwrap();
        registry
            .add(
                NewOffer {
                    name: "Pan + Galleta".to_string(),
                    description: None,
                    kind: OfferKind::BuyNGetMFree {
                        free_product_id: galleta.clone(),
                        free_quantity: 1,
                    },
                    product_ids: vec![pan.clone()],
                    buy_quantity: 2,
                    is_active: true,
                    start_date: start - Duration::days(1),
                    end_date: start + Duration::days(1),
                    created_by: "admin".to_string(),
                },
                start,
            )
            .unwrap();

        let catalog = CatalogHandle::new(catalog);
        let offers = OfferHandle::new(registry);
        let cart = CartEngine::new(
            catalog.clone(),
            offers.clone(),
            TaxRate::igv(),
            Arc::new(clock.clone()),
        );

        Fixture {
            cart,
            catalog,
            offers,
            clock,
            inca,
            pan,
            galleta,
        }
    }

    fn product(f: &Fixture, id: &str) -> Product {
        f.catalog.product(id).unwrap()
    }

    #[test]
    fn test_mutations_require_user() {
        let mut f = fixture();
        let inca = product(&f, &f.inca);

        assert!(matches!(
            f.cart.add_line(&inca, 1),
            Err(CoreError::NoActiveUser)
        ));
        assert!(f.cart.is_empty());
    }

    #[test]
    fn test_add_line_applies_three_for_two_immediately() {
        let mut f = fixture();
        f.cart.set_current_user(Some("1001"));
        let inca = product(&f, &f.inca);

        f.cart.add_line(&inca, 2).unwrap();
        assert_eq!(f.cart.discount_total(), Money::zero());

        f.cart.add_line(&inca, 1).unwrap();
        let line = f.cart.line(&f.inca).unwrap();
        assert_eq!(line.quantity, 3);
        assert_eq!(line.discount.cents(), 250);
        assert_eq!(line.total.cents(), 500);
        assert_eq!(f.cart.subtotal().cents(), 750);
        assert_eq!(f.cart.igv_total().cents(), 90);
        assert_eq!(f.cart.total().cents(), 590);
    }

    #[test]
    fn test_add_line_rejects_beyond_stock() {
        let mut f = fixture();
        f.cart.set_current_user(Some("1001"));
        let galleta = product(&f, &f.galleta);

        f.cart.add_line(&galleta, 50).unwrap();
        let err = f.cart.add_line(&galleta, 1).unwrap_err();
        assert!(matches!(
            err,
            CoreError::InsufficientStock {
                available: 50,
                requested: 51,
                ..
            }
        ));
        assert_eq!(f.cart.line(&f.galleta).unwrap().quantity, 50);
    }

    #[test]
    fn test_set_quantity_checks_current_catalog_stock() {
        let mut f = fixture();
        f.cart.set_current_user(Some("1001"));
        let inca = product(&f, &f.inca);
        f.cart.add_line(&inca, 1).unwrap();

        let id = f.inca.clone();
        f.catalog
            .with_catalog_mut(|c| c.decrement_stock(&id, 148, Utc::now()));

        assert!(f.cart.set_quantity(&f.inca, 3).is_err());
        f.cart.set_quantity(&f.inca, 2).unwrap();
        assert_eq!(f.cart.line(&f.inca).unwrap().quantity, 2);
    }

    #[test]
    fn test_set_quantity_zero_removes_line() {
        let mut f = fixture();
        f.cart.set_current_user(Some("1001"));
        let inca = product(&f, &f.inca);
        f.cart.add_line(&inca, 3).unwrap();

        f.cart.set_quantity(&f.inca, 0).unwrap();
        assert!(f.cart.is_empty());
        assert_eq!(f.cart.total(), Money::zero());
    }

    #[test]
    fn test_lowering_quantity_below_threshold_drops_discount() {
        let mut f = fixture();
        f.cart.set_current_user(Some("1001"));
        let inca = product(&f, &f.inca);
        f.cart.add_line(&inca, 3).unwrap();

        f.cart.set_quantity(&f.inca, 2).unwrap();
        assert_eq!(f.cart.line(&f.inca).unwrap().discount, Money::zero());
        assert_eq!(f.cart.discount_total(), Money::zero());
    }

    #[test]
    fn test_free_product_line_follows_trigger() {
        let mut f = fixture();
        f.cart.set_current_user(Some("1001"));
        let pan = product(&f, &f.pan);

        f.cart.add_line(&pan, 2).unwrap();
        let free = f.cart.line(&f.galleta).unwrap();
        assert!(free.promotional);
        assert_eq!(free.quantity, 1);
        assert_eq!(free.total, Money::zero());
        assert_eq!(f.cart.subtotal().cents(), 60 + 420);
        assert_eq!(f.cart.discount_total().cents(), 420);

        f.cart.set_quantity(&f.pan, 1).unwrap();
        assert!(f.cart.line(&f.galleta).is_none());
    }

    #[test]
    fn test_free_product_scanned_with_trigger() {
        let mut f = fixture();
        f.cart.set_current_user(Some("1001"));
        let pan = product(&f, &f.pan);
        let galleta = product(&f, &f.galleta);

        f.cart.add_line(&pan, 2).unwrap();
        f.cart.add_line(&galleta, 1).unwrap();

        let line = f.cart.line(&f.galleta).unwrap();
        assert!(!line.promotional);
        assert_eq!(line.quantity, 2);
        assert_eq!(line.discount.cents(), 420);
        assert_eq!(line.total.cents(), 420);
    }

    #[test]
    fn test_recompute_is_idempotent() {
        let mut f = fixture();
        f.cart.set_current_user(Some("1001"));
        let inca = product(&f, &f.inca);
        let pan = product(&f, &f.pan);
        f.cart.add_line(&inca, 7).unwrap();
        f.cart.add_line(&pan, 4).unwrap();

        let lines = f.cart.lines().to_vec();
        let totals = f.cart.totals();
        f.cart.recompute_discounts();
        assert_eq!(f.cart.lines(), lines.as_slice());
        assert_eq!(f.cart.totals(), totals);
    }

    #[test]
    fn test_total_identity_and_cash_rounding() {
        let mut f = fixture();
        f.cart.set_current_user(Some("1001"));
        let pan = product(&f, &f.pan);
        f.cart.add_line(&pan, 1).unwrap();

        let t = f.cart.totals();
        assert_eq!(t.total, t.subtotal - t.discount + t.igv);
        // 30 + 5 IGV = 35 → 40
        assert_eq!(t.total.cents(), 35);
        assert_eq!(t.total_rounded.cents(), 40);
    }

    #[test]
    fn test_expired_offer_stops_applying() {
        let mut f = fixture();
        f.cart.set_current_user(Some("1001"));
        let inca = product(&f, &f.inca);
        f.cart.add_line(&inca, 3).unwrap();
        assert_eq!(f.cart.discount_total().cents(), 250);

        f.clock.advance(Duration::days(2));
        f.cart.recompute_discounts();
        assert_eq!(f.cart.discount_total(), Money::zero());
        assert!(f.offers.active_offers(f.clock.now()).is_empty());
    }

    #[test]
    fn test_user_switch_round_trip() {
        let mut f = fixture();
        let inca = product(&f, &f.inca);
        let pan = product(&f, &f.pan);

        f.cart.set_current_user(Some("1001"));
        f.cart.add_line(&inca, 3).unwrap();
        let juan_lines = f.cart.lines().to_vec();

        f.cart.set_current_user(Some("2001"));
        assert!(f.cart.is_empty());
        f.cart.add_line(&pan, 1).unwrap();

        f.cart.set_current_user(Some("1001"));
        assert_eq!(f.cart.lines(), juan_lines.as_slice());
        assert_eq!(f.cart.saved_cart("2001").unwrap().len(), 1);
    }

    #[test]
    fn test_emptied_cart_is_not_restored_later() {
        let mut f = fixture();
        let inca = product(&f, &f.inca);

        f.cart.set_current_user(Some("1001"));
        f.cart.add_line(&inca, 1).unwrap();
        f.cart.set_current_user(Some("2001"));
        f.cart.set_current_user(Some("1001"));
        f.cart.remove_line(&f.inca).unwrap();
        f.cart.set_current_user(Some("2001"));
        f.cart.set_current_user(Some("1001"));

        assert!(f.cart.is_empty());
    }

    #[test]
    fn test_clear_cart_only_touches_current_user() {
        let mut f = fixture();
        let inca = product(&f, &f.inca);

        f.cart.set_current_user(Some("2001"));
        f.cart.add_line(&inca, 1).unwrap();
        f.cart.set_current_user(Some("1001"));
        f.cart.add_line(&inca, 2).unwrap();

        f.cart.clear_cart();
        assert!(f.cart.is_empty());
        assert!(f.cart.saved_cart("2001").is_some());
    }

    #[test]
    fn test_snapshot_restore() {
        let mut f = fixture();
        let inca = product(&f, &f.inca);
        f.cart.set_current_user(Some("1001"));
        f.cart.add_line(&inca, 3).unwrap();
        let snapshot = f.cart.snapshot();

        let mut other = CartEngine::new(
            f.catalog.clone(),
            f.offers.clone(),
            TaxRate::igv(),
            Arc::new(f.clock.clone()),
        );
        other.restore(snapshot);
        assert_eq!(other.current_user(), Some("1001"));
        assert_eq!(other.totals(), f.cart.totals());
    }
}
