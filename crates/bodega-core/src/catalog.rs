//! # Catalog Store
//!
//! Products on the shelf, their stock and the category list.
//!
//! ## Stock Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   checkout ──► decrement_stock(id, qty)   stock = max(0, stock - qty)  │
//! │                                                                         │
//! │   refund   ──► increment_stock(id, qty)   stock = stock + qty          │
//! │                                                                         │
//! │   Both run under the CatalogHandle write lock, so two stock changes    │
//! │   to the same product never interleave.                                │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The catalog does not decide whether a cart may hold a quantity; the cart
//! engine compares against `stock` itself. Decrementing never fails: a
//! request larger than the shelf clamps at zero.

use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::types::{Product, TaxRate};
use crate::validation::{
    validate_barcode, validate_category, validate_code, validate_description, validate_price,
    validate_search_query, validate_stock, validate_tax_rate_bps,
};

// =============================================================================
// Inputs
// =============================================================================

/// Fields for a product that does not exist yet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProduct {
    pub code: String,
    pub barcode: String,
    pub description: String,
    pub purchase_price: Money,
    pub sale_price: Money,
    #[serde(default)]
    pub igv_rate: TaxRate,
    pub stock: i64,
    pub category: String,
}

/// Partial update; `None` leaves the field alone.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductUpdate {
    pub code: Option<String>,
    pub barcode: Option<String>,
    pub description: Option<String>,
    pub purchase_price: Option<Money>,
    pub sale_price: Option<Money>,
    pub igv_rate: Option<TaxRate>,
    pub stock: Option<i64>,
    pub category: Option<String>,
    pub is_active: Option<bool>,
}

// =============================================================================
// Catalog
// =============================================================================

/// The product catalog.
///
/// Serialized as-is into the `products` cache blob.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    products: Vec<Product>,
    /// Append-only; a category never disappears once seen.
    categories: Vec<String>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a catalog from already-persisted products.
    ///
    /// Categories used by the products but missing from `categories` are
    /// appended.
    pub fn with_products(products: Vec<Product>, categories: Vec<String>) -> Self {
        let mut catalog = Catalog {
            products: Vec::new(),
            categories,
        };
        for product in &products {
            catalog.register_category(&product.category);
        }
        catalog.products = products;
        catalog
    }

    // -------------------------------------------------------------------------
    // Mutations
    // -------------------------------------------------------------------------

    /// Adds a new product with a fresh UUID.
    ///
    /// ## Errors
    /// - `Validation` for malformed fields
    /// - `Validation(Duplicate)` if the code or barcode is already used
    pub fn add(&mut self, new: NewProduct, now: DateTime<Utc>) -> CoreResult<Product> {
        validate_code(&new.code)?;
        validate_barcode(&new.barcode)?;
        validate_description(&new.description)?;
        validate_category(&new.category)?;
        validate_price(new.purchase_price)?;
        validate_price(new.sale_price)?;
        validate_stock(new.stock)?;
        validate_tax_rate_bps(new.igv_rate.bps())?;
        self.ensure_unique(None, new.code.trim(), new.barcode.trim())?;

        let product = Product {
            id: uuid::Uuid::new_v4().to_string(),
            code: new.code.trim().to_string(),
            barcode: new.barcode.trim().to_string(),
            description: new.description.trim().to_string(),
            purchase_price: new.purchase_price,
            sale_price: new.sale_price,
            igv_rate: new.igv_rate,
            stock: new.stock,
            category: new.category.trim().to_string(),
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        self.register_category(&product.category);
        self.products.push(product.clone());
        info!(product_id = %product.id, code = %product.code, "Product added to catalog");
        Ok(product)
    }

    /// Applies a partial update and stamps `updated_at`.
    pub fn update(
        &mut self,
        id: &str,
        update: ProductUpdate,
        now: DateTime<Utc>,
    ) -> CoreResult<Product> {
        if let Some(code) = &update.code {
            validate_code(code)?;
        }
        if let Some(barcode) = &update.barcode {
            validate_barcode(barcode)?;
        }
        if let Some(description) = &update.description {
            validate_description(description)?;
        }
        if let Some(category) = &update.category {
            validate_category(category)?;
        }
        if let Some(price) = update.purchase_price {
            validate_price(price)?;
        }
        if let Some(price) = update.sale_price {
            validate_price(price)?;
        }
        if let Some(stock) = update.stock {
            validate_stock(stock)?;
        }
        if let Some(rate) = update.igv_rate {
            validate_tax_rate_bps(rate.bps())?;
        }

        let current = self
            .get(id)
            .ok_or_else(|| CoreError::ProductNotFound(id.to_string()))?;
        let code = update.code.as_deref().unwrap_or(&current.code).trim().to_string();
        let barcode = update
            .barcode
            .as_deref()
            .unwrap_or(&current.barcode)
            .trim()
            .to_string();
        self.ensure_unique(Some(id), &code, &barcode)?;

        if let Some(category) = &update.category {
            self.register_category(category.trim());
        }

        let product = self
            .get_mut(id)
            .ok_or_else(|| CoreError::ProductNotFound(id.to_string()))?;
        product.code = code;
        product.barcode = barcode;
        if let Some(description) = update.description {
            product.description = description.trim().to_string();
        }
        if let Some(price) = update.purchase_price {
            product.purchase_price = price;
        }
        if let Some(price) = update.sale_price {
            product.sale_price = price;
        }
        if let Some(rate) = update.igv_rate {
            product.igv_rate = rate;
        }
        if let Some(stock) = update.stock {
            product.stock = stock;
        }
        if let Some(category) = update.category {
            product.category = category.trim().to_string();
        }
        if let Some(active) = update.is_active {
            product.is_active = active;
        }
        product.updated_at = now;

        debug!(product_id = %id, "Product updated");
        Ok(product.clone())
    }

    /// Hides a product from lookups. The record is kept.
    pub fn soft_delete(&mut self, id: &str, now: DateTime<Utc>) -> CoreResult<()> {
        let product = self
            .get_mut(id)
            .ok_or_else(|| CoreError::ProductNotFound(id.to_string()))?;
        product.is_active = false;
        product.updated_at = now;
        info!(product_id = %id, "Product deactivated");
        Ok(())
    }

    /// Changes the shelf price. Lines already in a cart keep their price.
    pub fn set_price(&mut self, id: &str, price: Money, now: DateTime<Utc>) -> CoreResult<()> {
        validate_price(price)?;
        let product = self
            .get_mut(id)
            .ok_or_else(|| CoreError::ProductNotFound(id.to_string()))?;
        product.sale_price = price;
        product.updated_at = now;
        Ok(())
    }

    /// Takes `qty` units off the shelf, clamping at zero.
    ///
    /// Returns the new stock, or `None` if the id is unknown.
    pub fn decrement_stock(&mut self, id: &str, qty: i64, now: DateTime<Utc>) -> Option<i64> {
        let product = self.get_mut(id)?;
        product.stock = (product.stock - qty).max(0);
        product.updated_at = now;
        debug!(product_id = %id, qty, stock = product.stock, "Stock decremented");
        Some(product.stock)
    }

    /// Puts `qty` units back on the shelf.
    ///
    /// Returns the new stock, or `None` if the id is unknown.
    pub fn increment_stock(&mut self, id: &str, qty: i64, now: DateTime<Utc>) -> Option<i64> {
        let product = self.get_mut(id)?;
        product.stock += qty.max(0);
        product.updated_at = now;
        debug!(product_id = %id, qty, stock = product.stock, "Stock restored");
        Some(product.stock)
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    /// Any product by id, including inactive ones.
    pub fn get(&self, id: &str) -> Option<&Product> {
        self.products.iter().find(|p| p.id == id)
    }

    /// Active product by exact code.
    pub fn by_code(&self, code: &str) -> Option<&Product> {
        self.products.iter().find(|p| p.code == code && p.is_active)
    }

    /// Active product by exact barcode.
    pub fn by_barcode(&self, barcode: &str) -> Option<&Product> {
        self.products
            .iter()
            .find(|p| p.barcode == barcode && p.is_active)
    }

    /// Active products in a category (exact match).
    pub fn by_category(&self, category: &str) -> Vec<&Product> {
        self.products
            .iter()
            .filter(|p| p.category == category && p.is_active)
            .collect()
    }

    /// Active products whose code, description or category contains the
    /// query (case-insensitive), or whose barcode contains it verbatim.
    pub fn search(&self, query: &str) -> CoreResult<Vec<&Product>> {
        let query = validate_search_query(query)?;
        let lowered = query.to_lowercase();

        Ok(self
            .products
            .iter()
            .filter(|p| {
                p.is_active
                    && (p.code.to_lowercase().contains(&lowered)
                        || p.description.to_lowercase().contains(&lowered)
                        || p.barcode.contains(&query)
                        || p.category.to_lowercase().contains(&lowered))
            })
            .collect())
    }

    /// Active products at or below `threshold` units.
    pub fn low_stock(&self, threshold: i64) -> Vec<&Product> {
        self.products
            .iter()
            .filter(|p| p.is_active && p.stock <= threshold)
            .collect()
    }

    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    /// Every product, active or not, in insertion order.
    pub fn products(&self) -> &[Product] {
        &self.products
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    fn get_mut(&mut self, id: &str) -> Option<&mut Product> {
        self.products.iter_mut().find(|p| p.id == id)
    }

    fn register_category(&mut self, category: &str) {
        if !category.is_empty() && !self.categories.iter().any(|c| c == category) {
            self.categories.push(category.to_string());
        }
    }

    fn ensure_unique(&self, except_id: Option<&str>, code: &str, barcode: &str) -> CoreResult<()> {
        let others = self
            .products
            .iter()
            .filter(|p| Some(p.id.as_str()) != except_id);

        for product in others {
            if product.code == code {
                return Err(ValidationError::Duplicate {
                    field: "code".to_string(),
                    value: code.to_string(),
                }
                .into());
            }
            if product.barcode == barcode {
                return Err(ValidationError::Duplicate {
                    field: "barcode".to_string(),
                    value: barcode.to_string(),
                }
                .into());
            }
        }
        Ok(())
    }
}

// =============================================================================
// Shared Handle
// =============================================================================

/// Shared, lock-guarded catalog.
///
/// The cart engine reads through it on every recompute; checkout and refund
/// write through it. A poisoned lock is recovered rather than propagated:
/// the catalog has no invariant a panicking reader could have broken.
#[derive(Debug, Clone, Default)]
pub struct CatalogHandle {
    inner: Arc<RwLock<Catalog>>,
}

impl CatalogHandle {
    pub fn new(catalog: Catalog) -> Self {
        CatalogHandle {
            inner: Arc::new(RwLock::new(catalog)),
        }
    }

    /// Executes a function with read access to the catalog.
    pub fn with_catalog<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&Catalog) -> R,
    {
        let catalog = self.inner.read().unwrap_or_else(|e| e.into_inner());
        f(&catalog)
    }

    /// Executes a function with exclusive write access to the catalog.
    pub fn with_catalog_mut<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut Catalog) -> R,
    {
        let mut catalog = self.inner.write().unwrap_or_else(|e| e.into_inner());
        f(&mut catalog)
    }

    /// Clone of a product by id (active or not).
    pub fn product(&self, id: &str) -> Option<Product> {
        self.with_catalog(|c| c.get(id).cloned())
    }

    /// Clone of the whole catalog, for persistence.
    pub fn snapshot(&self) -> Catalog {
        self.with_catalog(Catalog::clone)
    }

    /// Replaces the catalog, e.g. after loading the cache.
    pub fn replace(&self, catalog: Catalog) {
        self.with_catalog_mut(|c| *c = catalog);
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn new_product(code: &str, barcode: &str, price: i64, stock: i64) -> NewProduct {
        NewProduct {
            code: code.to_string(),
            barcode: barcode.to_string(),
            description: format!("Producto {}", code),
            purchase_price: Money::from_cents(price / 2),
            sale_price: Money::from_cents(price),
            igv_rate: TaxRate::igv(),
            stock,
            category: "Bebidas".to_string(),
        }
    }

    fn catalog_with(items: &[(&str, &str, i64, i64)]) -> (Catalog, Vec<String>) {
        let mut catalog = Catalog::new();
        let now = Utc::now();
        let ids = items
            .iter()
            .map(|(code, barcode, price, stock)| {
                catalog
                    .add(new_product(code, barcode, *price, *stock), now)
                    .unwrap()
                    .id
            })
            .collect();
        (catalog, ids)
    }

    #[test]
    fn test_add_registers_category_once() {
        let (mut catalog, _) = catalog_with(&[("P001", "100", 250, 150)]);
        let mut other = new_product("P002", "101", 450, 80);
        other.category = "Lácteos".to_string();
        catalog.add(other, Utc::now()).unwrap();
        catalog
            .add(new_product("P003", "102", 150, 200), Utc::now())
            .unwrap();

        assert_eq!(catalog.categories(), &["Bebidas", "Lácteos"]);
        assert_eq!(catalog.products().len(), 3);
    }

    #[test]
    fn test_add_rejects_duplicate_code_and_barcode() {
        let (mut catalog, _) = catalog_with(&[("P001", "100", 250, 150)]);

        let dup_code = catalog.add(new_product("P001", "999", 100, 1), Utc::now());
        assert!(matches!(
            dup_code,
            Err(CoreError::Validation(ValidationError::Duplicate { .. }))
        ));

        let dup_barcode = catalog.add(new_product("P009", "100", 100, 1), Utc::now());
        assert!(dup_barcode.is_err());
        assert_eq!(catalog.products().len(), 1);
    }

    #[test]
    fn test_decrement_then_increment_restores_stock() {
        let (mut catalog, ids) = catalog_with(&[("P001", "100", 250, 150)]);
        let now = Utc::now();

        assert_eq!(catalog.decrement_stock(&ids[0], 7, now), Some(143));
        assert_eq!(catalog.increment_stock(&ids[0], 7, now), Some(150));
    }

    #[test]
    fn test_decrement_clamps_at_zero() {
        let (mut catalog, ids) = catalog_with(&[("P001", "100", 250, 5)]);

        assert_eq!(catalog.decrement_stock(&ids[0], 8, Utc::now()), Some(0));
        assert_eq!(catalog.get(&ids[0]).unwrap().stock, 0);
        assert_eq!(catalog.decrement_stock("missing", 1, Utc::now()), None);
    }

    #[test]
    fn test_soft_delete_hides_from_lookups_only() {
        let (mut catalog, ids) = catalog_with(&[("P001", "100", 250, 5)]);
        catalog.soft_delete(&ids[0], Utc::now()).unwrap();

        assert!(catalog.by_code("P001").is_none());
        assert!(catalog.by_barcode("100").is_none());
        assert!(catalog.search("P001").unwrap().is_empty());
        assert!(!catalog.get(&ids[0]).unwrap().is_active);
        assert_eq!(catalog.products().len(), 1);
    }

    #[test]
    fn test_search_matches_fields() {
        let mut catalog = Catalog::new();
        let now = Utc::now();
        let mut inca = new_product("P001", "7501234567890", 250, 150);
        inca.description = "Inca Kola 500ml".to_string();
        catalog.add(inca, now).unwrap();
        let mut arroz = new_product("P006", "7501234567895", 1490, 50);
        arroz.description = "Arroz Costeño Extra 5kg".to_string();
        arroz.category = "Abarrotes".to_string();
        catalog.add(arroz, now).unwrap();

        assert_eq!(catalog.search("inca").unwrap().len(), 1);
        assert_eq!(catalog.search("ABARROTES").unwrap().len(), 1);
        assert_eq!(catalog.search("67895").unwrap().len(), 1);
        assert_eq!(catalog.search("p00").unwrap().len(), 2);
        assert_eq!(catalog.search("").unwrap().len(), 2);
        assert!(catalog.search("cerveza").unwrap().is_empty());
    }

    #[test]
    fn test_low_stock_uses_inclusive_threshold() {
        let (catalog, _) = catalog_with(&[
            ("P001", "100", 250, 10),
            ("P002", "101", 250, 11),
            ("P003", "102", 250, 0),
        ]);

        let low: Vec<&str> = catalog
            .low_stock(10)
            .into_iter()
            .map(|p| p.code.as_str())
            .collect();
        assert_eq!(low, vec!["P001", "P003"]);
    }

    #[test]
    fn test_update_is_partial_and_checks_uniqueness() {
        let (mut catalog, ids) = catalog_with(&[("P001", "100", 250, 10), ("P002", "101", 300, 5)]);

        let updated = catalog
            .update(
                &ids[0],
                ProductUpdate {
                    sale_price: Some(Money::from_cents(280)),
                    category: Some("Gaseosas".to_string()),
                    ..Default::default()
                },
                Utc::now(),
            )
            .unwrap();
        assert_eq!(updated.sale_price.cents(), 280);
        assert_eq!(updated.code, "P001");
        assert!(catalog.categories().iter().any(|c| c == "Gaseosas"));

        let clash = catalog.update(
            &ids[0],
            ProductUpdate {
                code: Some("P002".to_string()),
                ..Default::default()
            },
            Utc::now(),
        );
        assert!(clash.is_err());
        assert_eq!(catalog.get(&ids[0]).unwrap().code, "P001");
    }

    #[test]
    fn test_concurrent_decrements_never_go_negative() {
        let (catalog, ids) = catalog_with(&[("P001", "100", 250, 50)]);
        let handle = CatalogHandle::new(catalog);
        let id = ids[0].clone();

        let workers: Vec<_> = (0..8)
            .map(|_| {
                let handle = handle.clone();
                let id = id.clone();
                thread::spawn(move || {
                    for _ in 0..10 {
                        handle.with_catalog_mut(|c| c.decrement_stock(&id, 1, Utc::now()));
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        assert_eq!(handle.product(&id).unwrap().stock, 0);
    }
}
