//! # Terminal
//!
//! One checkout: every store plus the rules that tie them together.
//!
//! ## Checkout Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Terminal Operations                                  │
//! │                                                                         │
//! │  login ───► AuthManager::login ───► CartEngine::set_current_user       │
//! │                                                                         │
//! │  scan ────► Catalog (barcode, then code) ───► CartEngine::add_line     │
//! │               │                                       │                 │
//! │               └──────── record_activity ◄─────────────┘                 │
//! │                                                                         │
//! │  checkout ─► tender::settle ─► SalesLedger::complete_sale              │
//! │                                      │                                  │
//! │                                      ▼                                  │
//! │                       Catalog::decrement_stock (per line)               │
//! │                                      │                                  │
//! │                                      ▼                                  │
//! │                       clear_cart ──► Receipt                            │
//! │                                                                         │
//! │  refund ──► validate reason ─► prorate lines ─► process_refund         │
//! │                                                      │                  │
//! │                                                      ▼                  │
//! │                                 Catalog::increment_stock (per line)     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The ledger never touches stock; this type does, once per line, right
//! after the ledger accepted the sale or refund.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use bodega_core::offers::Offer;
use bodega_core::tender::{self, Tender};
use bodega_core::validation::validate_refund_reason;
use bodega_core::{
    prorated_refund_line, AuthManager, AuthSettings, CartEngine, CartLine, Catalog,
    CatalogHandle, Clock, CoreError, IdleStatus, OfferHandle, OfferRegistry, Product, Refund,
    RefundRequest, Sale, SaleRequest, SalesLedger, SalesReport, UserView,
};
use bodega_db::{BlobKey, CacheRepository, Database, DbConfig};

use crate::config::TerminalConfig;
use crate::error::{ApiError, ApiResult};
use crate::receipt::Receipt;

/// Units of one product to give back, by the code printed on the receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundSelection {
    pub product_code: String,
    pub quantity: i64,
}

pub struct Terminal {
    config: TerminalConfig,
    clock: Arc<dyn Clock>,
    catalog: CatalogHandle,
    offers: OfferHandle,
    auth: AuthManager,
    cart: CartEngine,
    ledger: SalesLedger,
    db: Option<Database>,
}

impl std::fmt::Debug for Terminal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Terminal")
            .field("terminal_id", &self.config.terminal_id)
            .field("auth", &self.auth)
            .field("cart", &self.cart)
            .field("persistent", &self.db.is_some())
            .finish()
    }
}

impl Terminal {
    // =========================================================================
    // Construction
    // =========================================================================

    /// Empty terminal with production password hashing.
    pub fn new(config: TerminalConfig, clock: Arc<dyn Clock>) -> Self {
        Self::with_auth_settings(config, AuthSettings::default(), clock)
    }

    /// Empty terminal with explicit hashing cost. The idle timeout always
    /// comes from `config`.
    pub fn with_auth_settings(
        config: TerminalConfig,
        settings: AuthSettings,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let catalog = CatalogHandle::default();
        let offers = OfferHandle::default();
        let settings = settings.with_idle_timeout(config.idle_timeout_secs);
        let auth = AuthManager::new(settings, clock.clone());
        let cart = CartEngine::new(
            catalog.clone(),
            offers.clone(),
            config.igv_rate(),
            clock.clone(),
        );
        let ledger = SalesLedger::new(config.igv_rate());

        Terminal {
            config,
            clock,
            catalog,
            offers,
            auth,
            cart,
            ledger,
            db: None,
        }
    }

    /// Replaces the catalog and offers, e.g. with demo data.
    pub fn with_stores(self, catalog: Catalog, offers: OfferRegistry) -> Self {
        self.catalog.replace(catalog);
        self.offers.replace(offers);
        self
    }

    /// Attaches the cache store used by [`Terminal::load`] and
    /// [`Terminal::save`].
    pub fn with_database(mut self, db: Database) -> Self {
        self.db = Some(db);
        self
    }

    /// Opens the configured cache database and restores every store from it.
    pub async fn open(config: TerminalConfig, clock: Arc<dyn Clock>) -> ApiResult<Self> {
        let db = Database::new(DbConfig::new(&config.database_path)).await?;
        let mut terminal = Terminal::new(config, clock).with_database(db);
        terminal.load().await;
        Ok(terminal)
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    /// Restores every store from the cache.
    ///
    /// The cache is best effort: a blob that is missing or cannot be read
    /// leaves that store empty and is logged.
    pub async fn load(&mut self) {
        let Some(cache) = self.cache() else {
            return;
        };

        if let Some(catalog) = read_blob::<Catalog>(&cache, BlobKey::Products).await {
            self.catalog.replace(catalog);
        }
        if let Some(offers) = read_blob::<OfferRegistry>(&cache, BlobKey::Offers).await {
            self.offers.replace(offers);
        }
        if let Some(auth) = read_blob(&cache, BlobKey::Auth).await {
            self.auth.restore(auth);
            self.auth.bind_terminal(&self.config.terminal_id);
        }
        if let Some(ledger) = read_blob(&cache, BlobKey::Sales).await {
            self.ledger.restore(ledger);
        }
        // Last: recomputing the cart needs the catalog and offers.
        if let Some(cart) = read_blob(&cache, BlobKey::Cart).await {
            self.cart.restore(cart);
        }

        let user_id = self.auth.current_user().map(|u| u.id);
        if self.cart.current_user() != user_id.as_deref() {
            self.cart.set_current_user(user_id.as_deref());
        }

        info!(
            products = self.catalog.with_catalog(|c| c.products().len()),
            users = self.auth.users().len(),
            sales = self.ledger.sales().len(),
            logged_in = ?user_id,
            "Terminal state restored"
        );
        if self.auth.users().is_empty() {
            warn!("No employees in the cache; run the seed binary first");
        }
    }

    /// Writes every store to the cache. No-op without a database.
    pub async fn save(&self) -> ApiResult<()> {
        let Some(cache) = self.cache() else {
            return Ok(());
        };

        cache.save(BlobKey::Products, &self.catalog.snapshot()).await?;
        cache.save(BlobKey::Offers, &self.offers.snapshot()).await?;
        cache.save(BlobKey::Auth, &self.auth.snapshot()).await?;
        cache.save(BlobKey::Cart, &self.cart.snapshot()).await?;
        cache.save(BlobKey::Sales, &self.ledger.snapshot()).await?;

        debug!("Terminal state saved");
        Ok(())
    }

    /// Closes the cache database, waiting for in-flight writes.
    pub async fn shutdown(&self) {
        if let Some(db) = &self.db {
            db.close().await;
        }
    }

    fn cache(&self) -> Option<CacheRepository> {
        self.db.as_ref().map(Database::cache)
    }

    // =========================================================================
    // Session
    // =========================================================================

    /// Logs an employee in at this terminal and hands them their cart.
    ///
    /// ## Errors
    /// - `INVALID_CREDENTIALS` for an unknown code or wrong password
    /// - `ACCOUNT_INACTIVE` for a deactivated employee
    /// - `SESSION_CONFLICT` if they are logged in at another terminal
    pub fn login(&mut self, code: &str, password: &str) -> ApiResult<UserView> {
        if !self.auth.login(code, password, &self.config.terminal_id)? {
            warn!(terminal_id = %self.config.terminal_id, "Invalid credentials");
            return Err(ApiError::invalid_credentials());
        }
        let user = self.auth.current_user().ok_or_else(ApiError::not_logged_in)?;
        self.cart.set_current_user(Some(&user.id));
        Ok(user)
    }

    /// Logs out and parks the cart. No-op when nobody is logged in.
    pub fn logout(&mut self) {
        self.auth.logout();
        self.cart.set_current_user(None);
    }

    /// Idle poll; on timeout the cart is parked like on logout.
    pub fn tick_idle(&mut self) -> IdleStatus {
        let status = self.auth.check_idle();
        if let IdleStatus::TimedOut { employee_id, .. } = &status {
            info!(employee_id = %employee_id, "Cart parked after inactivity");
            self.cart.set_current_user(None);
        }
        status
    }

    /// Resets the idle countdown. Every cart operation calls this.
    pub fn record_activity(&mut self) {
        self.auth.record_activity();
    }

    pub fn current_user(&self) -> Option<UserView> {
        self.auth.current_user()
    }

    pub fn seconds_left(&self) -> i64 {
        self.auth.seconds_left()
    }

    fn require_user(&self) -> ApiResult<UserView> {
        self.auth.current_user().ok_or_else(ApiError::not_logged_in)
    }

    // =========================================================================
    // Cart
    // =========================================================================

    /// Adds `qty` units of the product with this barcode or code.
    ///
    /// Returns the product's line after offers were applied.
    pub fn scan(&mut self, code_or_barcode: &str, qty: i64) -> ApiResult<CartLine> {
        self.require_user()?;
        let product = self.find_product(code_or_barcode)?;

        self.cart.add_line(&product, qty)?;
        self.record_activity();

        self.cart
            .line(&product.id)
            .cloned()
            .ok_or_else(|| ApiError::internal("Scanned line missing from cart"))
    }

    /// Sets the quantity of a line; zero removes it.
    pub fn set_quantity(&mut self, code_or_barcode: &str, qty: i64) -> ApiResult<()> {
        self.require_user()?;
        let product = self.find_product(code_or_barcode)?;
        self.cart.set_quantity(&product.id, qty)?;
        self.record_activity();
        Ok(())
    }

    pub fn remove_line(&mut self, code_or_barcode: &str) -> ApiResult<()> {
        self.require_user()?;
        let product = self.find_product(code_or_barcode)?;
        self.cart.remove_line(&product.id)?;
        self.record_activity();
        Ok(())
    }

    pub fn clear_cart(&mut self) -> ApiResult<()> {
        self.require_user()?;
        self.cart.clear_cart();
        self.record_activity();
        Ok(())
    }

    /// Active product by barcode, falling back to code.
    fn find_product(&self, code_or_barcode: &str) -> ApiResult<Product> {
        let key = code_or_barcode.trim();
        self.catalog
            .with_catalog(|c| c.by_barcode(key).or_else(|| c.by_code(key)).cloned())
            .ok_or_else(|| ApiError::not_found("Product", key))
    }

    // =========================================================================
    // Checkout
    // =========================================================================

    /// Charges the cart, books the sale and takes the goods off the shelf.
    ///
    /// Nothing changes if the tender is short or the cart is empty.
    pub fn checkout(&mut self, tender: Tender) -> ApiResult<Receipt> {
        let user = self.require_user()?;
        if self.cart.is_empty() {
            return Err(CoreError::EmptySale.into());
        }

        let settlement = tender::settle(&self.cart.totals(), tender)?;
        let session_start = self
            .auth
            .current_session()
            .map(|s| s.start_time)
            .ok_or_else(ApiError::not_logged_in)?;
        let now = self.clock.now();

        let sale = self.ledger.complete_sale(
            SaleRequest {
                employee_id: user.id,
                employee_name: user.name,
                terminal_id: self.config.terminal_id.clone(),
                lines: self.cart.lines().to_vec(),
                payment_method: settlement.method,
                session_start,
            },
            now,
        )?;

        self.catalog.with_catalog_mut(|catalog| {
            for line in &sale.lines {
                if catalog.decrement_stock(line.product_id(), line.quantity, now).is_none() {
                    warn!(product_id = %line.product_id(), "Sold product missing from catalog");
                }
            }
        });

        self.cart.clear_cart();
        self.record_activity();

        info!(
            ticket = %sale.ticket_number,
            method = ?settlement.method,
            charged = %settlement.charged,
            change = %settlement.change,
            "Checkout complete"
        );
        Ok(Receipt::new(&self.config, sale, settlement))
    }

    // =========================================================================
    // Refunds
    // =========================================================================

    pub fn find_ticket(&self, ticket_number: &str) -> ApiResult<&Sale> {
        self.ledger
            .sale_by_ticket(ticket_number)
            .ok_or_else(|| ApiError::not_found("Sale", ticket_number.trim()))
    }

    /// Gives back the selected units of a sale and puts them back on the
    /// shelf.
    ///
    /// Each refunded line carries its share of the original discount.
    pub fn refund(
        &mut self,
        ticket_number: &str,
        selections: &[RefundSelection],
        reason: &str,
    ) -> ApiResult<Refund> {
        let user = self.require_user()?;
        validate_refund_reason(reason)?;
        let sale = self.find_ticket(ticket_number)?.clone();

        let lines = selections
            .iter()
            .map(|selection| {
                let code = selection.product_code.trim();
                sale.lines
                    .iter()
                    .find(|line| line.product.code == code)
                    .map(|line| prorated_refund_line(line, selection.quantity))
                    .ok_or_else(|| CoreError::ProductNotInSale {
                        sale_id: sale.id.clone(),
                        product_id: code.to_string(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let now = self.clock.now();
        let refund = self.ledger.process_refund(
            RefundRequest {
                sale_id: sale.id.clone(),
                employee_id: user.id,
                employee_name: user.name,
                lines,
                reason: reason.trim().to_string(),
            },
            now,
        )?;

        self.catalog.with_catalog_mut(|catalog| {
            for line in &refund.lines {
                if catalog.increment_stock(line.product_id(), line.quantity, now).is_none() {
                    warn!(product_id = %line.product_id(), "Refunded product missing from catalog");
                }
            }
        });
        self.record_activity();

        Ok(refund)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn search(&self, query: &str) -> ApiResult<Vec<Product>> {
        let found: Vec<Product> = self
            .catalog
            .with_catalog(|c| c.search(query).map(|ps| ps.into_iter().cloned().collect()))?;
        Ok(found)
    }

    /// Products at or below the configured threshold.
    pub fn low_stock(&self) -> Vec<Product> {
        let threshold = self.config.low_stock_threshold;
        self.catalog
            .with_catalog(|c| c.low_stock(threshold).into_iter().cloned().collect())
    }

    /// Offers live right now.
    pub fn live_offers(&self) -> Vec<Offer> {
        self.offers.active_offers(self.clock.now())
    }

    /// Report for one local calendar day.
    pub fn report_for(&self, date: NaiveDate) -> SalesReport {
        let offset = self.config.utc_offset();
        SalesReport::build(
            self.ledger
                .sales()
                .iter()
                .filter(|s| s.created_at.with_timezone(&offset).date_naive() == date),
            offset,
        )
    }

    /// Today's date in the store's offset.
    pub fn today(&self) -> NaiveDate {
        self.clock
            .now()
            .with_timezone(&self.config.utc_offset())
            .date_naive()
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn config(&self) -> &TerminalConfig {
        &self.config
    }

    pub fn catalog(&self) -> &CatalogHandle {
        &self.catalog
    }

    pub fn offers(&self) -> &OfferHandle {
        &self.offers
    }

    pub fn auth(&self) -> &AuthManager {
        &self.auth
    }

    /// Directory administration (adding employees, resetting passwords).
    pub fn auth_mut(&mut self) -> &mut AuthManager {
        &mut self.auth
    }

    pub fn cart(&self) -> &CartEngine {
        &self.cart
    }

    pub fn ledger(&self) -> &SalesLedger {
        &self.ledger
    }
}

async fn read_blob<T: DeserializeOwned>(cache: &CacheRepository, key: BlobKey) -> Option<T> {
    match cache.load(key).await {
        Ok(value) => value,
        Err(e) => {
            warn!(key = %key, error = %e, "Ignoring unreadable cache blob");
            None
        }
    }
}
