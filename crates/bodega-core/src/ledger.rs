//! # Sales Ledger
//!
//! Append-only record of completed sales and the refunds made against them.
//!
//! ## Refund Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  complete_sale ──► Sale { status: Completed }                           │
//! │                        │                                                │
//! │        process_refund  │  some units back                               │
//! │                        ▼                                                │
//! │               Sale { status: PartialRefund } ◄──┐ more partial refunds │
//! │                        │                        │                       │
//! │                        │  refunded qty == sold qty for every line      │
//! │                        ▼                                                │
//! │               Sale { status: Refunded }    (further refunds rejected)   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The ledger never touches stock. Decrementing on sale and incrementing on
//! refund is the caller's job, line by line, after the ledger has accepted
//! the operation.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::pricing::CartTotals;
use crate::types::{CartLine, PaymentMethod, Refund, Sale, SaleStatus, TaxRate};

// =============================================================================
// Requests
// =============================================================================

/// Everything needed to book a sale.
#[derive(Debug, Clone)]
pub struct SaleRequest {
    pub employee_id: String,
    pub employee_name: String,
    pub terminal_id: String,
    pub lines: Vec<CartLine>,
    pub payment_method: PaymentMethod,
    pub session_start: DateTime<Utc>,
}

/// Everything needed to book a refund. `lines` are already prorated (see
/// [`prorated_refund_line`]) and `reason` is already validated.
#[derive(Debug, Clone)]
pub struct RefundRequest {
    pub sale_id: String,
    pub employee_id: String,
    pub employee_name: String,
    pub lines: Vec<CartLine>,
    pub reason: String,
}

/// Persisted form of the ledger (the `sales` blob).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub sales: Vec<Sale>,
    pub refunds: Vec<Refund>,
}

// =============================================================================
// Ledger
// =============================================================================

#[derive(Debug, Clone)]
pub struct SalesLedger {
    igv_rate: TaxRate,
    sales: Vec<Sale>,
    refunds: Vec<Refund>,
}

impl Default for SalesLedger {
    fn default() -> Self {
        SalesLedger::new(TaxRate::igv())
    }
}

impl SalesLedger {
    pub fn new(igv_rate: TaxRate) -> Self {
        SalesLedger {
            igv_rate,
            sales: Vec::new(),
            refunds: Vec::new(),
        }
    }

    /// Books a sale from a copy of the cart lines.
    ///
    /// Totals are recomputed with [`CartTotals::from_lines`] so the sale
    /// matches the cart to the céntimo.
    pub fn complete_sale(&mut self, request: SaleRequest, now: DateTime<Utc>) -> CoreResult<Sale> {
        if request.lines.is_empty() {
            return Err(CoreError::EmptySale);
        }

        let totals = CartTotals::from_lines(&request.lines, self.igv_rate);
        let sale = Sale {
            id: uuid::Uuid::new_v4().to_string(),
            ticket_number: self.next_ticket_number(now),
            employee_id: request.employee_id,
            employee_name: request.employee_name,
            terminal_id: request.terminal_id,
            lines: request.lines,
            subtotal: totals.subtotal,
            discount_amount: totals.discount,
            igv_amount: totals.igv,
            total: totals.total,
            payment_method: request.payment_method,
            status: SaleStatus::Completed,
            created_at: now,
            session_start: request.session_start,
            session_end: now,
        };

        info!(
            ticket = %sale.ticket_number,
            employee_id = %sale.employee_id,
            total = %sale.total,
            "Sale completed"
        );
        self.sales.push(sale.clone());
        Ok(sale)
    }

    /// Books a refund against an earlier sale.
    ///
    /// Either the whole request is accepted or nothing changes.
    pub fn process_refund(&mut self, request: RefundRequest, now: DateTime<Utc>) -> CoreResult<Refund> {
        let sale_index = self
            .sales
            .iter()
            .position(|s| s.id == request.sale_id)
            .ok_or_else(|| CoreError::SaleNotFound(request.sale_id.clone()))?;

        if request.lines.is_empty() {
            return Err(ValidationError::Required {
                field: "refund lines".to_string(),
            }
            .into());
        }
        if self.sales[sale_index].status == SaleStatus::Refunded {
            return Err(CoreError::AlreadyRefunded(request.sale_id));
        }

        let mut requested: HashMap<&str, i64> = HashMap::new();
        for line in &request.lines {
            if line.quantity <= 0 {
                return Err(ValidationError::MustBePositive {
                    field: "refund quantity".to_string(),
                }
                .into());
            }
            *requested.entry(line.product_id()).or_insert(0) += line.quantity;
        }

        let sale = &self.sales[sale_index];
        for (product_id, qty) in &requested {
            if sale.quantity_of(product_id) == 0 {
                return Err(CoreError::ProductNotInSale {
                    sale_id: sale.id.clone(),
                    product_id: product_id.to_string(),
                });
            }
            let refundable = self.refundable_quantity(&sale.id, product_id);
            if *qty > refundable {
                return Err(CoreError::RefundExceedsSale {
                    product_id: product_id.to_string(),
                    refundable,
                    requested: *qty,
                });
            }
        }

        let refund = Refund {
            id: uuid::Uuid::new_v4().to_string(),
            original_sale_id: sale.id.clone(),
            ticket_number: sale.ticket_number.clone(),
            employee_id: request.employee_id,
            employee_name: request.employee_name,
            refund_amount: request.lines.iter().map(|l| l.total).sum(),
            lines: request.lines,
            reason: request.reason,
            created_at: now,
        };
        self.refunds.push(refund.clone());

        let status = self.status_after_refunds(sale_index);
        self.sales[sale_index].status = status;

        info!(
            ticket = %refund.ticket_number,
            amount = %refund.refund_amount,
            status = ?status,
            "Refund processed"
        );
        Ok(refund)
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    pub fn sale(&self, sale_id: &str) -> Option<&Sale> {
        self.sales.iter().find(|s| s.id == sale_id)
    }

    pub fn sale_by_ticket(&self, ticket_number: &str) -> Option<&Sale> {
        let ticket = ticket_number.trim();
        self.sales.iter().find(|s| s.ticket_number == ticket)
    }

    pub fn sales(&self) -> &[Sale] {
        &self.sales
    }

    pub fn refunds(&self) -> &[Refund] {
        &self.refunds
    }

    /// Sales whose UTC calendar date is `date`.
    pub fn sales_on(&self, date: NaiveDate) -> Vec<&Sale> {
        self.sales
            .iter()
            .filter(|s| s.created_at.date_naive() == date)
            .collect()
    }

    pub fn sales_by_employee(&self, employee_id: &str) -> Vec<&Sale> {
        self.sales
            .iter()
            .filter(|s| s.employee_id == employee_id)
            .collect()
    }

    pub fn refunds_for_sale(&self, sale_id: &str) -> Vec<&Refund> {
        self.refunds
            .iter()
            .filter(|r| r.original_sale_id == sale_id)
            .collect()
    }

    /// Units of `product_id` already refunded against `sale_id`.
    pub fn refunded_quantity(&self, sale_id: &str, product_id: &str) -> i64 {
        self.refunds_for_sale(sale_id)
            .iter()
            .flat_map(|r| r.lines.iter())
            .filter(|l| l.product_id() == product_id)
            .map(|l| l.quantity)
            .sum()
    }

    /// Units of `product_id` that can still be refunded on `sale_id`.
    pub fn refundable_quantity(&self, sale_id: &str, product_id: &str) -> i64 {
        let sold = self.sale(sale_id).map_or(0, |s| s.quantity_of(product_id));
        (sold - self.refunded_quantity(sale_id, product_id)).max(0)
    }

    // -------------------------------------------------------------------------
    // Persistence
    // -------------------------------------------------------------------------

    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            sales: self.sales.clone(),
            refunds: self.refunds.clone(),
        }
    }

    pub fn restore(&mut self, snapshot: LedgerSnapshot) {
        debug!(
            sales = snapshot.sales.len(),
            refunds = snapshot.refunds.len(),
            "Ledger restored"
        );
        self.sales = snapshot.sales;
        self.refunds = snapshot.refunds;
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    /// `T<epoch millis>`, moved forward a millisecond at a time until it is
    /// unique in the ledger.
    fn next_ticket_number(&self, now: DateTime<Utc>) -> String {
        let mut millis = now.timestamp_millis();
        loop {
            let ticket = format!("T{millis}");
            if self.sale_by_ticket(&ticket).is_none() {
                return ticket;
            }
            millis += 1;
        }
    }

    fn status_after_refunds(&self, sale_index: usize) -> SaleStatus {
        let sale = &self.sales[sale_index];
        let fully_refunded = sale
            .lines
            .iter()
            .all(|line| self.refundable_quantity(&sale.id, line.product_id()) == 0);

        if fully_refunded {
            SaleStatus::Refunded
        } else {
            SaleStatus::PartialRefund
        }
    }
}

/// Builds the refund line for `quantity` units of an original sale line.
///
/// The discount is taken back in proportion to the units returned:
/// `total = unit_price × qty − discount × qty / original_qty`, rounded half
/// up to the céntimo.
pub fn prorated_refund_line(original: &CartLine, quantity: i64) -> CartLine {
    let mut line = original.clone();
    line.quantity = quantity;
    line.set_discount(original.discount.prorate(quantity, original.quantity));
    line
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::Money;
    use crate::types::ProductSnapshot;
    use chrono::{Duration, TimeZone};

    fn line(id: &str, qty: i64, unit: i64, discount: i64) -> CartLine {
        let mut line = CartLine {
            product: ProductSnapshot {
                id: id.to_string(),
                code: format!("P-{id}"),
                description: format!("Product {id}"),
                category: "Test".to_string(),
            },
            quantity: qty,
            unit_price: Money::from_cents(unit),
            discount: Money::zero(),
            total: Money::zero(),
            promotional: false,
        };
        line.set_discount(Money::from_cents(discount));
        line
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 15, 14, 30, 0).unwrap()
    }

    fn sell(ledger: &mut SalesLedger, lines: Vec<CartLine>) -> Sale {
        ledger
            .complete_sale(
                SaleRequest {
                    employee_id: "1".to_string(),
                    employee_name: "Juan Pérez".to_string(),
                    terminal_id: "T1".to_string(),
                    lines,
                    payment_method: PaymentMethod::Cash,
                    session_start: now() - Duration::minutes(30),
                },
                now(),
            )
            .unwrap()
    }

    fn refund_request(sale: &Sale, lines: Vec<CartLine>) -> RefundRequest {
        RefundRequest {
            sale_id: sale.id.clone(),
            employee_id: "3".to_string(),
            employee_name: "Carlos Admin".to_string(),
            lines,
            reason: "Producto vencido".to_string(),
        }
    }

    #[test]
    fn test_complete_sale_reference_totals() {
        let mut ledger = SalesLedger::default();

        let sale = sell(&mut ledger, vec![line("1", 2, 250, 0)]);
        assert_eq!(sale.subtotal.cents(), 500);
        assert_eq!(sale.igv_amount.cents(), 90);
        assert_eq!(sale.total.cents(), 590);
        assert_eq!(sale.status, SaleStatus::Completed);
        assert_eq!(sale.ticket_number, format!("T{}", now().timestamp_millis()));

        let discounted = sell(&mut ledger, vec![line("1", 2, 250, 100)]);
        assert_eq!(discounted.discount_amount.cents(), 100);
        assert_eq!(discounted.igv_amount.cents(), 72);
        assert_eq!(discounted.total.cents(), 472);
    }

    #[test]
    fn test_ticket_numbers_are_unique() {
        let mut ledger = SalesLedger::default();
        let a = sell(&mut ledger, vec![line("1", 1, 250, 0)]);
        let b = sell(&mut ledger, vec![line("1", 1, 250, 0)]);

        assert_ne!(a.ticket_number, b.ticket_number);
        assert_eq!(ledger.sale_by_ticket(&b.ticket_number).unwrap().id, b.id);
    }

    #[test]
    fn test_empty_sale_is_rejected() {
        let mut ledger = SalesLedger::default();
        let result = ledger.complete_sale(
            SaleRequest {
                employee_id: "1".to_string(),
                employee_name: "Juan".to_string(),
                terminal_id: "T1".to_string(),
                lines: vec![],
                payment_method: PaymentMethod::Card,
                session_start: now(),
            },
            now(),
        );
        assert!(matches!(result, Err(CoreError::EmptySale)));
        assert!(ledger.sales().is_empty());
    }

    #[test]
    fn test_refund_status_transitions() {
        let mut ledger = SalesLedger::default();
        let sale = sell(&mut ledger, vec![line("1", 3, 250, 0), line("2", 1, 450, 0)]);

        ledger
            .process_refund(refund_request(&sale, vec![line("1", 1, 250, 0)]), now())
            .unwrap();
        assert_eq!(ledger.sale(&sale.id).unwrap().status, SaleStatus::PartialRefund);
        assert_eq!(ledger.refunded_quantity(&sale.id, "1"), 1);
        assert_eq!(ledger.refundable_quantity(&sale.id, "1"), 2);

        ledger
            .process_refund(
                refund_request(&sale, vec![line("1", 2, 250, 0), line("2", 1, 450, 0)]),
                now(),
            )
            .unwrap();
        assert_eq!(ledger.sale(&sale.id).unwrap().status, SaleStatus::Refunded);
        assert_eq!(ledger.refunds_for_sale(&sale.id).len(), 2);

        let again = ledger.process_refund(refund_request(&sale, vec![line("1", 1, 250, 0)]), now());
        assert!(matches!(again, Err(CoreError::AlreadyRefunded(_))));
    }

    #[test]
    fn test_over_refund_is_rejected_whole() {
        let mut ledger = SalesLedger::default();
        let sale = sell(&mut ledger, vec![line("1", 2, 250, 0), line("2", 1, 450, 0)]);

        let result = ledger.process_refund(
            refund_request(&sale, vec![line("2", 1, 450, 0), line("1", 3, 250, 0)]),
            now(),
        );
        assert!(matches!(
            result,
            Err(CoreError::RefundExceedsSale { refundable: 2, requested: 3, .. })
        ));
        assert!(ledger.refunds().is_empty());
        assert_eq!(ledger.sale(&sale.id).unwrap().status, SaleStatus::Completed);

        let foreign = ledger.process_refund(refund_request(&sale, vec![line("9", 1, 30, 0)]), now());
        assert!(matches!(foreign, Err(CoreError::ProductNotInSale { .. })));
    }

    #[test]
    fn test_refund_unknown_sale_mutates_nothing() {
        let mut ledger = SalesLedger::default();
        sell(&mut ledger, vec![line("1", 1, 250, 0)]);

        let result = ledger.process_refund(
            RefundRequest {
                sale_id: "missing".to_string(),
                employee_id: "1".to_string(),
                employee_name: "Juan".to_string(),
                lines: vec![line("1", 1, 250, 0)],
                reason: "x".to_string(),
            },
            now(),
        );
        assert!(matches!(result, Err(CoreError::SaleNotFound(_))));
        assert!(ledger.refunds().is_empty());
    }

    #[test]
    fn test_refund_amount_sums_line_totals() {
        let mut ledger = SalesLedger::default();
        // 3x2 on 2.50: three units, 2.50 off.
        let sold = line("1", 3, 250, 250);
        let sale = sell(&mut ledger, vec![sold.clone()]);

        let back = prorated_refund_line(&sold, 1);
        assert_eq!(back.discount.cents(), 83);
        assert_eq!(back.total.cents(), 167);

        let refund = ledger
            .process_refund(refund_request(&sale, vec![back]), now())
            .unwrap();
        assert_eq!(refund.refund_amount.cents(), 167);
        assert_eq!(refund.ticket_number, sale.ticket_number);
    }

    #[test]
    fn test_prorated_refund_rounds_half_up() {
        let sold = line("1", 2, 250, 1);
        let back = prorated_refund_line(&sold, 1);
        // 0.5 céntimo rounds up.
        assert_eq!(back.discount.cents(), 1);
        assert_eq!(back.total.cents(), 249);

        let all = prorated_refund_line(&sold, 2);
        assert_eq!(all.total, sold.total);
    }

    #[test]
    fn test_queries_by_date_and_employee() {
        let mut ledger = SalesLedger::default();
        sell(&mut ledger, vec![line("1", 1, 250, 0)]);

        assert_eq!(ledger.sales_on(now().date_naive()).len(), 1);
        assert!(ledger
            .sales_on((now() + Duration::days(1)).date_naive())
            .is_empty());
        assert_eq!(ledger.sales_by_employee("1").len(), 1);
        assert!(ledger.sales_by_employee("2").is_empty());
    }

    #[test]
    fn test_snapshot_restore() {
        let mut ledger = SalesLedger::default();
        let sale = sell(&mut ledger, vec![line("1", 2, 250, 0)]);
        ledger
            .process_refund(refund_request(&sale, vec![line("1", 1, 250, 0)]), now())
            .unwrap();

        let json = serde_json::to_string(&ledger.snapshot()).unwrap();
        let mut restored = SalesLedger::default();
        restored.restore(serde_json::from_str(&json).unwrap());

        assert_eq!(restored.snapshot(), ledger.snapshot());
        assert_eq!(restored.refundable_quantity(&sale.id, "1"), 1);
    }
}
