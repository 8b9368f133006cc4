//! # Receipt
//!
//! What the customer takes home after checkout: the booked sale plus how it
//! was paid.
//!
//! ```text
//!               Bodega POS
//! Ticket T1718445600000    CAJA-01
//! 2025-06-15 04:00  Juan Pérez
//! ----------------------------------------
//! 3 x Inca Kola 500ml             S/ 7.50
//!     Offer                      -S/ 2.50
//! ----------------------------------------
//! Subtotal                        S/ 7.50
//! Discount                       -S/ 2.50
//! IGV 18%                         S/ 0.90
//! TOTAL                           S/ 5.90
//! Cash                            S/ 5.90
//! Received                       S/ 10.00
//! Change                          S/ 4.10
//! ```

use std::fmt::Write as _;

use chrono::{DateTime, FixedOffset};
use serde::Serialize;

use bodega_core::{Money, PaymentMethod, Sale, Settlement, TaxRate};

use crate::config::TerminalConfig;

const WIDTH: usize = 40;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    pub store_name: String,
    pub sale: Sale,
    pub settlement: Settlement,
    pub igv_rate: TaxRate,
    /// Sale time in the store's offset.
    pub printed_at: DateTime<FixedOffset>,
}

impl Receipt {
    pub fn new(config: &TerminalConfig, sale: Sale, settlement: Settlement) -> Self {
        let printed_at = sale.created_at.with_timezone(&config.utc_offset());
        Receipt {
            store_name: config.store_name.clone(),
            igv_rate: config.igv_rate(),
            sale,
            settlement,
            printed_at,
        }
    }

    pub fn ticket_number(&self) -> &str {
        &self.sale.ticket_number
    }

    /// Plain-text rendering for the shell and the receipt printer.
    pub fn render(&self, config: &TerminalConfig) -> String {
        let money = |m: Money| config.format_money(m);
        let discount = |m: Money| config.format_money(Money::zero() - m);
        let rule = "-".repeat(WIDTH);
        let mut out = String::new();

        let _ = writeln!(out, "{:^WIDTH$}", self.store_name);
        let _ = writeln!(
            out,
            "{}",
            row(&format!("Ticket {}", self.sale.ticket_number), &self.sale.terminal_id)
        );
        let _ = writeln!(
            out,
            "{}  {}",
            self.printed_at.format("%Y-%m-%d %H:%M"),
            self.sale.employee_name
        );
        let _ = writeln!(out, "{rule}");

        for line in &self.sale.lines {
            let label = format!("{} x {}", line.quantity, line.product.description);
            let _ = writeln!(out, "{}", row(&label, &money(line.gross())));
            if line.discount.is_positive() {
                let why = if line.promotional { "    Free item" } else { "    Offer" };
                let _ = writeln!(out, "{}", row(why, &discount(line.discount)));
            }
        }

        let _ = writeln!(out, "{rule}");
        let _ = writeln!(out, "{}", row("Subtotal", &money(self.sale.subtotal)));
        if self.sale.discount_amount.is_positive() {
            let _ = writeln!(out, "{}", row("Discount", &discount(self.sale.discount_amount)));
        }
        let _ = writeln!(
            out,
            "{}",
            row(&format!("IGV {}%", self.igv_rate.percentage()), &money(self.sale.igv_amount))
        );
        let _ = writeln!(out, "{}", row("TOTAL", &money(self.sale.total)));

        match self.settlement.method {
            PaymentMethod::Cash => {
                let _ = writeln!(out, "{}", row("Cash", &money(self.settlement.charged)));
                let _ = writeln!(out, "{}", row("Received", &money(self.settlement.received)));
                let _ = writeln!(out, "{}", row("Change", &money(self.settlement.change)));
            }
            PaymentMethod::Card => {
                let _ = writeln!(out, "{}", row("Card", &money(self.settlement.charged)));
            }
        }

        out
    }
}

fn row(label: &str, value: &str) -> String {
    let pad = WIDTH.saturating_sub(label.chars().count() + value.chars().count()).max(1);
    format!("{label}{}{value}", " ".repeat(pad))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bodega_core::{CartLine, ProductSnapshot, SaleStatus};
    use chrono::{TimeZone, Utc};

    fn sale() -> Sale {
        let mut line = CartLine {
            product: ProductSnapshot {
                id: "p1".to_string(),
                code: "P001".to_string(),
                description: "Inca Kola 500ml".to_string(),
                category: "Bebidas".to_string(),
            },
            quantity: 3,
            unit_price: Money::from_cents(250),
            discount: Money::zero(),
            total: Money::from_cents(750),
            promotional: false,
        };
        line.set_discount(Money::from_cents(250));
        let at = Utc.with_ymd_and_hms(2025, 6, 15, 14, 30, 0).unwrap();

        Sale {
            id: "s1".to_string(),
            ticket_number: "T1".to_string(),
            employee_id: "1".to_string(),
            employee_name: "Juan Pérez".to_string(),
            terminal_id: "CAJA-01".to_string(),
            lines: vec![line],
            subtotal: Money::from_cents(750),
            discount_amount: Money::from_cents(250),
            igv_amount: Money::from_cents(90),
            total: Money::from_cents(590),
            payment_method: PaymentMethod::Cash,
            status: SaleStatus::Completed,
            created_at: at,
            session_start: at,
            session_end: at,
        }
    }

    #[test]
    fn test_cash_receipt() {
        let config = TerminalConfig::default();
        let receipt = Receipt::new(
            &config,
            sale(),
            Settlement {
                method: PaymentMethod::Cash,
                charged: Money::from_cents(590),
                received: Money::from_cents(1000),
                change: Money::from_cents(410),
            },
        );

        let text = receipt.render(&config);
        assert!(text.contains("Ticket T1"));
        assert!(text.contains("2025-06-15 09:30"));
        assert!(text.contains("-S/ 2.50"));
        assert!(text.contains("IGV 18%"));
        assert!(text.lines().any(|l| l.starts_with("Change") && l.ends_with("S/ 4.10")));
        assert!(text.lines().all(|l| l.chars().count() <= WIDTH));
    }

    #[test]
    fn test_card_receipt_has_no_change() {
        let config = TerminalConfig::default();
        let receipt = Receipt::new(
            &config,
            sale(),
            Settlement {
                method: PaymentMethod::Card,
                charged: Money::from_cents(590),
                received: Money::from_cents(590),
                change: Money::zero(),
            },
        );

        let text = receipt.render(&config);
        assert!(text.contains("Card"));
        assert!(!text.contains("Change"));
    }
}
