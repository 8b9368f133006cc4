//! # Sales Report
//!
//! Summary of a set of sales for the end-of-day screen: how much was sold,
//! what sold best and when the store was busiest.

use std::collections::HashMap;

use chrono::{FixedOffset, Timelike};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;
use crate::types::{ProductSnapshot, Sale};

/// Number of entries kept in [`SalesReport::top_products`].
pub const TOP_PRODUCTS: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ProductSales {
    pub product: ProductSnapshot,
    pub quantity: i64,
    /// Σ line totals (after discount, before IGV).
    pub revenue: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SalesReport {
    pub sale_count: usize,
    /// Σ sale totals, IGV included.
    pub revenue: Money,
    pub items_sold: i64,
    /// Best sellers by quantity, at most [`TOP_PRODUCTS`].
    pub top_products: Vec<ProductSales>,
    /// Revenue per local hour of day, index 0 = 00:00-00:59.
    pub revenue_by_hour: Vec<Money>,
    /// Hour with the highest revenue; `None` with no sales.
    pub peak_hour: Option<u32>,
}

impl SalesReport {
    /// Builds the report; hours are bucketed in `offset` (Lima is UTC-5).
    pub fn build<'a, I>(sales: I, offset: FixedOffset) -> Self
    where
        I: IntoIterator<Item = &'a Sale>,
    {
        let mut sale_count = 0;
        let mut revenue = Money::zero();
        let mut items_sold = 0;
        let mut by_product: HashMap<String, ProductSales> = HashMap::new();
        let mut revenue_by_hour = vec![Money::zero(); 24];

        for sale in sales {
            sale_count += 1;
            revenue += sale.total;
            items_sold += sale.items_sold();

            let hour = sale.created_at.with_timezone(&offset).hour() as usize;
            revenue_by_hour[hour] += sale.total;

            for line in &sale.lines {
                let entry = by_product
                    .entry(line.product_id().to_string())
                    .or_insert_with(|| ProductSales {
                        product: line.product.clone(),
                        quantity: 0,
                        revenue: Money::zero(),
                    });
                entry.quantity += line.quantity;
                entry.revenue += line.total;
            }
        }

        let mut top_products: Vec<ProductSales> = by_product.into_values().collect();
        top_products.sort_by(|a, b| {
            b.quantity
                .cmp(&a.quantity)
                .then_with(|| a.product.code.cmp(&b.product.code))
        });
        top_products.truncate(TOP_PRODUCTS);

        let peak_hour = revenue_by_hour
            .iter()
            .enumerate()
            .filter(|(_, amount)| amount.is_positive())
            // Earliest hour wins a tie.
            .max_by(|(ha, a), (hb, b)| a.cmp(b).then_with(|| hb.cmp(ha)))
            .map(|(hour, _)| hour as u32);

        SalesReport {
            sale_count,
            revenue,
            items_sold,
            top_products,
            revenue_by_hour,
            peak_hour,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CartLine, PaymentMethod, SaleStatus};
    use chrono::{DateTime, TimeZone, Utc};

    fn sale(at: DateTime<Utc>, lines: &[(&str, i64, i64)]) -> Sale {
        let lines: Vec<CartLine> = lines
            .iter()
            .map(|(code, qty, unit)| CartLine {
                product: ProductSnapshot {
                    id: code.to_string(),
                    code: code.to_string(),
                    description: code.to_string(),
                    category: "Test".to_string(),
                },
                quantity: *qty,
                unit_price: Money::from_cents(*unit),
                discount: Money::zero(),
                total: Money::from_cents(unit * qty),
                promotional: false,
            })
            .collect();
        let total = lines.iter().map(|l| l.total).sum();
        Sale {
            id: uuid::Uuid::new_v4().to_string(),
            ticket_number: format!("T{}", at.timestamp_millis()),
            employee_id: "1".to_string(),
            employee_name: "Juan".to_string(),
            terminal_id: "T1".to_string(),
            lines,
            subtotal: total,
            discount_amount: Money::zero(),
            igv_amount: Money::zero(),
            total,
            payment_method: PaymentMethod::Cash,
            status: SaleStatus::Completed,
            created_at: at,
            session_start: at,
            session_end: at,
        }
    }

    #[test]
    fn test_empty_report() {
        let report = SalesReport::build(&Vec::<Sale>::new(), FixedOffset::west_opt(5 * 3600).unwrap());
        assert_eq!(report.sale_count, 0);
        assert_eq!(report.revenue, Money::zero());
        assert_eq!(report.revenue_by_hour.len(), 24);
        assert_eq!(report.peak_hour, None);
    }

    #[test]
    fn test_report_aggregates() {
        let lima = FixedOffset::west_opt(5 * 3600).unwrap();
        // 14:10 and 14:50 UTC are 09:xx in Lima; 20:00 UTC is 15:00.
        let sales = vec![
            sale(Utc.with_ymd_and_hms(2025, 6, 15, 14, 10, 0).unwrap(), &[("P001", 3, 250), ("P009", 10, 30)]),
            sale(Utc.with_ymd_and_hms(2025, 6, 15, 14, 50, 0).unwrap(), &[("P001", 2, 250)]),
            sale(Utc.with_ymd_and_hms(2025, 6, 15, 20, 0, 0).unwrap(), &[("P006", 1, 1490)]),
        ];

        let report = SalesReport::build(&sales, lima);
        assert_eq!(report.sale_count, 3);
        assert_eq!(report.revenue.cents(), 750 + 300 + 500 + 1490);
        assert_eq!(report.items_sold, 16);

        assert_eq!(report.top_products[0].product.code, "P009");
        assert_eq!(report.top_products[1].product.code, "P001");
        assert_eq!(report.top_products[1].quantity, 5);
        assert_eq!(report.top_products[1].revenue.cents(), 1250);

        assert_eq!(report.revenue_by_hour[9].cents(), 1550);
        assert_eq!(report.revenue_by_hour[15].cents(), 1490);
        assert_eq!(report.peak_hour, Some(9));
    }
}
