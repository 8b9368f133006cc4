//! # Tender
//!
//! Settles a cart's totals against what the customer hands over. Payment is
//! simulated: card is always approved for the exact total, cash is rounded
//! to the nearest 10 céntimos and change is computed.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::pricing::CartTotals;
use crate::types::PaymentMethod;

/// What the customer offers at checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum Tender {
    Cash { received: Money },
    Card,
}

impl Tender {
    pub fn method(&self) -> PaymentMethod {
        match self {
            Tender::Cash { .. } => PaymentMethod::Cash,
            Tender::Card => PaymentMethod::Card,
        }
    }
}

/// Outcome of a successful settlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Settlement {
    pub method: PaymentMethod,
    /// Amount charged: `total_rounded` for cash, `total` for card.
    pub charged: Money,
    pub received: Money,
    pub change: Money,
}

/// Checks the tender covers the amount due and computes change.
///
/// ## Example
/// ```rust
/// use bodega_core::money::Money;
/// use bodega_core::pricing::CartTotals;
/// use bodega_core::tender::{settle, Tender};
///
/// let totals = CartTotals {
///     subtotal: Money::from_cents(400),
///     discount: Money::zero(),
///     igv: Money::from_cents(72),
///     total: Money::from_cents(472),
///     total_rounded: Money::from_cents(470),
/// };
///
/// let s = settle(&totals, Tender::Cash { received: Money::from_cents(1000) }).unwrap();
/// assert_eq!(s.charged.cents(), 470);
/// assert_eq!(s.change.cents(), 530);
/// ```
pub fn settle(totals: &CartTotals, tender: Tender) -> CoreResult<Settlement> {
    match tender {
        Tender::Cash { received } => {
            let due = totals.total_rounded;
            if received < due {
                return Err(CoreError::InsufficientTender { due, received });
            }
            Ok(Settlement {
                method: PaymentMethod::Cash,
                charged: due,
                received,
                change: received - due,
            })
        }
        Tender::Card => Ok(Settlement {
            method: PaymentMethod::Card,
            charged: totals.total,
            received: totals.total,
            change: Money::zero(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn totals(total: i64) -> CartTotals {
        let total = Money::from_cents(total);
        CartTotals {
            subtotal: total,
            discount: Money::zero(),
            igv: Money::zero(),
            total,
            total_rounded: total.round_to_ten_cents(),
        }
    }

    #[test]
    fn test_cash_exact_and_short() {
        let t = totals(594);
        let exact = settle(&t, Tender::Cash { received: Money::from_cents(590) }).unwrap();
        assert_eq!(exact.change, Money::zero());

        let short = settle(&t, Tender::Cash { received: Money::from_cents(580) });
        assert!(matches!(short, Err(CoreError::InsufficientTender { .. })));
    }

    #[test]
    fn test_card_charges_unrounded_total() {
        let s = settle(&totals(594), Tender::Card).unwrap();
        assert_eq!(s.method, PaymentMethod::Card);
        assert_eq!(s.charged.cents(), 594);
        assert_eq!(s.change, Money::zero());
    }
}
