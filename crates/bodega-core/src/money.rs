//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  In floating point:                                                     │
//! │    4.72 = 4.00 * 1.18 → 4.719999999999999  ❌ WRONG!                    │
//! │                                                                         │
//! │  A refund of 1 of 3 units with a S/ 1.00 discount:                      │
//! │    1.00 / 3 = 0.333... → which cent do we keep?                        │
//! │                                                                         │
//! │  OUR SOLUTION: Integer Céntimos                                         │
//! │    Every amount is an i64 count of céntimos (1/100 Sol) and every      │
//! │    division rounds half up, in one place, on purpose                   │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use bodega_core::money::Money;
//!
//! let price = Money::from_cents(250); // S/ 2.50
//!
//! let line = price * 3_i64;           // S/ 7.50
//! assert_eq!(line.cents(), 750);
//!
//! // Cash is settled to the nearest 10 céntimos
//! assert_eq!(Money::from_cents(474).round_to_ten_cents().cents(), 470);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};
use std::iter::Sum;
use ts_rs::TS;

use crate::types::TaxRate;

// =============================================================================
// Money Type
// =============================================================================

/// Represents a monetary value in céntimos (1/100 of a Sol).
///
/// ## Design Decisions
/// - **i64 (signed)**: refunds and cash change are ordinary subtractions
/// - **Single field tuple struct**: Zero-cost abstraction over i64
/// - **Derives**: serialized as a bare integer inside every blob
///
/// ## Where Money Flows
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  Product.sale_price ──► CartLine.unit_price ──► CartLine.total          │
/// │                                                    │                    │
/// │  Offer discount ───────► CartLine.discount ────────┘                    │
/// │                                                                         │
/// │  CartTotals.subtotal − discount ──► IGV ──► total ──► total_rounded    │
/// │                                                                         │
/// │  Sale.total ──► Refund.refund_amount (prorated per line)               │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from céntimos.
    ///
    /// ## Example
    /// ```rust
    /// use bodega_core::money::Money;
    ///
    /// let price = Money::from_cents(420); // S/ 4.20
    /// assert_eq!(price.cents(), 420);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Creates a Money value from soles and céntimos.
    ///
    /// For negative amounts only `major` carries the sign:
    /// `from_major_minor(-5, 50)` is -S/ 5.50.
    #[inline]
    pub const fn from_major_minor(major: i64, minor: i64) -> Self {
        if major < 0 {
            Money(major * 100 - minor)
        } else {
            Money(major * 100 + minor)
        }
    }

    /// Returns the value in céntimos.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the whole soles portion.
    #[inline]
    pub const fn soles(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the céntimos portion (always 0-99).
    #[inline]
    pub const fn cents_part(&self) -> i64 {
        (self.0 % 100).abs()
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checks if the value is positive (greater than zero).
    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Checks if the value is negative (less than zero).
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Calculates tax on this amount, rounding half a céntimo up.
    ///
    /// ## Implementation
    /// Integer math: `(amount * rate + 5000) / 10000`.
    /// The +5000 provides rounding (5000/10000 = 0.5).
    ///
    /// ## Example
    /// ```rust
    /// use bodega_core::money::Money;
    /// use bodega_core::types::TaxRate;
    ///
    /// let igv = TaxRate::from_bps(1800);
    ///
    /// // S/ 4.00 × 18% = S/ 0.72
    /// assert_eq!(Money::from_cents(400).calculate_tax(igv).cents(), 72);
    ///
    /// // S/ 0.25 × 18% = S/ 0.045 → S/ 0.05
    /// assert_eq!(Money::from_cents(25).calculate_tax(igv).cents(), 5);
    /// ```
    pub fn calculate_tax(&self, rate: TaxRate) -> Money {
        // i128 keeps large sales from overflowing the intermediate product
        let tax_cents = (self.0 as i128 * rate.bps() as i128 + 5000) / 10000;
        Money::from_cents(tax_cents as i64)
    }

    /// Multiplies money by a quantity.
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0 * qty)
    }

    /// Returns `self × numerator / denominator`, rounding half up.
    ///
    /// Used to share a line discount across a partial refund.
    /// A zero denominator yields zero.
    ///
    /// ## Example
    /// ```rust
    /// use bodega_core::money::Money;
    ///
    /// // One third of a S/ 1.00 discount
    /// assert_eq!(Money::from_cents(100).prorate(1, 3).cents(), 33);
    /// // Two thirds
    /// assert_eq!(Money::from_cents(100).prorate(2, 3).cents(), 67);
    /// ```
    pub fn prorate(&self, numerator: i64, denominator: i64) -> Money {
        if denominator == 0 {
            return Money::zero();
        }
        let scaled = self.0 as i128 * numerator as i128;
        let denominator = denominator as i128;
        let rounded = (2 * scaled + denominator) / (2 * denominator);
        Money::from_cents(rounded as i64)
    }

    /// Rounds to the nearest 10 céntimos, half up.
    ///
    /// This is the amount collected when the customer pays cash; the result
    /// is always within 5 céntimos of the original.
    ///
    /// ## Example
    /// ```rust
    /// use bodega_core::money::Money;
    ///
    /// assert_eq!(Money::from_cents(590).round_to_ten_cents().cents(), 590);
    /// assert_eq!(Money::from_cents(594).round_to_ten_cents().cents(), 590);
    /// assert_eq!(Money::from_cents(595).round_to_ten_cents().cents(), 600);
    /// ```
    pub fn round_to_ten_cents(&self) -> Money {
        let magnitude = (self.0.abs() + 5) / 10 * 10;
        Money(if self.0 < 0 { -magnitude } else { magnitude })
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Shows money the way it appears on a Peruvian receipt: `S/ 5.90`.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}S/ {}.{:02}", sign, self.soles().abs(), self.cents_part())
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

/// Multiplication by a line quantity.
impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + *m)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_cents() {
        let money = Money::from_cents(1099);
        assert_eq!(money.cents(), 1099);
        assert_eq!(money.soles(), 10);
        assert_eq!(money.cents_part(), 99);
    }

    #[test]
    fn test_from_major_minor() {
        assert_eq!(Money::from_major_minor(2, 50).cents(), 250);
        assert_eq!(Money::from_major_minor(-5, 50).cents(), -550);
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", Money::from_cents(590)), "S/ 5.90");
        assert_eq!(format!("{}", Money::from_cents(5)), "S/ 0.05");
        assert_eq!(format!("{}", Money::from_cents(-550)), "-S/ 5.50");
        assert_eq!(format!("{}", Money::zero()), "S/ 0.00");
    }

    #[test]
    fn test_arithmetic_and_sum() {
        let a = Money::from_cents(1000);
        let b = Money::from_cents(500);

        assert_eq!((a + b).cents(), 1500);
        assert_eq!((a - b).cents(), 500);
        assert_eq!((a * 3_i64).cents(), 3000);

        let total: Money = [a, b, b].iter().sum();
        assert_eq!(total.cents(), 2000);
    }

    #[test]
    fn test_igv_on_reference_amounts() {
        let igv = TaxRate::from_bps(1800);
        // S/ 5.00 → S/ 0.90
        assert_eq!(Money::from_cents(500).calculate_tax(igv).cents(), 90);
        // S/ 4.00 → S/ 0.72
        assert_eq!(Money::from_cents(400).calculate_tax(igv).cents(), 72);
        // S/ 1.01 → 18.18 céntimos → 18
        assert_eq!(Money::from_cents(101).calculate_tax(igv).cents(), 18);
    }

    #[test]
    fn test_prorate_rounds_half_up() {
        let discount = Money::from_cents(250);
        assert_eq!(discount.prorate(1, 2).cents(), 125);
        assert_eq!(discount.prorate(1, 4).cents(), 63); // 62.5 → 63
        assert_eq!(discount.prorate(0, 4).cents(), 0);
        assert_eq!(discount.prorate(4, 4).cents(), 250);
        assert_eq!(discount.prorate(1, 0).cents(), 0);
    }

    #[test]
    fn test_round_to_ten_cents_stays_within_five() {
        for cents in 0..=1000 {
            let rounded = Money::from_cents(cents).round_to_ten_cents().cents();
            assert_eq!(rounded % 10, 0, "{} rounded to {}", cents, rounded);
            assert!((rounded - cents).abs() <= 5, "{} rounded to {}", cents, rounded);
        }
        assert_eq!(Money::from_cents(-595).round_to_ten_cents().cents(), -600);
    }

    #[test]
    fn test_zero_and_checks() {
        let zero = Money::zero();
        assert!(zero.is_zero());
        assert!(!zero.is_positive());
        assert!(!zero.is_negative());

        assert!(Money::from_cents(100).is_positive());
        assert!(Money::from_cents(-100).is_negative());
    }
}
