//! Quantity-tiered line item discount.
//!
//! | quantity | rate |
//! |----------|------|
//! | 10..=20  | 20%  |
//! | 4..=9    | 10%  |
//! | other    | 0%   |
//!
//! Quantities above the item limit are invalid anyway and earn no discount.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Discount band a quantity falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscountTier {
    None,
    Standard,
    Bulk,
}

impl DiscountTier {
    pub fn for_quantity(quantity: i32) -> Self {
        match quantity {
            10..=20 => DiscountTier::Bulk,
            4..=9 => DiscountTier::Standard,
            _ => DiscountTier::None,
        }
    }

    /// Fraction of the gross line amount taken off.
    pub fn rate(self) -> Decimal {
        match self {
            DiscountTier::None => Decimal::ZERO,
            DiscountTier::Standard => dec!(0.10),
            DiscountTier::Bulk => dec!(0.20),
        }
    }
}

/// Discount for `quantity` units at `unit_price`.
///
/// Saturates at the `Decimal` bounds instead of overflowing. Prices that large
/// fail the item rule set, so a saturated value is never stored.
pub fn discount(quantity: i32, unit_price: Decimal) -> Decimal {
    let tier = DiscountTier::for_quantity(quantity);
    if tier == DiscountTier::None {
        return Decimal::ZERO;
    }
    unit_price
        .saturating_mul(Decimal::from(quantity))
        .saturating_mul(tier.rate())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_boundaries() {
        assert_eq!(DiscountTier::for_quantity(3), DiscountTier::None);
        assert_eq!(DiscountTier::for_quantity(4), DiscountTier::Standard);
        assert_eq!(DiscountTier::for_quantity(9), DiscountTier::Standard);
        assert_eq!(DiscountTier::for_quantity(10), DiscountTier::Bulk);
        assert_eq!(DiscountTier::for_quantity(20), DiscountTier::Bulk);
        assert_eq!(DiscountTier::for_quantity(21), DiscountTier::None);
        assert_eq!(DiscountTier::for_quantity(0), DiscountTier::None);
        assert_eq!(DiscountTier::for_quantity(-5), DiscountTier::None);
    }

    #[test]
    fn worked_examples() {
        assert_eq!(discount(5, dec!(10)), dec!(5.0));
        assert_eq!(discount(10, dec!(10)), dec!(20.0));
        assert_eq!(discount(2, dec!(10)), Decimal::ZERO);
    }

    #[test]
    fn keeps_cents_exact() {
        assert_eq!(discount(4, dec!(19.99)), dec!(7.996));
        assert_eq!(discount(12, dec!(0.35)), dec!(0.84));
    }

    #[test]
    fn extreme_price_does_not_overflow() {
        assert_eq!(discount(5, Decimal::MAX), Decimal::MAX * dec!(0.10));
        assert_eq!(discount(20, Decimal::MIN), Decimal::MIN * dec!(0.20));
    }

    #[cfg(test)]
    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        fn price() -> impl Strategy<Value = Decimal> {
            // 0.00 ..= 99_999.99
            (0i64..10_000_000i64).prop_map(|cents| Decimal::new(cents, 2))
        }

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 512,
                ..ProptestConfig::default()
            })]

            #[test]
            fn small_quantities_earn_nothing(q in i32::MIN..4, p in price()) {
                prop_assert_eq!(discount(q, p), Decimal::ZERO);
            }

            #[test]
            fn standard_band_is_ten_percent(q in 4i32..10, p in price()) {
                prop_assert_eq!(discount(q, p), dec!(0.10) * p * Decimal::from(q));
            }

            #[test]
            fn bulk_band_is_twenty_percent(q in 10i32..=20, p in price()) {
                prop_assert_eq!(discount(q, p), dec!(0.20) * p * Decimal::from(q));
            }

            #[test]
            fn never_exceeds_gross_amount(q in 0i32..=20, p in price()) {
                let d = discount(q, p);
                prop_assert!(d >= Decimal::ZERO);
                prop_assert!(d <= p * Decimal::from(q));
            }
        }
    }
}
