//! Bounds shared by the sale and sale item rule sets.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use salesdesk_core::ValidationResult;
use salesdesk_core::validation::char_len_between;

/// Shortest accepted customer, branch or product name (characters).
pub const NAME_MIN_CHARS: usize = 3;

/// Longest accepted customer, branch or product name (characters).
pub const NAME_MAX_CHARS: usize = 150;

/// Largest quantity a single line item may carry.
pub const MAX_ITEM_QUANTITY: i32 = 20;

/// Decimal places a unit price may carry.
pub const UNIT_PRICE_MAX_SCALE: u32 = 2;

/// Largest accepted unit price.
///
/// At this bound with [`MAX_ITEM_QUANTITY`] units, the price, discount and line
/// total all fit the `NUMERIC(15,4)` money columns without rounding.
pub const MAX_UNIT_PRICE: Decimal = dec!(99999999.99);

/// Non-empty, then length-bounded. Reports at most one error per field.
pub(crate) fn check_name(result: &mut ValidationResult, field: &str, label: &str, value: &str) {
    if value.trim().is_empty() {
        result.push(field, format!("{label} must not be empty"));
    } else if !char_len_between(value, NAME_MIN_CHARS, NAME_MAX_CHARS) {
        result.push(
            field,
            format!("{label} must be between {NAME_MIN_CHARS} and {NAME_MAX_CHARS} characters"),
        );
    }
}

/// Non-negative, at most [`MAX_UNIT_PRICE`], at most two decimal places.
pub(crate) fn check_unit_price(result: &mut ValidationResult, field: &str, value: Decimal) {
    if value < Decimal::ZERO {
        result.push(field, "unit price must not be negative");
    } else if value > MAX_UNIT_PRICE {
        result.push(field, format!("unit price must not exceed {MAX_UNIT_PRICE}"));
    } else if value.normalize().scale() > UNIT_PRICE_MAX_SCALE {
        result.push(
            field,
            format!("unit price must have at most {UNIT_PRICE_MAX_SCALE} decimal places"),
        );
    }
}
