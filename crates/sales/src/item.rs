//! Sale line item.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use salesdesk_core::{Entity, ProductId, SaleId, SaleItemId, ValidationResult};

use crate::discount::discount;
use crate::rules::{MAX_ITEM_QUANTITY, check_name, check_unit_price};

/// One product line within a [`crate::Sale`].
///
/// The discount is derived: it is fixed on construction and recomputed by
/// [`SaleItem::update`], never set directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaleItem {
    id: SaleItemId,
    sale_id: SaleId,
    product_id: ProductId,
    product_name: String,
    quantity: i32,
    unit_price: Decimal,
    discount: Decimal,
}

/// Plain persisted form of a [`SaleItem`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleItemState {
    pub id: SaleItemId,
    pub sale_id: SaleId,
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub discount: Decimal,
}

impl SaleItem {
    /// Build a line. Nothing is validated here; see [`SaleItem::validate`].
    ///
    /// The item is detached (nil `sale_id`) until added to a sale.
    pub fn new(
        product_id: ProductId,
        product_name: impl Into<String>,
        quantity: i32,
        unit_price: Decimal,
    ) -> Self {
        Self::with_id(SaleItemId::new(), product_id, product_name, quantity, unit_price)
    }

    pub fn with_id(
        id: SaleItemId,
        product_id: ProductId,
        product_name: impl Into<String>,
        quantity: i32,
        unit_price: Decimal,
    ) -> Self {
        Self {
            id,
            sale_id: SaleId::nil(),
            product_id,
            product_name: product_name.into(),
            quantity,
            unit_price,
            discount: discount(quantity, unit_price),
        }
    }

    /// Replace every field and recompute the discount.
    pub fn update(
        &mut self,
        product_id: ProductId,
        product_name: impl Into<String>,
        quantity: i32,
        unit_price: Decimal,
    ) {
        self.product_id = product_id;
        self.product_name = product_name.into();
        self.quantity = quantity;
        self.unit_price = unit_price;
        self.discount = discount(quantity, unit_price);
    }

    pub(crate) fn attach_to(&mut self, sale_id: SaleId) {
        self.sale_id = sale_id;
    }

    pub fn sale_id(&self) -> SaleId {
        self.sale_id
    }

    pub fn product_id(&self) -> ProductId {
        self.product_id
    }

    pub fn product_name(&self) -> &str {
        &self.product_name
    }

    pub fn quantity(&self) -> i32 {
        self.quantity
    }

    pub fn unit_price(&self) -> Decimal {
        self.unit_price
    }

    pub fn discount(&self) -> Decimal {
        self.discount
    }

    /// `unit_price × quantity − discount`, saturating like [`discount`].
    pub fn total_amount(&self) -> Decimal {
        self.unit_price
            .saturating_mul(Decimal::from(self.quantity))
            .saturating_sub(self.discount)
    }

    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::new();

        result.ensure(!self.product_id.is_nil(), "product_id", "product id must not be empty");
        check_name(&mut result, "product_name", "product name", &self.product_name);

        if self.quantity <= 0 {
            result.push("quantity", "quantity must be greater than zero");
        } else if self.quantity > MAX_ITEM_QUANTITY {
            result.push(
                "quantity",
                format!("quantity must be less than or equal to {MAX_ITEM_QUANTITY}"),
            );
        }

        check_unit_price(&mut result, "unit_price", self.unit_price);

        result
    }

    /// Rebuild from persisted state. The stored discount is trusted as-is.
    pub fn restore(state: SaleItemState) -> Self {
        Self {
            id: state.id,
            sale_id: state.sale_id,
            product_id: state.product_id,
            product_name: state.product_name,
            quantity: state.quantity,
            unit_price: state.unit_price,
            discount: state.discount,
        }
    }

    pub fn to_state(&self) -> SaleItemState {
        SaleItemState {
            id: self.id,
            sale_id: self.sale_id,
            product_id: self.product_id,
            product_name: self.product_name.clone(),
            quantity: self.quantity,
            unit_price: self.unit_price,
            discount: self.discount,
        }
    }
}

impl Entity for SaleItem {
    type Id = SaleItemId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::MAX_UNIT_PRICE;
    use rust_decimal_macros::dec;

    fn item(quantity: i32, unit_price: Decimal) -> SaleItem {
        SaleItem::new(ProductId::new(), "Guarana 2L", quantity, unit_price)
    }

    #[test]
    fn standard_tier_example() {
        let item = item(5, dec!(10));
        assert_eq!(item.discount(), dec!(5));
        assert_eq!(item.total_amount(), dec!(45));
    }

    #[test]
    fn bulk_tier_example() {
        let item = item(10, dec!(10));
        assert_eq!(item.discount(), dec!(20));
        assert_eq!(item.total_amount(), dec!(80));
    }

    #[test]
    fn no_discount_example() {
        let item = item(2, dec!(10));
        assert_eq!(item.discount(), Decimal::ZERO);
        assert_eq!(item.total_amount(), dec!(20));
    }

    #[test]
    fn update_replaces_fields_and_recomputes_discount() {
        let mut item = item(2, dec!(10));
        let id = *item.id();
        let other_product = ProductId::new();

        item.update(other_product, "Pilsen 350ml", 12, dec!(3.50));

        assert_eq!(*item.id(), id);
        assert_eq!(item.product_id(), other_product);
        assert_eq!(item.product_name(), "Pilsen 350ml");
        assert_eq!(item.discount(), dec!(8.40));
        assert_eq!(item.total_amount(), dec!(33.60));
    }

    #[test]
    fn construction_does_not_validate() {
        let item = SaleItem::new(ProductId::nil(), "x", 99, dec!(-1));
        let fields: Vec<_> = item.validate().errors().iter().map(|e| e.field.clone()).collect();
        assert_eq!(fields, vec!["product_id", "product_name", "quantity", "unit_price"]);
    }

    #[test]
    fn quantity_bounds() {
        assert!(item(1, dec!(1)).validate().is_valid());
        assert!(item(20, dec!(1)).validate().is_valid());
        assert!(!item(0, dec!(1)).validate().is_valid());
        assert!(!item(21, dec!(1)).validate().is_valid());
    }

    #[test]
    fn oversized_price_is_reported_not_panicked_on() {
        let item = item(5, Decimal::MAX);
        assert!(item.total_amount() > Decimal::ZERO);

        let errors = item.validate().into_result().unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "unit_price");
    }

    #[test]
    fn price_bounds_follow_storage_precision() {
        assert!(item(20, MAX_UNIT_PRICE).validate().is_valid());
        assert!(item(1, dec!(10.500)).validate().is_valid());
        assert!(!item(1, MAX_UNIT_PRICE + dec!(0.01)).validate().is_valid());
        assert!(!item(1, dec!(0.12345)).validate().is_valid());
        assert!(!item(1, dec!(100000000)).validate().is_valid());
    }

    #[test]
    fn largest_line_keeps_exact_amounts() {
        let item = item(20, MAX_UNIT_PRICE);
        assert_eq!(item.discount(), dec!(399999999.96));
        assert_eq!(item.total_amount(), dec!(1599999999.84));
    }

    #[test]
    fn free_items_are_allowed() {
        assert!(item(3, Decimal::ZERO).validate().is_valid());
    }

    #[test]
    fn state_round_trip_keeps_stored_discount() {
        let original = item(6, dec!(2.50));
        let restored = SaleItem::restore(original.to_state());
        assert_eq!(restored, original);
    }
}
