//! Sale aggregate.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use salesdesk_core::{
    AggregateRoot, BranchId, CustomerId, Entity, ProductId, SaleId, SaleItemId, ValidationResult,
    ValueObject,
};

use crate::item::{SaleItem, SaleItemState};
use crate::rules::check_name;

/// Customer a sale was made to (reference into an external registry).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerRef {
    pub id: CustomerId,
    pub name: String,
}

impl CustomerRef {
    pub fn new(id: CustomerId, name: impl Into<String>) -> Self {
        Self { id, name: name.into() }
    }
}

impl ValueObject for CustomerRef {}

/// Branch a sale was made at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchRef {
    pub id: BranchId,
    pub name: String,
}

impl BranchRef {
    pub fn new(id: BranchId, name: impl Into<String>) -> Self {
        Self { id, name: name.into() }
    }
}

impl ValueObject for BranchRef {}

/// Desired line when reconciling a sale's items.
///
/// `id: Some(_)` targets an existing item; `None` (or an id the sale does not
/// own) adds a new one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemLine {
    pub id: Option<SaleItemId>,
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: i32,
    pub unit_price: Decimal,
}

/// Aggregate root: Sale.
///
/// Two states: active and cancelled. Cancellation is one-way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sale {
    id: SaleId,
    sale_number: i64,
    sale_date: DateTime<Utc>,
    customer: CustomerRef,
    branch: BranchRef,
    is_cancelled: bool,
    items: Vec<SaleItem>,
    version: u64,
}

/// Plain persisted form of a [`Sale`], items included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleState {
    pub id: SaleId,
    pub sale_number: i64,
    pub sale_date: DateTime<Utc>,
    pub customer: CustomerRef,
    pub branch: BranchRef,
    pub is_cancelled: bool,
    pub items: Vec<SaleItemState>,
    pub version: u64,
}

impl Sale {
    /// Start a new, active, never-persisted sale with no items.
    pub fn new(
        sale_number: i64,
        sale_date: DateTime<Utc>,
        customer: CustomerRef,
        branch: BranchRef,
    ) -> Self {
        Self {
            id: SaleId::new(),
            sale_number,
            sale_date,
            customer,
            branch,
            is_cancelled: false,
            items: Vec::new(),
            version: 0,
        }
    }

    pub fn sale_number(&self) -> i64 {
        self.sale_number
    }

    pub fn sale_date(&self) -> DateTime<Utc> {
        self.sale_date
    }

    pub fn customer(&self) -> &CustomerRef {
        &self.customer
    }

    pub fn branch(&self) -> &BranchRef {
        &self.branch
    }

    pub fn is_cancelled(&self) -> bool {
        self.is_cancelled
    }

    pub fn items(&self) -> &[SaleItem] {
        &self.items
    }

    pub fn item(&self, id: SaleItemId) -> Option<&SaleItem> {
        self.items.iter().find(|i| *i.id() == id)
    }

    /// Replace the header fields. Items and cancellation are untouched.
    pub fn update_details(
        &mut self,
        sale_number: i64,
        sale_date: DateTime<Utc>,
        customer: CustomerRef,
        branch: BranchRef,
    ) {
        self.sale_number = sale_number;
        self.sale_date = sale_date;
        self.customer = customer;
        self.branch = branch;
    }

    /// Take ownership of `item` and append it.
    pub fn add_item(&mut self, mut item: SaleItem) -> SaleItemId {
        item.attach_to(self.id);
        let id = *item.id();
        self.items.push(item);
        id
    }

    /// Reconcile items with `lines`.
    ///
    /// Afterwards the sale holds exactly one item per line, in line order.
    /// Lines naming an owned item update it in place (keeping its id); every
    /// other line becomes a new item. Owned items no line names are dropped.
    pub fn sync_items(&mut self, lines: Vec<ItemLine>) {
        let mut existing = std::mem::take(&mut self.items);
        let mut synced = Vec::with_capacity(lines.len());

        for line in lines {
            let owned = line
                .id
                .and_then(|id| existing.iter().position(|i| *i.id() == id))
                .map(|pos| existing.swap_remove(pos));

            let item = match owned {
                Some(mut item) => {
                    item.update(line.product_id, line.product_name, line.quantity, line.unit_price);
                    item
                }
                None => {
                    let mut item = SaleItem::new(
                        line.product_id,
                        line.product_name,
                        line.quantity,
                        line.unit_price,
                    );
                    item.attach_to(self.id);
                    item
                }
            };
            synced.push(item);
        }

        self.items = synced;
    }

    /// Mark the sale cancelled. Returns `false` when it already was.
    pub fn cancel(&mut self) -> bool {
        if self.is_cancelled {
            return false;
        }
        self.is_cancelled = true;
        true
    }

    /// Σ item totals, or zero once cancelled.
    pub fn total_amount(&self) -> Decimal {
        if self.is_cancelled {
            return Decimal::ZERO;
        }
        self.items
            .iter()
            .map(SaleItem::total_amount)
            .fold(Decimal::ZERO, Decimal::saturating_add)
    }

    /// Run the sale rule set plus every item's rule set.
    ///
    /// Item errors are reported as `items[<index>].<field>`.
    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::new();

        result.ensure(self.sale_number > 0, "sale_number", "sale number must be greater than zero");

        result.ensure(!self.customer.id.is_nil(), "customer_id", "customer id must not be empty");
        check_name(&mut result, "customer_name", "customer name", &self.customer.name);

        result.ensure(!self.branch.id.is_nil(), "branch_id", "branch id must not be empty");
        check_name(&mut result, "branch_name", "branch name", &self.branch.name);

        result.ensure(
            self.total_amount() >= Decimal::ZERO,
            "total_amount",
            "total amount must not be negative",
        );

        for (index, item) in self.items.iter().enumerate() {
            result.merge_nested(&format!("items[{index}]"), item.validate());
        }

        result
    }

    /// Rebuild from persisted state.
    pub fn restore(state: SaleState) -> Self {
        Self {
            id: state.id,
            sale_number: state.sale_number,
            sale_date: state.sale_date,
            customer: state.customer,
            branch: state.branch,
            is_cancelled: state.is_cancelled,
            items: state.items.into_iter().map(SaleItem::restore).collect(),
            version: state.version,
        }
    }

    pub fn to_state(&self) -> SaleState {
        SaleState {
            id: self.id,
            sale_number: self.sale_number,
            sale_date: self.sale_date,
            customer: self.customer.clone(),
            branch: self.branch.clone(),
            is_cancelled: self.is_cancelled,
            items: self.items.iter().map(SaleItem::to_state).collect(),
            version: self.version,
        }
    }
}

impl Entity for Sale {
    type Id = SaleId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl AggregateRoot for Sale {
    fn version(&self) -> u64 {
        self.version
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn test_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 18, 14, 30, 0).unwrap()
    }

    fn test_sale(sale_number: i64) -> Sale {
        Sale::new(
            sale_number,
            test_time(),
            CustomerRef::new(CustomerId::new(), "Maria Souza"),
            BranchRef::new(BranchId::new(), "Centro"),
        )
    }

    fn line(quantity: i32, unit_price: Decimal) -> SaleItem {
        SaleItem::new(ProductId::new(), "Agua Mineral", quantity, unit_price)
    }

    #[test]
    fn total_sums_item_totals() {
        let mut sale = test_sale(1);
        sale.add_item(line(5, dec!(10)));
        sale.add_item(line(10, dec!(10)));
        sale.add_item(line(2, dec!(10)));

        assert_eq!(sale.total_amount(), dec!(145));
    }

    #[test]
    fn oversized_items_saturate_total_and_fail_validation() {
        let mut sale = test_sale(1);
        sale.add_item(line(2, Decimal::MAX));
        sale.add_item(line(3, Decimal::MAX));

        assert_eq!(sale.total_amount(), Decimal::MAX);

        let fields: Vec<_> = sale.validate().errors().iter().map(|e| e.field.clone()).collect();
        assert_eq!(fields, vec!["items[0].unit_price", "items[1].unit_price"]);
    }

    #[test]
    fn cancelled_total_is_zero() {
        let mut sale = test_sale(1);
        sale.add_item(line(5, dec!(10)));

        assert!(sale.cancel());
        assert!(sale.is_cancelled());
        assert_eq!(sale.total_amount(), Decimal::ZERO);
    }

    #[test]
    fn cancel_is_idempotent() {
        let mut once = test_sale(1);
        once.add_item(line(3, dec!(4)));
        once.cancel();

        let mut twice = once.clone();
        assert!(!twice.cancel());
        assert_eq!(twice, once);
    }

    #[test]
    fn added_items_are_attached_to_the_sale() {
        let mut sale = test_sale(1);
        let item_id = sale.add_item(line(1, dec!(1)));

        assert_eq!(sale.item(item_id).unwrap().sale_id(), *sale.id());
    }

    #[test]
    fn valid_sale_has_no_errors() {
        let mut sale = test_sale(7);
        sale.add_item(line(4, dec!(2.25)));

        let result = sale.validate();
        assert!(result.is_valid(), "{:?}", result.errors());
    }

    #[test]
    fn item_quantity_over_limit_is_reported_with_its_index() {
        let mut sale = test_sale(7);
        sale.add_item(line(1, dec!(1)));
        sale.add_item(line(21, dec!(1)));

        let result = sale.validate();
        assert!(!result.is_valid());
        assert_eq!(result.errors().len(), 1);
        assert_eq!(result.errors()[0].field, "items[1].quantity");
    }

    #[test]
    fn short_names_are_invalid() {
        let sale = Sale::new(
            7,
            test_time(),
            CustomerRef::new(CustomerId::new(), "Al"),
            BranchRef::new(BranchId::new(), "X"),
        );

        let fields: Vec<_> = sale.validate().errors().iter().map(|e| e.field.clone()).collect();
        assert_eq!(fields, vec!["customer_name", "branch_name"]);
    }

    #[test]
    fn zero_sale_number_is_invalid() {
        let result = test_sale(0).validate();
        assert_eq!(result.errors()[0].field, "sale_number");
    }

    #[test]
    fn nil_party_ids_are_invalid() {
        let sale = Sale::new(
            7,
            test_time(),
            CustomerRef::new(CustomerId::nil(), "Maria Souza"),
            BranchRef::new(BranchId::nil(), "Centro"),
        );

        let fields: Vec<_> = sale.validate().errors().iter().map(|e| e.field.clone()).collect();
        assert_eq!(fields, vec!["customer_id", "branch_id"]);
    }

    #[test]
    fn sync_updates_known_items_adds_new_and_drops_the_rest() {
        let mut sale = test_sale(1);
        let kept = sale.add_item(line(1, dec!(10)));
        let dropped = sale.add_item(line(2, dec!(10)));
        let product = ProductId::new();

        sale.sync_items(vec![
            ItemLine {
                id: None,
                product_id: product,
                product_name: "Suco de Uva".into(),
                quantity: 4,
                unit_price: dec!(5),
            },
            ItemLine {
                id: Some(kept),
                product_id: product,
                product_name: "Suco de Laranja".into(),
                quantity: 10,
                unit_price: dec!(10),
            },
        ]);

        assert_eq!(sale.items().len(), 2);
        assert!(sale.item(dropped).is_none());

        let updated = sale.item(kept).unwrap();
        assert_eq!(updated.product_name(), "Suco de Laranja");
        assert_eq!(updated.discount(), dec!(20));

        let added = &sale.items()[0];
        assert_ne!(*added.id(), kept);
        assert_eq!(added.sale_id(), *sale.id());
        assert_eq!(added.discount(), dec!(2));
        assert_eq!(sale.total_amount(), dec!(98));
    }

    #[test]
    fn sync_treats_unknown_ids_as_new_items() {
        let mut sale = test_sale(1);
        let stranger = SaleItemId::new();

        sale.sync_items(vec![ItemLine {
            id: Some(stranger),
            product_id: ProductId::new(),
            product_name: "Cafe".into(),
            quantity: 1,
            unit_price: dec!(3),
        }]);

        assert_eq!(sale.items().len(), 1);
        assert_ne!(*sale.items()[0].id(), stranger);
    }

    #[test]
    fn update_details_keeps_items_and_cancellation() {
        let mut sale = test_sale(1);
        sale.add_item(line(1, dec!(1)));
        sale.cancel();

        let branch = BranchRef::new(BranchId::new(), "Zona Sul");
        sale.update_details(2, test_time(), sale.customer().clone(), branch.clone());

        assert_eq!(sale.sale_number(), 2);
        assert_eq!(sale.branch(), &branch);
        assert_eq!(sale.items().len(), 1);
        assert!(sale.is_cancelled());
    }

    #[test]
    fn restore_round_trips_full_state() {
        let mut sale = test_sale(3);
        sale.add_item(line(9, dec!(1.10)));

        let restored = Sale::restore(sale.to_state());
        assert_eq!(restored, sale);
        assert_eq!(restored.version(), 0);
    }

    #[cfg(test)]
    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        fn lines() -> impl Strategy<Value = Vec<(i32, i64)>> {
            prop::collection::vec((1i32..=20, 0i64..1_000_000), 0..12)
        }

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 256,
                ..ProptestConfig::default()
            })]

            #[test]
            fn active_total_matches_line_arithmetic(lines in lines()) {
                let mut sale = test_sale(1);
                let mut expected = Decimal::ZERO;
                for (q, cents) in lines {
                    let price = Decimal::new(cents, 2);
                    let item = line(q, price);
                    expected += price * Decimal::from(q) - item.discount();
                    sale.add_item(item);
                }
                prop_assert_eq!(sale.total_amount(), expected);
                prop_assert!(sale.total_amount() >= Decimal::ZERO);
            }

            #[test]
            fn cancelled_total_is_always_zero(lines in lines()) {
                let mut sale = test_sale(1);
                for (q, cents) in lines {
                    sale.add_item(line(q, Decimal::new(cents, 2)));
                }
                sale.cancel();
                sale.cancel();
                prop_assert_eq!(sale.total_amount(), Decimal::ZERO);
            }
        }
    }
}
