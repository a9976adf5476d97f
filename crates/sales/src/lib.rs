//! Sales domain module.
//!
//! This crate contains the business rules for sales and their line items,
//! implemented purely as deterministic domain logic (no IO, no HTTP, no
//! storage). Persistence and event publication live in `salesdesk-infra`.

pub mod discount;
pub mod events;
pub mod item;
pub mod rules;
pub mod sale;

pub use discount::{DiscountTier, discount};
pub use events::{AGGREGATE_TYPE, SaleCancelled, SaleCreated, SaleDeleted, SaleEvent, SaleModified};
pub use item::{SaleItem, SaleItemState};
pub use sale::{BranchRef, CustomerRef, ItemLine, Sale, SaleState};
