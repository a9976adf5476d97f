//! Sale persistence boundary.
//!
//! A repository stores whole aggregates: a sale is always read and written
//! together with its items. Implementations enforce two things the domain
//! cannot see on its own:
//!
//! - **Unique sale numbers** across all stored sales
//! - **Optimistic concurrency** against the stored `version`
//!
//! The stored version starts at 1 on insert and is bumped on every update.

pub mod in_memory;
pub mod postgres;

use std::sync::Arc;

use thiserror::Error;

use salesdesk_core::{ExpectedVersion, SaleId};
use salesdesk_sales::Sale;

use crate::query::SaleFilter;

pub use in_memory::InMemorySaleRepository;
pub use postgres::PostgresSaleRepository;

/// Repository operation error.
///
/// These are storage outcomes, not domain rule failures.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("sale number {0} already exists")]
    DuplicateSaleNumber(i64),

    #[error("sale {0} not found")]
    NotFound(SaleId),

    #[error("optimistic concurrency check failed: {0}")]
    Concurrency(String),

    #[error("storage backend error: {0}")]
    Backend(String),
}

#[async_trait::async_trait]
pub trait SaleRepository: Send + Sync {
    /// Store a new sale. Returns it as stored (version 1).
    async fn insert(&self, sale: Sale) -> Result<Sale, RepositoryError>;

    async fn get(&self, id: SaleId) -> Result<Option<Sale>, RepositoryError>;

    async fn get_by_number(&self, sale_number: i64) -> Result<Option<Sale>, RepositoryError>;

    /// Replace a stored sale (header and the full item list).
    ///
    /// Returns the sale as stored, with its version bumped.
    async fn update(&self, sale: Sale, expected: ExpectedVersion) -> Result<Sale, RepositoryError>;

    /// Sales matching `filter`, ordered by sale number ascending.
    async fn list(&self, filter: &SaleFilter) -> Result<Vec<Sale>, RepositoryError>;

    /// Remove a sale and its items. `false` when nothing was stored under `id`.
    async fn delete(&self, id: SaleId) -> Result<bool, RepositoryError>;
}

#[async_trait::async_trait]
impl<R> SaleRepository for Arc<R>
where
    R: SaleRepository + ?Sized,
{
    async fn insert(&self, sale: Sale) -> Result<Sale, RepositoryError> {
        (**self).insert(sale).await
    }

    async fn get(&self, id: SaleId) -> Result<Option<Sale>, RepositoryError> {
        (**self).get(id).await
    }

    async fn get_by_number(&self, sale_number: i64) -> Result<Option<Sale>, RepositoryError> {
        (**self).get_by_number(sale_number).await
    }

    async fn update(&self, sale: Sale, expected: ExpectedVersion) -> Result<Sale, RepositoryError> {
        (**self).update(sale, expected).await
    }

    async fn list(&self, filter: &SaleFilter) -> Result<Vec<Sale>, RepositoryError> {
        (**self).list(filter).await
    }

    async fn delete(&self, id: SaleId) -> Result<bool, RepositoryError> {
        (**self).delete(id).await
    }
}

/// The same sale, stamped with a storage version.
pub(crate) fn at_version(sale: Sale, version: u64) -> Sale {
    let mut state = sale.to_state();
    state.version = version;
    Sale::restore(state)
}
