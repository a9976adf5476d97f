//! In-memory sale repository for tests/dev.

use std::collections::HashMap;
use std::sync::RwLock;

use salesdesk_core::{AggregateRoot, Entity, ExpectedVersion, SaleId};
use salesdesk_sales::Sale;

use super::{RepositoryError, SaleRepository, at_version};
use crate::query::SaleFilter;

/// Sales kept in a process-local map.
///
/// - No IO
/// - Data is lost on restart
#[derive(Debug, Default)]
pub struct InMemorySaleRepository {
    inner: RwLock<HashMap<SaleId, Sale>>,
}

impl InMemorySaleRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn poisoned() -> RepositoryError {
        RepositoryError::Backend("in-memory sale repository lock poisoned".to_string())
    }
}

fn number_taken(map: &HashMap<SaleId, Sale>, sale_number: i64, except: Option<SaleId>) -> bool {
    map.values()
        .any(|s| s.sale_number() == sale_number && Some(*s.id()) != except)
}

#[async_trait::async_trait]
impl SaleRepository for InMemorySaleRepository {
    async fn insert(&self, sale: Sale) -> Result<Sale, RepositoryError> {
        let mut map = self.inner.write().map_err(|_| Self::poisoned())?;

        if map.contains_key(sale.id()) {
            return Err(RepositoryError::Concurrency(format!("sale {} already stored", sale.id())));
        }
        if number_taken(&map, sale.sale_number(), None) {
            return Err(RepositoryError::DuplicateSaleNumber(sale.sale_number()));
        }

        let stored = at_version(sale, 1);
        map.insert(*stored.id(), stored.clone());
        Ok(stored)
    }

    async fn get(&self, id: SaleId) -> Result<Option<Sale>, RepositoryError> {
        let map = self.inner.read().map_err(|_| Self::poisoned())?;
        Ok(map.get(&id).cloned())
    }

    async fn get_by_number(&self, sale_number: i64) -> Result<Option<Sale>, RepositoryError> {
        let map = self.inner.read().map_err(|_| Self::poisoned())?;
        Ok(map.values().find(|s| s.sale_number() == sale_number).cloned())
    }

    async fn update(&self, sale: Sale, expected: ExpectedVersion) -> Result<Sale, RepositoryError> {
        let mut map = self.inner.write().map_err(|_| Self::poisoned())?;
        let id = *sale.id();

        let current = map.get(&id).ok_or(RepositoryError::NotFound(id))?.version();
        if !expected.matches(current) {
            return Err(RepositoryError::Concurrency(format!(
                "expected {expected:?}, found {current}"
            )));
        }
        if number_taken(&map, sale.sale_number(), Some(id)) {
            return Err(RepositoryError::DuplicateSaleNumber(sale.sale_number()));
        }

        let stored = at_version(sale, current + 1);
        map.insert(id, stored.clone());
        Ok(stored)
    }

    async fn list(&self, filter: &SaleFilter) -> Result<Vec<Sale>, RepositoryError> {
        let map = self.inner.read().map_err(|_| Self::poisoned())?;

        let mut sales: Vec<Sale> = map.values().filter(|s| filter.matches(s)).cloned().collect();
        sales.sort_by_key(Sale::sale_number);
        Ok(sales)
    }

    async fn delete(&self, id: SaleId) -> Result<bool, RepositoryError> {
        let mut map = self.inner.write().map_err(|_| Self::poisoned())?;
        Ok(map.remove(&id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use salesdesk_core::{BranchId, CustomerId, ProductId};
    use salesdesk_sales::{BranchRef, CustomerRef, SaleItem};

    fn test_sale(sale_number: i64) -> Sale {
        let mut sale = Sale::new(
            sale_number,
            Utc::now(),
            CustomerRef::new(CustomerId::new(), "Carla Dias"),
            BranchRef::new(BranchId::new(), "Savassi"),
        );
        sale.add_item(SaleItem::new(ProductId::new(), "Cerveja Lata", 6, dec!(4.50)));
        sale
    }

    #[tokio::test]
    async fn insert_stamps_version_one() {
        let repo = InMemorySaleRepository::new();
        let stored = repo.insert(test_sale(1)).await.unwrap();

        assert_eq!(stored.version(), 1);
        assert_eq!(repo.get(*stored.id()).await.unwrap(), Some(stored));
    }

    #[tokio::test]
    async fn duplicate_sale_numbers_are_rejected() {
        let repo = InMemorySaleRepository::new();
        repo.insert(test_sale(7)).await.unwrap();

        let err = repo.insert(test_sale(7)).await.unwrap_err();
        assert!(matches!(err, RepositoryError::DuplicateSaleNumber(7)));
    }

    #[tokio::test]
    async fn update_bumps_version_and_rejects_stale_writers() {
        let repo = InMemorySaleRepository::new();
        let stored = repo.insert(test_sale(1)).await.unwrap();

        let mut first = stored.clone();
        first.cancel();
        let first = repo.update(first, ExpectedVersion::Exact(1)).await.unwrap();
        assert_eq!(first.version(), 2);

        let err = repo.update(stored, ExpectedVersion::Exact(1)).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Concurrency(_)));
    }

    #[tokio::test]
    async fn update_cannot_steal_another_sales_number() {
        let repo = InMemorySaleRepository::new();
        repo.insert(test_sale(1)).await.unwrap();
        let mut second = repo.insert(test_sale(2)).await.unwrap();

        let (date, customer, branch) = (second.sale_date(), second.customer().clone(), second.branch().clone());
        second.update_details(1, date, customer, branch);

        let err = repo.update(second, ExpectedVersion::Any).await.unwrap_err();
        assert!(matches!(err, RepositoryError::DuplicateSaleNumber(1)));
    }

    #[tokio::test]
    async fn update_of_unknown_sale_is_not_found() {
        let repo = InMemorySaleRepository::new();
        let err = repo.update(test_sale(1), ExpectedVersion::Any).await.unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound(_)));
    }

    #[tokio::test]
    async fn list_is_filtered_and_ordered_by_sale_number() {
        let repo = InMemorySaleRepository::new();
        for n in [30, 10, 20] {
            repo.insert(test_sale(n)).await.unwrap();
        }
        let mut cancelled = repo.get_by_number(20).await.unwrap().unwrap();
        cancelled.cancel();
        repo.update(cancelled, ExpectedVersion::Any).await.unwrap();

        let all = repo.list(&SaleFilter::default()).await.unwrap();
        let numbers: Vec<_> = all.iter().map(Sale::sale_number).collect();
        assert_eq!(numbers, vec![10, 20, 30]);

        let only_cancelled = repo
            .list(&SaleFilter { cancelled_only: true, ..Default::default() })
            .await
            .unwrap();
        assert_eq!(only_cancelled.len(), 1);
        assert_eq!(only_cancelled[0].sale_number(), 20);
    }

    #[tokio::test]
    async fn delete_reports_whether_anything_was_removed() {
        let repo = InMemorySaleRepository::new();
        let stored = repo.insert(test_sale(1)).await.unwrap();

        assert!(repo.delete(*stored.id()).await.unwrap());
        assert!(!repo.delete(*stored.id()).await.unwrap());
        assert_eq!(repo.get_by_number(1).await.unwrap(), None);
    }
}
