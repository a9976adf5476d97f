//! Postgres-backed sale repository.
//!
//! Tables are defined in `sql/schema.sql`. A sale row and its item rows are
//! always written in one transaction; items are replaced wholesale on update.
//!
//! ## Error Mapping
//!
//! | SQLx error | PostgreSQL code | RepositoryError |
//! |------------|-----------------|-----------------|
//! | Database (unique violation on `sale_number`) | `23505` | `DuplicateSaleNumber` |
//! | Database (other unique violation) | `23505` | `Concurrency` |
//! | Database (other) | any | `Backend` |
//! | PoolClosed / network / decode | n/a | `Backend` |

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{FromRow, Postgres, Row, Transaction};
use tracing::{Span, info, instrument};
use uuid::Uuid;

use salesdesk_core::{
    AggregateRoot, BranchId, CustomerId, Entity, ExpectedVersion, ProductId, SaleId, SaleItemId,
};
use salesdesk_sales::{BranchRef, CustomerRef, Sale, SaleItemState, SaleState};

use super::{RepositoryError, SaleRepository, at_version};
use crate::query::SaleFilter;

const SALE_NUMBER_CONSTRAINT: &str = "sales_sale_number_key";

const SALE_COLUMNS: &str = "id, sale_number, sale_date, customer_id, customer_name, \
                            branch_id, branch_name, is_cancelled, version";

/// Postgres-backed sale repository.
///
/// Cloning is cheap: clones share the underlying connection pool.
#[derive(Debug, Clone)]
pub struct PostgresSaleRepository {
    pool: PgPool,
}

impl PostgresSaleRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a connection pool against `database_url`.
    #[instrument(skip(database_url))]
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, RepositoryError> {
        info!(max_connections, "connecting to PostgreSQL");

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e, None))?;

        info!("PostgreSQL connection pool established");
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Attach items to already-loaded sale rows, preserving row order.
    async fn hydrate(&self, rows: Vec<SaleRow>) -> Result<Vec<Sale>, RepositoryError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let item_rows = sqlx::query(
            r#"
            SELECT id, sale_id, product_id, product_name, quantity, unit_price, discount
            FROM sale_items
            WHERE sale_id = ANY($1)
            ORDER BY sale_id, position ASC
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_items", e, None))?;

        let mut items_by_sale: HashMap<Uuid, Vec<SaleItemState>> = HashMap::new();
        for row in item_rows {
            let item = SaleItemRow::from_row(&row)
                .map_err(|e| RepositoryError::Backend(format!("failed to decode sale item row: {e}")))?;
            items_by_sale.entry(item.sale_id).or_default().push(item.into());
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let items = items_by_sale.remove(&row.id).unwrap_or_default();
                Sale::restore(row.into_state(items))
            })
            .collect())
    }

    async fn load_single(&self, row: Option<PgRow>) -> Result<Option<Sale>, RepositoryError> {
        let Some(row) = row else {
            return Ok(None);
        };
        let row = SaleRow::from_row(&row)
            .map_err(|e| RepositoryError::Backend(format!("failed to decode sale row: {e}")))?;
        Ok(self.hydrate(vec![row]).await?.into_iter().next())
    }
}

#[async_trait::async_trait]
impl SaleRepository for PostgresSaleRepository {
    #[instrument(skip(self, sale), fields(sale_id = %sale.id(), sale_number = sale.sale_number()))]
    async fn insert(&self, sale: Sale) -> Result<Sale, RepositoryError> {
        let sale_number = Some(sale.sale_number());
        let stored = at_version(sale, 1);

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e, None))?;

        sqlx::query(
            r#"
            INSERT INTO sales (
                id, sale_number, sale_date, customer_id, customer_name,
                branch_id, branch_name, is_cancelled, version
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(stored.id().as_uuid())
        .bind(stored.sale_number())
        .bind(stored.sale_date())
        .bind(stored.customer().id.as_uuid())
        .bind(&stored.customer().name)
        .bind(stored.branch().id.as_uuid())
        .bind(&stored.branch().name)
        .bind(stored.is_cancelled())
        .bind(stored.version() as i64)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("insert_sale", e, sale_number))?;

        insert_items(&mut tx, &stored).await?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit", e, sale_number))?;

        Ok(stored)
    }

    #[instrument(skip(self), fields(sale_id = %id))]
    async fn get(&self, id: SaleId) -> Result<Option<Sale>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {SALE_COLUMNS} FROM sales WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_sale", e, None))?;

        self.load_single(row).await
    }

    #[instrument(skip(self))]
    async fn get_by_number(&self, sale_number: i64) -> Result<Option<Sale>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {SALE_COLUMNS} FROM sales WHERE sale_number = $1"))
            .bind(sale_number)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_sale_by_number", e, None))?;

        self.load_single(row).await
    }

    #[instrument(
        skip(self, sale),
        fields(sale_id = %sale.id(), expected_version = ?expected, new_version = tracing::field::Empty)
    )]
    async fn update(&self, sale: Sale, expected: ExpectedVersion) -> Result<Sale, RepositoryError> {
        let id = *sale.id();
        let sale_number = Some(sale.sale_number());

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e, None))?;

        let current: Option<i64> = sqlx::query_scalar("SELECT version FROM sales WHERE id = $1 FOR UPDATE")
            .bind(id.as_uuid())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("lock_sale", e, None))?;

        let Some(current) = current.map(|v| v as u64) else {
            tx.rollback()
                .await
                .map_err(|e| map_sqlx_error("rollback", e, None))?;
            return Err(RepositoryError::NotFound(id));
        };

        if !expected.matches(current) {
            tx.rollback()
                .await
                .map_err(|e| map_sqlx_error("rollback", e, None))?;
            return Err(RepositoryError::Concurrency(format!(
                "expected {expected:?}, found {current}"
            )));
        }

        let stored = at_version(sale, current + 1);
        Span::current().record("new_version", stored.version());

        sqlx::query(
            r#"
            UPDATE sales
            SET sale_number = $2,
                sale_date = $3,
                customer_id = $4,
                customer_name = $5,
                branch_id = $6,
                branch_name = $7,
                is_cancelled = $8,
                version = $9,
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .bind(stored.sale_number())
        .bind(stored.sale_date())
        .bind(stored.customer().id.as_uuid())
        .bind(&stored.customer().name)
        .bind(stored.branch().id.as_uuid())
        .bind(&stored.branch().name)
        .bind(stored.is_cancelled())
        .bind(stored.version() as i64)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("update_sale", e, sale_number))?;

        sqlx::query("DELETE FROM sale_items WHERE sale_id = $1")
            .bind(id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("clear_items", e, None))?;

        insert_items(&mut tx, &stored).await?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit", e, sale_number))?;

        Ok(stored)
    }

    #[instrument(skip(self, filter), fields(result_count = tracing::field::Empty))]
    async fn list(&self, filter: &SaleFilter) -> Result<Vec<Sale>, RepositoryError> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {SALE_COLUMNS}
            FROM sales
            WHERE ($1::bigint IS NULL OR sale_number = $1)
              AND ($2::text IS NULL OR customer_name ILIKE $2)
              AND ($3::text IS NULL OR branch_name ILIKE $3)
              AND (NOT $4 OR is_cancelled)
              AND ($5::timestamptz IS NULL OR sale_date >= $5)
              AND ($6::timestamptz IS NULL OR sale_date <= $6)
            ORDER BY sale_number ASC
            "#
        ))
        .bind(filter.sale_number)
        .bind(filter.customer_name_pattern())
        .bind(filter.branch_name_pattern())
        .bind(filter.cancelled_only)
        .bind(filter.date_from)
        .bind(filter.date_to)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_sales", e, None))?;

        let sale_rows = rows
            .iter()
            .map(SaleRow::from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| RepositoryError::Backend(format!("failed to decode sale row: {e}")))?;

        let sales = self.hydrate(sale_rows).await?;
        Span::current().record("result_count", sales.len());
        Ok(sales)
    }

    #[instrument(skip(self), fields(sale_id = %id))]
    async fn delete(&self, id: SaleId) -> Result<bool, RepositoryError> {
        // sale_items rows go with it (ON DELETE CASCADE).
        let result = sqlx::query("DELETE FROM sales WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_sale", e, None))?;

        Ok(result.rows_affected() > 0)
    }
}

async fn insert_items(
    tx: &mut Transaction<'_, Postgres>,
    sale: &Sale,
) -> Result<(), RepositoryError> {
    for (position, item) in sale.items().iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO sale_items (
                id, sale_id, position, product_id, product_name, quantity, unit_price, discount
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(item.id().as_uuid())
        .bind(sale.id().as_uuid())
        .bind(position as i32)
        .bind(item.product_id().as_uuid())
        .bind(item.product_name())
        .bind(item.quantity())
        .bind(item.unit_price())
        .bind(item.discount())
        .execute(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("insert_item", e, None))?;
    }
    Ok(())
}

/// Map SQLx errors into repository errors.
///
/// `sale_number` is the number being written, if any, so a violation of the
/// sale number constraint can name it.
fn map_sqlx_error(operation: &str, err: sqlx::Error, sale_number: Option<i64>) -> RepositoryError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {operation}: {}", db_err.message());

            if db_err.is_unique_violation() {
                return match (db_err.constraint(), sale_number) {
                    (Some(SALE_NUMBER_CONSTRAINT), Some(n)) => RepositoryError::DuplicateSaleNumber(n),
                    _ => RepositoryError::Concurrency(msg),
                };
            }
            RepositoryError::Backend(msg)
        }
        sqlx::Error::PoolClosed => {
            RepositoryError::Backend(format!("connection pool closed in {operation}"))
        }
        _ => RepositoryError::Backend(format!("sqlx error in {operation}: {err}")),
    }
}

#[derive(Debug)]
struct SaleRow {
    id: Uuid,
    sale_number: i64,
    sale_date: DateTime<Utc>,
    customer_id: Uuid,
    customer_name: String,
    branch_id: Uuid,
    branch_name: String,
    is_cancelled: bool,
    version: i64,
}

impl SaleRow {
    fn into_state(self, items: Vec<SaleItemState>) -> SaleState {
        SaleState {
            id: SaleId::from_uuid(self.id),
            sale_number: self.sale_number,
            sale_date: self.sale_date,
            customer: CustomerRef::new(CustomerId::from_uuid(self.customer_id), self.customer_name),
            branch: BranchRef::new(BranchId::from_uuid(self.branch_id), self.branch_name),
            is_cancelled: self.is_cancelled,
            items,
            version: self.version as u64,
        }
    }
}

impl<'r> FromRow<'r, PgRow> for SaleRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(SaleRow {
            id: row.try_get("id")?,
            sale_number: row.try_get("sale_number")?,
            sale_date: row.try_get("sale_date")?,
            customer_id: row.try_get("customer_id")?,
            customer_name: row.try_get("customer_name")?,
            branch_id: row.try_get("branch_id")?,
            branch_name: row.try_get("branch_name")?,
            is_cancelled: row.try_get("is_cancelled")?,
            version: row.try_get("version")?,
        })
    }
}

#[derive(Debug)]
struct SaleItemRow {
    id: Uuid,
    sale_id: Uuid,
    product_id: Uuid,
    product_name: String,
    quantity: i32,
    unit_price: Decimal,
    discount: Decimal,
}

impl<'r> FromRow<'r, PgRow> for SaleItemRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(SaleItemRow {
            id: row.try_get("id")?,
            sale_id: row.try_get("sale_id")?,
            product_id: row.try_get("product_id")?,
            product_name: row.try_get("product_name")?,
            quantity: row.try_get("quantity")?,
            unit_price: row.try_get("unit_price")?,
            discount: row.try_get("discount")?,
        })
    }
}

impl From<SaleItemRow> for SaleItemState {
    fn from(row: SaleItemRow) -> Self {
        SaleItemState {
            id: SaleItemId::from_uuid(row.id),
            sale_id: SaleId::from_uuid(row.sale_id),
            product_id: ProductId::from_uuid(row.product_id),
            product_name: row.product_name,
            quantity: row.quantity,
            unit_price: row.unit_price,
            discount: row.discount,
        }
    }
}
