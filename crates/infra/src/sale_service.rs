//! Application handlers for sales.
//!
//! `SaleService` is the only place that combines a [`SaleRepository`] with an
//! [`EventBus`]. Each mutating operation follows the same pipeline:
//!
//! ```text
//! load (if needed) → mutate aggregate → validate → persist → publish
//! ```
//!
//! Events are published only after the repository accepted the write. A
//! publish failure is reported as [`ServiceError::Publish`]; the write is not
//! undone, so delivery is at-least-once from the caller's point of view.

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::{info, instrument, warn};

use salesdesk_core::{
    AggregateRoot, Entity, ExpectedVersion, SaleId, ValidationErrorDetail,
};
use salesdesk_events::{EventBus, EventEnvelope};
use salesdesk_sales::{
    AGGREGATE_TYPE, BranchRef, CustomerRef, ItemLine, Sale, SaleCancelled, SaleCreated,
    SaleDeleted, SaleEvent, SaleModified,
};

use crate::query::SaleFilter;
use crate::repository::{RepositoryError, SaleRepository};

#[derive(Debug, Error)]
pub enum ServiceError {
    /// The resulting sale broke one or more rules.
    #[error("validation failed: {}", summarize(.0))]
    Validation(Vec<ValidationErrorDetail>),

    #[error("not found: {0}")]
    NotFound(String),

    /// Duplicate sale number or stale version.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Storage failed for a reason the caller cannot fix.
    #[error(transparent)]
    Repository(RepositoryError),

    /// Publication failed after a successful write (at-least-once; retry may duplicate).
    #[error("event publication failed: {0}")]
    Publish(String),
}

impl From<RepositoryError> for ServiceError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::DuplicateSaleNumber(n) => {
                ServiceError::Conflict(format!("sale number {n} already exists"))
            }
            RepositoryError::NotFound(id) => ServiceError::NotFound(format!("sale {id}")),
            RepositoryError::Concurrency(msg) => ServiceError::Conflict(msg),
            other @ RepositoryError::Backend(_) => ServiceError::Repository(other),
        }
    }
}

/// Input for [`SaleService::create`].
///
/// Item ids are ignored; every line becomes a new item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateSale {
    pub sale_number: i64,
    pub sale_date: DateTime<Utc>,
    pub customer: CustomerRef,
    pub branch: BranchRef,
    pub items: Vec<ItemLine>,
}

/// Input for [`SaleService::update`]: the full desired state of a sale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateSale {
    pub id: SaleId,
    pub sale_number: i64,
    pub sale_date: DateTime<Utc>,
    pub customer: CustomerRef,
    pub branch: BranchRef,
    /// `true` cancels the sale. `false` never reactivates a cancelled one.
    pub is_cancelled: bool,
    pub items: Vec<ItemLine>,
}

#[derive(Debug)]
pub struct SaleService<R, B> {
    repository: R,
    bus: B,
}

impl<R, B> SaleService<R, B> {
    pub fn new(repository: R, bus: B) -> Self {
        Self { repository, bus }
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }
}

impl<R, B> SaleService<R, B>
where
    R: SaleRepository,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    #[instrument(skip(self, cmd), fields(sale_number = cmd.sale_number, item_count = cmd.items.len()))]
    pub async fn create(&self, cmd: CreateSale) -> Result<Sale, ServiceError> {
        let mut sale = Sale::new(cmd.sale_number, cmd.sale_date, cmd.customer, cmd.branch);
        sale.sync_items(cmd.items);
        ensure_valid(&sale)?;

        if self.repository.get_by_number(sale.sale_number()).await?.is_some() {
            warn!("sale number already in use");
            return Err(ServiceError::Conflict(format!(
                "sale number {} already exists",
                sale.sale_number()
            )));
        }

        let stored = self.repository.insert(sale).await?;
        info!(sale_id = %stored.id(), total_amount = %stored.total_amount(), "sale created");

        self.publish(SaleEvent::SaleCreated(SaleCreated {
            sale_id: *stored.id(),
            sale_number: stored.sale_number(),
            occurred_at: Utc::now(),
        }))?;

        Ok(stored)
    }

    #[instrument(skip(self), fields(sale_id = %id))]
    pub async fn get(&self, id: SaleId) -> Result<Sale, ServiceError> {
        self.repository
            .get(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("sale {id}")))
    }

    #[instrument(skip(self))]
    pub async fn get_by_number(&self, sale_number: i64) -> Result<Sale, ServiceError> {
        self.repository
            .get_by_number(sale_number)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("sale number {sale_number}")))
    }

    #[instrument(skip(self, filter))]
    pub async fn list(&self, filter: SaleFilter) -> Result<Vec<Sale>, ServiceError> {
        Ok(self.repository.list(&filter).await?)
    }

    #[instrument(skip(self, cmd), fields(sale_id = %cmd.id, sale_number = cmd.sale_number))]
    pub async fn update(&self, cmd: UpdateSale) -> Result<Sale, ServiceError> {
        let mut sale = self.get(cmd.id).await?;
        let expected = ExpectedVersion::Exact(sale.version());

        if cmd.sale_number != sale.sale_number() {
            if let Some(owner) = self.repository.get_by_number(cmd.sale_number).await? {
                if owner.id() != sale.id() {
                    warn!(owner = %owner.id(), "sale number already in use");
                    return Err(ServiceError::Conflict(format!(
                        "sale number {} already exists",
                        cmd.sale_number
                    )));
                }
            }
        }

        sale.update_details(cmd.sale_number, cmd.sale_date, cmd.customer, cmd.branch);
        sale.sync_items(cmd.items);
        let newly_cancelled = cmd.is_cancelled && sale.cancel();
        ensure_valid(&sale)?;

        let stored = self.repository.update(sale, expected).await?;
        info!(version = stored.version(), newly_cancelled, "sale updated");

        let now = Utc::now();
        self.publish(SaleEvent::SaleModified(SaleModified {
            sale_id: *stored.id(),
            occurred_at: now,
        }))?;
        if newly_cancelled {
            self.publish(SaleEvent::SaleCancelled(SaleCancelled {
                sale_id: *stored.id(),
                occurred_at: now,
            }))?;
        }

        Ok(stored)
    }

    /// Cancel by sale number. Cancelling an already-cancelled sale writes
    /// nothing and publishes nothing.
    #[instrument(skip(self))]
    pub async fn cancel(&self, sale_number: i64) -> Result<Sale, ServiceError> {
        let mut sale = self.get_by_number(sale_number).await?;
        if !sale.cancel() {
            info!(sale_id = %sale.id(), "sale already cancelled");
            return Ok(sale);
        }

        let expected = ExpectedVersion::Exact(sale.version());
        let stored = self.repository.update(sale, expected).await?;
        info!(sale_id = %stored.id(), "sale cancelled");

        self.publish(SaleEvent::SaleCancelled(SaleCancelled {
            sale_id: *stored.id(),
            occurred_at: Utc::now(),
        }))?;

        Ok(stored)
    }

    #[instrument(skip(self), fields(sale_id = %id))]
    pub async fn delete(&self, id: SaleId) -> Result<(), ServiceError> {
        if !self.repository.delete(id).await? {
            warn!("delete of unknown sale");
            return Err(ServiceError::NotFound(format!("sale {id}")));
        }
        info!("sale deleted");

        self.publish(SaleEvent::SaleDeleted(SaleDeleted {
            sale_id: id,
            occurred_at: Utc::now(),
        }))
    }

    fn publish(&self, event: SaleEvent) -> Result<(), ServiceError> {
        let envelope = EventEnvelope::from_event(event.sale_id().into(), AGGREGATE_TYPE, &event)
            .map_err(|e| ServiceError::Publish(e.to_string()))?;

        self.bus.publish(envelope).map_err(|e| {
            warn!(error = %e, "event publication failed after write");
            ServiceError::Publish(e.to_string())
        })
    }
}

fn summarize(errors: &[ValidationErrorDetail]) -> String {
    errors
        .iter()
        .map(|e| format!("{}: {}", e.field, e.message))
        .collect::<Vec<_>>()
        .join("; ")
}

fn ensure_valid(sale: &Sale) -> Result<(), ServiceError> {
    sale.validate().into_result().map_err(|errors| {
        warn!(error_count = errors.len(), "sale rejected by validation");
        ServiceError::Validation(errors)
    })
}
