//! Service wiring: repository + event bus behind one handle for the handlers.

use std::sync::Arc;

use anyhow::Context;
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::{info, warn};

use salesdesk_core::SaleId;
use salesdesk_events::{EventBus, EventEnvelope, InMemoryBusError, InMemoryEventBus, Subscription};
use salesdesk_infra::{
    CreateSale, InMemorySaleRepository, PostgresSaleRepository, SaleFilter, SaleService,
    ServiceError, UpdateSale,
};
use salesdesk_sales::Sale;

use crate::config::ApiConfig;

pub type SaleEnvelope = EventEnvelope<JsonValue>;

#[derive(Debug, Error)]
pub enum SalesBusError {
    #[error(transparent)]
    InMemory(#[from] InMemoryBusError),
    #[cfg(feature = "redis")]
    #[error(transparent)]
    Redis(#[from] salesdesk_infra::event_bus::RedisBusError),
}

/// Event transport selected at startup.
#[derive(Debug, Clone)]
pub enum SalesBus {
    InMemory(Arc<InMemoryEventBus<SaleEnvelope>>),
    #[cfg(feature = "redis")]
    Redis(salesdesk_infra::event_bus::RedisPubSubEventBus),
}

impl EventBus<SaleEnvelope> for SalesBus {
    type Error = SalesBusError;

    fn publish(&self, message: SaleEnvelope) -> Result<(), Self::Error> {
        match self {
            SalesBus::InMemory(bus) => Ok(bus.publish(message)?),
            #[cfg(feature = "redis")]
            SalesBus::Redis(bus) => Ok(bus.publish(message)?),
        }
    }

    fn subscribe(&self) -> Subscription<SaleEnvelope> {
        match self {
            SalesBus::InMemory(bus) => bus.subscribe(),
            #[cfg(feature = "redis")]
            SalesBus::Redis(bus) => bus.subscribe(),
        }
    }
}

/// Everything the handlers need, in one of two storage modes.
pub enum AppServices {
    /// Default: in-memory repository, lost on restart.
    InMemory {
        sales: SaleService<Arc<InMemorySaleRepository>, SalesBus>,
    },
    /// `USE_PERSISTENT_STORES=true`: PostgreSQL repository.
    Persistent {
        sales: SaleService<PostgresSaleRepository, SalesBus>,
    },
}

impl AppServices {
    pub fn in_memory() -> Self {
        AppServices::InMemory {
            sales: SaleService::new(
                Arc::new(InMemorySaleRepository::new()),
                SalesBus::InMemory(Arc::new(InMemoryEventBus::new())),
            ),
        }
    }

    pub fn backend(&self) -> &'static str {
        match self {
            AppServices::InMemory { .. } => "in_memory",
            AppServices::Persistent { .. } => "postgres",
        }
    }

    /// Subscribe to every sale event published after this call.
    pub fn subscribe(&self) -> Subscription<SaleEnvelope> {
        match self {
            AppServices::InMemory { sales } => sales.bus().subscribe(),
            AppServices::Persistent { sales } => sales.bus().subscribe(),
        }
    }

    pub async fn create_sale(&self, cmd: CreateSale) -> Result<Sale, ServiceError> {
        match self {
            AppServices::InMemory { sales } => sales.create(cmd).await,
            AppServices::Persistent { sales } => sales.create(cmd).await,
        }
    }

    pub async fn get_sale_by_number(&self, sale_number: i64) -> Result<Sale, ServiceError> {
        match self {
            AppServices::InMemory { sales } => sales.get_by_number(sale_number).await,
            AppServices::Persistent { sales } => sales.get_by_number(sale_number).await,
        }
    }

    pub async fn list_sales(&self, filter: SaleFilter) -> Result<Vec<Sale>, ServiceError> {
        match self {
            AppServices::InMemory { sales } => sales.list(filter).await,
            AppServices::Persistent { sales } => sales.list(filter).await,
        }
    }

    pub async fn update_sale(&self, cmd: UpdateSale) -> Result<Sale, ServiceError> {
        match self {
            AppServices::InMemory { sales } => sales.update(cmd).await,
            AppServices::Persistent { sales } => sales.update(cmd).await,
        }
    }

    pub async fn cancel_sale(&self, sale_number: i64) -> Result<Sale, ServiceError> {
        match self {
            AppServices::InMemory { sales } => sales.cancel(sale_number).await,
            AppServices::Persistent { sales } => sales.cancel(sale_number).await,
        }
    }

    pub async fn delete_sale(&self, id: SaleId) -> Result<(), ServiceError> {
        match self {
            AppServices::InMemory { sales } => sales.delete(id).await,
            AppServices::Persistent { sales } => sales.delete(id).await,
        }
    }
}

/// Build services from config and start the background event log.
pub async fn build_services(config: &ApiConfig) -> anyhow::Result<AppServices> {
    let bus = build_bus(config)?;
    spawn_event_log(bus.subscribe());

    if !config.use_persistent_stores {
        info!("using in-memory sale repository");
        return Ok(AppServices::InMemory {
            sales: SaleService::new(Arc::new(InMemorySaleRepository::new()), bus),
        });
    }

    let database_url = config
        .database_url
        .as_deref()
        .context("USE_PERSISTENT_STORES is set but DATABASE_URL is missing")?;
    let repository =
        PostgresSaleRepository::connect(database_url, config.database_max_connections)
            .await
            .context("failed to connect sale repository")?;

    Ok(AppServices::Persistent {
        sales: SaleService::new(repository, bus),
    })
}

fn build_bus(config: &ApiConfig) -> anyhow::Result<SalesBus> {
    match config.redis_url.as_deref() {
        #[cfg(feature = "redis")]
        Some(url) => {
            let bus = salesdesk_infra::event_bus::RedisPubSubEventBus::new(url, config.events_channel.clone())
                .context("failed to open redis event bus")?;
            info!(channel = bus.channel(), "publishing sale events to redis");
            Ok(SalesBus::Redis(bus))
        }
        #[cfg(not(feature = "redis"))]
        Some(_) => {
            warn!("REDIS_URL is set but the binary was built without the `redis` feature; using in-process bus");
            Ok(SalesBus::InMemory(Arc::new(InMemoryEventBus::new())))
        }
        None => Ok(SalesBus::InMemory(Arc::new(InMemoryEventBus::new()))),
    }
}

/// Log every sale event on a dedicated thread.
///
/// The thread exits once the bus (and with it every sender) is dropped.
fn spawn_event_log(subscription: Subscription<SaleEnvelope>) {
    let spawned = std::thread::Builder::new()
        .name("sale-event-log".to_string())
        .spawn(move || {
            while let Ok(envelope) = subscription.recv() {
                info!(
                    event_id = %envelope.event_id(),
                    event_type = envelope.event_type(),
                    aggregate_id = %envelope.aggregate_id(),
                    "sale event"
                );
            }
        });

    if let Err(e) = spawned {
        warn!(error = %e, "failed to start sale event log");
    }
}
