//! Infrastructure layer: persistence, event transport and application handlers.

pub mod event_bus;
pub mod query;
pub mod repository;
pub mod sale_service;


pub use query::SaleFilter;
pub use repository::{
    InMemorySaleRepository, PostgresSaleRepository, RepositoryError, SaleRepository,
};
pub use sale_service::{CreateSale, SaleService, ServiceError, UpdateSale};
