use axum::Router;

pub mod sales;
pub mod system;

/// Router for everything under `/api`.
pub fn router() -> Router {
    Router::new().nest("/sales", sales::router())
}
