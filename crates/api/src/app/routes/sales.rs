use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;

use salesdesk_core::SaleId;
use salesdesk_infra::SaleFilter;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

/// Sale routes.
///
/// `/:key` is a sale number for `GET` and a sale id for `PUT`/`DELETE`; the
/// router cannot hold two differently named parameters in the same position.
pub fn router() -> Router {
    Router::new()
        .route("/", post(create_sale))
        .route("/search", post(search_sales))
        .route("/:key", get(get_sale).put(update_sale).delete(delete_sale))
        .route("/:key/cancel", post(cancel_sale))
}

pub async fn create_sale(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::CreateSaleRequest>,
) -> axum::response::Response {
    let cmd = match body.into_command() {
        Ok(c) => c,
        Err(resp) => return resp,
    };

    match services.create_sale(cmd).await {
        Ok(sale) => (StatusCode::CREATED, Json(dto::sale_to_json(&sale))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn get_sale(
    Extension(services): Extension<Arc<AppServices>>,
    Path(sale_number): Path<String>,
) -> axum::response::Response {
    let sale_number = match dto::parse_sale_number(&sale_number) {
        Ok(n) => n,
        Err(resp) => return resp,
    };

    match services.get_sale_by_number(sale_number).await {
        Ok(sale) => Json(dto::sale_to_json(&sale)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn cancel_sale(
    Extension(services): Extension<Arc<AppServices>>,
    Path(sale_number): Path<String>,
) -> axum::response::Response {
    let sale_number = match dto::parse_sale_number(&sale_number) {
        Ok(n) => n,
        Err(resp) => return resp,
    };

    match services.cancel_sale(sale_number).await {
        Ok(sale) => Json(dto::sale_to_json(&sale)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn search_sales(
    Extension(services): Extension<Arc<AppServices>>,
    Json(filter): Json<SaleFilter>,
) -> axum::response::Response {
    match services.list_sales(filter).await {
        Ok(sales) => Json(json!({
            "items": sales.iter().map(dto::sale_to_json).collect::<Vec<_>>(),
        }))
        .into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn update_sale(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<dto::UpdateSaleRequest>,
) -> axum::response::Response {
    let id: SaleId = match dto::parse_id("id", &id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let cmd = match body.into_command(id) {
        Ok(c) => c,
        Err(resp) => return resp,
    };

    match services.update_sale(cmd).await {
        Ok(sale) => Json(dto::sale_to_json(&sale)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn delete_sale(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: SaleId = match dto::parse_id("id", &id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.delete_sale(id).await {
        Ok(()) => Json(json!({"id": id.to_string(), "deleted": true})).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
