use std::str::FromStr;

use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{Value as JsonValue, json};

use salesdesk_core::{AggregateRoot, DomainError, Entity};
use salesdesk_infra::{CreateSale, UpdateSale};
use salesdesk_sales::{BranchRef, CustomerRef, ItemLine, Sale, SaleItem};

use crate::app::errors;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct SaleItemRequest {
    /// Existing item to update; omit to add a new line.
    pub id: Option<String>,
    pub product_id: String,
    pub product_name: String,
    pub quantity: i32,
    pub unit_price: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct CreateSaleRequest {
    pub sale_number: i64,
    /// Defaults to the time the request is handled.
    pub sale_date: Option<DateTime<Utc>>,
    pub customer_id: String,
    pub customer_name: String,
    pub branch_id: String,
    pub branch_name: String,
    #[serde(default)]
    pub items: Vec<SaleItemRequest>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateSaleRequest {
    /// Must equal the id in the path when present.
    pub id: Option<String>,
    pub sale_number: i64,
    pub sale_date: DateTime<Utc>,
    pub customer_id: String,
    pub customer_name: String,
    pub branch_id: String,
    pub branch_name: String,
    #[serde(default)]
    pub is_cancelled: bool,
    #[serde(default)]
    pub items: Vec<SaleItemRequest>,
}

impl CreateSaleRequest {
    pub fn into_command(self) -> Result<CreateSale, axum::response::Response> {
        Ok(CreateSale {
            sale_number: self.sale_number,
            sale_date: self.sale_date.unwrap_or_else(Utc::now),
            customer: CustomerRef::new(parse_id("customer_id", &self.customer_id)?, self.customer_name),
            branch: BranchRef::new(parse_id("branch_id", &self.branch_id)?, self.branch_name),
            items: item_lines(self.items)?,
        })
    }
}

impl UpdateSaleRequest {
    /// `path_id` is the already-parsed id from the URL.
    pub fn into_command(
        self,
        path_id: salesdesk_core::SaleId,
    ) -> Result<UpdateSale, axum::response::Response> {
        if let Some(body_id) = self.id.as_deref() {
            let body_id: salesdesk_core::SaleId = parse_id("id", body_id)?;
            if body_id != path_id {
                return Err(errors::json_error(
                    StatusCode::BAD_REQUEST,
                    "id_mismatch",
                    format!("body id {body_id} does not match path id {path_id}"),
                ));
            }
        }

        Ok(UpdateSale {
            id: path_id,
            sale_number: self.sale_number,
            sale_date: self.sale_date,
            customer: CustomerRef::new(parse_id("customer_id", &self.customer_id)?, self.customer_name),
            branch: BranchRef::new(parse_id("branch_id", &self.branch_id)?, self.branch_name),
            is_cancelled: self.is_cancelled,
            items: item_lines(self.items)?,
        })
    }
}

fn item_lines(items: Vec<SaleItemRequest>) -> Result<Vec<ItemLine>, axum::response::Response> {
    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| {
            let id = match item.id.as_deref() {
                Some(raw) => Some(parse_id(&format!("items[{i}].id"), raw)?),
                None => None,
            };
            Ok(ItemLine {
                id,
                product_id: parse_id(&format!("items[{i}].product_id"), &item.product_id)?,
                product_name: item.product_name,
                quantity: item.quantity,
                unit_price: item.unit_price,
            })
        })
        .collect()
}

pub fn parse_id<T>(field: &str, raw: &str) -> Result<T, axum::response::Response>
where
    T: FromStr<Err = DomainError>,
{
    raw.trim().parse().map_err(|e: DomainError| {
        errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", format!("{field}: {e}"))
    })
}

pub fn parse_sale_number(raw: &str) -> Result<i64, axum::response::Response> {
    raw.trim().parse().map_err(|_| {
        errors::json_error(
            StatusCode::BAD_REQUEST,
            "invalid_sale_number",
            format!("sale number must be an integer, got {raw:?}"),
        )
    })
}

// -------------------------
// Response mapping
// -------------------------

pub fn sale_to_json(sale: &Sale) -> JsonValue {
    json!({
        "id": sale.id().to_string(),
        "sale_number": sale.sale_number(),
        "sale_date": sale.sale_date(),
        "customer_id": sale.customer().id.to_string(),
        "customer_name": sale.customer().name,
        "branch_id": sale.branch().id.to_string(),
        "branch_name": sale.branch().name,
        "is_cancelled": sale.is_cancelled(),
        "total_amount": sale.total_amount().to_string(),
        "version": sale.version(),
        "items": sale.items().iter().map(sale_item_to_json).collect::<Vec<_>>(),
    })
}

fn sale_item_to_json(item: &SaleItem) -> JsonValue {
    json!({
        "id": item.id().to_string(),
        "product_id": item.product_id().to_string(),
        "product_name": item.product_name(),
        "quantity": item.quantity(),
        "unit_price": item.unit_price().to_string(),
        "discount": item.discount().to_string(),
        "total_amount": item.total_amount().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use salesdesk_core::{BranchId, CustomerId, ProductId, SaleId};

    fn request_json(items: JsonValue) -> JsonValue {
        json!({
            "sale_number": 7,
            "customer_id": CustomerId::new().to_string(),
            "customer_name": "Ada Lovelace",
            "branch_id": BranchId::new().to_string(),
            "branch_name": "Downtown",
            "items": items,
        })
    }

    #[test]
    fn create_request_converts_to_command() {
        let product = ProductId::new();
        let body: CreateSaleRequest = serde_json::from_value(request_json(json!([
            {"product_id": product.to_string(), "product_name": "Keyboard", "quantity": 5, "unit_price": "10.00"}
        ])))
        .unwrap();

        let cmd = body.into_command().unwrap();
        assert_eq!(cmd.sale_number, 7);
        assert_eq!(cmd.items.len(), 1);
        assert_eq!(cmd.items[0].product_id, product);
        assert_eq!(cmd.items[0].unit_price, dec!(10.00));
        assert_eq!(cmd.items[0].id, None);
    }

    #[test]
    fn bad_item_product_id_is_rejected_with_its_path() {
        let body: CreateSaleRequest = serde_json::from_value(request_json(json!([
            {"product_id": "nope", "product_name": "Keyboard", "quantity": 1, "unit_price": 1}
        ])))
        .unwrap();

        let resp = body.into_command().unwrap_err();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn update_rejects_mismatched_body_id() {
        let mut value = request_json(json!([]));
        value["id"] = json!(SaleId::new().to_string());
        value["sale_date"] = json!("2024-03-01T12:00:00Z");
        let body: UpdateSaleRequest = serde_json::from_value(value).unwrap();

        let resp = body.into_command(SaleId::new()).unwrap_err();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn sale_json_reports_money_as_strings() {
        let mut sale = Sale::new(
            9,
            Utc::now(),
            CustomerRef::new(CustomerId::new(), "Ada Lovelace"),
            BranchRef::new(BranchId::new(), "Downtown"),
        );
        sale.sync_items(vec![ItemLine {
            id: None,
            product_id: ProductId::new(),
            product_name: "Keyboard".into(),
            quantity: 5,
            unit_price: dec!(10),
        }]);

        let json = sale_to_json(&sale);
        let total: Decimal = json["total_amount"].as_str().unwrap().parse().unwrap();
        let discount: Decimal = json["items"][0]["discount"].as_str().unwrap().parse().unwrap();
        assert_eq!(total, dec!(45));
        assert_eq!(discount, dec!(5));
        assert_eq!(json["is_cancelled"], json!(false));
    }
}
