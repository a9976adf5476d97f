use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use salesdesk_core::ValidationErrorDetail;
use salesdesk_infra::ServiceError;

pub fn service_error_to_response(err: ServiceError) -> Response {
    match err {
        ServiceError::Validation(details) => validation_error(details),
        ServiceError::NotFound(msg) => json_error(StatusCode::NOT_FOUND, "not_found", msg),
        ServiceError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        ServiceError::Repository(e) => {
            tracing::error!(error = %e, "sale repository failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "storage_error", e.to_string())
        }
        ServiceError::Publish(msg) => json_error(StatusCode::BAD_GATEWAY, "publish_error", msg),
    }
}

pub fn json_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

/// 400 carrying every failed field under `details`.
pub fn validation_error(details: Vec<ValidationErrorDetail>) -> Response {
    let message = match details.len() {
        1 => "1 field failed validation".to_string(),
        n => format!("{n} fields failed validation"),
    };
    (
        StatusCode::BAD_REQUEST,
        axum::Json(json!({
            "error": "validation_error",
            "message": message,
            "details": details,
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use salesdesk_infra::RepositoryError;

    #[test]
    fn maps_each_service_error_to_its_status() {
        let cases = [
            (ServiceError::Validation(vec![]), StatusCode::BAD_REQUEST),
            (ServiceError::NotFound("sale 1".into()), StatusCode::NOT_FOUND),
            (ServiceError::Conflict("taken".into()), StatusCode::CONFLICT),
            (
                ServiceError::Repository(RepositoryError::Backend("down".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (ServiceError::Publish("no broker".into()), StatusCode::BAD_GATEWAY),
        ];

        for (err, status) in cases {
            assert_eq!(service_error_to_response(err).status(), status);
        }
    }
}
