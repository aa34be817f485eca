use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use kardex_infra::StockError;

pub fn stock_error_to_response(err: StockError) -> axum::response::Response {
    let message = err.to_string();
    match err {
        StockError::Validation(_) => json_error(StatusCode::BAD_REQUEST, "validation_error", message),
        StockError::InsufficientStock {
            available,
            requested,
        } => (
            StatusCode::UNPROCESSABLE_ENTITY,
            axum::Json(json!({
                "error": "insufficient_stock",
                "message": message,
                "available": available,
                "requested": requested,
            })),
        )
            .into_response(),
        StockError::NotFound(_) => json_error(StatusCode::NOT_FOUND, "not_found", message),
        StockError::InvariantViolation(_) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "invariant_violation", message)
        }
        StockError::AlreadyExists(_) => json_error(StatusCode::CONFLICT, "already_exists", message),
        StockError::Conflict(_) => json_error(StatusCode::CONFLICT, "conflict", message),
        StockError::Store(e) => {
            tracing::error!(error = %e, "store failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", message)
        }
    }
}

pub fn internal_error(message: impl Into<String>) -> axum::response::Response {
    json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", message)
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

/// Parse a path/query value into a domain type, or answer 400.
pub fn parse<T>(raw: &str, what: &'static str) -> Result<T, axum::response::Response>
where
    T: core::str::FromStr,
    T::Err: core::fmt::Display,
{
    raw.parse::<T>().map_err(|e| {
        json_error(
            StatusCode::BAD_REQUEST,
            "invalid_parameter",
            format!("invalid {what}: {e}"),
        )
    })
}
