use std::sync::Arc;

use axum::{
    extract::{Extension, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use kardex_inventory::ApplyMovement;

use crate::app::dto;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new().route("/", get(list_movements).post(apply_movement))
}

/// Record one Entrada / Salida / Ajuste / Reserva / Liberación.
///
/// Not idempotent: posting the same body twice records two movements.
pub async fn apply_movement(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<ApplyMovement>,
) -> axum::response::Response {
    match services.blocking(move |s| s.apply_movement(body)).await {
        Ok(record) => (StatusCode::CREATED, Json(record)).into_response(),
        Err(res) => res,
    }
}

/// Kardex history in append order.
pub async fn list_movements(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<dto::MovementQuery>,
) -> axum::response::Response {
    let filter = match query.into_filter() {
        Ok(f) => f,
        Err(res) => return res,
    };
    match services.blocking(move |s| s.movement_history(&filter)).await {
        Ok(records) => (StatusCode::OK, Json(records)).into_response(),
        Err(res) => res,
    }
}
