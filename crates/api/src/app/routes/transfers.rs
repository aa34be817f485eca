use std::sync::Arc;

use axum::{
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use kardex_inventory::TransferStock;

use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new().route("/", get(list_transfers).post(create_transfer))
}

/// Both legs and the transfer record are committed together or not at all.
pub async fn create_transfer(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<TransferStock>,
) -> axum::response::Response {
    match services.blocking(move |s| s.transfer(body)).await {
        Ok(outcome) => (StatusCode::CREATED, Json(outcome)).into_response(),
        Err(res) => res,
    }
}

pub async fn list_transfers(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.blocking(|s| s.list_transfers()).await {
        Ok(transfers) => (StatusCode::OK, Json(transfers)).into_response(),
        Err(res) => res,
    }
}
