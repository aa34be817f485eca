use std::sync::Arc;

use axum::{
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use crate::app::services::AppServices;

pub fn reconciliation_router() -> Router {
    Router::new()
        .route("/", get(reconcile))
        .route("/rebuild", post(rebuild))
}

pub async fn health() -> StatusCode {
    StatusCode::OK
}

/// Replay the ledger and report divergences from the stock table.
pub async fn reconcile(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    match services.blocking(|s| s.reconcile()).await {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(res) => res,
    }
}

pub async fn rebuild(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    match services.blocking(|s| s.rebuild_projection()).await {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(res) => res,
    }
}
