//! Entry points used by the other modules of the system: sales, quality
//! control, order reservations and the legacy product-level counter.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use kardex_core::ProductId;
use kardex_infra::{QualityApproval, Reservation, SaleLine};

use crate::app::{dto, errors};
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/sales", post(complete_sale))
        .route("/quality-control/approvals", post(approve_quality_control))
        .route("/reservations", post(reserve))
        .route("/reservations/release", post(release))
}

pub fn products_router() -> Router {
    Router::new()
        .route("/:id/global-stock", get(global_stock))
        .route("/:id/global-stock/adjust", post(adjust_global_stock))
}

pub async fn complete_sale(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<SaleLine>,
) -> axum::response::Response {
    match services.blocking(move |s| s.complete_sale(body)).await {
        Ok(record) => (StatusCode::CREATED, Json(record)).into_response(),
        Err(res) => res,
    }
}

/// `200` with `null` when nothing was approved.
pub async fn approve_quality_control(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<QualityApproval>,
) -> axum::response::Response {
    match services.blocking(move |s| s.approve_quality_control(body)).await {
        Ok(Some(record)) => (StatusCode::CREATED, Json(record)).into_response(),
        Ok(None) => (StatusCode::OK, Json(serde_json::Value::Null)).into_response(),
        Err(res) => res,
    }
}

pub async fn reserve(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<Reservation>,
) -> axum::response::Response {
    match services.blocking(move |s| s.reserve(body)).await {
        Ok(record) => (StatusCode::CREATED, Json(record)).into_response(),
        Err(res) => res,
    }
}

pub async fn release(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<Reservation>,
) -> axum::response::Response {
    match services.blocking(move |s| s.release(body)).await {
        Ok(record) => (StatusCode::CREATED, Json(record)).into_response(),
        Err(res) => res,
    }
}

pub async fn global_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: ProductId = match errors::parse(&id, "product id") {
        Ok(v) => v,
        Err(res) => return res,
    };
    match services.blocking(move |s| s.global_stock(&id)).await {
        Ok(counter) => (StatusCode::OK, Json(counter)).into_response(),
        Err(res) => res,
    }
}

/// Clamped at zero; never touches the kardex.
pub async fn adjust_global_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<dto::AdjustGlobalStockRequest>,
) -> axum::response::Response {
    let id: ProductId = match errors::parse(&id, "product id") {
        Ok(v) => v,
        Err(res) => return res,
    };
    match services
        .blocking(move |s| s.adjust_global_stock(&id, body.delta))
        .await
    {
        Ok(counter) => (StatusCode::OK, Json(counter)).into_response(),
        Err(res) => res,
    }
}
