use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, put},
    Json, Router,
};

use kardex_core::WarehouseId;
use kardex_inventory::WarehouseDraft;

use crate::app::{dto, errors};
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_warehouses).post(create_warehouse))
        .route(
            "/:id",
            get(get_warehouse).put(update_warehouse).delete(remove_warehouse),
        )
        .route("/:id/status", put(set_status))
        .route("/:id/stock", get(warehouse_stock))
}

fn warehouse_id(raw: &str) -> Result<WarehouseId, axum::response::Response> {
    errors::parse(raw, "warehouse id")
}

pub async fn create_warehouse(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<WarehouseDraft>,
) -> axum::response::Response {
    match services.blocking(move |s| s.register_warehouse(body)).await {
        Ok(warehouse) => (StatusCode::CREATED, Json(warehouse)).into_response(),
        Err(res) => res,
    }
}

pub async fn list_warehouses(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.blocking(|s| s.list_warehouses()).await {
        Ok(all) => (StatusCode::OK, Json(all)).into_response(),
        Err(res) => res,
    }
}

pub async fn get_warehouse(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match warehouse_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };
    match services.blocking(move |s| s.get_warehouse(&id)).await {
        Ok(warehouse) => (StatusCode::OK, Json(warehouse)).into_response(),
        Err(res) => res,
    }
}

pub async fn update_warehouse(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<WarehouseDraft>,
) -> axum::response::Response {
    let id = match warehouse_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };
    match services.blocking(move |s| s.update_warehouse(&id, body)).await {
        Ok(warehouse) => (StatusCode::OK, Json(warehouse)).into_response(),
        Err(res) => res,
    }
}

pub async fn set_status(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<dto::WarehouseStatusRequest>,
) -> axum::response::Response {
    let id = match warehouse_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };
    match services
        .blocking(move |s| s.set_warehouse_status(&id, body.status))
        .await
    {
        Ok(warehouse) => (StatusCode::OK, Json(warehouse)).into_response(),
        Err(res) => res,
    }
}

/// Rejected while the warehouse still holds stock.
pub async fn remove_warehouse(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match warehouse_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };
    match services.blocking(move |s| s.remove_warehouse(&id)).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(res) => res,
    }
}

pub async fn warehouse_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match warehouse_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };
    match services.blocking(move |s| s.warehouse_stock(&id)).await {
        Ok(stock) => (StatusCode::OK, Json(stock)).into_response(),
        Err(res) => res,
    }
}
