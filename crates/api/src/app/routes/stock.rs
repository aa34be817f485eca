use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use kardex_core::{ProductId, WarehouseId};
use kardex_inventory::StockKey;

use crate::app::errors;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_stock))
        .route("/:product_id", get(product_total))
        .route("/:product_id/:warehouse_id", get(get_entry))
}

pub async fn list_stock(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    match services.blocking(|s| s.list_stock()).await {
        Ok(entries) => (StatusCode::OK, Json(entries)).into_response(),
        Err(res) => res,
    }
}

/// Sum of one product across every warehouse.
pub async fn product_total(
    Extension(services): Extension<Arc<AppServices>>,
    Path(product_id): Path<String>,
) -> axum::response::Response {
    let product_id: ProductId = match errors::parse(&product_id, "product id") {
        Ok(v) => v,
        Err(res) => return res,
    };
    let id = product_id.clone();
    match services.blocking(move |s| s.total_stock(&id)).await {
        Ok(total) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "product_id": product_id,
                "total": total,
            })),
        )
            .into_response(),
        Err(res) => res,
    }
}

/// Zero-quantity entry (version 0) when nothing was ever recorded.
pub async fn get_entry(
    Extension(services): Extension<Arc<AppServices>>,
    Path((product_id, warehouse_id)): Path<(String, String)>,
) -> axum::response::Response {
    let key = match (
        errors::parse::<ProductId>(&product_id, "product id"),
        errors::parse::<WarehouseId>(&warehouse_id, "warehouse id"),
    ) {
        (Ok(p), Ok(w)) => StockKey::new(p, w),
        (Err(res), _) | (_, Err(res)) => return res,
    };
    match services.blocking(move |s| s.stock_entry(&key)).await {
        Ok(entry) => (StatusCode::OK, Json(entry)).into_response(),
        Err(res) => res,
    }
}
