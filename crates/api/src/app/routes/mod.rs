use axum::Router;

pub mod consumers;
pub mod movements;
pub mod stock;
pub mod system;
pub mod transfers;
pub mod warehouses;

/// Router for every inventory endpoint.
pub fn router() -> Router {
    Router::new()
        .nest("/warehouses", warehouses::router())
        .nest("/stock", stock::router())
        .nest("/movements", movements::router())
        .nest("/transfers", transfers::router())
        .nest("/products", consumers::products_router())
        .merge(consumers::router())
        .nest("/reconciliation", system::reconciliation_router())
}
