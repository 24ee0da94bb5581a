use axum::{Router, routing::get};

pub mod categories;
pub mod common;
pub mod products;
pub mod serials;
pub mod stock;
pub mod system;

/// Router for all authenticated endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .nest("/categories", categories::router())
        .nest("/products", products::router())
        .nest("/serials", serials::router())
        .nest("/stock", stock::router())
}
