use std::sync::Arc;

use axum::{
    Router,
    extract::{Extension, Query},
    http::StatusCode,
    response::Response,
    routing::get,
};

use serialtrack_auth::Permission;
use serialtrack_stock::LOW_STOCK_THRESHOLD;

use crate::app::routes::common::reply;
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::authz;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(stock_view))
        .route("/low", get(low_stock))
        .route("/statistics", get(statistics))
}

pub async fn stock_view(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> Response {
    if let Err(e) = authz::require(&principal, Permission::CATALOG_READ) {
        return errors::forbidden(e);
    }
    reply(StatusCode::OK, services.stock.stock_view().await)
}

pub async fn low_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<dto::LowStockQuery>,
) -> Response {
    if let Err(e) = authz::require(&principal, Permission::CATALOG_READ) {
        return errors::forbidden(e);
    }
    let threshold = query.threshold.unwrap_or(LOW_STOCK_THRESHOLD);
    reply(StatusCode::OK, services.stock.low_stock(threshold).await)
}

pub async fn statistics(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> Response {
    if let Err(e) = authz::require(&principal, Permission::CATALOG_READ) {
        return errors::forbidden(e);
    }
    reply(StatusCode::OK, services.stock.statistics().await)
}
