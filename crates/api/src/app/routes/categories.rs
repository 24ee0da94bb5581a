use std::sync::Arc;

use axum::{
    Json, Router,
    extract::Extension,
    http::StatusCode,
    response::Response,
    routing::{get, post},
};

use serialtrack_auth::Permission;

use crate::app::routes::common::reply;
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::authz;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_categories).post(create_category))
        .route("/seed", post(seed_categories))
}

pub async fn list_categories(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> Response {
    if let Err(e) = authz::require(&principal, Permission::CATALOG_READ) {
        return errors::forbidden(e);
    }
    reply(StatusCode::OK, services.categories.list().await)
}

pub async fn create_category(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::CreateCategoryRequest>,
) -> Response {
    if let Err(e) = authz::require(&principal, Permission::CATALOG_WRITE) {
        return errors::forbidden(e);
    }
    let created = services
        .categories
        .create(&body.label)
        .await
        .map(|id| dto::CreatedCategory { id });
    reply(StatusCode::CREATED, created)
}

pub async fn seed_categories(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> Response {
    if let Err(e) = authz::require(&principal, Permission::CATALOG_WRITE) {
        return errors::forbidden(e);
    }
    let seeded = services
        .categories
        .seed_defaults()
        .await
        .map(|inserted| dto::SeedResult { inserted });
    reply(StatusCode::OK, seeded)
}
