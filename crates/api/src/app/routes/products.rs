use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::Utc;

use serialtrack_auth::Permission;
use serialtrack_catalog::CreateProduct;
use serialtrack_core::{CategoryId, ProductId};
use serialtrack_infra::services::ProvisionBatch;
use serialtrack_serials::SerialState;

use crate::app::routes::common::{parse_id, reply};
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::authz;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_product).get(list_products))
        .route("/search", get(search_products))
        .route("/:id", get(get_product).delete(delete_product))
        .route("/:id/serials", get(list_product_serials))
        .route("/:id/provision", post(provision_serials))
}

pub async fn create_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::CreateProductRequest>,
) -> Response {
    if let Err(e) = authz::require(&principal, Permission::CATALOG_WRITE) {
        return errors::forbidden(e);
    }
    let category_id: CategoryId = match parse_id(&body.category_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    let created = services
        .catalog
        .create(CreateProduct {
            name: body.name,
            description: body.description,
            category_id,
            sku: body.sku,
            brand: body.brand,
            model: body.model,
        })
        .await
        .map(|id| dto::CreatedProduct { id });
    reply(StatusCode::CREATED, created)
}

pub async fn list_products(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<dto::ListProductsQuery>,
) -> Response {
    if let Err(e) = authz::require(&principal, Permission::CATALOG_READ) {
        return errors::forbidden(e);
    }
    let products = if query.detailed {
        services.catalog.list_detailed().await
    } else {
        services.catalog.list().await
    };
    reply(StatusCode::OK, products)
}

pub async fn search_products(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<dto::SearchQuery>,
) -> Response {
    if let Err(e) = authz::require(&principal, Permission::CATALOG_READ) {
        return errors::forbidden(e);
    }
    let hits = services
        .catalog
        .search(&query.q)
        .await
        .map(|matches| matches.into_iter().map(dto::SearchHit::from).collect::<Vec<_>>());
    reply(StatusCode::OK, hits)
}

pub async fn get_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Response {
    if let Err(e) = authz::require(&principal, Permission::CATALOG_READ) {
        return errors::forbidden(e);
    }
    let id: ProductId = match parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    reply(StatusCode::OK, services.catalog.get(id).await)
}

pub async fn delete_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Response {
    let id: ProductId = match parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match services.catalog.delete(principal.principal(), id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn list_product_serials(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Query(query): Query<dto::ListSerialsQuery>,
) -> Response {
    if let Err(e) = authz::require(&principal, Permission::CATALOG_READ) {
        return errors::forbidden(e);
    }
    let id: ProductId = match parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let state = match query.state.as_deref().map(str::parse::<SerialState>).transpose() {
        Ok(state) => state,
        Err(e) => return errors::service_error_to_response(e.into()),
    };
    reply(StatusCode::OK, services.serials.list_by_product(id, state).await)
}

pub async fn provision_serials(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::ProvisionRequest>,
) -> Response {
    if let Err(e) = authz::require(&principal, Permission::SERIALS_WRITE) {
        return errors::forbidden(e);
    }
    let product_id: ProductId = match parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let state = match dto::state_or_default(body.state.as_deref()) {
        Ok(state) => state,
        Err(e) => return errors::service_error_to_response(e.into()),
    };

    let provisioned = services
        .provisioner
        .provision(ProvisionBatch {
            product_id,
            count: body.count(),
            state,
            occurred_at: Utc::now(),
        })
        .await;
    reply(StatusCode::CREATED, provisioned)
}
