use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use chrono::Utc;

use serialtrack_auth::Permission;
use serialtrack_core::{ProductId, SerialId};
use serialtrack_serials::{RegisterBatch, RegisterSerial, SerialState, TransitionSerial};

use crate::app::routes::common::{parse_id, reply};
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::authz;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(register_serial))
        .route("/batch", post(register_batch))
        .route("/:id", get(get_serial).delete(delete_serial))
        .route("/:id/state", put(transition_serial))
        .route("/:id/history", get(serial_history))
}

pub async fn register_serial(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::RegisterSerialRequest>,
) -> Response {
    if let Err(e) = authz::require(&principal, Permission::SERIALS_WRITE) {
        return errors::forbidden(e);
    }
    let product_id: ProductId = match parse_id(&body.product_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    let created = services
        .serials
        .register_one(RegisterSerial {
            product_id,
            code: body.code,
            occurred_at: Utc::now(),
        })
        .await
        .map(|id| dto::CreatedSerial { id });
    reply(StatusCode::CREATED, created)
}

pub async fn register_batch(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::RegisterBatchRequest>,
) -> Response {
    if let Err(e) = authz::require(&principal, Permission::SERIALS_WRITE) {
        return errors::forbidden(e);
    }
    let product_id: ProductId = match parse_id(&body.product_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let state = match dto::state_or_default(body.state.as_deref()) {
        Ok(state) => state,
        Err(e) => return errors::service_error_to_response(e.into()),
    };

    let created = services
        .serials
        .register_batch(RegisterBatch {
            product_id,
            codes: body.codes,
            state,
            occurred_at: Utc::now(),
        })
        .await
        .map(|ids| dto::CreatedSerials {
            count: ids.len(),
            ids,
        });
    reply(StatusCode::CREATED, created)
}

pub async fn get_serial(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Response {
    if let Err(e) = authz::require(&principal, Permission::CATALOG_READ) {
        return errors::forbidden(e);
    }
    let id: SerialId = match parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    reply(StatusCode::OK, services.serials.get(id).await)
}

pub async fn transition_serial(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::TransitionRequest>,
) -> Response {
    if let Err(e) = authz::require(&principal, Permission::SERIALS_WRITE) {
        return errors::forbidden(e);
    }
    let serial_id: SerialId = match parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let state: SerialState = match body.state.parse() {
        Ok(state) => state,
        Err(e) => return errors::service_error_to_response(e.into()),
    };

    let updated = services
        .serials
        .transition(TransitionSerial {
            serial_id,
            state,
            notes: body.notes,
            occurred_at: Utc::now(),
        })
        .await;
    reply(StatusCode::OK, updated)
}

pub async fn serial_history(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Response {
    if let Err(e) = authz::require(&principal, Permission::CATALOG_READ) {
        return errors::forbidden(e);
    }
    let id: SerialId = match parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    reply(StatusCode::OK, services.serials.history(id).await)
}

pub async fn delete_serial(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Response {
    let id: SerialId = match parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match services.serials.delete(principal.principal(), id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
