use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use serialtrack_auth::AuthzError;
use serialtrack_infra::ServiceError;

/// Status code for each service error class.
pub fn status_for(err: &ServiceError) -> StatusCode {
    match err {
        ServiceError::NotFound { .. } => StatusCode::NOT_FOUND,
        ServiceError::DuplicateKey { .. } => StatusCode::CONFLICT,
        ServiceError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        ServiceError::ReferentialViolation(_) => StatusCode::CONFLICT,
        ServiceError::Forbidden(_) => StatusCode::FORBIDDEN,
        ServiceError::StorageUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        ServiceError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub fn service_error_to_response(err: ServiceError) -> axum::response::Response {
    let status = status_for(&err);
    if status.is_server_error() {
        tracing::error!(error = %err, retryable = err.is_retryable(), "request failed");
    }

    let mut body = json!({
        "error": err.code(),
        "message": err.to_string(),
    });
    if let ServiceError::DuplicateKey { keys, .. } = &err {
        body["keys"] = json!(keys);
    }

    (status, axum::Json(body)).into_response()
}

pub fn forbidden(err: AuthzError) -> axum::response::Response {
    json_error(StatusCode::FORBIDDEN, "forbidden", err.to_string())
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
