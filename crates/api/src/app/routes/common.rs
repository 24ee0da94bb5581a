use std::str::FromStr;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use serialtrack_core::DomainError;
use serialtrack_infra::ServiceError;

use crate::app::errors;

/// Parse a path identifier; malformed ids are a 400.
pub fn parse_id<T>(raw: &str) -> Result<T, Response>
where
    T: FromStr<Err = DomainError>,
{
    raw.parse()
        .map_err(|e: DomainError| errors::service_error_to_response(e.into()))
}

/// Serialize a successful result with `status`, or map the error.
pub fn reply<T: Serialize>(status: StatusCode, result: Result<T, ServiceError>) -> Response {
    match result {
        Ok(body) => (status, Json(body)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
