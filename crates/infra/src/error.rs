//! Service-level error taxonomy.
//!
//! Domain crates return [`DomainError`], stores return [`StoreError`]; services
//! translate both into one flat [`ServiceError`] that the HTTP boundary maps to
//! status codes.

use thiserror::Error;

use serialtrack_auth::AuthzError;
use serialtrack_core::DomainError;

use crate::store::{StoreError, constraints};

/// Keys reported by [`ServiceError::DuplicateKey`].
pub mod kinds {
    pub const SKU: &str = "sku";
    pub const SERIAL_CODE: &str = "serial code";
    pub const CATEGORY_LABEL: &str = "category label";
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("duplicate {kind}: {}", .keys.join(", "))]
    DuplicateKey {
        kind: &'static str,
        keys: Vec<String>,
    },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("referential violation: {0}")]
    ReferentialViolation(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl ServiceError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn duplicate(kind: &'static str, keys: Vec<String>) -> Self {
        Self::DuplicateKey { kind, keys }
    }

    /// Only connection-level failures are worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StorageUnavailable(_))
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::DuplicateKey { .. } => "duplicate_key",
            Self::InvalidInput(_) => "invalid_input",
            Self::ReferentialViolation(_) => "referential_violation",
            Self::Forbidden(_) => "forbidden",
            Self::StorageUnavailable(_) => "storage_unavailable",
            Self::Storage(_) => "storage_error",
        }
    }
}

impl From<DomainError> for ServiceError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Validation(msg) | DomainError::InvalidId(msg) => Self::InvalidInput(msg),
        }
    }
}

impl From<AuthzError> for ServiceError {
    fn from(err: AuthzError) -> Self {
        match err {
            AuthzError::Forbidden(permission) => Self::Forbidden(permission),
        }
    }
}

/// Context-free translation. Services intercept `Unique`, `ForeignKey` and
/// `NotFound` first when they can name the entity or keys involved.
impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unique { constraint, key } => Self::DuplicateKey {
                kind: kind_for(&constraint),
                keys: key.into_iter().collect(),
            },
            StoreError::ForeignKey { constraint } => Self::ReferentialViolation(constraint),
            StoreError::NotFound => Self::not_found("record", "unknown"),
            StoreError::Rejected(domain) => domain.into(),
            StoreError::Unavailable(msg) => Self::StorageUnavailable(msg),
            StoreError::Backend(msg) => Self::Storage(msg),
        }
    }
}

fn kind_for(constraint: &str) -> &'static str {
    match constraint {
        constraints::CATEGORY_LABEL => kinds::CATEGORY_LABEL,
        constraints::PRODUCT_SKU => kinds::SKU,
        constraints::SERIAL_CODE => kinds::SERIAL_CODE,
        _ => "key",
    }
}
