//! API-side permission guard.
//!
//! Read and write routes are checked here, before any service call. The two
//! deletions are checked again inside the services, which receive the
//! principal explicitly.

use serialtrack_auth::{AuthzError, Permission, authorize};

use crate::context::PrincipalContext;

/// Require `permission` for the current request's principal.
pub fn require(principal: &PrincipalContext, permission: &'static str) -> Result<(), AuthzError> {
    authorize(principal.principal(), &Permission::new(permission))
}
