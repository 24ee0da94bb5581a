//! `serialtrack-auth` — pure authorization boundary.
//!
//! Decoupled from HTTP and storage: the API decodes a bearer token into a
//! [`Principal`] and passes it explicitly to the operations that need it.

pub mod authorize;
pub mod claims;
pub mod jwt;
pub mod permissions;
pub mod principal;
pub mod roles;

pub use authorize::{AuthzError, authorize, permissions_for_roles};
pub use claims::{JwtClaims, TokenValidationError, validate_claims};
pub use jwt::{Hs256JwtValidator, JwtValidator};
pub use permissions::Permission;
pub use principal::{Principal, PrincipalId};
pub use roles::Role;
