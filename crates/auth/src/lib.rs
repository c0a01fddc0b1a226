//! `staybook-auth` — pure authorization boundary.
//!
//! This crate is decoupled from HTTP and storage: grants are read through the
//! [`GrantStore`] seam and decisions are plain values.

pub mod authorize;
pub mod cache;
pub mod claims;
pub mod grants;
pub mod permissions;
pub mod principal;
pub mod resolver;
pub mod roles;

pub use authorize::{
    AuthorizationExplanation, AuthzError, DenialKind, DenialReason, PrincipalState, authorize, check,
    explain_authorization, requirement,
};
pub use cache::{AuthorizationCache, Clock, DEFAULT_TTL_SECS, ManualClock, SystemClock};
pub use claims::{Hs256JwtValidator, JwtClaims, JwtValidator, TokenValidationError, validate_claims};
pub use grants::{
    GrantSnapshot, GrantStore, GrantStoreError, PermissionDefinition, RoleGrant, UserGrant,
};
pub use permissions::Permission;
pub use principal::Principal;
pub use resolver::{PermissionResolver, PermissionSource, ResolvedPermissionSet, resolve_snapshot};
pub use roles::{Role, SUPER_USER};
