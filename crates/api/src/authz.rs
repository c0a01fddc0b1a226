//! Route-level permission guard.
//!
//! The route supplies the code; this only decides allow or deny.

use std::sync::Arc;

use staybook_auth::{
    AuthorizationCache, AuthzError, GrantStore, PermissionResolver, PermissionSource, check,
    requirement,
};

use crate::context::{CorrelationContext, PrincipalContext};

/// The cache the server runs with: resolver over whichever grant store was
/// configured at start-up.
pub type PermissionCache = AuthorizationCache<PermissionResolver<Arc<dyn GrantStore>>>;

/// Check `code` for the current request.
///
/// A blank or absent code means "no restriction". Indeterminate results are
/// returned as errors and must be answered as denials.
pub async fn require_permission<P: PermissionSource>(
    cache: &AuthorizationCache<P>,
    principal: &PrincipalContext,
    correlation: &CorrelationContext,
    code: Option<&str>,
) -> Result<(), AuthzError> {
    let required = requirement(code);
    let principal = principal.principal();

    let result = check(cache, principal, required.as_ref()).await;
    if let Err(e) = &result {
        tracing::info!(
            user_id = %principal.user_id,
            permission = code.unwrap_or_default(),
            correlation_id = correlation.id(),
            reason = %e,
            "permission denied"
        );
    }
    result
}
