use serde::Serialize;
use thiserror::Error;

use staybook_core::UserId;

use crate::cache::AuthorizationCache;
use crate::resolver::{PermissionSource, ResolvedPermissionSet};
use crate::{Permission, Principal};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("forbidden: missing permission '{0}'")]
    Forbidden(String),

    /// The permission set could not be computed. Always treated as deny.
    #[error("authorization indeterminate: {0}")]
    Indeterminate(String),
}

/// Parse a route's permission requirement.
///
/// A missing or blank requirement means "no restriction" rather than an error.
pub fn requirement(code: Option<&str>) -> Option<Permission> {
    code.and_then(|c| Permission::parse(c).ok())
}

/// Check a required permission against an already-resolved set.
///
/// - No IO
/// - No panics
/// - SuperUser always passes, regardless of the set
pub fn authorize(
    principal: &Principal,
    resolved: &ResolvedPermissionSet,
    required: &Permission,
) -> Result<(), AuthzError> {
    if principal.is_super_user() || resolved.allows(required) {
        Ok(())
    } else {
        Err(AuthzError::Forbidden(required.as_str().to_string()))
    }
}

/// Full decision path: requirement → SuperUser bypass → cache → membership.
pub async fn check<P>(
    cache: &AuthorizationCache<P>,
    principal: &Principal,
    required: Option<&Permission>,
) -> Result<(), AuthzError>
where
    P: PermissionSource,
{
    let Some(required) = required else {
        return Ok(());
    };
    if principal.is_super_user() {
        return Ok(());
    }

    let resolved = cache.resolve(principal).await?;
    authorize(principal, &resolved, required)
}

// ─────────────────────────────────────────────────────────────────────────────
// Authorization Explanation (Audit Trail)
// ─────────────────────────────────────────────────────────────────────────────

/// Detailed explanation of an authorization decision.
#[derive(Debug, Clone, Serialize)]
pub struct AuthorizationExplanation {
    pub required_permission: Option<String>,
    pub granted: bool,
    pub reason: String,
    pub principal: PrincipalState,
    pub denial_reason: Option<DenialReason>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PrincipalState {
    pub user_id: UserId,
    pub roles: Vec<String>,
    pub effective_permissions: Vec<String>,
    pub super_user: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct DenialReason {
    pub kind: DenialKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialKind {
    MissingPermission,
    Indeterminate,
}

/// Explain why an authorization decision was made (or would be made).
///
/// `resolved` is the outcome of resolution; pass the error through unchanged
/// so indeterminate results are reported as denials.
pub fn explain_authorization(
    principal: &Principal,
    required: Option<&Permission>,
    resolved: Result<&ResolvedPermissionSet, &AuthzError>,
) -> AuthorizationExplanation {
    let super_user = principal.is_super_user();
    let state = |effective_permissions: Vec<String>| PrincipalState {
        user_id: principal.user_id,
        roles: principal.roles.iter().map(|r| r.as_str().to_string()).collect(),
        effective_permissions,
        super_user,
    };
    let required_permission = required.map(|p| p.as_str().to_string());

    let Some(required) = required else {
        return AuthorizationExplanation {
            required_permission,
            granted: true,
            reason: "No permission required".to_string(),
            principal: state(resolved.map(|s| s.to_strings()).unwrap_or_default()),
            denial_reason: None,
        };
    };

    if super_user {
        return AuthorizationExplanation {
            required_permission,
            granted: true,
            reason: "Principal holds the SuperUser role".to_string(),
            principal: state(ResolvedPermissionSet::All.to_strings()),
            denial_reason: None,
        };
    }

    match resolved {
        Err(err) => AuthorizationExplanation {
            required_permission,
            granted: false,
            reason: "Effective permissions could not be resolved".to_string(),
            principal: state(Vec::new()),
            denial_reason: Some(DenialReason {
                kind: DenialKind::Indeterminate,
                message: err.to_string(),
            }),
        },
        Ok(set) if set.allows(required) => AuthorizationExplanation {
            required_permission,
            granted: true,
            reason: format!("Principal has permission '{}'", required),
            principal: state(set.to_strings()),
            denial_reason: None,
        },
        Ok(set) => AuthorizationExplanation {
            required_permission,
            granted: false,
            reason: format!(
                "Principal does not have permission '{}'. Current permissions: {:?}",
                required,
                set.to_strings()
            ),
            principal: state(set.to_strings()),
            denial_reason: Some(DenialReason {
                kind: DenialKind::MissingPermission,
                message: format!("Missing required permission: '{}'", required),
            }),
        },
    }
}
