//! Permission introspection for the calling principal.
//!
//! These endpoints give clients (and humans debugging a denial) the same view
//! of effective permissions the guard uses.

use axum::{
    Json,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;

use staybook_auth::{explain_authorization, requirement};

use crate::app::{AppState, errors};
use crate::authz;
use crate::context::{CorrelationContext, PrincipalContext};

#[derive(Debug, Deserialize)]
pub struct CheckQuery {
    pub permission: Option<String>,
}

/// GET /me/permissions - effective permission set (`["*"]` for SuperUser)
pub async fn my_permissions(
    Extension(state): Extension<AppState>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    let principal = principal.principal();
    match state.cache.resolve(principal).await {
        Ok(set) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "user_id": principal.user_id.to_string(),
                "super_user": principal.is_super_user(),
                "permissions": set.to_strings(),
            })),
        )
            .into_response(),
        Err(e) => errors::authz_error_to_response(e),
    }
}

/// GET /me/permissions/:code - 204 when allowed, 403 otherwise
pub async fn require(
    Extension(state): Extension<AppState>,
    Extension(principal): Extension<PrincipalContext>,
    Extension(correlation): Extension<CorrelationContext>,
    Path(code): Path<String>,
) -> axum::response::Response {
    match authz::require_permission(&*state.cache, &principal, &correlation, Some(code.as_str())).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::authz_error_to_response(e),
    }
}

/// GET /authz/check?permission=... - decision plus explanation
///
/// Always 200: the body carries the decision.
pub async fn check(
    Extension(state): Extension<AppState>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<CheckQuery>,
) -> axum::response::Response {
    let principal = principal.principal();
    let required = requirement(query.permission.as_deref());
    let resolved = state.cache.resolve(principal).await;

    let explanation = explain_authorization(
        principal,
        required.as_ref(),
        resolved.as_ref().map(|set| &**set),
    );

    (StatusCode::OK, Json(explanation)).into_response()
}
