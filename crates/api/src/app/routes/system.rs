use axum::{Json, extract::Extension, http::StatusCode, response::IntoResponse};

use crate::context::PrincipalContext;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn me(Extension(principal): Extension<PrincipalContext>) -> impl IntoResponse {
    let principal = principal.principal();
    Json(serde_json::json!({
        "user_id": principal.user_id.to_string(),
        "roles": principal.roles.iter().map(|r| r.as_str()).collect::<Vec<_>>(),
        "super_user": principal.is_super_user(),
        "token_expires_at": principal.token_expires_at,
    }))
}
