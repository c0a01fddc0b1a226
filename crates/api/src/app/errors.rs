use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use staybook_auth::AuthzError;

/// Both kinds of authorization failure answer 403; an undeterminable decision
/// is never an allow.
pub fn authz_error_to_response(err: AuthzError) -> axum::response::Response {
    match err {
        AuthzError::Forbidden(_) => json_error(StatusCode::FORBIDDEN, "forbidden", err.to_string()),
        AuthzError::Indeterminate(_) => json_error(
            StatusCode::FORBIDDEN,
            "authorization_indeterminate",
            "authorization could not be determined",
        ),
    }
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
