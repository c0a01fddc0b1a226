use axum::{Router, routing::get};

pub mod permissions;
pub mod system;

/// Router for all authenticated endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/me", get(system::me))
        .route("/me/permissions", get(permissions::my_permissions))
        .route("/me/permissions/:code", get(permissions::require))
        .route("/authz/check", get(permissions::check))
}
