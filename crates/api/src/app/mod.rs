//! HTTP API application wiring (Axum router + shared state).
//!
//! - `routes/`: handlers, one file per area
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{Extension, Router, routing::get};
use chrono::Duration;
use tower::ServiceBuilder;

use staybook_auth::{AuthorizationCache, GrantStore, PermissionResolver, PermissionSource};

use crate::authz::PermissionCache;
use crate::middleware;

pub mod errors;
pub mod routes;

/// State shared by every protected handler.
#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<PermissionCache>,
}

impl AppState {
    pub fn new(store: Arc<dyn GrantStore>, ttl: Duration) -> Self {
        Self::with_cache(AuthorizationCache::new(PermissionResolver::new(store), ttl))
    }

    pub fn with_cache(cache: PermissionCache) -> Self {
        Self {
            cache: Arc::new(cache),
        }
    }
}

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub fn build_app(jwt_secret: &str, state: AppState) -> Router {
    let jwt = Arc::new(staybook_auth::Hs256JwtValidator::new(
        jwt_secret.as_bytes().to_vec(),
    ));
    let auth_state = middleware::AuthState { jwt };

    // Protected routes: require a verified principal.
    let protected = routes::router()
        .layer(Extension(state))
        .layer(axum::middleware::from_fn_with_state(
            auth_state,
            middleware::auth_middleware,
        ));

    Router::new()
        .route("/health", get(routes::system::health))
        .merge(protected)
        .layer(ServiceBuilder::new().layer(axum::middleware::from_fn(
            middleware::correlation_middleware,
        )))
}

/// Periodically drop expired cache entries.
///
/// Memory housekeeping only; lookups already ignore expired entries.
pub fn spawn_cache_sweeper<P>(
    cache: Arc<AuthorizationCache<P>>,
    period: std::time::Duration,
) -> tokio::task::JoinHandle<()>
where
    P: PermissionSource + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            let purged = cache.purge_expired();
            if purged > 0 {
                tracing::debug!(purged, remaining = cache.len(), "authorization cache swept");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use staybook_auth::{ManualClock, Principal, Role};
    use staybook_core::UserId;
    use staybook_infra::grant_store::InMemoryGrantStore;

    #[tokio::test]
    async fn sweeper_purges_expired_entries() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let store: Arc<dyn GrantStore> = Arc::new(InMemoryGrantStore::new());
        let cache = Arc::new(AuthorizationCache::with_clock(
            PermissionResolver::new(store),
            Duration::seconds(120),
            clock.clone(),
        ));

        let principal = Principal::new(UserId::new(), vec![Role::new("Host")], Utc::now());
        cache.resolve(&principal).await.unwrap();
        assert_eq!(cache.len(), 1);

        clock.advance(Duration::seconds(121));
        let handle = spawn_cache_sweeper(cache.clone(), std::time::Duration::from_millis(5));
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        handle.abort();

        assert!(cache.is_empty());
    }
}
