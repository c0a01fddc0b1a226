//! Integration tests for the server-side authorization path.
//!
//! Tests: GrantStore → PermissionResolver → AuthorizationCache → decision
//!
//! Verifies:
//! - SuperUser bypass with an empty store
//! - disabled definitions never surface
//! - role ∪ user grants
//! - TTL-only staleness (grant edits do not invalidate cached sets)

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, Utc};

    use staybook_auth::{
        AuthorizationCache, AuthzError, ManualClock, Permission, PermissionDefinition,
        PermissionResolver, Principal, Role, check,
    };
    use staybook_core::UserId;

    use crate::grant_store::InMemoryGrantStore;

    type Cache = AuthorizationCache<PermissionResolver<Arc<InMemoryGrantStore>>>;

    fn principal(roles: &[&'static str]) -> Principal {
        Principal::new(
            UserId::new(),
            roles.iter().map(|r| Role::new(*r)).collect(),
            Utc::now() + Duration::minutes(10),
        )
    }

    fn setup() -> (Arc<InMemoryGrantStore>, Cache, Arc<ManualClock>) {
        let store = Arc::new(InMemoryGrantStore::new());
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let cache = AuthorizationCache::with_clock(
            PermissionResolver::new(store.clone()),
            Duration::minutes(2),
            clock.clone(),
        );
        (store, cache, clock)
    }

    fn codes(set: &staybook_auth::ResolvedPermissionSet) -> Vec<String> {
        set.to_strings()
    }

    #[tokio::test]
    async fn super_user_is_allowed_with_empty_store() {
        let (_store, cache, _clock) = setup();
        let p = principal(&["SuperUser"]);

        assert!(check(&cache, &p, Some(&Permission::new("anything.codes"))).await.is_ok());
    }

    #[tokio::test]
    async fn disabled_role_grant_is_excluded() {
        let (store, cache, _clock) = setup();
        store.define(PermissionDefinition::disabled("houses.manage"));
        store.grant_to_role(Role::new("Admin"), Permission::new("houses.manage"));

        let p = principal(&["Admin"]);
        let set = cache.resolve(&p).await.unwrap();

        assert!(codes(&set).is_empty());
        assert_eq!(
            check(&cache, &p, Some(&Permission::new("houses.manage"))).await,
            Err(AuthzError::Forbidden("houses.manage".into()))
        );
    }

    #[tokio::test]
    async fn role_and_user_grants_union() {
        let (store, cache, _clock) = setup();
        let p = principal(&["Admin"]);
        store.define(PermissionDefinition::enabled("houses.manage"));
        store.define(PermissionDefinition::enabled("reports.view"));
        store.grant_to_role(Role::new("Admin"), Permission::new("houses.manage"));
        store.grant_to_user(p.user_id, Permission::new("reports.view"));

        let set = cache.resolve(&p).await.unwrap();
        assert_eq!(codes(&set), vec!["houses.manage", "reports.view"]);
    }

    #[tokio::test]
    async fn grant_changes_are_invisible_until_ttl_elapses() {
        let (store, cache, clock) = setup();
        let p = principal(&["Agent"]);
        store.define(PermissionDefinition::enabled("tours.edit"));

        let before = cache.resolve(&p).await.unwrap();
        assert!(codes(&before).is_empty());

        store.grant_to_role(Role::new("Agent"), Permission::new("tours.edit"));
        clock.advance(Duration::seconds(90));
        let still_cached = cache.resolve(&p).await.unwrap();
        assert!(Arc::ptr_eq(&before, &still_cached));

        clock.advance(Duration::seconds(30));
        let refreshed = cache.resolve(&p).await.unwrap();
        assert_eq!(codes(&refreshed), vec!["tours.edit"]);
    }

    #[tokio::test]
    async fn disabling_a_definition_takes_effect_after_expiry() {
        let (store, cache, clock) = setup();
        let p = principal(&["Admin"]);
        store.define(PermissionDefinition::enabled("exchange.rates.edit"));
        store.grant_to_role(Role::new("Admin"), Permission::new("exchange.rates.edit"));

        assert_eq!(codes(&cache.resolve(&p).await.unwrap()), vec!["exchange.rates.edit"]);

        store.set_enabled(&Permission::new("exchange.rates.edit"), false);
        clock.advance(Duration::minutes(2));

        assert!(codes(&cache.resolve(&p).await.unwrap()).is_empty());
    }
}
