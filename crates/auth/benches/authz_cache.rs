use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use staybook_auth::{
    AuthorizationCache, GrantSnapshot, GrantStore, GrantStoreError, Permission,
    PermissionDefinition, PermissionResolver, Principal, Role, RoleGrant, UserGrant,
    resolve_snapshot,
};
use staybook_core::UserId;

/// Store that hands back a prebuilt snapshot (no IO).
struct SnapshotStore(GrantSnapshot);

#[async_trait]
impl GrantStore for SnapshotStore {
    async fn snapshot_for(
        &self,
        _user_id: UserId,
        _roles: &[Role],
    ) -> Result<GrantSnapshot, GrantStoreError> {
        Ok(self.0.clone())
    }
}

fn snapshot(principal: &Principal, codes: usize) -> GrantSnapshot {
    let mut snapshot = GrantSnapshot::default();
    for i in 0..codes {
        let code = Permission::new(format!("area{}.action{}", i % 16, i));
        snapshot.definitions.push(PermissionDefinition {
            code: code.clone(),
            enabled: i % 7 != 0,
            description: None,
        });
        if i % 2 == 0 {
            snapshot.role_grants.push(RoleGrant {
                role: Role::new("Admin"),
                code,
            });
        } else {
            snapshot.user_grants.push(UserGrant {
                user_id: principal.user_id,
                code,
            });
        }
    }
    snapshot
}

fn bench_resolution(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let principal = Principal::new(
        UserId::new(),
        vec![Role::new("Admin")],
        Utc::now() + Duration::minutes(10),
    );

    let mut group = c.benchmark_group("permission_resolution");
    for codes in [16usize, 256, 2048] {
        let snap = snapshot(&principal, codes);

        group.bench_with_input(BenchmarkId::new("resolve_snapshot", codes), &snap, |b, snap| {
            b.iter(|| black_box(resolve_snapshot(&principal, snap)))
        });

        let cache = AuthorizationCache::new(
            PermissionResolver::new(SnapshotStore(snap.clone())),
            Duration::minutes(2),
        );
        rt.block_on(cache.resolve(&principal)).unwrap();

        group.bench_with_input(BenchmarkId::new("cache_hit", codes), &cache, |b, cache| {
            b.iter(|| black_box(rt.block_on(cache.resolve(&principal)).unwrap()))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_resolution);
criterion_main!(benches);
