use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use async_trait::async_trait;

use staybook_auth::{
    GrantSnapshot, GrantStore, GrantStoreError, Permission, PermissionDefinition, Role, RoleGrant,
    UserGrant,
};
use staybook_core::UserId;

#[derive(Debug, Default)]
struct GrantTables {
    definitions: HashMap<Permission, PermissionDefinition>,
    role_grants: HashSet<RoleGrant>,
    user_grants: HashSet<UserGrant>,
}

/// In-memory grant store for tests/dev.
///
/// Mutations only touch the tables; any authorization cache in front of this
/// store keeps serving its entries until they expire.
#[derive(Debug, Default)]
pub struct InMemoryGrantStore {
    inner: RwLock<GrantTables>,
}

impl InMemoryGrantStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a permission definition.
    pub fn define(&self, definition: PermissionDefinition) {
        if let Ok(mut t) = self.inner.write() {
            t.definitions.insert(definition.code.clone(), definition);
        }
    }

    /// Flip the enabled flag. Returns `false` if the code is unknown.
    pub fn set_enabled(&self, code: &Permission, enabled: bool) -> bool {
        let Ok(mut t) = self.inner.write() else {
            return false;
        };
        match t.definitions.get_mut(code) {
            Some(def) => {
                def.enabled = enabled;
                true
            }
            None => false,
        }
    }

    pub fn grant_to_role(&self, role: Role, code: Permission) {
        if let Ok(mut t) = self.inner.write() {
            t.role_grants.insert(RoleGrant { role, code });
        }
    }

    pub fn revoke_from_role(&self, role: &Role, code: &Permission) -> bool {
        let Ok(mut t) = self.inner.write() else {
            return false;
        };
        t.role_grants.remove(&RoleGrant {
            role: role.clone(),
            code: code.clone(),
        })
    }

    pub fn grant_to_user(&self, user_id: UserId, code: Permission) {
        if let Ok(mut t) = self.inner.write() {
            t.user_grants.insert(UserGrant { user_id, code });
        }
    }

    pub fn revoke_from_user(&self, user_id: UserId, code: &Permission) -> bool {
        let Ok(mut t) = self.inner.write() else {
            return false;
        };
        t.user_grants.remove(&UserGrant {
            user_id,
            code: code.clone(),
        })
    }

    pub fn definitions(&self) -> Vec<PermissionDefinition> {
        let Ok(t) = self.inner.read() else {
            return Vec::new();
        };
        let mut defs: Vec<_> = t.definitions.values().cloned().collect();
        defs.sort_by(|a, b| a.code.cmp(&b.code));
        defs
    }
}

#[async_trait]
impl GrantStore for InMemoryGrantStore {
    async fn snapshot_for(
        &self,
        user_id: UserId,
        roles: &[Role],
    ) -> Result<GrantSnapshot, GrantStoreError> {
        let t = self
            .inner
            .read()
            .map_err(|_| GrantStoreError::Unavailable("grant tables lock poisoned".into()))?;

        let role_grants: Vec<RoleGrant> = t
            .role_grants
            .iter()
            .filter(|g| roles.contains(&g.role))
            .cloned()
            .collect();
        let user_grants: Vec<UserGrant> = t
            .user_grants
            .iter()
            .filter(|g| g.user_id == user_id)
            .cloned()
            .collect();

        let referenced: HashSet<&Permission> = role_grants
            .iter()
            .map(|g| &g.code)
            .chain(user_grants.iter().map(|g| &g.code))
            .collect();
        let definitions = referenced
            .into_iter()
            .filter_map(|code| t.definitions.get(code).cloned())
            .collect();

        Ok(GrantSnapshot {
            definitions,
            role_grants,
            user_grants,
        })
    }
}
