//! Grant data model and the read-only query seam used by the resolver.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use staybook_core::UserId;

use crate::{Permission, Role};

/// A known permission code. Disabled definitions are invisible to resolution
/// even when granted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionDefinition {
    pub code: Permission,
    pub enabled: bool,
    pub description: Option<String>,
}

impl PermissionDefinition {
    pub fn enabled(code: impl Into<Permission>) -> Self {
        Self {
            code: code.into(),
            enabled: true,
            description: None,
        }
    }

    pub fn disabled(code: impl Into<Permission>) -> Self {
        Self {
            code: code.into(),
            enabled: false,
            description: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoleGrant {
    pub role: Role,
    pub code: Permission,
}

/// Direct grant to a single user, independent of roles.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserGrant {
    pub user_id: UserId,
    pub code: Permission,
}

/// Everything the resolver needs for one principal, read in one query.
///
/// Stores may return more than strictly relevant (e.g. all definitions); the
/// resolver filters by role, user and enabled flag itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GrantSnapshot {
    pub definitions: Vec<PermissionDefinition>,
    pub role_grants: Vec<RoleGrant>,
    pub user_grants: Vec<UserGrant>,
}

#[derive(Debug, Error)]
pub enum GrantStoreError {
    #[error("grant store unavailable: {0}")]
    Unavailable(String),

    #[error("grant store query failed: {0}")]
    Query(String),
}

/// Read-only access to role/user grants and permission definitions.
#[async_trait]
pub trait GrantStore: Send + Sync {
    async fn snapshot_for(
        &self,
        user_id: UserId,
        roles: &[Role],
    ) -> Result<GrantSnapshot, GrantStoreError>;
}

#[async_trait]
impl<S> GrantStore for std::sync::Arc<S>
where
    S: GrantStore + ?Sized,
{
    async fn snapshot_for(
        &self,
        user_id: UserId,
        roles: &[Role],
    ) -> Result<GrantSnapshot, GrantStoreError> {
        (**self).snapshot_for(user_id, roles).await
    }
}
