//! Effective permission computation (role grants ∪ user grants, enabled only).

use std::collections::{BTreeSet, HashSet};

use async_trait::async_trait;
use serde::Serialize;

use crate::grants::{GrantSnapshot, GrantStore};
use crate::{AuthzError, Permission, Principal};

/// The effective permissions of one principal.
///
/// A snapshot: built once per resolution and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "codes", rename_all = "snake_case")]
pub enum ResolvedPermissionSet {
    /// SuperUser bypass: every code is authorized.
    All,
    Granted(BTreeSet<Permission>),
}

impl ResolvedPermissionSet {
    pub fn empty() -> Self {
        Self::Granted(BTreeSet::new())
    }

    pub fn allows(&self, code: &Permission) -> bool {
        match self {
            Self::All => true,
            Self::Granted(codes) => codes.contains(code),
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Self::All)
    }

    /// Granted codes, or `None` for the SuperUser bypass.
    pub fn codes(&self) -> Option<&BTreeSet<Permission>> {
        match self {
            Self::All => None,
            Self::Granted(codes) => Some(codes),
        }
    }

    /// Codes as strings for reporting; the bypass renders as `["*"]`.
    pub fn to_strings(&self) -> Vec<String> {
        match self {
            Self::All => vec![Permission::wildcard().as_str().to_string()],
            Self::Granted(codes) => codes.iter().map(|c| c.as_str().to_string()).collect(),
        }
    }
}

/// Anything able to compute a principal's effective permissions.
///
/// The authorization cache is generic over this so it can wrap the real
/// resolver or a test double.
#[async_trait]
pub trait PermissionSource: Send + Sync {
    async fn resolve(&self, principal: &Principal) -> Result<ResolvedPermissionSet, AuthzError>;
}

/// Computes effective permissions from a [`GrantStore`].
///
/// No retries: a data-access failure surfaces as
/// [`AuthzError::Indeterminate`], which callers must treat as deny.
#[derive(Debug, Clone)]
pub struct PermissionResolver<S> {
    store: S,
}

impl<S> PermissionResolver<S>
where
    S: GrantStore,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

#[async_trait]
impl<S> PermissionSource for PermissionResolver<S>
where
    S: GrantStore,
{
    async fn resolve(&self, principal: &Principal) -> Result<ResolvedPermissionSet, AuthzError> {
        if principal.is_super_user() {
            return Ok(ResolvedPermissionSet::All);
        }

        let snapshot = self
            .store
            .snapshot_for(principal.user_id, &principal.roles)
            .await
            .map_err(|e| {
                tracing::error!(user_id = %principal.user_id, error = %e, "permission resolution failed");
                AuthzError::Indeterminate(e.to_string())
            })?;

        Ok(resolve_snapshot(principal, &snapshot))
    }
}

/// Pure resolution over an already-fetched snapshot.
pub fn resolve_snapshot(principal: &Principal, snapshot: &GrantSnapshot) -> ResolvedPermissionSet {
    if principal.is_super_user() {
        return ResolvedPermissionSet::All;
    }

    let enabled: HashSet<&Permission> = snapshot
        .definitions
        .iter()
        .filter(|d| d.enabled)
        .map(|d| &d.code)
        .collect();

    let from_roles = snapshot
        .role_grants
        .iter()
        .filter(|g| principal.roles.contains(&g.role))
        .map(|g| &g.code);

    let from_user = snapshot
        .user_grants
        .iter()
        .filter(|g| g.user_id == principal.user_id)
        .map(|g| &g.code);

    let codes = from_roles
        .chain(from_user)
        .filter(|code| enabled.contains(code))
        .cloned()
        .collect();

    ResolvedPermissionSet::Granted(codes)
}
