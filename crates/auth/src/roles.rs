use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Sentinel role that authorizes every permission code without consulting
/// grants. Compared case-sensitively.
pub const SUPER_USER: &str = "SuperUser";

/// Role identifier used for RBAC.
///
/// Roles are opaque strings at this layer; mapping roles to permissions is the
/// job of the grant store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(Cow<'static, str>);

impl Role {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn super_user() -> Self {
        Self(Cow::Borrowed(SUPER_USER))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_super_user(&self) -> bool {
        self.as_str() == SUPER_USER
    }
}

impl From<&'static str> for Role {
    fn from(value: &'static str) -> Self {
        Self::new(value)
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn super_user_sentinel_is_case_sensitive() {
        assert!(Role::new("SuperUser").is_super_user());
        assert!(!Role::new("superuser").is_super_user());
        assert!(!Role::new("SUPERUSER").is_super_user());
    }
}
