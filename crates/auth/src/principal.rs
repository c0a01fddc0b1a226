use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use staybook_core::UserId;

use crate::Role;

/// A verified identity plus its role set, attached to a request.
///
/// Both halves of the system treat this as a snapshot: it is replaced
/// wholesale on refresh or logout, never edited in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub user_id: UserId,
    pub roles: Vec<Role>,
    pub token_expires_at: DateTime<Utc>,
}

impl Principal {
    pub fn new(user_id: UserId, roles: Vec<Role>, token_expires_at: DateTime<Utc>) -> Self {
        Self {
            user_id,
            roles,
            token_expires_at,
        }
    }

    pub fn is_super_user(&self) -> bool {
        self.roles.iter().any(Role::is_super_user)
    }

    pub fn has_role(&self, name: &str) -> bool {
        self.roles.iter().any(|r| r.as_str() == name)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.token_expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn super_user_detected_among_other_roles() {
        let p = Principal::new(
            UserId::new(),
            vec![Role::new("Agent"), Role::super_user()],
            Utc::now() + Duration::minutes(5),
        );
        assert!(p.is_super_user());
        assert!(p.has_role("Agent"));
    }

    #[test]
    fn expiry_is_inclusive_of_the_deadline() {
        let now = Utc::now();
        let p = Principal::new(UserId::new(), vec![], now);
        assert!(p.is_expired(now));
        assert!(!p.is_expired(now - Duration::seconds(1)));
    }
}
