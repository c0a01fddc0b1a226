//! In-memory session state owned by one client process.

use std::sync::{Arc, RwLock};

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

use staybook_auth::{Principal, Role};
use staybook_core::UserId;

/// Opaque bearer credential. Superseded, never mutated.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub token: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl AccessToken {
    pub fn new(token: impl Into<String>, issued_at: DateTime<Utc>, expires_at: DateTime<Utc>) -> Self {
        Self {
            token: token.into(),
            issued_at,
            expires_at,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

impl core::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AccessToken")
            .field("token", &"<redacted>")
            .field("issued_at", &self.issued_at)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Everything the client knows about the signed-in user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub access_token: AccessToken,
    /// Session artifact presented to the refresh endpoint.
    pub refresh_token: Option<String>,
    pub principal: Option<Principal>,
}

/// Wire shape of a login or refresh result.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    /// Lifetime in seconds.
    pub expires_in: i64,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub user_id: Option<UserId>,
    #[serde(default)]
    pub roles: Vec<Role>,
}

impl TokenResponse {
    /// Build the next session. Fields the server omitted (refresh token
    /// rotation, identity) carry over from `previous`.
    pub fn into_session(self, now: DateTime<Utc>, previous: Option<&Session>) -> Session {
        let expires_at = now + Duration::seconds(self.expires_in);
        let principal = match self.user_id {
            Some(user_id) => Some(Principal::new(user_id, self.roles, expires_at)),
            None => previous.and_then(|s| s.principal.clone()).map(|p| Principal {
                token_expires_at: expires_at,
                ..p
            }),
        };

        Session {
            access_token: AccessToken::new(self.access_token, now, expires_at),
            refresh_token: self
                .refresh_token
                .or_else(|| previous.and_then(|s| s.refresh_token.clone())),
            principal,
        }
    }
}

/// Holds the current session; readers get a cheap snapshot.
#[derive(Debug, Default)]
pub struct TokenStore {
    current: RwLock<Option<Arc<Session>>>,
}

impl TokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the session wholesale (login or successful refresh).
    pub fn login(&self, session: Session) {
        match self.current.write() {
            Ok(mut slot) => *slot = Some(Arc::new(session)),
            Err(poisoned) => *poisoned.into_inner() = Some(Arc::new(session)),
        }
    }

    pub fn logout(&self) {
        match self.current.write() {
            Ok(mut slot) => *slot = None,
            Err(poisoned) => *poisoned.into_inner() = None,
        }
    }

    pub fn session(&self) -> Option<Arc<Session>> {
        match self.current.read() {
            Ok(slot) => slot.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn current_token(&self) -> Option<AccessToken> {
        self.session().map(|s| s.access_token.clone())
    }

    pub fn principal(&self) -> Option<Principal> {
        self.session().and_then(|s| s.principal.clone())
    }

    pub fn is_authenticated(&self) -> bool {
        self.session().is_some()
    }
}
