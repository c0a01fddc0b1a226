//! Injects the current access token into outbound calls.

use reqwest::header::{AUTHORIZATION, HeaderValue};

use crate::request::ApiRequest;
use crate::token_store::TokenStore;

#[derive(Debug, Clone, Copy, Default)]
pub struct CredentialStage;

impl CredentialStage {
    /// Attach the stored token, overwriting any existing Authorization header.
    /// Without a session the request goes out unmodified.
    pub fn apply(&self, request: &mut ApiRequest, tokens: &TokenStore) {
        if let Some(token) = tokens.current_token() {
            set_bearer(request, &token.token);
        }
    }
}

pub fn set_bearer(request: &mut ApiRequest, token: &str) {
    match HeaderValue::from_str(&format!("Bearer {token}")) {
        Ok(mut value) => {
            value.set_sensitive(true);
            request.headers.insert(AUTHORIZATION, value);
        }
        Err(_) => tracing::warn!("access token is not a valid header value; sending without it"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token_store::{AccessToken, Session};
    use chrono::Utc;

    fn store_with(token: &str) -> TokenStore {
        let store = TokenStore::new();
        store.login(Session {
            access_token: AccessToken::new(token, Utc::now(), Utc::now()),
            refresh_token: None,
            principal: None,
        });
        store
    }

    #[test]
    fn no_session_leaves_request_untouched() {
        let mut req = ApiRequest::get("http://x/public/tours");
        CredentialStage.apply(&mut req, &TokenStore::new());
        assert!(req.headers.get(AUTHORIZATION).is_none());
    }

    #[test]
    fn stored_token_overwrites_existing_header() {
        let mut req = ApiRequest::get("http://x")
            .header(AUTHORIZATION, HeaderValue::from_static("Bearer stale"));
        CredentialStage.apply(&mut req, &store_with("fresh"));
        assert_eq!(req.bearer_token(), Some("fresh"));
    }
}
