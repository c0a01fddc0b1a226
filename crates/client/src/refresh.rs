//! Expired-credential recovery with a single in-flight refresh per process.
//!
//! State is `Idle` while the slot is empty and `Refreshing` while it holds a
//! handle to the running refresh. The check-and-set on the slot happens under
//! one mutex acquisition, so two callers can never both observe `Idle` and
//! both start a refresh.
//!
//! The refresh runs on its own task: callers that stop waiting do not cancel
//! it, and the slot is cleared when it settles whether or not anyone listens.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use reqwest::StatusCode;
use thiserror::Error;
use tokio::sync::watch;

use crate::correlation::CorrelationStage;
use crate::request::ApiRequest;
use crate::token_store::{AccessToken, Session, TokenResponse, TokenStore};
use crate::transport::{Transport, TransportError};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RefreshError {
    #[error("refresh rejected with status {0}")]
    Rejected(StatusCode),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("malformed refresh response: {0}")]
    Decode(String),
}

/// The external refresh operation.
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    /// Exchange whatever the current session holds for a new session.
    async fn refresh(&self, current: Option<&Session>) -> Result<Session, RefreshError>;
}

/// Logout side effect, run once when a refresh fails.
pub trait SessionListener: Send + Sync {
    fn session_ended(&self);
}

impl<F> SessionListener for F
where
    F: Fn() + Send + Sync,
{
    fn session_ended(&self) {
        self()
    }
}

/// Default listener: records the logout; hosts replace it with a redirect to
/// the credential-entry flow.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSessionListener;

impl SessionListener for LogSessionListener {
    fn session_ended(&self) {
        tracing::info!("session ended; credentials must be re-entered");
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshState {
    Idle,
    Refreshing,
}

#[derive(Debug, Clone)]
enum RefreshOutcome {
    Refreshed(AccessToken),
    Failed,
}

struct RefreshSlot {
    outcome: watch::Receiver<Option<RefreshOutcome>>,
    joined: Arc<AtomicUsize>,
}

struct Inner {
    tokens: Arc<TokenStore>,
    refresher: Arc<dyn TokenRefresher>,
    listener: Arc<dyn SessionListener>,
    slot: Mutex<Option<RefreshSlot>>,
    completed: AtomicUsize,
}

/// Clears the slot when the refresh task ends, including by panic.
struct SlotGuard(Arc<Inner>);

impl Drop for SlotGuard {
    fn drop(&mut self) {
        match self.0.slot.lock() {
            Ok(mut slot) => *slot = None,
            Err(poisoned) => *poisoned.into_inner() = None,
        }
    }
}

/// A token that is already newer than the one a call failed with, a
/// subscription to the in-flight refresh, or a session that has already ended.
enum Recovery {
    Ready(AccessToken),
    Wait(watch::Receiver<Option<RefreshOutcome>>),
    Ended,
}

#[derive(Clone)]
pub struct RefreshCoordinator {
    inner: Arc<Inner>,
}

impl RefreshCoordinator {
    pub fn new(
        tokens: Arc<TokenStore>,
        refresher: Arc<dyn TokenRefresher>,
        listener: Arc<dyn SessionListener>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                tokens,
                refresher,
                listener,
                slot: Mutex::new(None),
                completed: AtomicUsize::new(0),
            }),
        }
    }

    pub fn state(&self) -> RefreshState {
        let occupied = match self.inner.slot.lock() {
            Ok(slot) => slot.is_some(),
            Err(poisoned) => poisoned.into_inner().is_some(),
        };
        if occupied {
            RefreshState::Refreshing
        } else {
            RefreshState::Idle
        }
    }

    /// Number of refresh operations that have settled so far.
    pub fn refreshes_completed(&self) -> usize {
        self.inner.completed.load(Ordering::SeqCst)
    }

    /// Recover from an expired-credential failure of a call that was sent
    /// with `used_token`.
    ///
    /// Returns the token to replay with, or `None` when there is no session
    /// left to refresh. A failing refresh clears the store and runs the
    /// listener once; calls recovering after that fail without refreshing.
    pub async fn recover(&self, used_token: Option<&str>) -> Option<AccessToken> {
        let mut outcome = match self.join_or_start(used_token) {
            Recovery::Ready(token) => return Some(token),
            Recovery::Wait(rx) => rx,
            Recovery::Ended => return None,
        };

        let settled = match outcome.wait_for(Option::is_some).await {
            Ok(value) => value.clone(),
            // Sender dropped without a result: the refresh task died.
            Err(_) => None,
        };

        match settled {
            Some(RefreshOutcome::Refreshed(token)) => Some(token),
            Some(RefreshOutcome::Failed) | None => None,
        }
    }

    fn join_or_start(&self, used_token: Option<&str>) -> Recovery {
        let mut slot = match self.inner.slot.lock() {
            Ok(slot) => slot,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Some(running) = slot.as_ref() {
            running.joined.fetch_add(1, Ordering::SeqCst);
            return Recovery::Wait(running.outcome.clone());
        }

        // A refresh that settled after this call was sent already decided the
        // window: replay with the token it installed, or fail with it if it
        // ended the session.
        let Some(current) = self.inner.tokens.current_token() else {
            tracing::debug!("no session to refresh");
            return Recovery::Ended;
        };
        if used_token.is_some_and(|used| used != current.token) {
            return Recovery::Ready(current);
        }

        let (tx, rx) = watch::channel(None);
        let joined = Arc::new(AtomicUsize::new(1));
        *slot = Some(RefreshSlot {
            outcome: rx.clone(),
            joined: joined.clone(),
        });
        drop(slot);

        tracing::debug!("access token rejected; starting refresh");
        let guard = SlotGuard(self.inner.clone());
        tokio::spawn(run_refresh(guard, tx, joined));

        Recovery::Wait(rx)
    }
}

async fn run_refresh(
    guard: SlotGuard,
    tx: watch::Sender<Option<RefreshOutcome>>,
    joined: Arc<AtomicUsize>,
) {
    let inner = guard.0.clone();
    let current = inner.tokens.session();

    let outcome = match inner.refresher.refresh(current.as_deref()).await {
        Ok(session) => {
            let token = session.access_token.clone();
            inner.tokens.login(session);
            tracing::info!(waiters = joined.load(Ordering::SeqCst), "access token refreshed");
            RefreshOutcome::Refreshed(token)
        }
        Err(e) => {
            // Only the logout path leaves the coordinator; the refresh error
            // itself stays here.
            tracing::warn!(error = %e, waiters = joined.load(Ordering::SeqCst), "token refresh failed; logging out");
            inner.tokens.logout();
            inner.listener.session_ended();
            RefreshOutcome::Failed
        }
    };

    inner.completed.fetch_add(1, Ordering::SeqCst);
    drop(guard);
    let _ = tx.send(Some(outcome));
}

/// Refresher that calls the server's refresh endpoint.
///
/// The call is marked `without_refresh` so a rejected refresh never recurses
/// into the coordinator.
pub struct HttpTokenRefresher {
    transport: Arc<dyn Transport>,
    url: String,
    correlation: CorrelationStage,
}

impl HttpTokenRefresher {
    pub fn new(transport: Arc<dyn Transport>, url: impl Into<String>, correlation: CorrelationStage) -> Self {
        Self {
            transport,
            url: url.into(),
            correlation,
        }
    }
}

#[async_trait]
impl TokenRefresher for HttpTokenRefresher {
    async fn refresh(&self, current: Option<&Session>) -> Result<Session, RefreshError> {
        let body = serde_json::json!({
            "refresh_token": current.and_then(|s| s.refresh_token.as_deref()),
        });
        let mut request = ApiRequest::post(self.url.as_str())
            .json(&body)
            .map_err(|e| RefreshError::Decode(e.to_string()))?
            .without_refresh();
        self.correlation.apply(&mut request);

        let response = self.transport.send(request).await?;
        if !response.status.is_success() {
            return Err(RefreshError::Rejected(response.status));
        }

        let parsed: TokenResponse = response
            .json()
            .map_err(|e| RefreshError::Decode(e.to_string()))?;
        Ok(parsed.into_session(Utc::now(), current))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::ApiResponse;
    use std::time::Duration;

    fn session(token: &str) -> Session {
        Session {
            access_token: AccessToken::new(token, Utc::now(), Utc::now() + chrono::Duration::minutes(15)),
            refresh_token: Some("refresh-1".into()),
            principal: None,
        }
    }

    struct SlowRefresher {
        calls: AtomicUsize,
        succeed: bool,
    }

    #[async_trait]
    impl TokenRefresher for SlowRefresher {
        async fn refresh(&self, _current: Option<&Session>) -> Result<Session, RefreshError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            tokio::time::sleep(Duration::from_millis(50)).await;
            if self.succeed {
                Ok(session(&format!("fresh-{n}")))
            } else {
                Err(RefreshError::Rejected(StatusCode::UNAUTHORIZED))
            }
        }
    }

    fn coordinator(succeed: bool) -> (RefreshCoordinator, Arc<SlowRefresher>, Arc<TokenStore>, Arc<AtomicUsize>) {
        let tokens = Arc::new(TokenStore::new());
        tokens.login(session("stale"));
        let refresher = Arc::new(SlowRefresher {
            calls: AtomicUsize::new(0),
            succeed,
        });
        let logouts = Arc::new(AtomicUsize::new(0));
        let counter = logouts.clone();
        let listener = move || {
            counter.fetch_add(1, Ordering::SeqCst);
        };
        let coordinator = RefreshCoordinator::new(tokens.clone(), refresher.clone(), Arc::new(listener));
        (coordinator, refresher, tokens, logouts)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_failures_share_one_refresh() {
        let (coordinator, refresher, tokens, _) = coordinator(true);

        let mut handles = Vec::new();
        for _ in 0..8 {
            let c = coordinator.clone();
            handles.push(tokio::spawn(async move { c.recover(Some("stale")).await }));
        }

        for h in handles {
            assert_eq!(h.await.unwrap().unwrap().token, "fresh-1");
        }
        assert_eq!(refresher.calls.load(Ordering::SeqCst), 1);
        assert_eq!(tokens.current_token().unwrap().token, "fresh-1");
        assert_eq!(coordinator.state(), RefreshState::Idle);
    }

    #[tokio::test]
    async fn state_is_refreshing_while_in_flight() {
        let (coordinator, _, _, _) = coordinator(true);
        let c = coordinator.clone();
        let pending = tokio::spawn(async move { c.recover(Some("stale")).await });

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(coordinator.state(), RefreshState::Refreshing);

        pending.await.unwrap().unwrap();
        assert_eq!(coordinator.state(), RefreshState::Idle);
    }

    #[tokio::test]
    async fn failure_clears_store_and_logs_out_once() {
        let (coordinator, _, tokens, logouts) = coordinator(false);

        let (a, b) = tokio::join!(coordinator.recover(Some("stale")), coordinator.recover(Some("stale")));

        assert!(a.is_none() && b.is_none());
        assert!(tokens.current_token().is_none());
        assert_eq!(logouts.load(Ordering::SeqCst), 1);
        assert_eq!(coordinator.state(), RefreshState::Idle);
    }

    #[tokio::test]
    async fn superseded_token_replays_without_refreshing() {
        let (coordinator, refresher, _, _) = coordinator(true);

        let token = coordinator.recover(Some("older-than-stale")).await.unwrap();

        assert_eq!(token.token, "stale");
        assert_eq!(refresher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn abandoned_waiters_do_not_cancel_the_refresh() {
        let (coordinator, refresher, tokens, _) = coordinator(true);

        let c = coordinator.clone();
        let waiter = tokio::spawn(async move { c.recover(Some("stale")).await });
        tokio::time::sleep(Duration::from_millis(5)).await;
        waiter.abort();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(refresher.calls.load(Ordering::SeqCst), 1);
        assert_eq!(tokens.current_token().unwrap().token, "fresh-1");
        assert_eq!(coordinator.refreshes_completed(), 1);
        assert_eq!(coordinator.state(), RefreshState::Idle);
    }

    #[tokio::test]
    async fn late_expiry_after_failed_refresh_does_not_refresh_again() {
        let (coordinator, refresher, tokens, logouts) = coordinator(false);

        // Both calls went out with "stale"; the second 401 lands after the
        // first call's refresh already failed.
        assert!(coordinator.recover(Some("stale")).await.is_none());
        assert!(coordinator.recover(Some("stale")).await.is_none());

        assert_eq!(refresher.calls.load(Ordering::SeqCst), 1);
        assert_eq!(logouts.load(Ordering::SeqCst), 1);
        assert!(tokens.current_token().is_none());
        assert_eq!(coordinator.refreshes_completed(), 1);
    }

    #[tokio::test]
    async fn no_session_means_nothing_to_refresh() {
        let (coordinator, refresher, tokens, logouts) = coordinator(true);
        tokens.logout();

        assert!(coordinator.recover(None).await.is_none());

        assert_eq!(refresher.calls.load(Ordering::SeqCst), 0);
        assert_eq!(logouts.load(Ordering::SeqCst), 0);
    }

    struct Scripted(StatusCode, &'static str);

    #[async_trait]
    impl Transport for Scripted {
        async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
            assert!(request.flags.skip_refresh);
            assert!(request.headers.contains_key("x-correlation-id"));
            Ok(ApiResponse::new(self.0, self.1))
        }
    }

    #[tokio::test]
    async fn http_refresher_parses_token_response() {
        let transport = Arc::new(Scripted(
            StatusCode::OK,
            r#"{"access_token":"abc","expires_in":900}"#,
        ));
        let refresher = HttpTokenRefresher::new(transport, "http://api/auth/refresh", CorrelationStage::default());

        let next = refresher.refresh(Some(&session("old"))).await.unwrap();

        assert_eq!(next.access_token.token, "abc");
        assert_eq!(next.refresh_token.as_deref(), Some("refresh-1"));
    }

    #[tokio::test]
    async fn http_refresher_reports_rejection() {
        let transport = Arc::new(Scripted(StatusCode::UNAUTHORIZED, "{}"));
        let refresher = HttpTokenRefresher::new(transport, "http://api/auth/refresh", CorrelationStage::default());

        assert_eq!(
            refresher.refresh(None).await.unwrap_err(),
            RefreshError::Rejected(StatusCode::UNAUTHORIZED)
        );
    }
}
