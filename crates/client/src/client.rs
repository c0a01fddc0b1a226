//! The request pipeline:
//! correlation → credentials → transport → (expiry) refresh + replay → normalize.

use std::sync::Arc;

use reqwest::header::HeaderName;
use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::Instrument;

use crate::config::ClientConfig;
use crate::correlation::CorrelationStage;
use crate::credentials::{CredentialStage, set_bearer};
use crate::error::{ApiError, ErrorCause, ErrorNormalizer, Failure, Notifier};
use crate::refresh::{
    HttpTokenRefresher, LogSessionListener, RefreshCoordinator, RefreshState, SessionListener,
    TokenRefresher,
};
use crate::request::{ApiRequest, ApiResponse};
use crate::token_store::{TokenResponse, TokenStore};
use crate::transport::{ReqwestTransport, Transport, TransportError};

/// The authorization-failure status that signals an expired credential.
pub fn is_expired_credential(status: StatusCode) -> bool {
    status == StatusCode::UNAUTHORIZED
}

pub struct ApiClient {
    config: ClientConfig,
    transport: Arc<dyn Transport>,
    tokens: Arc<TokenStore>,
    correlation: CorrelationStage,
    credentials: CredentialStage,
    refresh: RefreshCoordinator,
    errors: ErrorNormalizer,
}

impl ApiClient {
    pub fn builder(config: ClientConfig) -> ApiClientBuilder {
        ApiClientBuilder::new(config)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn tokens(&self) -> &Arc<TokenStore> {
        &self.tokens
    }

    pub fn refresh_state(&self) -> RefreshState {
        self.refresh.state()
    }

    pub fn refreshes_completed(&self) -> usize {
        self.refresh.refreshes_completed()
    }

    /// Install the result of a successful login.
    pub fn login(&self, response: TokenResponse) {
        let previous = self.tokens.session();
        let session = response.into_session(chrono::Utc::now(), previous.as_deref());
        self.tokens.login(session);
    }

    pub fn logout(&self) {
        self.tokens.logout();
    }

    /// Build a request against `base_url`.
    pub fn request(&self, method: Method, path: &str) -> ApiRequest {
        ApiRequest::new(method, self.config.url(path))
    }

    /// Run a request through the full pipeline.
    ///
    /// Every unrecovered failure is normalized, notified, and returned; this
    /// never swallows an error.
    pub async fn send(&self, mut request: ApiRequest) -> Result<ApiResponse, ApiError> {
        let correlation_id = self.correlation.apply(&mut request);
        self.credentials.apply(&mut request, &self.tokens);

        let span = tracing::debug_span!(
            "api_call",
            method = %request.method,
            url = %request.url,
            correlation_id = %correlation_id,
        );

        self.dispatch(request)
            .instrument(span)
            .await
            .map_err(|failure| self.errors.handle(failure))
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let response = self.send(self.request(Method::GET, path)).await?;
        self.decode(response)
    }

    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = self
            .request(Method::POST, path)
            .json(body)
            .map_err(|e| ApiError {
                status: None,
                message: "The request could not be encoded.".to_string(),
                cause: ErrorCause::Transport(TransportError::InvalidRequest(e.to_string())),
            })?;
        let response = self.send(request).await?;
        self.decode(response)
    }

    fn decode<T: DeserializeOwned>(&self, response: ApiResponse) -> Result<T, ApiError> {
        response
            .json()
            .map_err(|e| self.errors.handle(Failure::Decode(response.status, e)))
    }

    async fn dispatch(&self, request: ApiRequest) -> Result<ApiResponse, Failure> {
        let first = self
            .transport
            .send(request.clone())
            .await
            .map_err(Failure::Transport)?;
        if first.status.is_success() {
            return Ok(first);
        }

        let recoverable = is_expired_credential(first.status)
            && !request.flags.skip_refresh
            && !request.flags.retried;
        if !recoverable {
            return Err(Failure::Status(first));
        }

        // Callers see the original expiry failure when the refresh fails.
        let Some(token) = self.refresh.recover(request.bearer_token()).await else {
            return Err(Failure::SessionEnded(first));
        };

        let mut replay = request;
        replay.flags.retried = true;
        set_bearer(&mut replay, &token.token);

        let second = self
            .transport
            .send(replay)
            .await
            .map_err(Failure::Transport)?;
        if second.status.is_success() {
            Ok(second)
        } else {
            Err(Failure::Status(second))
        }
    }
}

pub struct ApiClientBuilder {
    config: ClientConfig,
    transport: Option<Arc<dyn Transport>>,
    tokens: Option<Arc<TokenStore>>,
    refresher: Option<Arc<dyn TokenRefresher>>,
    listener: Option<Arc<dyn SessionListener>>,
    notifier: Option<Arc<dyn Notifier>>,
}

impl ApiClientBuilder {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            transport: None,
            tokens: None,
            refresher: None,
            listener: None,
            notifier: None,
        }
    }

    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn token_store(mut self, tokens: Arc<TokenStore>) -> Self {
        self.tokens = Some(tokens);
        self
    }

    pub fn refresher(mut self, refresher: Arc<dyn TokenRefresher>) -> Self {
        self.refresher = Some(refresher);
        self
    }

    pub fn session_listener(mut self, listener: Arc<dyn SessionListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn build(self) -> anyhow::Result<ApiClient> {
        use anyhow::Context;

        let header = HeaderName::try_from(self.config.correlation_header.as_str())
            .context("invalid correlation header name")?;
        let correlation = CorrelationStage::new(header);

        let transport: Arc<dyn Transport> = match self.transport {
            Some(t) => t,
            None => Arc::new(
                ReqwestTransport::new(self.config.timeout).context("failed to build http client")?,
            ),
        };
        let tokens = self.tokens.unwrap_or_default();
        let refresher = self.refresher.unwrap_or_else(|| {
            Arc::new(HttpTokenRefresher::new(
                transport.clone(),
                self.config.refresh_url(),
                correlation.clone(),
            ))
        });
        let listener = self
            .listener
            .unwrap_or_else(|| Arc::new(LogSessionListener));
        let errors = match self.notifier {
            Some(n) => ErrorNormalizer::new(n),
            None => ErrorNormalizer::default(),
        };

        Ok(ApiClient {
            refresh: RefreshCoordinator::new(tokens.clone(), refresher, listener),
            config: self.config,
            transport,
            tokens,
            correlation,
            credentials: CredentialStage,
            errors,
        })
    }
}
