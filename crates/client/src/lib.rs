//! `staybook-client` — outbound request pipeline for API consumers.
//!
//! Stages, in order:
//! - [`CorrelationStage`]: stamps a trace id unless one is present
//! - [`CredentialStage`]: attaches the stored bearer token
//! - [`Transport`]: one network round-trip
//! - [`RefreshCoordinator`]: on an expired credential, one shared refresh and
//!   a single replay per call
//! - [`ErrorNormalizer`]: uniform `{ status, message, cause }` + notification

pub mod client;
pub mod config;
pub mod correlation;
pub mod credentials;
pub mod error;
pub mod refresh;
pub mod request;
pub mod token_store;
pub mod transport;

pub use client::{ApiClient, ApiClientBuilder, is_expired_credential};
pub use config::ClientConfig;
pub use correlation::{CorrelationStage, DEFAULT_CORRELATION_HEADER};
pub use credentials::CredentialStage;
pub use error::{
    ApiError, ErrorCause, ErrorNormalizer, LogNotifier, Notification, Notifier, NotifyError,
    Severity,
};
pub use refresh::{
    HttpTokenRefresher, LogSessionListener, RefreshCoordinator, RefreshError, RefreshState,
    SessionListener, TokenRefresher,
};
pub use request::{ApiRequest, ApiResponse, RequestFlags};
pub use token_store::{AccessToken, Session, TokenResponse, TokenStore};
pub use transport::{ReqwestTransport, Transport, TransportError};
