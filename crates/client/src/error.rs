//! Uniform failure shape plus best-effort user notification.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

use crate::request::ApiResponse;
use crate::transport::TransportError;

/// What produced an [`ApiError`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorCause {
    /// No response was obtained.
    Transport(TransportError),
    /// The server answered with a non-success status.
    Status { code: Option<String>, body: String },
    /// A success response whose body did not match the expected shape.
    Decode(String),
}

/// The normalized failure every pipeline caller sees.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct ApiError {
    pub status: Option<StatusCode>,
    pub message: String,
    pub cause: ErrorCause,
}

impl ApiError {
    pub fn is_unauthorized(&self) -> bool {
        self.status == Some(StatusCode::UNAUTHORIZED)
    }

    pub fn is_forbidden(&self) -> bool {
        self.status == Some(StatusCode::FORBIDDEN)
    }
}

/// Unrecovered pipeline failure before normalization.
#[derive(Debug)]
pub(crate) enum Failure {
    Transport(TransportError),
    Status(ApiResponse),
    /// Expired credential the session flow already answered (refresh failed,
    /// listener ran, or there was no session left).
    SessionEnded(ApiResponse),
    Decode(StatusCode, serde_json::Error),
}

/// Server error body: `{ "error": <code>, "message": <text> }`.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub severity: Severity,
    pub message: String,
    pub status: Option<StatusCode>,
}

#[derive(Debug, Error)]
#[error("notification failed: {0}")]
pub struct NotifyError(pub String);

/// Transient user-facing notification sink (toast, status bar, ...).
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// Default notifier: emits the notification as a log event.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, n: &Notification) -> Result<(), NotifyError> {
        match n.severity {
            Severity::Warning => tracing::warn!(status = ?n.status, "{}", n.message),
            Severity::Error => tracing::error!(status = ?n.status, "{}", n.message),
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct ErrorNormalizer {
    notifier: Arc<dyn Notifier>,
}

impl ErrorNormalizer {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self { notifier }
    }

    /// Normalize, notify, and hand the error back for the caller to return.
    ///
    /// Failures the session flow already answered with a logout get no
    /// transient notification; every other failure does, 401s included.
    pub(crate) fn handle(&self, failure: Failure) -> ApiError {
        let session_ended = matches!(failure, Failure::SessionEnded(_));
        let error = normalize(failure);
        if !session_ended {
            self.notify(&error);
        }
        error
    }

    fn notify(&self, error: &ApiError) {
        let notification = Notification {
            severity: match error.status {
                Some(s) if s.is_client_error() => Severity::Warning,
                _ => Severity::Error,
            },
            message: error.message.clone(),
            status: error.status,
        };

        let outcome = catch_unwind(AssertUnwindSafe(|| self.notifier.notify(&notification)));
        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!(error = %e, "user notification failed"),
            Err(_) => tracing::warn!("user notification panicked"),
        }
    }
}

impl Default for ErrorNormalizer {
    fn default() -> Self {
        Self::new(Arc::new(LogNotifier))
    }
}

pub(crate) fn normalize(failure: Failure) -> ApiError {
    match failure {
        Failure::Transport(e) => {
            tracing::debug!(error = %e, "transport failure");
            let message = match &e {
                TransportError::Timeout(_) => "The server took too long to respond.".to_string(),
                TransportError::Connect(_) => "Unable to reach the server.".to_string(),
                other => other.to_string(),
            };
            ApiError {
                status: None,
                message,
                cause: ErrorCause::Transport(e),
            }
        }
        Failure::Status(response) | Failure::SessionEnded(response) => {
            let body = response.text();
            let parsed: Option<ErrorBody> = serde_json::from_slice(&response.body).ok();
            let (code, message) = match parsed {
                Some(b) => (b.error, b.message),
                None => (None, None),
            };
            let message = message
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| default_message(response.status));
            ApiError {
                status: Some(response.status),
                message,
                cause: ErrorCause::Status { code, body },
            }
        }
        Failure::Decode(status, e) => ApiError {
            status: Some(status),
            message: "The server returned an unexpected response.".to_string(),
            cause: ErrorCause::Decode(e.to_string()),
        },
    }
}

fn default_message(status: StatusCode) -> String {
    match status {
        StatusCode::UNAUTHORIZED => "Your session has expired. Please sign in again.".to_string(),
        StatusCode::FORBIDDEN => "You do not have permission to perform this action.".to_string(),
        s => s
            .canonical_reason()
            .map(str::to_string)
            .unwrap_or_else(|| format!("Request failed with status {}", s.as_u16())),
    }
}
