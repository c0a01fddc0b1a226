use std::time::Duration;

use crate::correlation::DEFAULT_CORRELATION_HEADER;

/// Client pipeline configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// API origin, without a trailing slash (e.g. `https://api.example.com`).
    pub base_url: String,
    /// Path of the refresh endpoint, relative to `base_url`.
    pub refresh_path: String,
    pub correlation_header: String,
    pub timeout: Duration,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            ..Self::default()
        }
    }

    /// Read `STAYBOOK_API_URL`, `STAYBOOK_REFRESH_PATH` and
    /// `STAYBOOK_HTTP_TIMEOUT_SECS`.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let base_url = std::env::var("STAYBOOK_API_URL").unwrap_or_else(|_| {
            tracing::warn!(default = %defaults.base_url, "STAYBOOK_API_URL not set; using local default");
            defaults.base_url.clone()
        });
        let refresh_path =
            std::env::var("STAYBOOK_REFRESH_PATH").unwrap_or(defaults.refresh_path.clone());
        let timeout = std::env::var("STAYBOOK_HTTP_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.timeout);

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            refresh_path,
            timeout,
            ..defaults
        }
    }

    pub fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    pub fn refresh_url(&self) -> String {
        self.url(&self.refresh_path)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            refresh_path: "/auth/refresh".to_string(),
            correlation_header: DEFAULT_CORRELATION_HEADER.to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}
