//! Stamps outbound calls with a request-scoped trace id.

use reqwest::header::{HeaderName, HeaderValue};

use staybook_core::CorrelationId;

use crate::request::ApiRequest;

pub const DEFAULT_CORRELATION_HEADER: &str = "x-correlation-id";

#[derive(Debug, Clone)]
pub struct CorrelationStage {
    header: HeaderName,
}

impl CorrelationStage {
    pub fn new(header: HeaderName) -> Self {
        Self { header }
    }

    pub fn header(&self) -> &HeaderName {
        &self.header
    }

    /// Add a fresh id unless the caller already supplied one. Returns the id
    /// the request carries afterwards.
    pub fn apply(&self, request: &mut ApiRequest) -> String {
        if let Some(existing) = request.headers.get(&self.header) {
            return String::from_utf8_lossy(existing.as_bytes()).into_owned();
        }

        let id = CorrelationId::generate().to_string();
        if let Ok(value) = HeaderValue::from_str(&id) {
            request.headers.insert(self.header.clone(), value);
        }
        id
    }
}

impl Default for CorrelationStage {
    fn default() -> Self {
        Self::new(HeaderName::from_static(DEFAULT_CORRELATION_HEADER))
    }
}
