//! Ready-made interceptors.

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use tracing::{debug, info};

use super::{ErrorAction, ErrorInterceptor, RequestInterceptor, ResponseInterceptor};
use crate::types::request::parse_header;
use crate::types::{RequestDescriptor, ResponseOutcome};
use crate::{Error, Result};

/// Adds fixed headers to every request, e.g. `X-Requested-With: XMLHttpRequest`.
///
/// Headers already present on the request are left untouched.
#[derive(Debug, Clone, Default)]
pub struct StaticHeaders {
    headers: HeaderMap,
}

impl StaticHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a header; invalid names or values are configuration errors.
    pub fn header(mut self, name: &str, value: &str) -> Result<Self> {
        let (name, value) = parse_header(name, value)?;
        self.headers.insert(name, value);
        Ok(self)
    }
}

#[async_trait]
impl RequestInterceptor for StaticHeaders {
    async fn on_request(&self, mut request: RequestDescriptor) -> Result<RequestDescriptor> {
        for (name, value) in &self.headers {
            if !request.headers.contains_key(name) {
                request.headers.insert(name.clone(), value.clone());
            }
        }
        Ok(request)
    }
}

/// Emits a `tracing` event at every pipeline stage.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingInterceptor;

#[async_trait]
impl RequestInterceptor for TracingInterceptor {
    async fn on_request(&self, request: RequestDescriptor) -> Result<RequestDescriptor> {
        debug!(
            method = %request.method,
            url = request.url.as_str(),
            skip_auth = request.skip_auth,
            "resilient-client sending request"
        );
        Ok(request)
    }
}

#[async_trait]
impl ResponseInterceptor for TracingInterceptor {
    async fn on_response(&self, response: ResponseOutcome) -> Result<ResponseOutcome> {
        debug!(
            http_status = response.status,
            content_type = response.content_type().unwrap_or(""),
            body_len = response.body.len(),
            "resilient-client received response"
        );
        Ok(response)
    }
}

#[async_trait]
impl ErrorInterceptor for TracingInterceptor {
    async fn on_error(&self, error: Error) -> ErrorAction {
        match error.classified() {
            Some(c) => info!(
                error_kind = c.code(),
                http_status = c.status().unwrap_or(0),
                message = c.message(),
                "resilient-client request failed"
            ),
            None => info!(error = %error, "resilient-client request failed"),
        }
        ErrorAction::Propagate(error)
    }
}
