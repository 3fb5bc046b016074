use crate::types::{RequestBody, RequestDescriptor, ResponseOutcome};
use crate::{Error, ErrorContext, Result};
use async_trait::async_trait;
use reqwest::Proxy;
use std::env;
use std::time::Duration;
use tracing::debug;

use super::{Transport, TransportError};

/// Transport timeout when `RESILIENT_CLIENT_HTTP_TIMEOUT_SECS` is unset.
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// reqwest-backed [`Transport`].
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Build with env-overridable defaults:
    /// `RESILIENT_CLIENT_HTTP_TIMEOUT_SECS` (default 30) and `RESILIENT_CLIENT_PROXY_URL`.
    pub fn new() -> Result<Self> {
        let timeout_secs = env::var("RESILIENT_CLIENT_HTTP_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_HTTP_TIMEOUT_SECS);

        let mut builder = reqwest::Client::builder().timeout(Duration::from_secs(timeout_secs));

        if let Ok(proxy_url) = env::var("RESILIENT_CLIENT_PROXY_URL") {
            let proxy = Proxy::all(&proxy_url).map_err(|e| {
                Error::configuration_with_context(
                    format!("invalid proxy url: {}", e),
                    ErrorContext::new()
                        .with_field_path("RESILIENT_CLIENT_PROXY_URL")
                        .with_details(proxy_url.clone())
                        .with_source("http_transport"),
                )
            })?;
            builder = builder.proxy(proxy);
        }

        let client = builder.build().map_err(|e| {
            Error::configuration_with_context(
                format!("failed to build HTTP client: {}", e),
                ErrorContext::new().with_source("http_transport"),
            )
        })?;

        Ok(Self { client })
    }

    /// Wrap a preconfigured reqwest client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &RequestDescriptor) -> std::result::Result<ResponseOutcome, TransportError> {
        let mut req = self
            .client
            .request(request.method.clone(), &request.url)
            .headers(request.headers.clone());

        req = match &request.body {
            // `json` only sets content-type when the caller did not.
            Some(RequestBody::Json(value)) => req.json(value),
            Some(RequestBody::Bytes(bytes)) => req.body(bytes.clone()),
            None => req,
        };

        let resp = req.send().await?;
        let status = resp.status().as_u16();
        let headers = resp.headers().clone();
        let body = resp.bytes().await?;
        debug!(http_status = status, body_len = body.len(), "transport received response");

        Ok(ResponseOutcome::new(status, headers, body))
    }
}
