//! Request descriptor passed through the interceptor pipeline and the transport.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use reqwest::Method;

use crate::interceptors::Hooks;
use crate::structured::SchemaValidator;
use crate::{Error, ErrorContext, Result};

/// Request body, either raw bytes or a structured value serialized at send time.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Json(serde_json::Value),
    Bytes(Bytes),
}

/// One attempt's description of a request.
///
/// Interceptors receive a descriptor by value and hand back a new one, so a
/// descriptor is never mutated from two places at once.
#[derive(Clone)]
pub struct RequestDescriptor {
    pub method: Method,
    pub url: String,
    /// Header names are case-insensitive.
    pub headers: HeaderMap,
    pub body: Option<RequestBody>,
    /// Do not attach the access token.
    pub skip_auth: bool,
    /// Per-call interceptors layered on top of the client's registered ones.
    pub hooks: Option<Hooks>,
    /// Validator applied to the decoded body of a successful response.
    pub schema: Option<Arc<dyn SchemaValidator>>,
}

impl RequestDescriptor {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HeaderMap::new(),
            body: None,
            skip_auth: false,
            hooks: None,
            schema: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn with_body(mut self, body: RequestBody) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_json(self, value: serde_json::Value) -> Self {
        self.with_body(RequestBody::Json(value))
    }

    pub fn with_skip_auth(mut self, skip: bool) -> Self {
        self.skip_auth = skip;
        self
    }

    pub fn with_hooks(mut self, hooks: Hooks) -> Self {
        self.hooks = Some(hooks);
        self
    }

    pub fn with_schema(mut self, schema: Arc<dyn SchemaValidator>) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Builder-style header insert; replaces any value under the same name.
    pub fn with_header(mut self, name: &str, value: &str) -> Result<Self> {
        self.insert_header(name, value)?;
        Ok(self)
    }

    /// Insert or replace a header, validating name and value.
    pub fn insert_header(&mut self, name: &str, value: &str) -> Result<()> {
        let (name, value) = parse_header(name, value)?;
        self.headers.insert(name, value);
        Ok(())
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Credential carried in the `Authorization` header, with the scheme stripped.
    pub fn authorization_token(&self) -> Option<&str> {
        let raw = self.headers.get(AUTHORIZATION)?.to_str().ok()?;
        Some(raw.split_once(' ').map(|(_, t)| t).unwrap_or(raw))
    }
}

/// Validate a header pair; invalid names or values are configuration errors.
pub(crate) fn parse_header(name: &str, value: &str) -> Result<(HeaderName, HeaderValue)> {
    let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
        Error::configuration_with_context(
            format!("invalid header name: {}", e),
            ErrorContext::new()
                .with_field_path("request.headers")
                .with_details(name.to_string()),
        )
    })?;
    let value = HeaderValue::from_str(value).map_err(|e| {
        Error::configuration_with_context(
            format!("invalid header value: {}", e),
            ErrorContext::new().with_field_path(format!("request.headers.{}", name)),
        )
    })?;
    Ok((name, value))
}

impl fmt::Debug for RequestDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestDescriptor")
            .field("method", &self.method)
            .field("url", &self.url)
            .field("headers", &self.headers)
            .field("body", &self.body)
            .field("skip_auth", &self.skip_auth)
            .field("hooks", &self.hooks.is_some())
            .field("schema", &self.schema.is_some())
            .finish()
    }
}
