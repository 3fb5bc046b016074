use crate::auth::TokenManager;
use crate::client::options::{merge, ClientDefaults, RequestOptions};
use crate::interceptors::{
    ErrorInterceptor, InterceptorHandle, InterceptorPipeline, RequestInterceptor, ResponseInterceptor,
};
use crate::transport::Transport;
use crate::types::{Payload, RequestBody, RequestDescriptor};
use crate::{Error, ErrorContext, Result};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Client that runs every request through the interceptor pipeline, attaches
/// credentials, and retries once after a successful token refresh.
///
/// Each instance owns its interceptors and (unless shared explicitly) its
/// token manager, so separate instances never interfere.
pub struct ApiClient {
    pub(crate) base_url: Option<String>,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) interceptors: InterceptorPipeline,
    pub(crate) tokens: Arc<TokenManager>,
    pub(crate) defaults: ClientDefaults,
    pub(crate) auth_scheme: String,
    pub(crate) refresh_ahead: Option<Duration>,
}

impl ApiClient {
    pub fn builder() -> crate::client::builder::ApiClientBuilder {
        crate::client::builder::ApiClientBuilder::new()
    }

    /// The credential owner; use it for login (`set_credentials`) and logout (`clear`).
    pub fn tokens(&self) -> &Arc<TokenManager> {
        &self.tokens
    }

    pub fn interceptors(&self) -> &InterceptorPipeline {
        &self.interceptors
    }

    pub fn defaults(&self) -> &ClientDefaults {
        &self.defaults
    }

    pub fn add_request_interceptor<I: RequestInterceptor + 'static>(&self, interceptor: I) -> InterceptorHandle {
        self.interceptors.add_request_interceptor(interceptor)
    }

    pub fn add_response_interceptor<I: ResponseInterceptor + 'static>(&self, interceptor: I) -> InterceptorHandle {
        self.interceptors.add_response_interceptor(interceptor)
    }

    pub fn add_error_interceptor<I: ErrorInterceptor + 'static>(&self, interceptor: I) -> InterceptorHandle {
        self.interceptors.add_error_interceptor(interceptor)
    }

    pub fn remove_interceptor(&self, handle: InterceptorHandle) -> bool {
        self.interceptors.remove(handle)
    }

    pub async fn get(&self, url: &str, options: RequestOptions) -> Result<Payload> {
        self.dispatch(Method::GET, url, None, options).await
    }

    /// GET and deserialize the body into `T`.
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str, options: RequestOptions) -> Result<T> {
        let (descriptor, deadline) = self.prepare(Method::GET, url, None, options)?;
        self.execute_as_with_deadline(descriptor, deadline).await
    }

    /// POST with `body` serialized as JSON. A body that serializes to `null`
    /// (such as `&()`) sends no body.
    pub async fn post<B: Serialize + ?Sized>(&self, url: &str, body: &B, options: RequestOptions) -> Result<Payload> {
        let body = json_body(body)?;
        self.dispatch(Method::POST, url, body, options).await
    }

    pub async fn put<B: Serialize + ?Sized>(&self, url: &str, body: &B, options: RequestOptions) -> Result<Payload> {
        let body = json_body(body)?;
        self.dispatch(Method::PUT, url, body, options).await
    }

    pub async fn delete(&self, url: &str, options: RequestOptions) -> Result<Payload> {
        self.dispatch(Method::DELETE, url, None, options).await
    }

    async fn dispatch(
        &self,
        method: Method,
        url: &str,
        body: Option<RequestBody>,
        options: RequestOptions,
    ) -> Result<Payload> {
        let (descriptor, deadline) = self.prepare(method, url, body, options)?;
        self.execute_with_deadline(descriptor, deadline).await
    }

    /// Build the descriptor for one logical request: resolve the URL against
    /// the base URL, append query parameters and merge options over defaults.
    ///
    /// Returns the descriptor and the deadline it should run under.
    pub fn prepare(
        &self,
        method: Method,
        url: &str,
        body: Option<RequestBody>,
        options: RequestOptions,
    ) -> Result<(RequestDescriptor, Option<Duration>)> {
        let resolved = merge(&self.defaults, options);
        let url = self.resolve_url(url, &resolved.query)?;

        let descriptor = RequestDescriptor {
            method,
            url,
            headers: resolved.headers,
            body,
            skip_auth: resolved.skip_auth,
            hooks: resolved.hooks,
            schema: resolved.schema,
        };
        Ok((descriptor, resolved.timeout))
    }

    pub(crate) fn resolve_url(&self, url: &str, query: &[(String, String)]) -> Result<String> {
        let joined = if is_absolute(url) {
            url.to_string()
        } else {
            match &self.base_url {
                Some(base) => format!("{}/{}", base, url.trim_start_matches('/')),
                None => {
                    return Err(Error::configuration_with_context(
                        "relative url without a base url",
                        ErrorContext::new()
                            .with_field_path("client.base_url")
                            .with_details(url.to_string())
                            .with_source("url_resolver"),
                    ))
                }
            }
        };

        let mut parsed = Url::parse(&joined).map_err(|e| {
            Error::configuration_with_context(
                format!("invalid request url: {}", e),
                ErrorContext::new()
                    .with_details(joined.clone())
                    .with_source("url_resolver"),
            )
        })?;
        if !query.is_empty() {
            let mut pairs = parsed.query_pairs_mut();
            for (k, v) in query {
                pairs.append_pair(k, v);
            }
        }
        Ok(parsed.into())
    }
}

fn is_absolute(url: &str) -> bool {
    let lower = url.get(..8).unwrap_or(url).to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

fn json_body<B: Serialize + ?Sized>(body: &B) -> Result<Option<RequestBody>> {
    let value = serde_json::to_value(body)?;
    Ok(match value {
        serde_json::Value::Null => None,
        v => Some(RequestBody::Json(v)),
    })
}
