use crate::auth::{RefreshError, TokenManager, TokenPair, TokenRefresher};
use crate::client::core::ApiClient;
use crate::client::options::ClientDefaults;
use crate::interceptors::InterceptorPipeline;
use crate::transport::{HttpTransport, Transport};
use crate::types::request::parse_header;
use crate::{Error, ErrorContext, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Builder for creating clients with custom configuration.
///
/// Values not set explicitly fall back to the environment at `build()`:
/// - `RESILIENT_CLIENT_BASE_URL`: base URL for relative paths
/// - `RESILIENT_CLIENT_TIMEOUT_MS`: default per-request deadline (unset means none)
///
/// The default transport is [`HttpTransport`], which reads its own env knobs.
pub struct ApiClientBuilder {
    base_url: Option<String>,
    transport: Option<Arc<dyn Transport>>,
    refresher: Option<Arc<dyn TokenRefresher>>,
    credentials: Option<TokenPair>,
    token_manager: Option<Arc<TokenManager>>,
    defaults: ClientDefaults,
    auth_scheme: String,
    refresh_ahead: Option<Duration>,
}

impl ApiClientBuilder {
    pub fn new() -> Self {
        Self {
            base_url: None,
            transport: None,
            refresher: None,
            credentials: None,
            token_manager: None,
            defaults: ClientDefaults::default(),
            auth_scheme: "Bearer".to_string(),
            refresh_ahead: None,
        }
    }

    /// Base URL that relative request paths are appended to.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Replace the HTTP transport (tests, custom stacks).
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// The refresh endpoint used when a request fails authentication.
    pub fn refresher(mut self, refresher: Arc<dyn TokenRefresher>) -> Self {
        self.refresher = Some(refresher);
        self
    }

    /// Initial credentials. Without them the client starts unauthenticated.
    pub fn credentials(mut self, pair: TokenPair) -> Self {
        self.credentials = Some(pair);
        self
    }

    /// Share an existing token manager, e.g. between clients for different services.
    ///
    /// Takes precedence over `refresher` and `credentials`.
    pub fn token_manager(mut self, manager: Arc<TokenManager>) -> Self {
        self.token_manager = Some(manager);
        self
    }

    /// Header sent on every request unless the call overrides it.
    pub fn default_header(mut self, name: &str, value: &str) -> Result<Self> {
        let (name, value) = parse_header(name, value)?;
        self.defaults.headers.insert(name, value);
        Ok(self)
    }

    /// Do not attach credentials unless a call opts back in.
    pub fn skip_auth_by_default(mut self, skip: bool) -> Self {
        self.defaults.skip_auth = skip;
        self
    }

    /// Default deadline for a whole logical request, retry included.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.defaults.timeout = Some(timeout);
        self
    }

    /// Authorization scheme placed before the token. Default `Bearer`.
    pub fn auth_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.auth_scheme = scheme.into();
        self
    }

    /// Refresh before sending when the access token expires within `skew`.
    ///
    /// Only applies to tokens whose lifetime is known.
    pub fn refresh_ahead(mut self, skew: Duration) -> Self {
        self.refresh_ahead = Some(skew);
        self
    }

    /// Build the client.
    pub fn build(self) -> Result<ApiClient> {
        let base_url = match self
            .base_url
            .or_else(|| std::env::var("RESILIENT_CLIENT_BASE_URL").ok())
        {
            Some(raw) => Some(validate_base_url(&raw)?),
            None => None,
        };

        let mut defaults = self.defaults;
        if defaults.timeout.is_none() {
            defaults.timeout = std::env::var("RESILIENT_CLIENT_TIMEOUT_MS")
                .ok()
                .and_then(|s| s.parse::<u64>().ok())
                .filter(|ms| *ms > 0)
                .map(Duration::from_millis);
        }

        let transport: Arc<dyn Transport> = match self.transport {
            Some(t) => t,
            None => Arc::new(HttpTransport::new()?),
        };

        let tokens = match self.token_manager {
            Some(m) => m,
            None => {
                let refresher = self
                    .refresher
                    .unwrap_or_else(|| Arc::new(NoRefresher) as Arc<dyn TokenRefresher>);
                Arc::new(match self.credentials {
                    Some(pair) => TokenManager::new(refresher, pair),
                    None => TokenManager::unauthenticated(refresher),
                })
            }
        };

        Ok(ApiClient {
            base_url,
            transport,
            interceptors: InterceptorPipeline::new(),
            tokens,
            defaults,
            auth_scheme: self.auth_scheme,
            refresh_ahead: self.refresh_ahead,
        })
    }
}

impl Default for ApiClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn validate_base_url(raw: &str) -> Result<String> {
    let trimmed = raw.trim().trim_end_matches('/');
    Url::parse(trimmed).map_err(|e| {
        Error::configuration_with_context(
            format!("invalid base url: {}", e),
            ErrorContext::new()
                .with_field_path("client.base_url")
                .with_details(raw.to_string())
                .with_source("client_builder"),
        )
    })?;
    Ok(trimmed.to_string())
}

/// Used when no refresher is configured: every refresh fails.
struct NoRefresher;

#[async_trait]
impl TokenRefresher for NoRefresher {
    async fn refresh(&self, _refresh_token: &str) -> std::result::Result<TokenPair, RefreshError> {
        Err(RefreshError::new("no token refresher configured"))
    }
}
