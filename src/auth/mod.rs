//! Credential lifecycle: the access/refresh pair and single-flight refresh.
//!
//! [`TokenManager`] is the only owner of credential state. Concurrent callers
//! that need a refresh share one in-flight call to the [`TokenRefresher`] and
//! all observe the same outcome.

mod token_manager;

pub use token_manager::{TokenManager, TokenState};

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A credential pair as returned by the refresh endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Lifetime of the access token, if the endpoint reports one.
    #[serde(default, with = "optional_secs", skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<Duration>,
}

impl TokenPair {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            expires_in: None,
        }
    }

    pub fn with_expires_in(mut self, expires_in: Duration) -> Self {
        self.expires_in = Some(expires_in);
        self
    }
}

mod optional_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => s.serialize_some(&d.as_secs()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(d)?.map(Duration::from_secs))
    }
}

/// Why a refresh did not produce new credentials.
///
/// Cloneable so every waiter on a shared refresh receives the same value.
#[derive(Debug, Clone)]
pub struct RefreshError {
    message: String,
    invalidated: bool,
    cause: Option<Arc<dyn std::error::Error + Send + Sync + 'static>>,
}

impl RefreshError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            invalidated: false,
            cause: None,
        }
    }

    pub fn with_cause(mut self, cause: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.cause = Some(Arc::new(cause));
        self
    }

    /// Refused without calling the endpoint because the credentials were already invalidated.
    pub(crate) fn already_invalidated() -> Self {
        Self {
            message: "credentials invalidated; re-authentication required".to_string(),
            invalidated: true,
            cause: None,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// True when the manager was already invalidated and no refresh call was made.
    pub fn is_already_invalidated(&self) -> bool {
        self.invalidated
    }
}

impl fmt::Display for RefreshError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "token refresh failed: {}", self.message)
    }
}

impl std::error::Error for RefreshError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_ref()
            .map(|c| &**c as &(dyn std::error::Error + 'static))
    }
}

/// The external refresh endpoint.
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, RefreshError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_pair_reads_expires_in_seconds() {
        let pair: TokenPair = serde_json::from_str(
            r#"{"access_token":"a","refresh_token":"r","expires_in":300}"#,
        )
        .unwrap();
        assert_eq!(pair.expires_in, Some(Duration::from_secs(300)));

        let bare: TokenPair =
            serde_json::from_str(r#"{"access_token":"a","refresh_token":"r"}"#).unwrap();
        assert_eq!(bare, TokenPair::new("a", "r"));
    }

    #[test]
    fn refresh_error_keeps_cause() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "endpoint down");
        let err = RefreshError::new("endpoint unavailable").with_cause(io);
        assert!(std::error::Error::source(&err).is_some());
        assert!(!err.is_already_invalidated());
        assert_eq!(err.to_string(), "token refresh failed: endpoint unavailable");
    }

    #[test]
    fn refresher_is_object_safe() {
        struct Echo;

        #[async_trait]
        impl TokenRefresher for Echo {
            async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, RefreshError> {
                Ok(TokenPair::new("fresh", refresh_token))
            }
        }

        let refresher: Arc<dyn TokenRefresher> = Arc::new(Echo);
        let pair = tokio_test::block_on(refresher.refresh("R1")).unwrap();
        assert_eq!(pair, TokenPair::new("fresh", "R1"));
    }
}
