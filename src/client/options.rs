//! Client-wide defaults and per-call options.
//!
//! Merge rule, field by field:
//! - `headers`: per-call values replace defaults under the same (case-insensitive) name,
//! - `skip_auth`, `timeout`: per-call value wins when set,
//! - `schema`, `hooks`, `query`: per-call only; hooks run after registered interceptors.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::HeaderMap;

use crate::interceptors::Hooks;
use crate::structured::SchemaValidator;
use crate::types::request::parse_header;
use crate::Result;

/// Defaults applied to every request a client issues.
#[derive(Debug, Clone, Default)]
pub struct ClientDefaults {
    pub headers: HeaderMap,
    pub skip_auth: bool,
    pub timeout: Option<Duration>,
}

/// Recognized per-call options.
#[derive(Clone, Default)]
pub struct RequestOptions {
    pub headers: HeaderMap,
    pub skip_auth: Option<bool>,
    pub timeout: Option<Duration>,
    pub schema: Option<Arc<dyn SchemaValidator>>,
    pub hooks: Option<Hooks>,
    /// Appended to the resolved URL in order.
    pub query: Vec<(String, String)>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn header(mut self, name: &str, value: &str) -> Result<Self> {
        let (name, value) = parse_header(name, value)?;
        self.headers.insert(name, value);
        Ok(self)
    }

    pub fn skip_auth(mut self, skip: bool) -> Self {
        self.skip_auth = Some(skip);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn schema<V: SchemaValidator + 'static>(mut self, validator: V) -> Self {
        self.schema = Some(Arc::new(validator));
        self
    }

    /// Per-call interceptors; repeated calls accumulate.
    pub fn hooks(mut self, hooks: Hooks) -> Self {
        match &mut self.hooks {
            Some(existing) => existing.extend(hooks),
            None => self.hooks = Some(hooks),
        }
        self
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }
}

impl std::fmt::Debug for RequestOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestOptions")
            .field("headers", &self.headers)
            .field("skip_auth", &self.skip_auth)
            .field("timeout", &self.timeout)
            .field("schema", &self.schema.is_some())
            .field("hooks", &self.hooks.is_some())
            .field("query", &self.query)
            .finish()
    }
}

/// Result of [`merge`]: what one logical request runs with.
#[derive(Clone)]
pub struct ResolvedOptions {
    pub headers: HeaderMap,
    pub skip_auth: bool,
    pub timeout: Option<Duration>,
    pub schema: Option<Arc<dyn SchemaValidator>>,
    pub hooks: Option<Hooks>,
    pub query: Vec<(String, String)>,
}

/// Layer per-call options over client defaults.
pub fn merge(defaults: &ClientDefaults, options: RequestOptions) -> ResolvedOptions {
    let mut headers = defaults.headers.clone();
    for name in options.headers.keys() {
        headers.remove(name);
    }
    for (name, value) in options.headers.iter() {
        headers.append(name.clone(), value.clone());
    }

    ResolvedOptions {
        headers,
        skip_auth: options.skip_auth.unwrap_or(defaults.skip_auth),
        timeout: options.timeout.or(defaults.timeout),
        schema: options.schema,
        hooks: options.hooks.filter(|h| !h.is_empty()),
        query: options.query,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    fn defaults() -> ClientDefaults {
        let mut headers = HeaderMap::new();
        headers.insert("x-requested-with", HeaderValue::from_static("XMLHttpRequest"));
        headers.insert("accept", HeaderValue::from_static("application/json"));
        ClientDefaults {
            headers,
            skip_auth: false,
            timeout: Some(Duration::from_secs(10)),
        }
    }

    #[test]
    fn per_call_headers_override_by_name() {
        let options = RequestOptions::new().header("Accept", "text/csv").unwrap();
        let merged = merge(&defaults(), options);
        assert_eq!(merged.headers.get("accept").unwrap(), "text/csv");
        assert_eq!(merged.headers.get("x-requested-with").unwrap(), "XMLHttpRequest");
        assert_eq!(merged.headers.len(), 2);
    }

    #[test]
    fn unset_fields_fall_back_to_defaults() {
        let merged = merge(&defaults(), RequestOptions::new());
        assert!(!merged.skip_auth);
        assert_eq!(merged.timeout, Some(Duration::from_secs(10)));
        assert!(merged.hooks.is_none());
        assert!(merged.schema.is_none());
    }

    #[test]
    fn set_fields_win() {
        let options = RequestOptions::new()
            .skip_auth(true)
            .timeout(Duration::from_millis(250))
            .query("page", "2");
        let merged = merge(&defaults(), options);
        assert!(merged.skip_auth);
        assert_eq!(merged.timeout, Some(Duration::from_millis(250)));
        assert_eq!(merged.query, vec![("page".to_string(), "2".to_string())]);
    }

    #[test]
    fn defaults_can_skip_auth_and_calls_can_opt_back_in() {
        let mut d = defaults();
        d.skip_auth = true;
        assert!(merge(&d, RequestOptions::new()).skip_auth);
        assert!(!merge(&d, RequestOptions::new().skip_auth(false)).skip_auth);
    }
}
