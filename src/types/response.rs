//! Raw transport outcome and the decoded payload handed to callers.

use bytes::Bytes;
use reqwest::header::{HeaderMap, CONTENT_TYPE};
use serde::de::DeserializeOwned;

use crate::error::ClassifiedError;

/// What the transport produced for one attempt.
#[derive(Debug, Clone)]
pub struct ResponseOutcome {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl ResponseOutcome {
    pub fn new(status: u16, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
        }
    }

    /// JSON response with the given status, mostly useful for tests and fakes.
    pub fn json(status: u16, value: &serde_json::Value) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_TYPE,
            reqwest::header::HeaderValue::from_static("application/json"),
        );
        Self::new(status, headers, value.to_string())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok())
    }

    pub fn is_json(&self) -> bool {
        self.content_type()
            .map(|ct| {
                let ct = ct.to_ascii_lowercase();
                ct.contains("application/json") || ct.contains("+json")
            })
            .unwrap_or(false)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// Decoded body of a successful response.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// JSON content type, parsed.
    Json(serde_json::Value),
    /// Any other content type, as text.
    Text(String),
    /// Empty body or a no-content status.
    NoContent,
}

impl Payload {
    pub fn is_no_content(&self) -> bool {
        matches!(self, Payload::NoContent)
    }

    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Payload::Json(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Payload::Text(t) => Some(t),
            _ => None,
        }
    }

    /// JSON view used by schema validators: text becomes a string, no-content becomes null.
    pub fn to_value(&self) -> serde_json::Value {
        match self {
            Payload::Json(v) => v.clone(),
            Payload::Text(t) => serde_json::Value::String(t.clone()),
            Payload::NoContent => serde_json::Value::Null,
        }
    }

    /// Deserialize into the caller's type; failure is a `Decode` error.
    pub fn deserialize<T: DeserializeOwned>(self) -> Result<T, ClassifiedError> {
        let value = match self {
            Payload::Json(v) => v,
            Payload::Text(t) => serde_json::Value::String(t),
            Payload::NoContent => serde_json::Value::Null,
        };
        serde_json::from_value(value).map_err(|e| {
            ClassifiedError::decode(format!(
                "response body does not match {}: {}",
                std::any::type_name::<T>(),
                e
            ))
            .with_cause(e)
        })
    }
}
