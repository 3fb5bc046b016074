//! Transport seam: the only place bytes leave the process.
//!
//! The executor talks to a [`Transport`]; [`HttpTransport`] is the reqwest
//! implementation and tests plug in scripted fakes. A transport resolves with
//! any status code, classification happens above this boundary.

pub mod http;

pub use http::HttpTransport;

use async_trait::async_trait;

use crate::types::{RequestDescriptor, ResponseOutcome};

/// Sends one request and returns whatever the server answered.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &RequestDescriptor) -> Result<ResponseOutcome, TransportError>;
}

/// The request never produced a response (DNS, connect, TLS, body read).
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Transport error: {0}")]
    Other(String),
}
