//! Shared fixtures: a scripted in-memory transport and a counting refresher.

#![allow(dead_code)]

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use resilient_client::{
    ApiClient, RefreshError, RequestDescriptor, ResponseOutcome, TokenPair, TokenRefresher, Transport,
    TransportError,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

type Responder = dyn Fn(&RequestDescriptor, usize) -> Result<ResponseOutcome, TransportError> + Send + Sync;

/// Answers each request from a closure and records everything it was sent.
pub struct ScriptedTransport {
    responder: Box<Responder>,
    requests: Mutex<Vec<RequestDescriptor>>,
    latency: Option<Duration>,
}

impl ScriptedTransport {
    pub fn new<F>(responder: F) -> Arc<Self>
    where
        F: Fn(&RequestDescriptor, usize) -> Result<ResponseOutcome, TransportError> + Send + Sync + 'static,
    {
        Arc::new(Self {
            responder: Box::new(responder),
            requests: Mutex::new(Vec::new()),
            latency: None,
        })
    }

    pub fn with_latency<F>(latency: Duration, responder: F) -> Arc<Self>
    where
        F: Fn(&RequestDescriptor, usize) -> Result<ResponseOutcome, TransportError> + Send + Sync + 'static,
    {
        Arc::new(Self {
            responder: Box::new(responder),
            requests: Mutex::new(Vec::new()),
            latency: Some(latency),
        })
    }

    /// Always answers with the same outcome.
    pub fn always(outcome: ResponseOutcome) -> Arc<Self> {
        Self::new(move |_, _| Ok(outcome.clone()))
    }

    /// Answers the n-th call with the n-th outcome, repeating the last one.
    pub fn sequence(outcomes: Vec<ResponseOutcome>) -> Arc<Self> {
        Self::new(move |_, n| Ok(outcomes[n.min(outcomes.len() - 1)].clone()))
    }

    pub fn requests(&self) -> Vec<RequestDescriptor> {
        self.requests.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn authorization(&self, index: usize) -> Option<String> {
        self.requests()
            .get(index)
            .and_then(|r| r.header("authorization").map(str::to_string))
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: &RequestDescriptor) -> Result<ResponseOutcome, TransportError> {
        let index = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request.clone());
            requests.len() - 1
        };
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        (self.responder)(request, index)
    }
}

/// Issues `T2/R2`, `T3/R3`, ... and counts calls.
pub struct CountingRefresher {
    calls: AtomicUsize,
    fail: bool,
    latency: Duration,
}

impl CountingRefresher {
    pub fn succeeding() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            fail: false,
            latency: Duration::from_millis(20),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            fail: true,
            latency: Duration::from_millis(5),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenRefresher for CountingRefresher {
    async fn refresh(&self, _refresh_token: &str) -> Result<TokenPair, RefreshError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::time::sleep(self.latency).await;
        if self.fail {
            return Err(RefreshError::new("refresh token revoked"));
        }
        Ok(TokenPair::new(format!("T{}", n + 1), format!("R{}", n + 1)))
    }
}

pub fn json(status: u16, body: serde_json::Value) -> ResponseOutcome {
    ResponseOutcome::json(status, &body)
}

pub fn raw(status: u16, content_type: &'static str, body: &'static str) -> ResponseOutcome {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    ResponseOutcome::new(status, headers, body)
}

pub fn empty(status: u16) -> ResponseOutcome {
    ResponseOutcome::new(status, HeaderMap::new(), "")
}

/// Client over `transport`, logged in as `T1/R1`.
pub fn client(transport: Arc<ScriptedTransport>, refresher: Arc<CountingRefresher>) -> ApiClient {
    ApiClient::builder()
        .base_url("https://api.test")
        .transport(transport)
        .refresher(refresher)
        .credentials(TokenPair::new("T1", "R1"))
        .build()
        .unwrap()
}
