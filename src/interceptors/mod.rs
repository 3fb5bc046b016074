//! Interceptor hooks for application-layer cross-cutting concerns.
//!
//! Three ordered registries:
//! - request interceptors transform the [`RequestDescriptor`] before it is sent,
//! - response interceptors see every [`ResponseOutcome`] before it is classified,
//! - error interceptors replace or suppress the final [`Error`].
//!
//! Registration order is execution order. Per-call [`Hooks`] run after the
//! registered ones. The pipeline performs no I/O of its own; logging, header
//! injection and alerting belong in interceptors.

mod builtin;

pub use builtin::{StaticHeaders, TracingInterceptor};

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use crate::types::{Payload, RequestDescriptor, ResponseOutcome};
use crate::{Error, Result};

/// Transforms a request before it reaches the transport.
///
/// Returning `Err` aborts the whole request; the transport is never called.
#[async_trait]
pub trait RequestInterceptor: Send + Sync {
    async fn on_request(&self, request: RequestDescriptor) -> Result<RequestDescriptor>;
}

/// Observes (or rewrites) a raw response before status classification.
#[async_trait]
pub trait ResponseInterceptor: Send + Sync {
    async fn on_response(&self, response: ResponseOutcome) -> Result<ResponseOutcome>;
}

/// What an error interceptor decided.
#[derive(Debug)]
pub enum ErrorAction {
    /// Keep propagating this error (the same one, or a replacement).
    Propagate(Error),
    /// Stop propagation and hand the caller this payload instead.
    Suppress(Payload),
}

/// Replaces or suppresses the error a request ends with.
#[async_trait]
pub trait ErrorInterceptor: Send + Sync {
    async fn on_error(&self, error: Error) -> ErrorAction;
}

/// Adapter for plain closures as request interceptors.
pub struct FnRequestInterceptor<F>(pub F);

impl<F> FnRequestInterceptor<F>
where
    F: Fn(RequestDescriptor) -> Result<RequestDescriptor> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

#[async_trait]
impl<F> RequestInterceptor for FnRequestInterceptor<F>
where
    F: Fn(RequestDescriptor) -> Result<RequestDescriptor> + Send + Sync,
{
    async fn on_request(&self, request: RequestDescriptor) -> Result<RequestDescriptor> {
        (self.0)(request)
    }
}

/// Adapter for plain closures as response interceptors.
pub struct FnResponseInterceptor<F>(pub F);

impl<F> FnResponseInterceptor<F>
where
    F: Fn(ResponseOutcome) -> Result<ResponseOutcome> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

#[async_trait]
impl<F> ResponseInterceptor for FnResponseInterceptor<F>
where
    F: Fn(ResponseOutcome) -> Result<ResponseOutcome> + Send + Sync,
{
    async fn on_response(&self, response: ResponseOutcome) -> Result<ResponseOutcome> {
        (self.0)(response)
    }
}

/// Adapter for plain closures as error interceptors.
pub struct FnErrorInterceptor<F>(pub F);

impl<F> FnErrorInterceptor<F>
where
    F: Fn(Error) -> ErrorAction + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

#[async_trait]
impl<F> ErrorInterceptor for FnErrorInterceptor<F>
where
    F: Fn(Error) -> ErrorAction + Send + Sync,
{
    async fn on_error(&self, error: Error) -> ErrorAction {
        (self.0)(error)
    }
}

/// Per-call interceptor additions.
#[derive(Clone, Default)]
pub struct Hooks {
    pub request: Vec<Arc<dyn RequestInterceptor>>,
    pub response: Vec<Arc<dyn ResponseInterceptor>>,
    pub error: Vec<Arc<dyn ErrorInterceptor>>,
}

impl Hooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_request<I: RequestInterceptor + 'static>(mut self, interceptor: I) -> Self {
        self.request.push(Arc::new(interceptor));
        self
    }

    pub fn on_response<I: ResponseInterceptor + 'static>(mut self, interceptor: I) -> Self {
        self.response.push(Arc::new(interceptor));
        self
    }

    pub fn on_error<I: ErrorInterceptor + 'static>(mut self, interceptor: I) -> Self {
        self.error.push(Arc::new(interceptor));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.request.is_empty() && self.response.is_empty() && self.error.is_empty()
    }

    /// Append `other` after `self`.
    pub fn extend(&mut self, other: Hooks) {
        self.request.extend(other.request);
        self.response.extend(other.response);
        self.error.extend(other.error);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Stage {
    Request,
    Response,
    Error,
}

/// Returned by registration; pass to [`InterceptorPipeline::remove`] to unregister.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InterceptorHandle {
    stage: Stage,
    id: u64,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    request: Vec<(u64, Arc<dyn RequestInterceptor>)>,
    response: Vec<(u64, Arc<dyn ResponseInterceptor>)>,
    error: Vec<(u64, Arc<dyn ErrorInterceptor>)>,
}

impl Registry {
    fn next(&mut self, stage: Stage) -> InterceptorHandle {
        self.next_id += 1;
        InterceptorHandle {
            stage,
            id: self.next_id,
        }
    }
}

/// Ordered interceptor registries owned by a client instance.
#[derive(Default)]
pub struct InterceptorPipeline {
    registry: RwLock<Registry>,
}

impl InterceptorPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Registry> {
        self.registry.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Registry> {
        self.registry.write().unwrap_or_else(|e| e.into_inner())
    }

    pub fn add_request_interceptor<I: RequestInterceptor + 'static>(&self, interceptor: I) -> InterceptorHandle {
        let mut reg = self.write();
        let handle = reg.next(Stage::Request);
        reg.request.push((handle.id, Arc::new(interceptor)));
        handle
    }

    pub fn add_response_interceptor<I: ResponseInterceptor + 'static>(&self, interceptor: I) -> InterceptorHandle {
        let mut reg = self.write();
        let handle = reg.next(Stage::Response);
        reg.response.push((handle.id, Arc::new(interceptor)));
        handle
    }

    pub fn add_error_interceptor<I: ErrorInterceptor + 'static>(&self, interceptor: I) -> InterceptorHandle {
        let mut reg = self.write();
        let handle = reg.next(Stage::Error);
        reg.error.push((handle.id, Arc::new(interceptor)));
        handle
    }

    /// Unregister a previously added interceptor. Returns false if it was already gone.
    pub fn remove(&self, handle: InterceptorHandle) -> bool {
        let mut reg = self.write();
        match handle.stage {
            Stage::Request => {
                let len = reg.request.len();
                reg.request.retain(|(id, _)| *id != handle.id);
                reg.request.len() < len
            }
            Stage::Response => {
                let len = reg.response.len();
                reg.response.retain(|(id, _)| *id != handle.id);
                reg.response.len() < len
            }
            Stage::Error => {
                let len = reg.error.len();
                reg.error.retain(|(id, _)| *id != handle.id);
                reg.error.len() < len
            }
        }
    }

    /// (request, response, error) counts.
    pub fn len(&self) -> (usize, usize, usize) {
        let reg = self.read();
        (reg.request.len(), reg.response.len(), reg.error.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == (0, 0, 0)
    }

    // Snapshots are taken under the lock and awaited after it is released, so a
    // registration during a fold only affects later requests.

    fn request_chain(&self, extra: Option<&Hooks>) -> Vec<Arc<dyn RequestInterceptor>> {
        let mut chain: Vec<_> = self.read().request.iter().map(|(_, i)| i.clone()).collect();
        if let Some(hooks) = extra {
            chain.extend(hooks.request.iter().cloned());
        }
        chain
    }

    fn response_chain(&self, extra: Option<&Hooks>) -> Vec<Arc<dyn ResponseInterceptor>> {
        let mut chain: Vec<_> = self.read().response.iter().map(|(_, i)| i.clone()).collect();
        if let Some(hooks) = extra {
            chain.extend(hooks.response.iter().cloned());
        }
        chain
    }

    fn error_chain(&self, extra: Option<&Hooks>) -> Vec<Arc<dyn ErrorInterceptor>> {
        let mut chain: Vec<_> = self.read().error.iter().map(|(_, i)| i.clone()).collect();
        if let Some(hooks) = extra {
            chain.extend(hooks.error.iter().cloned());
        }
        chain
    }

    /// Fold a request through every request interceptor in order.
    pub async fn apply_request(&self, request: RequestDescriptor, extra: Option<&Hooks>) -> Result<RequestDescriptor> {
        let mut current = request;
        for interceptor in self.request_chain(extra) {
            current = interceptor.on_request(current).await?;
        }
        Ok(current)
    }

    /// Fold a raw response through every response interceptor in order.
    pub async fn apply_response(&self, response: ResponseOutcome, extra: Option<&Hooks>) -> Result<ResponseOutcome> {
        let mut current = response;
        for interceptor in self.response_chain(extra) {
            current = interceptor.on_response(current).await?;
        }
        Ok(current)
    }

    /// Fold an error through every error interceptor in order.
    ///
    /// The first interceptor that suppresses ends the fold.
    pub async fn apply_error(&self, error: Error, extra: Option<&Hooks>) -> ErrorAction {
        let mut current = error;
        for interceptor in self.error_chain(extra) {
            match interceptor.on_error(current).await {
                ErrorAction::Propagate(next) => current = next,
                suppressed @ ErrorAction::Suppress(_) => return suppressed,
            }
        }
        ErrorAction::Propagate(current)
    }
}
