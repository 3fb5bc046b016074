//! Request execution: interceptors, credentials, transport, classification,
//! a single retry after a token refresh, then decoding.

use std::time::{Duration, Instant};

use reqwest::header::{HeaderValue, AUTHORIZATION};
use serde::de::DeserializeOwned;
use tracing::{debug, info};
use uuid::Uuid;

use super::classification::{classify, classify_transport_error};
use super::core::ApiClient;
use super::decode::decode;
use crate::auth::RefreshError;
use crate::error::ClassifiedError;
use crate::error_code::ErrorKind;
use crate::interceptors::{ErrorAction, Hooks};
use crate::types::{Payload, RequestDescriptor, ResponseOutcome};
use crate::{Error, ErrorContext, Result};

/// Correlation header; one value per logical request, kept across the retry.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// At most the original attempt plus one retry after a refresh.
const MAX_ATTEMPTS: u32 = 2;

enum AttemptFailure {
    /// A request interceptor refused the request; the transport was never called.
    Aborted(Error),
    /// Anything after the transport call; goes through the error interceptors.
    Failed(Error),
}

/// Where a successful payload came from. A suppressed payload has already been
/// through the error interceptors and must not be handed to them again.
enum Delivery {
    Decoded(Payload),
    Suppressed(Payload),
}

impl Delivery {
    fn into_payload(self) -> Payload {
        match self {
            Delivery::Decoded(payload) | Delivery::Suppressed(payload) => payload,
        }
    }
}

impl ApiClient {
    /// Run one logical request under the client's default deadline.
    pub async fn execute(&self, request: RequestDescriptor) -> Result<Payload> {
        self.execute_with_deadline(request, self.defaults.timeout).await
    }

    /// Run one logical request, failing with [`Error::Timeout`] once `deadline`
    /// elapses. `None` waits indefinitely.
    ///
    /// A refresh started by this request keeps running after the deadline, so
    /// other requests waiting on it are unaffected.
    pub async fn execute_with_deadline(&self, request: RequestDescriptor, deadline: Option<Duration>) -> Result<Payload> {
        self.deliver(request, deadline).await.map(Delivery::into_payload)
    }

    /// [`execute`](Self::execute) and deserialize the payload into `T`.
    pub async fn execute_as<T: DeserializeOwned>(&self, request: RequestDescriptor) -> Result<T> {
        self.execute_as_with_deadline(request, self.defaults.timeout).await
    }

    /// A payload that fails to deserialize goes through the error interceptors
    /// once. A payload an error interceptor already supplied fails directly.
    pub(crate) async fn execute_as_with_deadline<T: DeserializeOwned>(
        &self,
        request: RequestDescriptor,
        deadline: Option<Duration>,
    ) -> Result<T> {
        let hooks = request.hooks.clone();
        let payload = match self.deliver(request, deadline).await? {
            Delivery::Suppressed(payload) => return Ok(payload.deserialize::<T>()?),
            Delivery::Decoded(payload) => payload,
        };
        match payload.deserialize::<T>() {
            Ok(value) => Ok(value),
            Err(err) => match self.interceptors.apply_error(err.into(), hooks.as_ref()).await {
                ErrorAction::Propagate(e) => Err(e),
                ErrorAction::Suppress(replacement) => Ok(replacement.deserialize::<T>()?),
            },
        }
    }

    async fn deliver(&self, request: RequestDescriptor, deadline: Option<Duration>) -> Result<Delivery> {
        let Some(after) = deadline else {
            return self.run(request).await;
        };
        let hooks = request.hooks.clone();
        match tokio::time::timeout(after, self.run(request)).await {
            Ok(result) => result,
            Err(_) => {
                info!(duration_ms = after.as_millis() as u64, "resilient-client request timed out");
                self.finish_error(Error::Timeout { after }, hooks.as_ref()).await
            }
        }
    }

    async fn run(&self, request: RequestDescriptor) -> Result<Delivery> {
        let started = Instant::now();
        let request_id = request
            .header(REQUEST_ID_HEADER)
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let outcome = match self.send_with_auth_retry(&request, &request_id).await {
            Ok(outcome) => outcome,
            Err(AttemptFailure::Aborted(e)) => {
                debug!(request_id = request_id.as_str(), error = %e, "request aborted by interceptor");
                return Err(e);
            }
            Err(AttemptFailure::Failed(e)) => {
                self.log_failure(&e, &request_id, started);
                return self.finish_error(e, request.hooks.as_ref()).await;
            }
        };

        match decode(&outcome, request.schema.as_ref()) {
            Ok(payload) => {
                debug!(
                    http_status = outcome.status,
                    request_id = request_id.as_str(),
                    duration_ms = started.elapsed().as_millis() as u64,
                    "resilient-client request succeeded"
                );
                Ok(Delivery::Decoded(payload))
            }
            Err(e) => {
                let e = Error::from(e);
                self.log_failure(&e, &request_id, started);
                self.finish_error(e, request.hooks.as_ref()).await
            }
        }
    }

    async fn send_with_auth_retry(
        &self,
        request: &RequestDescriptor,
        request_id: &str,
    ) -> std::result::Result<ResponseOutcome, AttemptFailure> {
        if !request.skip_auth {
            self.refresh_ahead_if_expiring().await;
        }

        let hooks = request.hooks.as_ref();
        let mut attempt = 1;
        loop {
            let prepared = self
                .prepare_attempt(request.clone(), hooks, request_id)
                .await
                .map_err(AttemptFailure::Aborted)?;
            let used_token = prepared.authorization_token().map(str::to_string);

            debug!(
                method = %prepared.method,
                url = prepared.url.as_str(),
                request_id,
                attempt,
                "resilient-client sending request"
            );
            let outcome = self
                .transport
                .send(&prepared)
                .await
                .map_err(|e| AttemptFailure::Failed(classify_transport_error(e).into()))?;

            let outcome = self
                .interceptors
                .apply_response(outcome, hooks)
                .await
                .map_err(AttemptFailure::Failed)?;

            let err = match classify(outcome) {
                Ok(outcome) => return Ok(outcome),
                Err(err) => err,
            };

            let retryable = err.kind() == ErrorKind::Authentication && !prepared.skip_auth && attempt < MAX_ATTEMPTS;
            if !retryable {
                return Err(AttemptFailure::Failed(err.into()));
            }

            info!(
                http_status = err.status().unwrap_or(0),
                request_id,
                attempt,
                "authentication failed; refreshing credentials"
            );
            match self.tokens.refresh_after(used_token.as_deref()).await {
                Ok(_) => attempt += 1,
                Err(refresh) => return Err(AttemptFailure::Failed(refresh_failure(err, refresh).into())),
            }
        }
    }

    /// Request interceptors first, then the correlation id and the latest
    /// access token, so a refresh that finished mid-fold is still picked up.
    async fn prepare_attempt(
        &self,
        request: RequestDescriptor,
        hooks: Option<&Hooks>,
        request_id: &str,
    ) -> Result<RequestDescriptor> {
        let mut prepared = self.interceptors.apply_request(request, hooks).await?;

        if !prepared.headers.contains_key(REQUEST_ID_HEADER) {
            prepared.insert_header(REQUEST_ID_HEADER, request_id)?;
        }

        if !prepared.skip_auth {
            let token = self.tokens.current_access_token();
            if !token.is_empty() {
                let mut value = HeaderValue::from_str(&format!("{} {}", self.auth_scheme, token)).map_err(|e| {
                    Error::configuration_with_context(
                        format!("access token is not a valid header value: {}", e),
                        ErrorContext::new()
                            .with_field_path("request.headers.authorization")
                            .with_source("request_executor"),
                    )
                })?;
                value.set_sensitive(true);
                prepared.headers.insert(AUTHORIZATION, value);
            }
        }

        Ok(prepared)
    }

    async fn refresh_ahead_if_expiring(&self) {
        let Some(skew) = self.refresh_ahead else {
            return;
        };
        if !self.tokens.is_expired(skew) {
            return;
        }
        match self.tokens.request_refresh().await {
            Ok(_) => debug!("access token refreshed ahead of expiry"),
            Err(e) => debug!(error = %e, "refresh ahead of expiry failed; sending with current token"),
        }
    }

    async fn finish_error(&self, error: Error, hooks: Option<&Hooks>) -> Result<Delivery> {
        match self.interceptors.apply_error(error, hooks).await {
            ErrorAction::Propagate(e) => Err(e),
            ErrorAction::Suppress(payload) => {
                debug!("error suppressed by interceptor");
                Ok(Delivery::Suppressed(payload))
            }
        }
    }

    fn log_failure(&self, error: &Error, request_id: &str, started: Instant) {
        let duration_ms = started.elapsed().as_millis() as u64;
        match error.classified() {
            Some(c) => info!(
                http_status = c.status().unwrap_or(0),
                error_kind = c.code(),
                request_id,
                duration_ms,
                "resilient-client request failed"
            ),
            None => info!(error = %error, request_id, duration_ms, "resilient-client request failed"),
        }
    }
}

/// Keep the 401's status and payload, but mark the refresh as the cause so
/// callers can tell it from a rejected fresh token.
fn refresh_failure(err: ClassifiedError, refresh: RefreshError) -> ClassifiedError {
    err.with_message(format!("{}: {}", ErrorKind::Authentication.default_message(), refresh))
        .with_cause(refresh)
}
