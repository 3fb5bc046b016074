//! Status-based classification of transport outcomes.
//!
//! The status-to-kind table lives in [`ErrorKind::from_http_status`]; this
//! module attaches the response payload and handles the transport-failure path.

use crate::error::ClassifiedError;
use crate::transport::TransportError;
use crate::types::ResponseOutcome;

#[cfg(doc)]
use crate::error_code::ErrorKind;

/// 2xx outcomes pass through unchanged for decoding; anything else becomes a
/// [`ClassifiedError`] with the parsed body attached as `data`.
///
/// A body that is empty or does not parse as JSON yields an empty object as
/// `data` instead of failing.
pub fn classify(outcome: ResponseOutcome) -> Result<ResponseOutcome, ClassifiedError> {
    if outcome.is_success() {
        return Ok(outcome);
    }
    let data = error_payload(&outcome);
    Err(ClassifiedError::from_status(outcome.status, data))
}

/// The descriptor never reached a server.
pub fn classify_transport_error(err: TransportError) -> ClassifiedError {
    ClassifiedError::network(err)
}

fn error_payload(outcome: &ResponseOutcome) -> Option<serde_json::Value> {
    let parsed = if outcome.body.is_empty() {
        None
    } else {
        serde_json::from_slice(&outcome.body).ok()
    };
    Some(parsed.unwrap_or_else(|| serde_json::Value::Object(Default::default())))
}
