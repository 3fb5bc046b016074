//! Body decoding for successful responses.

use std::sync::Arc;

use crate::error::ClassifiedError;
use crate::structured::SchemaValidator;
use crate::types::{Payload, ResponseOutcome};

/// Decode a 2xx outcome by content type.
///
/// - 204/205 or an empty body: [`Payload::NoContent`]
/// - JSON content type: parsed, a parse failure is a `Decode` error
/// - anything else: UTF-8 text
pub fn decode_body(outcome: &ResponseOutcome) -> Result<Payload, ClassifiedError> {
    if matches!(outcome.status, 204 | 205) || outcome.body.is_empty() {
        return Ok(Payload::NoContent);
    }

    if outcome.is_json() {
        return serde_json::from_slice(&outcome.body)
            .map(Payload::Json)
            .map_err(|e| {
                ClassifiedError::decode(format!("invalid JSON in response body: {}", e)).with_cause(e)
            });
    }

    String::from_utf8(outcome.body.to_vec())
        .map(Payload::Text)
        .map_err(|e| ClassifiedError::decode(format!("response body is not valid UTF-8: {}", e)).with_cause(e))
}

/// Run the caller's validator over the decoded payload; no-content is seen as `null`.
pub fn validate(payload: &Payload, schema: Option<&Arc<dyn SchemaValidator>>) -> Result<(), ClassifiedError> {
    let Some(schema) = schema else {
        return Ok(());
    };
    schema.validate(&payload.to_value()).map_err(|rejection| {
        ClassifiedError::decode(rejection.to_string())
            .with_data(serde_json::Value::from(rejection.messages()))
            .with_cause(rejection)
    })
}

/// [`decode_body`] then [`validate`].
pub fn decode(outcome: &ResponseOutcome, schema: Option<&Arc<dyn SchemaValidator>>) -> Result<Payload, ClassifiedError> {
    let payload = decode_body(outcome)?;
    validate(&payload, schema)?;
    Ok(payload)
}
